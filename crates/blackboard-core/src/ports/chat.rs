//! ChatTransport port - 会話フロントエンドとの境界
//!
//! # 実装
//! - **TelegramTransport**: Bot API の long polling

use async_trait::async_trait;

/// A text message delivered by the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub requester_id: i64,
    pub requester_name: String,
    pub chat_id: i64,
    pub text: String,
}

impl IncomingMessage {
    /// `/start` や `/start@bot_name` なら command 名を返す
    pub fn command(&self) -> Option<&str> {
        let first = self.text.split_whitespace().next()?;
        let command = first.strip_prefix('/')?;
        Some(command.split('@').next().unwrap_or(command))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("chat transport unavailable: {0}")]
    Unavailable(String),

    #[error("chat transport rejected request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Wait for the next batch of messages (may be empty).
    async fn poll(&self) -> Result<Vec<IncomingMessage>, TransportError>;

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage {
            requester_id: 1,
            requester_name: "Ana".to_string(),
            chat_id: 1,
            text: text.to_string(),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(message("/start").command(), Some("start"));
        assert_eq!(message("/start@alice_bot hi").command(), Some("start"));
        assert_eq!(message("research Peru").command(), None);
        assert_eq!(message("").command(), None);
    }
}
