//! TelegramTransport - Telegram Bot API の long polling
//!
//! `getUpdates` で受信し、`sendMessage` で返信します。
//! 受信済み update_id は offset として保持し、同じ update を二度処理しないようにします。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::ports::{ChatTransport, IncomingMessage, TransportError};

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramTransport {
    http: reqwest::Client,
    base_url: String,
    long_poll: Duration,
    next_offset: AtomicI64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    from: Option<User>,
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    first_name: String,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl TelegramTransport {
    pub fn new(token: &str, long_poll: Duration) -> Result<Self, TransportError> {
        // long poll より長い timeout にしないと毎回 timeout 扱いになる
        let http = reqwest::Client::builder()
            .timeout(long_poll + Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: format!("{API_BASE}/bot{token}"),
            long_poll,
            next_offset: AtomicI64::new(0),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(e.without_url().to_string()))?;

        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Unavailable(e.without_url().to_string()))?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TransportError::Rejected(
                description.unwrap_or_else(|| format!("{method} failed")),
            )),
        }
    }
}

/// text を持つメッセージだけを IncomingMessage に変換
fn to_incoming(update: Update) -> Option<IncomingMessage> {
    let message = update.message?;
    let from = message.from?;
    Some(IncomingMessage {
        requester_id: from.id,
        requester_name: from.first_name,
        chat_id: message.chat.id,
        text: message.text?,
    })
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn poll(&self) -> Result<Vec<IncomingMessage>, TransportError> {
        let offset = self.next_offset.load(Ordering::Relaxed);
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": self.long_poll.as_secs(),
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.next_offset.store(last + 1, Ordering::Relaxed);
        }
        Ok(updates.into_iter().filter_map(to_incoming).collect())
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let _sent: serde_json::Value = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }
}
