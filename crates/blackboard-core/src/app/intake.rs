//! Intake - チャットのメッセージを受けて返答を決める
//!
//! # フロー
//! 1. allow-list に無い requester は固定のお断りメッセージ（/start も同じ）
//! 2. `/start` には挨拶、それ以外のコマンドは無視
//! 3. 分類モデルで依頼か雑談かを判定
//! 4. 依頼なら TaskRouter::submit が成功してから受付メッセージを返す
//!
//! 分類の失敗（生成エラー・パースエラー）はここで回収し、タスクは作りません。

use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::classify::{classification_prompt, parse_classification};
use super::router::{SubmissionError, TaskRouter};
use crate::ports::{ChatTransport, Generator, IncomingMessage, generate_within};

pub const REJECTION_REPLY: &str = "Sorry, you are not authorized to use this system.";
pub const GREETING_REPLY: &str =
    "Hello. I'm Alice, your operations manager. What shall we research today?";
pub const CASUAL_FALLBACK_REPLY: &str = "Understood.";
pub const APOLOGY_REPLY: &str = "I had trouble processing that. Could you say it again?";
pub const SUBMISSION_FAILED_REPLY: &str = "There was an error registering the project.";
pub const EMPTY_TOPIC_REPLY: &str =
    "I couldn't tell what to research. Could you rephrase the request?";

/// transport エラー後の待ち時間
const TRANSPORT_RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Requester ids allowed to talk to the intake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList(HashSet<i64>);

impl AllowList {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn contains(&self, requester_id: i64) -> bool {
        self.0.contains(&requester_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct Intake {
    router: TaskRouter,
    generator: Arc<dyn Generator>,
    allow_list: AllowList,
    model: String,
    timeout: Duration,
}

impl Intake {
    pub fn new(
        router: TaskRouter,
        generator: Arc<dyn Generator>,
        allow_list: AllowList,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            router,
            generator,
            allow_list,
            model: model.into(),
            timeout,
        }
    }

    /// Decide the reply for one message; `None` means stay silent.
    pub async fn handle(&self, message: &IncomingMessage) -> Option<String> {
        if !self.allow_list.contains(message.requester_id) {
            warn!(
                requester_id = message.requester_id,
                requester = %message.requester_name,
                "unauthorized requester"
            );
            return Some(REJECTION_REPLY.to_string());
        }

        match message.command() {
            Some("start") => {
                info!(requester = %message.requester_name, "/start received");
                return Some(GREETING_REPLY.to_string());
            }
            Some(other) => {
                debug!(command = other, "ignoring unknown command");
                return None;
            }
            None => {}
        }

        let prompt = classification_prompt(&message.requester_name, &message.text);
        let raw = match generate_within(self.generator.as_ref(), &self.model, &prompt, self.timeout)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "classification failed");
                return Some(APOLOGY_REPLY.to_string());
            }
        };
        let verdict = match parse_classification(&raw) {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(error = %e, raw = %e.raw, "classification response unusable");
                return Some(APOLOGY_REPLY.to_string());
            }
        };

        if !verdict.is_order {
            return Some(
                verdict
                    .casual_reply
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| CASUAL_FALLBACK_REPLY.to_string()),
            );
        }

        let topic = verdict.topic.unwrap_or_default();
        info!(topic = %topic, "order detected");
        let reply_context = json!({ "chat_id": message.chat_id });
        match self
            .router
            .submit(&message.requester_name, &topic, reply_context)
            .await
        {
            Ok(_) => Some(format!(
                "Understood, {}. Passing '{}' to {}.",
                message.requester_name,
                topic.trim(),
                self.router.agent()
            )),
            Err(SubmissionError::EmptyTopic) => Some(EMPTY_TOPIC_REPLY.to_string()),
            Err(_) => Some(SUBMISSION_FAILED_REPLY.to_string()),
        }
    }
}

/// Poll `transport` and answer each message until shutdown.
pub async fn run_intake(
    transport: Arc<dyn ChatTransport>,
    intake: Arc<Intake>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("intake started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        let polled = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            polled = transport.poll() => polled,
        };

        let messages = match polled {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "chat poll failed; pausing");
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(TRANSPORT_RETRY_PAUSE) => {}
                }
                continue;
            }
        };

        for message in messages {
            let Some(reply) = intake.handle(&message).await else {
                continue;
            };
            if let Err(e) = transport.reply(message.chat_id, &reply).await {
                warn!(chat_id = message.chat_id, error = %e, "reply not delivered");
            }
        }
    }
    info!("intake stopped");
}
