//! Generator port - 生成 AI バックエンドの抽象化
//!
//! core から見ると `generate(model, prompt) -> text` という不透明な関数です。
//! 分類用の速いモデルと、調査用の高品質モデルの 2 プロファイルで使います。
//!
//! # 実装
//! - **GeminiGenerator**: Google Generative Language API

use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation backend unavailable: {0}")]
    Unavailable(String),

    #[error("generation backend rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("generation backend returned no text: {0}")]
    Empty(String),
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;
}

/// Bound a generation call; a timeout becomes [`GenerationError::Timeout`].
pub async fn generate_within(
    generator: &dyn Generator,
    model: &str,
    prompt: &str,
    limit: Duration,
) -> Result<String, GenerationError> {
    match tokio::time::timeout(limit, generator.generate(model, prompt)).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl Generator for Slow {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".to_string())
        }
    }

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
            Ok(format!("{model}:{prompt}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out() {
        let err = generate_within(&Slow, "m", "p", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn fast_generation_passes_through() {
        let text = generate_within(&Echo, "m", "p", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(text, "m:p");
    }
}
