//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryStore**: 開発・テスト用の blackboard store
//! - **PostgrestStore**: Supabase (PostgREST) の blackboard store
//! - **GeminiGenerator**: 生成 AI バックエンド
//! - **TelegramTransport**: 会話フロントエンド

pub mod gemini;
pub mod inmem_store;
pub mod postgrest;
pub mod telegram;

pub use self::gemini::GeminiGenerator;
pub use self::inmem_store::InMemoryStore;
pub use self::postgrest::PostgrestStore;
pub use self::telegram::TelegramTransport;
