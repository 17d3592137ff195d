//! blackboard-core
//!
//! 共有ストア（blackboard）の行を介してエージェント同士が仕事を受け渡すための部品。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, stage / status, payload, task / project 行）
//! - **ports**: 抽象化レイヤー（BlackboardStore, Generator, ChatTransport, Clock, IdGenerator）
//! - **impls**: 実装（PostgREST / Gemini / Telegram アダプタ、開発用 InMemoryStore）
//! - **app**: アプリケーションロジック（router, scanner, executor, polling_loop, intake）
//! - **config**: 環境変数からの役割別設定
//! - **observability**: tracing の初期化と状態集計

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
