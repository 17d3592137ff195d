//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 外部システム（Supabase, Gemini, Telegram）はすべてこの trait 越しに使い、
//! クライアントは main で組み立てて各コンポーネントに注入します。

pub mod blackboard_store;
pub mod chat;
pub mod clock;
pub mod generator;
pub mod id_generator;

pub use self::blackboard_store::{BlackboardStore, Filters, StoreError, Table};
pub use self::chat::{ChatTransport, IncomingMessage, TransportError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::generator::{GenerationError, Generator, generate_within};
pub use self::id_generator::{IdGenerator, UlidGenerator};
