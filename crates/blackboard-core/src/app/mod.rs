//! App - アプリケーション層
//!
//! ports を組み合わせて blackboard のワークフローを実装します。
//!
//! # 主要コンポーネント
//! - **Blackboard**: 行の読み書きと状態遷移の検証（claim / complete / fail）
//! - **TaskRouter**: 依頼を project + task 行として書き込む
//! - **TaskScanner**: (stage, status, agent) で対象行を取得
//! - **TaskExecutor**: claim → 生成 → 終端状態
//! - **PollingLoop**: scanner / executor を固定間隔で回す
//! - **Intake**: チャットの受信を分類して router に渡す

pub mod board;
pub mod classify;
pub mod executor;
pub mod intake;
pub mod polling_loop;
pub mod research;
pub mod router;
pub mod scanner;

// 主要な型を再エクスポート
pub use self::board::{Blackboard, StoreWriteError};
pub use self::classify::{Classification, ParseError, classification_prompt, parse_classification};
pub use self::executor::{ExecutorError, ProcessOutcome, StageHandler, TaskExecutor};
pub use self::intake::{AllowList, Intake, run_intake};
pub use self::polling_loop::{CycleReport, PollingHandle, PollingLoop};
pub use self::research::{ResearchHandler, research_prompt};
pub use self::router::{SubmissionError, TaskRouter};
pub use self::scanner::{ScanError, ScanFilter, TaskScanner};
