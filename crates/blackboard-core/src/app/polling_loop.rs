//! PollingLoop - scan → process → sleep の繰り返し
//!
//! # フロー
//! 1. TaskScanner::scan() で対象タスクのスナップショットを取得
//! 2. 各タスクを順番に TaskExecutor::process() で処理
//! 3. 固定間隔で sleep（backoff / jitter なし）
//!
//! scan の失敗はそのサイクルを飛ばすだけ（行は pending のまま残る）。
//! 1 タスクの処理中に panic しても、残りのタスクとループは止まりません。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::executor::{ProcessOutcome, TaskExecutor};
use super::scanner::{ScanFilter, TaskScanner};

/// Tally of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub scan_failed: bool,
    pub scanned: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub stuck: usize,
    pub panicked: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::Completed => self.completed += 1,
            ProcessOutcome::Failed | ProcessOutcome::Malformed => self.failed += 1,
            ProcessOutcome::AlreadyClaimed
            | ProcessOutcome::ClaimFailed
            | ProcessOutcome::WrongStage
            | ProcessOutcome::Superseded => self.skipped += 1,
            ProcessOutcome::Stuck => self.stuck += 1,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.scan_failed && self.scanned == 0
    }
}

pub struct PollingLoop {
    scanner: TaskScanner,
    executor: Arc<TaskExecutor>,
    filter: ScanFilter,
    interval: Duration,
}

impl PollingLoop {
    pub fn new(
        scanner: TaskScanner,
        executor: Arc<TaskExecutor>,
        filter: ScanFilter,
        interval: Duration,
    ) -> Self {
        Self {
            scanner,
            executor,
            filter,
            interval,
        }
    }

    /// Run one scan/process cycle.
    pub async fn run_once(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let tasks = match self.scanner.scan(&self.filter).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "scan failed; skipping cycle");
                report.scan_failed = true;
                return report;
            }
        };
        report.scanned = tasks.len();

        for task in tasks {
            let task_id = task.id.clone();
            let executor = Arc::clone(&self.executor);

            // 別 task で実行して panic を JoinError として受け取る。
            // すぐ await するので処理自体は逐次のまま。
            let joined = tokio::spawn(async move { executor.process(task).await }).await;
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(task_id = %task_id, panic = e.is_panic(), error = %e, "task processing aborted");
                    report.panicked += 1;
                }
            }
        }
        report
    }

    /// Loop until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(filter = %self.filter, interval = ?self.interval, "polling loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_once().await;
            if report.is_idle() {
                debug!("nothing to do");
            } else {
                info!(?report, "cycle finished");
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("polling loop stopped");
    }

    /// Spawn the loop on the runtime.
    pub fn spawn(self) -> PollingHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move { self.run(shutdown_rx).await });
        PollingHandle { shutdown_tx, join }
    }
}

/// Polling loop handle.
/// - `shutdown_tx` を drop するとループが止まる
/// - 進行中のサイクルは最後まで処理してから止まる（強制キャンセルはしない）
pub struct PollingHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PollingHandle {
    pub fn request_shutdown(&self) {
        // ignore send error: receiver may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::board::Blackboard;
    use crate::app::executor::StageHandler;
    use crate::app::research::ResearchHandler;
    use crate::domain::{NewTask, Payload, ProjectId, Stage, Task, TaskStatus};
    use crate::impls::InMemoryStore;
    use crate::ports::{BlackboardStore, Filters, GenerationError, Generator, StoreError, Table};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, _model: &str, prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("report for {}", prompt.len()))
        }
    }

    /// objective が "boom" のタスクで panic する
    struct Panicky(ResearchHandler);

    impl StageHandler for Panicky {
        fn stage(&self) -> Stage {
            self.0.stage()
        }
        fn agent(&self) -> &str {
            self.0.agent()
        }
        fn model(&self) -> &str {
            self.0.model()
        }
        fn result_key(&self) -> &str {
            self.0.result_key()
        }
        fn prompt(&self, payload: &Payload) -> Option<String> {
            if payload.objective() == Some("boom") {
                panic!("handler bug");
            }
            self.0.prompt(payload)
        }
    }

    struct Offline;

    #[async_trait]
    impl BlackboardStore for Offline {
        async fn insert(&self, _table: Table, _record: Value) -> Result<Value, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn select(&self, _table: Table, _filters: &Filters) -> Result<Vec<Value>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn update(
            &self,
            _table: Table,
            _filters: &Filters,
            _patch: Value,
        ) -> Result<Vec<Value>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
    }

    fn polling_loop(
        board: Blackboard,
        handler: Arc<dyn StageHandler>,
        generator: Arc<dyn Generator>,
        interval: Duration,
    ) -> PollingLoop {
        let filter = ScanFilter::pending(handler.stage(), handler.agent());
        let executor = TaskExecutor::new(board.clone(), generator, handler, Duration::from_secs(5))
            .unwrap();
        PollingLoop::new(TaskScanner::new(board), Arc::new(executor), filter, interval)
    }

    async fn seed(board: &Blackboard, objective: &str) -> Task {
        board
            .create_task(&NewTask::pending(
                ProjectId::new("p"),
                Stage::ResearchNeeded,
                "marcus",
                Payload::for_objective(objective, json!(null)),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn panicking_task_does_not_stop_the_cycle() {
        let board = Blackboard::new(Arc::new(InMemoryStore::new()));
        let ok_a = seed(&board, "Peru").await;
        let bad = seed(&board, "boom").await;
        let ok_b = seed(&board, "Chile").await;

        let polling = polling_loop(
            board.clone(),
            Arc::new(Panicky(ResearchHandler::new("marcus", "m"))),
            Arc::new(Echo { calls: AtomicUsize::new(0) }),
            Duration::from_secs(10),
        );
        let report = polling.run_once().await;

        assert_eq!(report.scanned, 3);
        assert_eq!(report.completed, 2);
        assert_eq!(report.panicked, 1);
        for task in [&ok_a, &ok_b] {
            let row = board.get_task(&task.id).await.unwrap().unwrap();
            assert_eq!(row.status, TaskStatus::Completed);
        }
        // claim 後に panic したので processing のまま
        let row = board.get_task(&bad.id).await.unwrap().unwrap();
        assert_eq!(row.status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn scan_failure_skips_the_cycle() {
        let generator = Arc::new(Echo { calls: AtomicUsize::new(0) });
        let polling = polling_loop(
            Blackboard::new(Arc::new(Offline)),
            Arc::new(ResearchHandler::new("marcus", "m")),
            generator.clone(),
            Duration::from_secs(10),
        );

        let report = polling.run_once().await;

        assert!(report.scan_failed);
        assert_eq!(report.scanned, 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn completed_tasks_are_not_picked_up_again() {
        let board = Blackboard::new(Arc::new(InMemoryStore::new()));
        seed(&board, "Peru").await;
        let generator = Arc::new(Echo { calls: AtomicUsize::new(0) });
        let polling = polling_loop(
            board,
            Arc::new(ResearchHandler::new("marcus", "m")),
            generator.clone(),
            Duration::from_secs(10),
        );

        let first = polling.run_once().await;
        let second = polling.run_once().await;

        assert_eq!(first.completed, 1);
        assert!(second.is_idle());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_keeps_polling_until_shutdown() {
        let board = Blackboard::new(Arc::new(InMemoryStore::new()));
        let generator = Arc::new(Echo { calls: AtomicUsize::new(0) });
        let handle = polling_loop(
            board.clone(),
            Arc::new(ResearchHandler::new("marcus", "m")),
            generator.clone(),
            Duration::from_secs(10),
        )
        .spawn();

        // 最初のサイクルの後に投入されたタスクも次のサイクルで拾われる
        tokio::time::sleep(Duration::from_secs(1)).await;
        let late = seed(&board, "late arrival").await;
        tokio::time::sleep(Duration::from_secs(15)).await;

        handle.shutdown_and_join().await;

        let row = board.get_task(&late.id).await.unwrap().unwrap();
        assert_eq!(row.status, TaskStatus::Completed);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }
}
