//! Run log
//!
//! Collects the user-visible log of one run. Lines are queued on a channel
//! and persisted by a dedicated writer task, so command output streaming and
//! step execution never wait on the store. Persistence is best-effort: a
//! failed append is reported through tracing and the run carries on.

use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::repository::RunRepository;

enum LogCommand {
    Line(String),
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle to the log of one run
#[derive(Clone)]
pub struct RunLog {
    run_id: Uuid,
    tx: mpsc::UnboundedSender<LogCommand>,
}

impl RunLog {
    /// Starts the writer task for `run_id`
    ///
    /// The writer exits once every handle has been dropped and the queue is empty.
    pub fn start(run_id: Uuid, runs: Arc<dyn RunRepository>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(run_id, runs, rx));
        Self { run_id, tx }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Queues a timestamped line
    pub fn line(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        debug!(run_id = %self.run_id, "{}", message);

        let stamped = format!(
            "[{}] {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            message
        );

        if self.tx.send(LogCommand::Line(stamped)).is_err() {
            warn!(run_id = %self.run_id, "Run log writer is gone, dropping line");
        }
    }

    /// Waits until every line queued so far has been handed to the store
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(LogCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn write_loop(
    run_id: Uuid,
    runs: Arc<dyn RunRepository>,
    mut rx: mpsc::UnboundedReceiver<LogCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            LogCommand::Line(line) => {
                if let Err(e) = runs.append_log(run_id, &line).await {
                    warn!(run_id = %run_id, "Failed to persist log line: {:#}", e);
                }
            }
            LogCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    #[tokio::test]
    async fn test_lines_are_persisted_in_order() {
        let store = Arc::new(MemoryStore::new());
        let run = store.create_run(Uuid::new_v4()).await.unwrap();

        let log = RunLog::start(run.id, store.clone());
        for i in 0..50 {
            log.line(format!("line {}", i));
        }
        log.flush().await;

        let text = store.run(run.id).unwrap().log;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 50);
        assert!(lines[0].ends_with("] line 0"));
        assert!(lines[49].ends_with("] line 49"));
        assert!(lines[0].starts_with('['));
    }

    #[tokio::test]
    async fn test_store_failures_do_not_propagate() {
        let store = Arc::new(MemoryStore::new());
        let run = store.create_run(Uuid::new_v4()).await.unwrap();
        store.fail_log_appends(true);

        let log = RunLog::start(run.id, store.clone());
        log.line("lost");
        log.flush().await;

        store.fail_log_appends(false);
        log.line("kept");
        log.flush().await;

        let text = store.run(run.id).unwrap().log;
        assert!(!text.contains("lost"));
        assert!(text.contains("kept"));
    }
}
