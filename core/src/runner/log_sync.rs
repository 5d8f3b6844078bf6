use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::types::CommandLog;

pub const DEFAULT_BATCH_SIZE: usize = 256;
pub const DEFAULT_IDLE_DURATION: Duration = Duration::from_secs(1);

/// Collects captured output lines and hands them to a sync callback in batches.
///
/// A batch is flushed when it reaches `batch_size`, or once no line has
/// arrived for `idle`. `wait` drains what is left.
pub(crate) struct LogSyncer {
    tx: Option<mpsc::Sender<CommandLog>>,
    task: JoinHandle<()>,
}

impl LogSyncer {
    pub(crate) fn start<F>(sync: F) -> Self
    where
        F: Fn(Vec<CommandLog>) + Send + 'static,
    {
        Self::start_with(sync, DEFAULT_BATCH_SIZE, DEFAULT_IDLE_DURATION)
    }

    pub(crate) fn start_with<F>(sync: F, batch_size: usize, idle: Duration) -> Self
    where
        F: Fn(Vec<CommandLog>) + Send + 'static,
    {
        let batch_size = batch_size.max(1);
        let (tx, mut rx) = mpsc::channel::<CommandLog>(batch_size);

        let task = tokio::spawn(async move {
            let mut pending: Vec<CommandLog> = Vec::with_capacity(batch_size);

            loop {
                match tokio::time::timeout(idle, rx.recv()).await {
                    Ok(Some(log)) => {
                        pending.push(log);
                        if pending.len() >= batch_size {
                            sync(std::mem::take(&mut pending));
                        }
                    }
                    Ok(None) => break,
                    Err(_) if !pending.is_empty() => sync(std::mem::take(&mut pending)),
                    Err(_) => {}
                }
            }

            if !pending.is_empty() {
                sync(pending);
            }
        });

        Self { tx: Some(tx), task }
    }

    /// Sender for an output pump.
    pub(crate) fn sender(&self) -> Option<mpsc::Sender<CommandLog>> {
        self.tx.clone()
    }

    /// Waits until every line sent so far has been synced. Pumps holding a
    /// sender must have finished first.
    pub(crate) async fn wait(mut self) {
        self.tx.take();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "log sync task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::types::LogChannel;
    use std::sync::{Arc, Mutex};

    fn log(line: u64) -> CommandLog {
        CommandLog {
            channel: LogChannel::Stdout,
            line,
            message: format!("line {line}"),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_batches_and_drains() {
        let batches: Arc<Mutex<Vec<Vec<u64>>>> = Arc::default();
        let sink = batches.clone();
        let syncer = LogSyncer::start_with(
            move |logs| {
                sink.lock()
                    .unwrap()
                    .push(logs.iter().map(|l| l.line).collect())
            },
            2,
            Duration::from_secs(60),
        );

        let tx = syncer.sender().unwrap();
        for i in 1..=5 {
            tx.send(log(i)).await.unwrap();
        }
        drop(tx);
        syncer.wait().await;

        let batches = batches.lock().unwrap().clone();
        assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[tokio::test]
    async fn test_idle_period_flushes_without_new_lines() {
        let batches: Arc<Mutex<Vec<Vec<u64>>>> = Arc::default();
        let sink = batches.clone();
        let syncer = LogSyncer::start_with(
            move |logs| {
                sink.lock()
                    .unwrap()
                    .push(logs.iter().map(|l| l.line).collect())
            },
            256,
            Duration::from_millis(50),
        );

        let tx = syncer.sender().unwrap();
        tx.send(log(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*batches.lock().unwrap(), vec![vec![1]]);

        tx.send(log(2)).await.unwrap();
        drop(tx);
        syncer.wait().await;
        assert_eq!(*batches.lock().unwrap(), vec![vec![1], vec![2]]);
    }
}
