//! Watch sessions.
//!
//! Everything long-lived that a build starts in watch mode (file watchers,
//! event loops, `tsc --watch`, bundler rebuild loops) is owned by one
//! [`WatchSession`] so a config restart can tear all of it down at once.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How long cancelled tasks get to finish before being aborted.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Default)]
pub struct WatchSession {
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl WatchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that fires when the session shuts down.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Keep an already spawned task alive for the session's lifetime.
    pub fn adopt(&mut self, handle: tokio::task::JoinHandle<()>) {
        self.tasks.spawn(async move {
            let _ = handle.await;
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every task and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while self.tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            debug!(remaining = self.tasks.len(), "aborting watch tasks");
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }
    }

    /// Wait until every task has ended on its own.
    pub async fn wait(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn shutdown_cancels_and_drains() {
        let mut session = WatchSession::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let token = session.token();
        let flag = Arc::clone(&stopped);
        session.spawn(async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(session.len(), 1);

        session.shutdown().await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stubborn_tasks_are_aborted() {
        let mut session = WatchSession::new();
        session.spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        session.shutdown().await;
    }
}
