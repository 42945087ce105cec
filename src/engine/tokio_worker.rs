//! One tokio task per symbol, consuming a bounded `tokio::sync::mpsc`
//! channel and feeding commands into [`Engine::dispatch`] (§5). The
//! async counterpart to [`super::worker`]; use this when the host
//! process is already driven by a tokio runtime.

use super::{Command, Engine};
use std::sync::Arc;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinHandle;
use tracing::info;

/// A running per-symbol worker task and the bounded sender feeding it.
pub struct SymbolWorker {
    sender: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl SymbolWorker {
    /// Spawns a worker task that pulls [`Command`]s off a channel of
    /// capacity `queue_capacity` and dispatches them through `engine`.
    /// Must be called from within a running tokio runtime.
    #[must_use]
    pub fn spawn(engine: Arc<Engine>, queue_capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Command>(queue_capacity);
        info!("worker: starting tokio task worker (queue capacity {})", queue_capacity);
        let handle = tokio::spawn(async move {
            while let Some(command) = receiver.recv().await {
                if let Err(err) = engine.dispatch(command) {
                    panic!("fatal engine invariant violation: {err}");
                }
            }
            info!("worker: tokio task worker stopped");
        });
        Self {
            sender,
            handle: Some(handle),
        }
    }

    /// Enqueues a command, waiting if the bounded channel is full.
    pub async fn send(&self, command: Command) -> Result<(), mpsc::error::SendError<Command>> {
        self.sender.send(command).await
    }

    /// Attempts to enqueue without waiting; returns the command back on a full queue.
    pub fn try_send(&self, command: Command) -> Result<(), mpsc::error::TrySendError<Command>> {
        self.sender.try_send(command)
    }

    /// Closes the sender and awaits the worker task draining its queue.
    pub async fn shutdown(mut self) {
        drop(self.sender);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
