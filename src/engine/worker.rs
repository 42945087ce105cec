//! One OS thread per symbol, consuming a bounded `std::sync::mpsc`
//! channel and feeding commands into [`Engine::dispatch`] (§5).
//!
//! This is the synchronous counterpart to [`super::tokio_worker`]; pick
//! whichever matches the rest of the host process. Both give the same
//! guarantee: exactly one thread/task is ever the writer for a given
//! symbol, satisfying the single-writer-per-bucket requirement even
//! when many producer threads enqueue commands concurrently.

use super::{Command, Engine};
use std::sync::Arc;
use std::sync::mpsc::{self, SyncSender};
use std::thread::JoinHandle;
use tracing::info;

/// A running per-symbol worker thread and the bounded sender feeding it.
pub struct SymbolWorker {
    // `Option` so `Drop` can release the sender before joining the
    // thread — the thread's `recv()` loop only ends once every sender is
    // gone, and `self` (and so this field) outlives the `join()` call
    // inside `drop` otherwise.
    sender: Option<SyncSender<Command>>,
    handle: Option<JoinHandle<()>>,
}

impl SymbolWorker {
    /// Spawns a worker thread that pulls [`Command`]s for `symbol` off a
    /// channel of capacity `queue_capacity` and dispatches them through
    /// `engine`. Dropping the returned sender (or calling
    /// [`SymbolWorker::shutdown`]) ends the thread once the queue drains.
    #[must_use]
    pub fn spawn(engine: Arc<Engine>, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<Command>(queue_capacity);
        info!("worker: starting std thread worker (queue capacity {})", queue_capacity);
        let handle = std::thread::spawn(move || {
            while let Ok(command) = receiver.recv() {
                if let Err(err) = engine.dispatch(command) {
                    panic!("fatal engine invariant violation: {err}");
                }
            }
            info!("worker: std thread worker stopped");
        });
        Self {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Enqueues a command, blocking if the bounded channel is full.
    pub fn send(&self, command: Command) -> Result<(), mpsc::SendError<Command>> {
        self.sender.as_ref().expect("sender dropped before shutdown").send(command)
    }

    /// Attempts to enqueue without blocking; returns the command back on a full queue.
    pub fn try_send(&self, command: Command) -> Result<(), mpsc::TrySendError<Command>> {
        self.sender.as_ref().expect("sender dropped before shutdown").try_send(command)
    }

    /// Closes the sender and blocks until the worker thread drains its queue.
    pub fn shutdown(mut self) {
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SymbolWorker {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::EngineConfig;
    use crate::event::VecEventSink;
    use crate::order::{Owner, Side};
    use crate::symbol_book::{SubmitCommand, SymbolBookConfig};

    #[test]
    fn worker_processes_submitted_commands() {
        let sink = Arc::new(VecEventSink::new());
        let engine = Arc::new(Engine::new(
            Arc::new(ManualClock::new(0)),
            sink.clone(),
            EngineConfig::default(),
        ));
        engine.add_symbol("X", SymbolBookConfig::default());
        let worker = SymbolWorker::spawn(engine.clone(), 16);

        worker
            .send(Command::Submit {
                symbol: "X".into(),
                cmd: SubmitCommand {
                    order_id: crate::order::OrderId(1),
                    side: Side::Buy,
                    kind: crate::order::OrderKind::Limit,
                    price: Some(100),
                    stop_price: None,
                    quantity: 10,
                    displayed_quantity: None,
                    owner: Owner::ANONYMOUS,
                },
            })
            .unwrap();
        drop(worker);

        let events = sink.drain();
        assert_eq!(events.len(), 1);
    }
}
