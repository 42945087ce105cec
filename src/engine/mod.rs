//! Multi-symbol dispatcher (§4.5, §5): owns one [`SymbolBook`] per
//! instrument, a single global monotonic event sequence shared across
//! every symbol, and the per-symbol single-writer guarantee the
//! matching core depends on.
//!
//! Two execution substrates are offered for getting commands onto a
//! symbol's single writer, mirroring the teacher crate's
//! `BookManagerStd`/`BookManagerTokio` split: [`worker`] (an OS thread
//! per symbol reading a bounded `std::sync::mpsc` channel) and
//! [`tokio_worker`] (a tokio task per symbol reading a bounded
//! `tokio::sync::mpsc` channel). Both are thin consumers around the
//! same [`Engine::dispatch`] — they differ only in how commands reach
//! that call, not in matching semantics.

pub mod tokio_worker;
pub mod worker;

use crate::clock::SharedClock;
use crate::error::EngineError;
use crate::event::{Event, EventKind, EventSink, RejectReason};
use crate::order::OrderId;
use crate::symbol_book::{SubmitCommand, SymbolBook, SymbolBookConfig, SymbolBookSnapshot};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// A single unit of work routed to one symbol's book.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Command {
    /// Admit a new order.
    Submit {
        /// Target symbol.
        symbol: String,
        /// The order to admit.
        cmd: SubmitCommand,
    },
    /// Cancel a live order.
    Cancel {
        /// Target symbol.
        symbol: String,
        /// The order to cancel.
        order_id: OrderId,
    },
    /// Modify a resting order's price and/or quantity.
    Modify {
        /// Target symbol.
        symbol: String,
        /// The order to modify.
        order_id: OrderId,
        /// Requested new price.
        new_price: i64,
        /// Requested new quantity.
        new_quantity: u64,
    },
}

impl Command {
    /// The symbol this command targets.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Command::Submit { symbol, .. }
            | Command::Cancel { symbol, .. }
            | Command::Modify { symbol, .. } => symbol,
        }
    }
}

/// Engine-wide defaults applied to every symbol added without an
/// explicit [`SymbolBookConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Default per-symbol configuration.
    pub default_symbol_config: SymbolBookConfig,
}

struct BookEntry {
    book: Arc<SymbolBook>,
    // Serializes dispatch into this symbol even if callers race across
    // threads; §5's single-writer-per-bucket guarantee holds regardless
    // of how many producer threads submit commands.
    writer_lock: Mutex<()>,
}

/// The multi-symbol matching engine (§4.5).
pub struct Engine {
    books: DashMap<String, Arc<BookEntry>>,
    clock: SharedClock,
    sink: Arc<dyn EventSink>,
    global_seq: AtomicU64,
    // Held for the full duration of one command's dispatch (or one
    // snapshot). The per-symbol `writer_lock` alone only serializes
    // commands targeting the *same* symbol; §5 ordering guarantee (2)
    // ("all events generated by one command are contiguous in the global
    // event stream") also has to hold when two different symbols are
    // dispatched concurrently from separate workers, since both share the
    // same `global_seq` counter and `sink`. This lock is coarser than the
    // per-symbol one but only ever held for CPU-bound work — matching
    // itself never blocks (§5) — so it does not reintroduce the
    // suspension points §5 rules out.
    global_write_lock: Mutex<()>,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with no symbols registered yet.
    #[must_use]
    pub fn new(clock: SharedClock, sink: Arc<dyn EventSink>, config: EngineConfig) -> Self {
        Self {
            books: DashMap::new(),
            clock,
            sink,
            global_seq: AtomicU64::new(0),
            global_write_lock: Mutex::new(()),
            config,
        }
    }

    /// Registers a symbol with an explicit configuration. Replaces any
    /// existing book for the same symbol (only safe before the engine
    /// starts receiving commands for it).
    pub fn add_symbol(&self, symbol: impl Into<String>, config: SymbolBookConfig) {
        let symbol = symbol.into();
        info!("engine: registering book for symbol {}", symbol);
        let book = Arc::new(SymbolBook::new(symbol.clone(), config, self.clock.clone()));
        self.books.insert(
            symbol,
            Arc::new(BookEntry {
                book,
                writer_lock: Mutex::new(()),
            }),
        );
    }

    /// Registers a symbol using the engine's default configuration.
    pub fn add_symbol_default(&self, symbol: impl Into<String>) {
        self.add_symbol(symbol, self.config.default_symbol_config.clone());
    }

    /// Returns the live book for `symbol`, if registered.
    #[must_use]
    pub fn book(&self, symbol: &str) -> Option<Arc<SymbolBook>> {
        self.books.get(symbol).map(|e| e.book.clone())
    }

    /// Every registered symbol, in no particular order.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.books.iter().map(|e| e.key().clone()).collect()
    }

    fn next_event_seq(&self) -> u64 {
        self.global_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit(&self, symbol: &str, kind: EventKind) {
        #[cfg(feature = "metrics")]
        match &kind {
            EventKind::Accepted { .. } => crate::metrics::record_accepted(symbol),
            EventKind::Rejected { reason, .. } => crate::metrics::record_rejected(symbol, reason.name()),
            EventKind::Trade(trade) => crate::metrics::record_trade(symbol, trade.qty, trade.aggressor_side),
            _ => {}
        }

        let event = Event {
            event_seq: self.next_event_seq(),
            symbol: symbol.to_string(),
            ts: self.clock.now_millis(),
            kind,
        };
        self.sink.deliver(event);
    }

    /// Routes one [`Command`] to its target symbol's book, serialized
    /// against any other dispatch into the same symbol.
    ///
    /// Returns `Err` only for [`EngineError::Internal`] — every ordinary
    /// business rejection is delivered as an event through the sink this
    /// engine was built with, and this returns `Ok(())`.
    pub fn dispatch(&self, command: Command) -> Result<(), EngineError> {
        let symbol = command.symbol().to_string();
        let Some(entry) = self.books.get(&symbol).map(|e| e.clone()) else {
            let order_id = match &command {
                Command::Submit { cmd, .. } => cmd.order_id,
                Command::Cancel { order_id, .. } | Command::Modify { order_id, .. } => *order_id,
            };
            let _global_guard = self.global_write_lock.lock().unwrap();
            self.emit(
                &symbol,
                EventKind::Rejected {
                    order_id,
                    reason: RejectReason::UnknownSymbol,
                },
            );
            return Ok(());
        };

        let _global_guard = self.global_write_lock.lock().unwrap();
        let _guard = entry.writer_lock.lock().unwrap();
        let mut emit = |kind: EventKind| self.emit(&symbol, kind);

        match command {
            Command::Submit { cmd, .. } => entry.book.submit(cmd, &mut emit),
            Command::Cancel { order_id, .. } => entry.book.cancel(order_id, &mut emit),
            Command::Modify {
                order_id,
                new_price,
                new_quantity,
                ..
            } => entry.book.modify(order_id, new_price, new_quantity, &mut emit),
        }
    }

    /// Captures a snapshot of `symbol`'s book and emits `SnapshotTaken`.
    /// Returns `None` if `symbol` isn't registered.
    pub fn snapshot(&self, symbol: &str, include_orders: bool) -> Option<SymbolBookSnapshot> {
        let entry = self.books.get(symbol)?.clone();
        let _global_guard = self.global_write_lock.lock().unwrap();
        let _guard = entry.writer_lock.lock().unwrap();
        let snapshot = entry.book.snapshot(include_orders);
        info!("engine: snapshot taken for symbol {}", symbol);
        self.emit(
            symbol,
            EventKind::SnapshotTaken {
                level_count: entry.book.level_count(),
            },
        );
        Some(snapshot)
    }
}
