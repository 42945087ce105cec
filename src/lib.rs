//! A continuous limit order book matching engine: price-time priority,
//! partial fills, self-trade prevention, and a deterministic, replayable
//! event stream across an arbitrary number of independently-matched
//! symbols.
//!
//! The matching core ([`symbol_book::SymbolBook`]) is single-writer by
//! design — callers serialize commands per symbol, typically via
//! [`engine::Engine`]'s per-symbol worker dispatch. Everything above
//! that (order validation, price-time matching, stop-order cascades,
//! snapshotting) lives in this crate as a library with no I/O of its
//! own; the `cli` workspace member wires it to a process.

pub mod clock;
pub mod engine;
pub mod error;
pub mod event;
#[cfg(feature = "journal")]
pub mod journal;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod order;
pub mod price_level;
pub mod replay;
pub mod side_book;
pub mod symbol_book;

/// Re-exports of the types most callers need, mirroring the teacher
/// crate's prelude convention.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SharedClock, SystemClock};
    pub use crate::engine::{Command, Engine, EngineConfig};
    pub use crate::error::EngineError;
    pub use crate::event::{Event, EventKind, EventSink, RejectReason, TradePayload};
    pub use crate::order::{Order, OrderId, OrderKind, OrderStatus, Owner, Side};
    pub use crate::symbol_book::{OrderKindFlags, StpMode, SubmitCommand, SymbolBook, SymbolBookConfig};
}
