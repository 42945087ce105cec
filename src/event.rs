//! Event envelope and the `EventSink` consumer contract (§4.6, §6).

use crate::order::{OrderId, Side};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a command was rejected. Carried inside `Rejected`/`CancelReject`/
/// `ModifyReject` events so consumers can distinguish the error taxonomy
/// of §7 without downcasting an error type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// `quantity` was zero.
    InvalidQuantity,
    /// Price failed validation (non-positive, or absent where required).
    InvalidPrice,
    /// `displayed_quantity` exceeded `quantity`.
    InvalidDisplayedQuantity,
    /// Price was not a multiple of the configured tick size.
    InvalidTickSize,
    /// The command named an unrecognized symbol.
    UnknownSymbol,
    /// `order_id` was already used on this symbol.
    DuplicateOrderId,
    /// The order kind is disabled on this book.
    UnsupportedKind,
    /// The referenced order does not exist.
    OrderNotFound,
    /// The referenced order is already in a terminal state.
    AlreadyTerminal,
    /// A Market order could not be filled at all.
    UnfilledLiquidity,
    /// A Fill-Or-Kill order could not be filled in full.
    InsufficientLiquidity,
    /// Self-trade prevention cancelled the order.
    SelfTradePrevented,
}

impl RejectReason {
    /// Stable lowercase name, for metric labels and CLI output.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RejectReason::InvalidQuantity => "invalid_quantity",
            RejectReason::InvalidPrice => "invalid_price",
            RejectReason::InvalidDisplayedQuantity => "invalid_displayed_quantity",
            RejectReason::InvalidTickSize => "invalid_tick_size",
            RejectReason::UnknownSymbol => "unknown_symbol",
            RejectReason::DuplicateOrderId => "duplicate_order_id",
            RejectReason::UnsupportedKind => "unsupported_kind",
            RejectReason::OrderNotFound => "order_not_found",
            RejectReason::AlreadyTerminal => "already_terminal",
            RejectReason::UnfilledLiquidity => "unfilled_liquidity",
            RejectReason::InsufficientLiquidity => "insufficient_liquidity",
            RejectReason::SelfTradePrevented => "self_trade_prevented",
        }
    }
}

/// The payload carried by a `Trade` event (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePayload {
    /// The incoming (aggressing) order's id.
    pub taker_id: OrderId,
    /// The resting (posted) order's id.
    pub maker_id: OrderId,
    /// Trade price — always the maker's price (§4.4 step 3).
    pub price: i64,
    /// Quantity exchanged in this fill.
    pub qty: u64,
    /// The side of the aggressor.
    pub aggressor_side: Side,
}

/// One book-level price point in a snapshot (§6 Snapshot format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Price in ticks.
    pub price: i64,
    /// Sum of displayed (visible) quantity at this price.
    pub display_qty: u64,
    /// Sum of hidden quantity (iceberg reserve) at this price.
    pub hidden_qty: u64,
    /// Number of live orders resting at this price.
    pub order_count: usize,
}

/// The closed tagged variant of events the engine can emit (§4.6, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// A submitted order passed validation and was admitted.
    Accepted {
        /// The admitted order's id.
        order_id: OrderId,
    },
    /// A submitted command failed validation or a liquidity/STP check.
    Rejected {
        /// The order id that was rejected (as supplied by the client).
        order_id: OrderId,
        /// Why.
        reason: RejectReason,
    },
    /// A cancel command succeeded, or a Market/IOC remainder was
    /// auto-cancelled after the match loop ran out of crossable liquidity.
    Canceled {
        /// The cancelled order's id.
        order_id: OrderId,
        /// Set when this was an automatic remainder cancel rather than an
        /// explicit `cancel` command (e.g. `UnfilledLiquidity`).
        reason: Option<RejectReason>,
    },
    /// A cancel command could not be applied.
    CancelReject {
        /// The order id the cancel targeted.
        order_id: OrderId,
        /// Why.
        reason: RejectReason,
    },
    /// A modify command succeeded.
    Modified {
        /// The modified order's id.
        order_id: OrderId,
        /// `true` if the modify lost priority (equivalent to cancel + resubmit).
        lost_priority: bool,
    },
    /// A modify command could not be applied.
    ModifyReject {
        /// The order id the modify targeted.
        order_id: OrderId,
        /// Why.
        reason: RejectReason,
    },
    /// A single maker/taker fill.
    Trade(TradePayload),
    /// A stop order left the stop book and was reintroduced as a live order.
    Triggered {
        /// The stop order's id.
        order_id: OrderId,
        /// Its fresh arrival sequence after reintroduction.
        new_arrival_seq: u64,
    },
    /// A `snapshot` command was served.
    SnapshotTaken {
        /// Number of distinct price levels included (both sides).
        level_count: usize,
    },
}

/// A fully addressed event: global sequence, symbol, timestamp, and payload (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Global monotonic sequence assigned by the `Engine`, unique across all symbols.
    pub event_seq: u64,
    /// The symbol this event pertains to.
    pub symbol: String,
    /// Timestamp from the injected `Clock` at the moment of emission.
    pub ts: u64,
    /// The event payload.
    pub kind: EventKind,
}

/// Push interface events are delivered through (§4.6).
///
/// Delivery is synchronous from the engine's point of view and must never
/// fail the command that produced the event; a sink that needs
/// backpressure handles its own buffering internally (e.g. a bounded
/// channel with a blocking send) rather than returning an error the
/// engine would have nowhere to route.
pub trait EventSink: Send + Sync {
    /// Delivers one event. Must not panic on ordinary backpressure.
    fn deliver(&self, event: Event);
}

/// An `EventSink` that appends every event to a `Vec` behind a mutex.
/// Used by tests and the CLI's `snapshot`/one-shot commands, where
/// events are inspected synchronously after a command returns.
#[derive(Default)]
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<Event>>,
}

impl VecEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of every event delivered so far, in delivery order.
    #[must_use]
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut self.events.lock().unwrap())
    }

    /// Returns a clone of every event delivered so far without clearing the buffer.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for VecEventSink {
    fn deliver(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// A sink that fans delivery out to every sink in an `Arc<[...]>` list —
/// useful for attaching both a journal writer and a test probe to one engine.
pub struct BroadcastEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl BroadcastEventSink {
    /// Creates a sink that forwards every event to each of `sinks`, in order.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for BroadcastEventSink {
    fn deliver(&self, event: Event) {
        for sink in &self.sinks {
            sink.deliver(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_collects_in_order() {
        let sink = VecEventSink::new();
        sink.deliver(Event {
            event_seq: 1,
            symbol: "X".into(),
            ts: 0,
            kind: EventKind::Accepted { order_id: OrderId(1) },
        });
        sink.deliver(Event {
            event_seq: 2,
            symbol: "X".into(),
            ts: 0,
            kind: EventKind::Accepted { order_id: OrderId(2) },
        });
        let events = sink.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_seq, 1);
        assert_eq!(events[1].event_seq, 2);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn broadcast_sink_forwards_to_all() {
        let a = Arc::new(VecEventSink::new());
        let b = Arc::new(VecEventSink::new());
        let broadcast = BroadcastEventSink::new(vec![a.clone(), b.clone()]);
        broadcast.deliver(Event {
            event_seq: 1,
            symbol: "X".into(),
            ts: 0,
            kind: EventKind::Accepted { order_id: OrderId(1) },
        });
        assert_eq!(a.drain().len(), 1);
        assert_eq!(b.drain().len(), 1);
    }
}
