//! Order entity: immutable identity plus mutable residual quantity and status.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque order identifier, unique per symbol across the engine's lifetime.
///
/// Wraps a `u64` rather than a random UUID: event payloads that embed
/// order ids must be byte-identical across replay runs (§8.5), which rules
/// out anything sourced from a random generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque account/owner identifier, used only for self-trade-prevention
/// comparisons. `Owner(0)` is the anonymous owner and always bypasses STP,
/// mirroring the teacher crate's `Hash32::zero()` bypass convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Owner(pub u64);

impl Owner {
    /// The anonymous owner. Orders carrying this value never participate
    /// in self-trade-prevention checks.
    pub const ANONYMOUS: Owner = Owner(0);

    /// Returns `true` if this owner is the anonymous sentinel.
    #[must_use]
    pub fn is_anonymous(self) -> bool {
        self == Owner::ANONYMOUS
    }
}

/// Side of the book an order rests on or takes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy / bid side.
    Buy,
    /// Sell / ask side.
    Sell,
}

impl Side {
    /// The opposing side — the side a taker on `self` matches against.
    #[must_use]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Closed tagged variant for order kinds. Unknown kinds are rejected at
/// the command-decoding boundary and never reach the matching core (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Rests at `price` until filled or cancelled.
    Limit,
    /// Sweeps the opposing book immediately; any remainder is cancelled.
    Market,
    /// Immediate-Or-Cancel: matches what it can right now, cancels the rest.
    Ioc,
    /// Fill-Or-Kill: must fill completely in one pass or the whole order is rejected.
    Fok,
    /// Limit order that only displays `displayed_quantity`; matches against full residual.
    Iceberg,
    /// Held in the stop book; becomes a Market order once the trigger condition holds.
    StopLoss,
    /// Held in the stop book; becomes a Limit order at `price` once the trigger condition holds.
    StopLimit,
}

impl OrderKind {
    /// Human-readable name used in `UnsupportedKind` rejections.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            OrderKind::Limit => "Limit",
            OrderKind::Market => "Market",
            OrderKind::Ioc => "Ioc",
            OrderKind::Fok => "Fok",
            OrderKind::Iceberg => "Iceberg",
            OrderKind::StopLoss => "StopLoss",
            OrderKind::StopLimit => "StopLimit",
        }
    }

    /// `true` for the two kinds the core MUST support unconditionally (§3).
    #[must_use]
    pub fn is_mandatory(self) -> bool {
        matches!(self, OrderKind::Limit | OrderKind::Market)
    }
}

/// Lifecycle status of an [`Order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Resting in the book (or the stop book) with no fills yet.
    Pending,
    /// Some but not all of `quantity` has been filled; resting with a reduced residual.
    PartiallyFilled,
    /// `residual` reached zero through matching.
    Filled,
    /// Removed from the book by a `cancel` command or a cancel-inducing `modify`.
    Canceled,
    /// Rejected at submission; never had book presence.
    Rejected,
    /// Reserved for TTL/GTD orders whose time-in-force elapsed (not produced by the core today).
    Expired,
    /// A stop order that left the stop book and was reintroduced as Market/Limit.
    Triggered,
}

impl OrderStatus {
    /// `true` for statuses from which no further mutation is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// Name used in `AlreadyTerminal` diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::PartiallyFilled => "PartiallyFilled",
            OrderStatus::Filled => "Filled",
            OrderStatus::Canceled => "Canceled",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Expired => "Expired",
            OrderStatus::Triggered => "Triggered",
        }
    }
}

/// A resting or in-flight order. Immutable identity fields plus the
/// mutable `residual`/`status` pair that matching and cancel/modify update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier, assigned by the client and validated for uniqueness at submit time.
    pub id: OrderId,
    /// Instrument this order belongs to.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Closed order-kind tag.
    pub kind: OrderKind,
    /// Limit price in ticks. `None` for `Market`.
    pub price: Option<i64>,
    /// Trigger price in ticks. `Some` iff `kind` is `StopLoss` or `StopLimit`.
    pub stop_price: Option<i64>,
    /// Original quantity at submission, > 0.
    pub quantity: u64,
    /// Visible portion for `Iceberg`; equals `quantity` for all other kinds.
    pub displayed_quantity: u64,
    /// Remaining unfilled quantity. Invariant: `0 <= residual <= quantity`.
    pub residual: u64,
    /// Engine-assigned monotonically increasing sequence; the tiebreaker after price.
    pub arrival_seq: u64,
    /// Wall-ish admission timestamp from the injected `Clock`. Informational only.
    pub ts_arrival: u64,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Owner identity for self-trade-prevention; `Owner::ANONYMOUS` bypasses STP.
    pub owner: Owner,
}

impl Order {
    /// Validates the static fields of a not-yet-admitted order against the
    /// invariants in §4.1: `quantity > 0`; `price > 0` unless Market;
    /// `displayed_quantity <= quantity`; and, if given, `price` is a
    /// multiple of `tick_size`.
    pub fn validate(
        kind: OrderKind,
        price: Option<i64>,
        quantity: u64,
        displayed_quantity: u64,
        tick_size: Option<i64>,
    ) -> Result<(), EngineError> {
        if quantity == 0 {
            return Err(EngineError::InvalidQuantity { quantity });
        }
        if kind != OrderKind::Market {
            match price {
                Some(p) if p > 0 => {
                    if let Some(tick) = tick_size {
                        if tick > 0 && p % tick != 0 {
                            return Err(EngineError::InvalidTickSize {
                                price: p,
                                tick_size: tick,
                            });
                        }
                    }
                }
                _ => return Err(EngineError::InvalidPrice { price: price.unwrap_or(0) }),
            }
        }
        if displayed_quantity > quantity {
            return Err(EngineError::InvalidDisplayedQuantity {
                displayed: displayed_quantity,
                quantity,
            });
        }
        Ok(())
    }

    /// Decrements `residual` by `qty`, updating `status` to `PartiallyFilled`
    /// or `Filled` as appropriate. Called only from the matching context,
    /// which owns both sides of a trade.
    pub fn apply_fill(&mut self, qty: u64) {
        debug_assert!(qty <= self.residual, "fill exceeds residual");
        self.residual = self.residual.saturating_sub(qty);
        self.status = if self.residual == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// `true` if this order crosses the market, i.e. would match
    /// immediately against the current opposing best price.
    #[must_use]
    pub fn is_aggressive(&self, opposing_best: Option<i64>) -> bool {
        match (self.kind, self.price, opposing_best) {
            (OrderKind::Market, _, _) => true,
            (_, Some(price), Some(best)) => match self.side {
                Side::Buy => price >= best,
                Side::Sell => price <= best,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_zero_quantity() {
        let err = Order::validate(OrderKind::Limit, Some(10), 0, 0, None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuantity { quantity: 0 }));
    }

    #[test]
    fn validate_rejects_nonpositive_price_for_limit() {
        let err = Order::validate(OrderKind::Limit, Some(0), 10, 10, None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPrice { .. }));
    }

    #[test]
    fn validate_allows_absent_price_for_market() {
        assert!(Order::validate(OrderKind::Market, None, 10, 10, None).is_ok());
    }

    #[test]
    fn validate_rejects_displayed_over_quantity() {
        let err = Order::validate(OrderKind::Iceberg, Some(10), 10, 20, None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDisplayedQuantity { .. }));
    }

    #[test]
    fn validate_rejects_tick_size_mismatch() {
        let err = Order::validate(OrderKind::Limit, Some(15), 10, 10, Some(10)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTickSize { .. }));
    }

    #[test]
    fn apply_fill_transitions_to_partially_filled_then_filled() {
        let mut order = Order {
            id: OrderId(1),
            symbol: "BTC/USD".into(),
            side: Side::Buy,
            kind: OrderKind::Limit,
            price: Some(100),
            stop_price: None,
            quantity: 10,
            displayed_quantity: 10,
            residual: 10,
            arrival_seq: 1,
            ts_arrival: 0,
            status: OrderStatus::Pending,
            owner: Owner::ANONYMOUS,
        };
        order.apply_fill(4);
        assert_eq!(order.residual, 6);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        order.apply_fill(6);
        assert_eq!(order.residual, 0);
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn is_aggressive_for_market_always_true() {
        let order = Order {
            id: OrderId(1),
            symbol: "X".into(),
            side: Side::Buy,
            kind: OrderKind::Market,
            price: None,
            stop_price: None,
            quantity: 1,
            displayed_quantity: 1,
            residual: 1,
            arrival_seq: 0,
            ts_arrival: 0,
            status: OrderStatus::Pending,
            owner: Owner::ANONYMOUS,
        };
        assert!(order.is_aggressive(None));
        assert!(order.is_aggressive(Some(100)));
    }
}
