//! Error taxonomy for the matching engine.
//!
//! Every variant here is surfaced to the caller as data (a `Rejected`,
//! `CancelReject`, or `ModifyReject` event) — the matching core never
//! unwinds for an ordinary business rejection. [`EngineError::Internal`]
//! is the one exception: it marks an invariant violation and is meant to
//! be escalated to a panic by the caller, never returned silently.

use crate::order::{OrderId, Side};
use thiserror::Error;

/// Errors produced while validating or applying a command against a
/// [`SymbolBook`](crate::symbol_book::SymbolBook).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// `quantity` was zero, or negative where a signed type allows it.
    #[error("invalid quantity: {quantity} (must be > 0)")]
    InvalidQuantity {
        /// The quantity that failed validation.
        quantity: u64,
    },

    /// A `Limit`, `StopLoss`, or `StopLimit` order carried a non-positive price.
    #[error("invalid price: {price} (must be > 0 for this order kind)")]
    InvalidPrice {
        /// The price that failed validation.
        price: i64,
    },

    /// `displayed_quantity` exceeded `quantity` on an Iceberg order.
    #[error("invalid displayed quantity: {displayed} exceeds total quantity {quantity}")]
    InvalidDisplayedQuantity {
        /// The requested displayed quantity.
        displayed: u64,
        /// The order's total quantity.
        quantity: u64,
    },

    /// The command named a symbol with no corresponding `SymbolBook`.
    #[error("unknown symbol: {symbol}")]
    UnknownSymbol {
        /// The unrecognized symbol.
        symbol: String,
    },

    /// `order_id` was already present (live or terminal) in this symbol's index.
    #[error("duplicate order id: {order_id}")]
    DuplicateOrderId {
        /// The order id that was already in use.
        order_id: OrderId,
    },

    /// The requested order kind is disabled on this book's configuration.
    #[error("unsupported order kind: {kind} is disabled for this symbol")]
    UnsupportedKind {
        /// Name of the disabled order kind.
        kind: &'static str,
    },

    /// Price was not an exact multiple of the configured tick size.
    #[error("invalid tick size: price {price} is not a multiple of tick size {tick_size}")]
    InvalidTickSize {
        /// The offending price.
        price: i64,
        /// The configured tick size.
        tick_size: i64,
    },

    /// A cancel or modify referenced an order id absent from the index.
    #[error("order not found: {order_id}")]
    OrderNotFound {
        /// The order id that could not be located.
        order_id: OrderId,
    },

    /// A cancel or modify referenced an order already in a terminal state.
    #[error("order {order_id} is already terminal ({status})")]
    AlreadyTerminal {
        /// The order id.
        order_id: OrderId,
        /// The terminal status it was found in.
        status: &'static str,
    },

    /// A Market or IOC order could not be fully filled.
    #[error("insufficient liquidity on {side} side: requested {requested}, filled {filled}")]
    InsufficientLiquidity {
        /// The side that was swept for liquidity.
        side: Side,
        /// Quantity requested.
        requested: u64,
        /// Quantity actually filled before liquidity ran out.
        filled: u64,
    },

    /// A Fill-Or-Kill order could not be filled in full in a single dry run.
    #[error("FOK infeasible: requested {requested}, available {available}")]
    FokInfeasible {
        /// Quantity requested.
        requested: u64,
        /// Quantity available across the opposing book.
        available: u64,
    },

    /// Self-trade prevention cancelled the incoming order before any fill.
    #[error("self-trade prevented: taker {taker_id} would have matched its own resting order")]
    SelfTradePrevented {
        /// The taker order id that was cancelled.
        taker_id: OrderId,
    },

    /// An internal invariant was violated. This is never expected to be
    /// constructed by normal command processing; callers should treat it
    /// as fatal and abort rather than continue with corrupted state.
    #[error("internal invariant violated: {message}")]
    Internal {
        /// Diagnostic description of the violated invariant.
        message: String,
    },
}

impl EngineError {
    /// Returns `true` for [`EngineError::Internal`] — invariant violations
    /// that must never be treated as a normal business rejection.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Internal { .. })
    }
}
