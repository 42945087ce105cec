//! Optional observability counters/gauges (§10.3 ambient stack), wired
//! through the `metrics` facade so the host process picks whatever
//! exporter it likes (Prometheus, StatsD, ...). A no-op unless some
//! recorder is installed, same as `tracing` without a subscriber.

use crate::order::Side;

/// Records one admitted order.
pub fn record_accepted(symbol: &str) {
    metrics::counter!("lob_orders_accepted_total", "symbol" => symbol.to_string()).increment(1);
}

/// Records one rejected command.
pub fn record_rejected(symbol: &str, reason: &str) {
    metrics::counter!(
        "lob_orders_rejected_total",
        "symbol" => symbol.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Records one trade: count, notional-agnostic quantity, and which side aggressed.
pub fn record_trade(symbol: &str, qty: u64, aggressor_side: Side) {
    metrics::counter!("lob_trades_total", "symbol" => symbol.to_string()).increment(1);
    metrics::counter!("lob_trade_quantity_total", "symbol" => symbol.to_string()).increment(qty);
    metrics::counter!(
        "lob_trade_aggressor_total",
        "symbol" => symbol.to_string(),
        "side" => aggressor_side.to_string()
    )
    .increment(1);
}

/// Updates the current resting-order depth gauge for one side of one symbol.
pub fn set_level_count(symbol: &str, side: Side, count: usize) {
    metrics::gauge!(
        "lob_price_levels",
        "symbol" => symbol.to_string(),
        "side" => side.to_string()
    )
    .set(count as f64);
}
