//! Stop-order book: resting `StopLoss`/`StopLimit` orders not yet live,
//! keyed by id rather than priced into a [`crate::side_book::SideBook`] —
//! trigger scanning is a linear pass, which is fine at the stop-book
//! sizes this is meant for (a tiny fraction of a symbol's live orders).

use crate::order::{Order, OrderId, OrderKind, Side};
use dashmap::DashMap;

/// Resting stop orders for one symbol, independent of the bid/ask books.
#[derive(Default)]
pub(super) struct StopBook {
    stops: DashMap<OrderId, Order>,
}

impl StopBook {
    pub(super) fn new() -> Self {
        Self {
            stops: DashMap::new(),
        }
    }

    pub(super) fn insert(&self, order: Order) {
        self.stops.insert(order.id, order);
    }

    pub(super) fn remove(&self, order_id: OrderId) -> Option<Order> {
        self.stops.remove(&order_id).map(|(_, o)| o)
    }

    /// `true` if `order` triggers given the latest trade price (§4.4):
    /// a Sell-side stop (protecting a long) triggers when the market
    /// trades *down* to or through its stop price; a Buy-side stop
    /// (protecting a short, or a breakout buy) triggers when the market
    /// trades *up* to or through it.
    fn triggers(order: &Order, last_trade_price: i64) -> bool {
        let stop = order.stop_price.expect("stop order always carries stop_price");
        match order.side {
            Side::Sell => last_trade_price <= stop,
            Side::Buy => last_trade_price >= stop,
        }
    }

    /// Removes and returns every stop order that triggers at `last_trade_price`.
    pub(super) fn drain_triggered(&self, last_trade_price: i64) -> Vec<Order> {
        let ids: Vec<OrderId> = self
            .stops
            .iter()
            .filter(|e| Self::triggers(e.value(), last_trade_price))
            .map(|e| *e.key())
            .collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.stops.len()
    }
}

/// Converts a triggered stop order into the live order it becomes:
/// `StopLoss` -> `Market`, `StopLimit` -> `Limit` at its original price.
pub(super) fn reintroduce(mut order: Order, fresh_arrival_seq: u64) -> Order {
    order.arrival_seq = fresh_arrival_seq;
    order.status = crate::order::OrderStatus::Pending;
    match order.kind {
        OrderKind::StopLoss => {
            order.kind = OrderKind::Market;
            order.price = None;
        }
        OrderKind::StopLimit => {
            order.kind = OrderKind::Limit;
        }
        other => unreachable!("non-stop kind {other:?} in the stop book"),
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderStatus, Owner};

    fn make_stop(id: u64, side: Side, kind: OrderKind, stop_price: i64) -> Order {
        Order {
            id: OrderId(id),
            symbol: "X".into(),
            side,
            kind,
            price: if kind == OrderKind::StopLimit { Some(stop_price) } else { None },
            stop_price: Some(stop_price),
            quantity: 10,
            displayed_quantity: 10,
            residual: 10,
            arrival_seq: 1,
            ts_arrival: 0,
            status: crate::order::OrderStatus::Pending,
            owner: Owner::ANONYMOUS,
        }
    }

    #[test]
    fn sell_stop_triggers_on_price_at_or_below() {
        let book = StopBook::new();
        book.insert(make_stop(1, Side::Sell, OrderKind::StopLoss, 100));
        assert!(book.drain_triggered(101).is_empty());
        assert_eq!(book.drain_triggered(100).len(), 1);
    }

    #[test]
    fn buy_stop_triggers_on_price_at_or_above() {
        let book = StopBook::new();
        book.insert(make_stop(1, Side::Buy, OrderKind::StopLoss, 100));
        assert!(book.drain_triggered(99).is_empty());
        assert_eq!(book.drain_triggered(100).len(), 1);
    }

    #[test]
    fn triggered_stop_is_removed_from_book() {
        let book = StopBook::new();
        book.insert(make_stop(1, Side::Sell, OrderKind::StopLoss, 100));
        book.drain_triggered(100);
        assert_eq!(book.len(), 0);
    }

    #[test]
    fn reintroduce_stop_loss_becomes_market() {
        let order = make_stop(1, Side::Sell, OrderKind::StopLoss, 100);
        let live = reintroduce(order, 42);
        assert_eq!(live.kind, OrderKind::Market);
        assert_eq!(live.price, None);
        assert_eq!(live.arrival_seq, 42);
        assert_eq!(live.status, OrderStatus::Pending);
    }

    #[test]
    fn reintroduce_stop_limit_becomes_limit_at_same_price() {
        let order = make_stop(1, Side::Buy, OrderKind::StopLimit, 100);
        let live = reintroduce(order, 42);
        assert_eq!(live.kind, OrderKind::Limit);
        assert_eq!(live.price, Some(100));
    }
}
