//! FIFO queue of live orders at one price point for one side.
//!
//! Mirrors the teacher crate's hybrid storage: a `DashMap` keyed by order
//! id holds the orders themselves (O(1) average lookup/remove), while a
//! `Mutex<VecDeque<OrderId>>` preserves arrival order for FIFO service.
//! Removing an order only erases it from the map; the id left behind in
//! the queue is a tombstone that `peek_front`/`pop_front` skip lazily and
//! drop — this avoids an O(n) shift on every cancel deep in a level.

use crate::order::{Order, OrderId, Side};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use dashmap::DashMap;

/// A single price point's FIFO queue of resting orders.
pub struct PriceLevel {
    price: i64,
    side: Side,
    orders: DashMap<OrderId, Order>,
    queue: Mutex<VecDeque<OrderId>>,
    total_qty: AtomicU64,
}

impl PriceLevel {
    /// Creates an empty level at `price` for `side`.
    #[must_use]
    pub fn new(price: i64, side: Side) -> Self {
        Self {
            price,
            side,
            orders: DashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            total_qty: AtomicU64::new(0),
        }
    }

    /// The price this level represents.
    #[must_use]
    pub fn price(&self) -> i64 {
        self.price
    }

    /// The side this level belongs to.
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Appends `order` to the back of the FIFO queue (§4.2 `push_back`).
    ///
    /// # Panics
    /// Panics (an internal invariant violation, §7) if `order.side`/`order.price`
    /// disagree with this level's — a level must never hold mixed orders.
    pub fn push_back(&self, order: Order) {
        assert_eq!(order.side, self.side, "price level side mismatch");
        assert_eq!(
            order.price.unwrap_or(self.price),
            self.price,
            "price level price mismatch"
        );
        self.total_qty.fetch_add(order.residual, Ordering::Relaxed);
        let id = order.id;
        self.orders.insert(id, order);
        self.queue.lock().unwrap().push_back(id);
    }

    /// Returns a clone of the order at the front of the queue without
    /// removing it, skipping and discarding any tombstoned ids first.
    #[must_use]
    pub fn peek_front(&self) -> Option<Order> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            let id = *queue.front()?;
            if let Some(order) = self.orders.get(&id) {
                return Some(order.clone());
            }
            queue.pop_front();
        }
    }

    /// Removes and returns the order at the front of the queue (§4.2 `pop_front`).
    pub fn pop_front(&self) -> Option<Order> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            let id = queue.pop_front()?;
            if let Some((_, order)) = self.orders.remove(&id) {
                self.total_qty.fetch_sub(order.residual, Ordering::Relaxed);
                return Some(order);
            }
        }
    }

    /// Removes a specific order by id in O(1) average (§4.2 `remove`).
    /// Leaves a tombstone in the queue that later `peek_front`/`pop_front`
    /// calls skip.
    pub fn remove(&self, order_id: OrderId) -> Option<Order> {
        let (_, order) = self.orders.remove(&order_id)?;
        self.total_qty.fetch_sub(order.residual, Ordering::Relaxed);
        Some(order)
    }

    /// Replaces the stored copy of a live order in place (used for
    /// in-place residual reduction on `modify`, and for iceberg slice
    /// refresh bookkeeping). Does not change FIFO position.
    pub fn replace(&self, order: Order) {
        if let Some(mut slot) = self.orders.get_mut(&order.id) {
            self.total_qty
                .fetch_sub(slot.residual, Ordering::Relaxed);
            self.total_qty.fetch_add(order.residual, Ordering::Relaxed);
            *slot = order;
        }
    }

    /// Sum of `residual` across all live orders at this level (§4.2 `total_qty`).
    #[must_use]
    pub fn total_qty(&self) -> u64 {
        self.total_qty.load(Ordering::Relaxed)
    }

    /// Sum of `displayed_quantity` across all live orders — what depth
    /// snapshots show (§4.4 Iceberg hides the rest).
    #[must_use]
    pub fn displayed_qty(&self) -> u64 {
        self.orders.iter().map(|e| e.displayed_quantity.min(e.residual)).sum()
    }

    /// `true` if the level holds no live orders (§4.2 `is_empty`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of live orders at this level.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Live orders in FIFO (arrival) order — used for self-trade-prevention
    /// scans and order-level snapshot detail. O(level depth).
    #[must_use]
    pub fn iter_orders(&self) -> Vec<Order> {
        let queue = self.queue.lock().unwrap();
        queue
            .iter()
            .filter_map(|id| self.orders.get(id).map(|o| o.clone()))
            .collect()
    }

    /// Looks up a single live order without removing it.
    #[must_use]
    pub fn get(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).map(|o| o.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderKind, OrderStatus, Owner};

    fn make_order(id: u64, seq: u64, qty: u64) -> Order {
        Order {
            id: OrderId(id),
            symbol: "X".into(),
            side: Side::Buy,
            kind: OrderKind::Limit,
            price: Some(100),
            stop_price: None,
            quantity: qty,
            displayed_quantity: qty,
            residual: qty,
            arrival_seq: seq,
            ts_arrival: 0,
            status: OrderStatus::Pending,
            owner: Owner::ANONYMOUS,
        }
    }

    #[test]
    fn fifo_order_preserved() {
        let level = PriceLevel::new(100, Side::Buy);
        level.push_back(make_order(1, 1, 10));
        level.push_back(make_order(2, 2, 10));
        level.push_back(make_order(3, 3, 10));

        assert_eq!(level.pop_front().unwrap().id, OrderId(1));
        assert_eq!(level.pop_front().unwrap().id, OrderId(2));
        assert_eq!(level.pop_front().unwrap().id, OrderId(3));
        assert!(level.is_empty());
    }

    #[test]
    fn remove_from_middle_preserves_remaining_order() {
        let level = PriceLevel::new(100, Side::Buy);
        level.push_back(make_order(1, 1, 10));
        level.push_back(make_order(2, 2, 10));
        level.push_back(make_order(3, 3, 10));

        level.remove(OrderId(2));
        assert_eq!(level.total_qty(), 20);
        assert_eq!(level.pop_front().unwrap().id, OrderId(1));
        assert_eq!(level.pop_front().unwrap().id, OrderId(3));
        assert!(level.is_empty());
    }

    #[test]
    fn total_qty_tracks_pushes_and_removes() {
        let level = PriceLevel::new(100, Side::Buy);
        level.push_back(make_order(1, 1, 30));
        level.push_back(make_order(2, 2, 20));
        assert_eq!(level.total_qty(), 50);
        level.remove(OrderId(1));
        assert_eq!(level.total_qty(), 20);
    }

    #[test]
    fn peek_front_does_not_consume() {
        let level = PriceLevel::new(100, Side::Buy);
        level.push_back(make_order(1, 1, 10));
        assert_eq!(level.peek_front().unwrap().id, OrderId(1));
        assert_eq!(level.peek_front().unwrap().id, OrderId(1));
        assert_eq!(level.order_count(), 1);
    }
}
