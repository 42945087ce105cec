//! Price-ordered collection of [`PriceLevel`]s for one side of one symbol.

use crate::order::Side;
use crate::price_level::PriceLevel;
use crossbeam_skiplist::SkipMap;
use std::sync::Arc;

/// One side (bids or asks) of a [`crate::symbol_book::SymbolBook`].
///
/// Backed by a `crossbeam_skiplist::SkipMap<i64, Arc<PriceLevel>>`, which
/// keeps prices in ascending order automatically — giving O(log n)
/// insert/remove of levels and O(log n)-or-better best-price access
/// without an explicit sort on every read (§4.3). Bids read the map from
/// the back (highest price first); asks read it from the front (lowest
/// price first).
pub struct SideBook {
    side: Side,
    levels: SkipMap<i64, Arc<PriceLevel>>,
}

impl SideBook {
    /// Creates an empty side book for `side`.
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: SkipMap::new(),
        }
    }

    /// Returns the level at `price`, creating an empty one if absent.
    pub fn get_or_create(&self, price: i64) -> Arc<PriceLevel> {
        self.levels
            .get_or_insert_with(price, || Arc::new(PriceLevel::new(price, self.side)))
            .value()
            .clone()
    }

    /// Returns the level at `price` if one exists.
    #[must_use]
    pub fn get(&self, price: i64) -> Option<Arc<PriceLevel>> {
        self.levels.get(&price).map(|e| e.value().clone())
    }

    /// Removes the level at `price`. Callers must only do this once the
    /// level is empty (§4.2 invariant (c)); no check is made here since
    /// the matching loop already knows when a level drained to empty.
    pub fn remove_level(&self, price: i64) {
        self.levels.remove(&price);
    }

    /// The best price and its level: the maximum price for bids, the
    /// minimum price for asks (§4.3 `best()`).
    #[must_use]
    pub fn best(&self) -> Option<(i64, Arc<PriceLevel>)> {
        let entry = match self.side {
            Side::Buy => self.levels.back(),
            Side::Sell => self.levels.front(),
        }?;
        Some((*entry.key(), entry.value().clone()))
    }

    /// The best price alone.
    #[must_use]
    pub fn best_price(&self) -> Option<i64> {
        self.best().map(|(p, _)| p)
    }

    /// Iterates levels from best toward worst, deterministically (§4.3 `iterate_from_best`).
    pub fn iterate_from_best(&self) -> Box<dyn Iterator<Item = (i64, Arc<PriceLevel>)> + '_> {
        match self.side {
            Side::Buy => Box::new(
                self.levels
                    .iter()
                    .rev()
                    .map(|e| (*e.key(), e.value().clone())),
            ),
            Side::Sell => Box::new(self.levels.iter().map(|e| (*e.key(), e.value().clone()))),
        }
    }

    /// `true` if no price levels remain (all were removed once empty).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of distinct price levels currently resting.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Order, OrderId, OrderKind, OrderStatus, Owner};

    fn make_order(id: u64, price: i64, side: Side, seq: u64) -> Order {
        Order {
            id: OrderId(id),
            symbol: "X".into(),
            side,
            kind: OrderKind::Limit,
            price: Some(price),
            stop_price: None,
            quantity: 10,
            displayed_quantity: 10,
            residual: 10,
            arrival_seq: seq,
            ts_arrival: 0,
            status: OrderStatus::Pending,
            owner: Owner::ANONYMOUS,
        }
    }

    #[test]
    fn bids_best_is_highest_price() {
        let book = SideBook::new(Side::Buy);
        book.get_or_create(100).push_back(make_order(1, 100, Side::Buy, 1));
        book.get_or_create(105).push_back(make_order(2, 105, Side::Buy, 2));
        book.get_or_create(95).push_back(make_order(3, 95, Side::Buy, 3));
        assert_eq!(book.best_price(), Some(105));
    }

    #[test]
    fn asks_best_is_lowest_price() {
        let book = SideBook::new(Side::Sell);
        book.get_or_create(100).push_back(make_order(1, 100, Side::Sell, 1));
        book.get_or_create(95).push_back(make_order(2, 95, Side::Sell, 2));
        book.get_or_create(105).push_back(make_order(3, 105, Side::Sell, 3));
        assert_eq!(book.best_price(), Some(95));
    }

    #[test]
    fn iterate_from_best_is_ordered_for_both_sides() {
        let bids = SideBook::new(Side::Buy);
        for p in [90, 100, 95] {
            bids.get_or_create(p).push_back(make_order(p as u64, p, Side::Buy, p as u64));
        }
        let order: Vec<i64> = bids.iterate_from_best().map(|(p, _)| p).collect();
        assert_eq!(order, vec![100, 95, 90]);

        let asks = SideBook::new(Side::Sell);
        for p in [110, 100, 105] {
            asks.get_or_create(p).push_back(make_order(p as u64, p, Side::Sell, p as u64));
        }
        let order: Vec<i64> = asks.iterate_from_best().map(|(p, _)| p).collect();
        assert_eq!(order, vec![100, 105, 110]);
    }

    #[test]
    fn remove_level_drops_from_map() {
        let book = SideBook::new(Side::Buy);
        book.get_or_create(100).push_back(make_order(1, 100, Side::Buy, 1));
        assert_eq!(book.level_count(), 1);
        book.remove_level(100);
        assert!(book.is_empty());
    }
}
