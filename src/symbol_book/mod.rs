//! Single-symbol order book: the matching core (§4.4).
//!
//! A `SymbolBook` owns two [`SideBook`]s, a stop book, and the id index
//! that ties order ids to where they currently live. It is built to be
//! driven by a single writer (the owning `engine::worker` thread) — none
//! of its mutating methods take `&mut self`; the interior `DashMap`s and
//! atomics give it the freedom to be read concurrently by snapshot
//! requests from other threads while the writer is idle.

mod matching;
mod snapshot;
mod stops;
mod stp;

pub use snapshot::SymbolBookSnapshot;
pub use stp::StpMode;

use crate::clock::SharedClock;
use crate::error::EngineError;
use crate::event::EventKind;
use crate::order::{Order, OrderId, OrderKind, OrderStatus, Owner, Side};
use crate::side_book::SideBook;
use stops::StopBook;

use bitflags::bitflags;
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

bitflags! {
    /// Which optional order kinds (§3) are enabled on a symbol. `Limit`
    /// and `Market` have no corresponding flag — they are always on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct OrderKindFlags: u32 {
        /// Immediate-Or-Cancel.
        const IOC         = 0b0000_0001;
        /// Fill-Or-Kill.
        const FOK         = 0b0000_0010;
        /// Iceberg (displayed quantity).
        const ICEBERG     = 0b0000_0100;
        /// Stop-loss (triggers a Market order).
        const STOP_LOSS   = 0b0000_1000;
        /// Stop-limit (triggers a Limit order).
        const STOP_LIMIT  = 0b0001_0000;
    }
}

impl OrderKindFlags {
    /// `true` if `kind` is admissible given these flags — `Limit` and
    /// `Market` are always admissible regardless of flag state.
    #[must_use]
    pub fn supports(self, kind: OrderKind) -> bool {
        match kind {
            OrderKind::Limit | OrderKind::Market => true,
            OrderKind::Ioc => self.contains(OrderKindFlags::IOC),
            OrderKind::Fok => self.contains(OrderKindFlags::FOK),
            OrderKind::Iceberg => self.contains(OrderKindFlags::ICEBERG),
            OrderKind::StopLoss => self.contains(OrderKindFlags::STOP_LOSS),
            OrderKind::StopLimit => self.contains(OrderKindFlags::STOP_LIMIT),
        }
    }
}

/// Per-symbol configuration (§10.3), grounded on the teacher's
/// `tick_size`/`lot_size`/`min_order_size`/`max_order_size`/`stp_mode` fields.
#[derive(Debug, Clone)]
pub struct SymbolBookConfig {
    /// Prices must be an exact multiple of this. `None`/`0` disables the check.
    pub tick_size: Option<i64>,
    /// Quantities must be an exact multiple of this. `None`/`0` disables the check.
    pub lot_size: Option<u64>,
    /// Minimum admissible order quantity, inclusive. `None` disables the floor.
    pub min_order_size: Option<u64>,
    /// Maximum admissible order quantity, inclusive. `None` disables the ceiling.
    pub max_order_size: Option<u64>,
    /// Self-trade-prevention policy for this symbol.
    pub stp_mode: StpMode,
    /// Which optional order kinds are accepted.
    pub enabled_kinds: OrderKindFlags,
}

impl Default for SymbolBookConfig {
    fn default() -> Self {
        Self {
            tick_size: None,
            lot_size: None,
            min_order_size: None,
            max_order_size: None,
            stp_mode: StpMode::CancelTaker,
            enabled_kinds: OrderKindFlags::all(),
        }
    }
}

/// Where an order id currently lives, for O(1) cancel/modify dispatch and
/// the duplicate-id check (§4.1, §4.4 invariant "index bijection").
///
/// `Terminal` entries are kept forever (never removed) so that an id can
/// never be reused once assigned, even after the order stops being live.
#[derive(Debug, Clone, Copy)]
enum IndexEntry {
    Resting { side: Side, price: i64 },
    Stopped,
    Terminal { status: OrderStatus },
}

/// One instrument's complete book: two [`SideBook`]s, a stop book, and
/// the bookkeeping that ties order ids to events (§4.4).
pub struct SymbolBook {
    symbol: String,
    config: SymbolBookConfig,
    clock: SharedClock,
    bids: SideBook,
    asks: SideBook,
    stops: StopBook,
    index: DashMap<OrderId, IndexEntry>,
    next_arrival_seq: AtomicU64,
    last_trade_price: AtomicCell<Option<i64>>,
    last_trade_seq: AtomicU64,
}

/// A new order submission, as decoded from a client command (§6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmitCommand {
    /// Client-assigned id, unique per symbol for the engine's lifetime.
    pub order_id: OrderId,
    /// Buy or sell.
    pub side: Side,
    /// Order kind.
    pub kind: OrderKind,
    /// Limit/trigger-resting price. `None` for `Market`.
    pub price: Option<i64>,
    /// Trigger price for `StopLoss`/`StopLimit`.
    pub stop_price: Option<i64>,
    /// Total quantity.
    pub quantity: u64,
    /// Visible portion for `Iceberg`; defaults to `quantity` otherwise.
    pub displayed_quantity: Option<u64>,
    /// Owner, for self-trade prevention. `Owner::ANONYMOUS` bypasses it.
    pub owner: Owner,
}

impl SymbolBook {
    /// Creates an empty book for `symbol`.
    #[must_use]
    pub fn new(symbol: impl Into<String>, config: SymbolBookConfig, clock: SharedClock) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            clock,
            bids: SideBook::new(Side::Buy),
            asks: SideBook::new(Side::Sell),
            stops: StopBook::new(),
            index: DashMap::new(),
            next_arrival_seq: AtomicU64::new(0),
            last_trade_price: AtomicCell::new(None),
            last_trade_seq: AtomicU64::new(0),
        }
    }

    /// The instrument this book serves.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The book's static configuration.
    #[must_use]
    pub fn config(&self) -> &SymbolBookConfig {
        &self.config
    }

    /// Last traded price, if any trade has occurred yet.
    #[must_use]
    pub fn last_trade_price(&self) -> Option<i64> {
        self.last_trade_price.load()
    }

    fn side_book(&self, side: Side) -> &SideBook {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn opposing_book(&self, side: Side) -> &SideBook {
        self.side_book(side.opposite())
    }

    fn next_seq(&self) -> u64 {
        self.next_arrival_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn reject_reason(err: &EngineError) -> crate::event::RejectReason {
        use crate::event::RejectReason as R;
        match err {
            EngineError::InvalidQuantity { .. } => R::InvalidQuantity,
            EngineError::InvalidPrice { .. } => R::InvalidPrice,
            EngineError::InvalidDisplayedQuantity { .. } => R::InvalidDisplayedQuantity,
            EngineError::InvalidTickSize { .. } => R::InvalidTickSize,
            EngineError::UnknownSymbol { .. } => R::UnknownSymbol,
            EngineError::DuplicateOrderId { .. } => R::DuplicateOrderId,
            EngineError::UnsupportedKind { .. } => R::UnsupportedKind,
            EngineError::OrderNotFound { .. } => R::OrderNotFound,
            EngineError::AlreadyTerminal { .. } => R::AlreadyTerminal,
            EngineError::InsufficientLiquidity { .. } => R::UnfilledLiquidity,
            EngineError::FokInfeasible { .. } => R::InsufficientLiquidity,
            EngineError::SelfTradePrevented { .. } => R::SelfTradePrevented,
            EngineError::Internal { .. } => {
                unreachable!("Internal errors are never surfaced as a reject reason")
            }
        }
    }

    /// Validates and admits a new order, running it through the match
    /// loop immediately if it's aggressive (§4.4).
    ///
    /// Never returns `Err` for an ordinary business rejection — those are
    /// delivered through `emit` as a `Rejected` event and this returns
    /// `Ok(())`. An `Err` here is always [`EngineError::Internal`] and
    /// must be treated as fatal by the caller.
    pub fn submit(
        &self,
        cmd: SubmitCommand,
        emit: &mut dyn FnMut(EventKind),
    ) -> Result<(), EngineError> {
        trace!(
            "book {}: submit {:?} order {} side {:?} qty {}",
            self.symbol, cmd.kind, cmd.order_id, cmd.side, cmd.quantity
        );

        if self.index.contains_key(&cmd.order_id) {
            emit(EventKind::Rejected {
                order_id: cmd.order_id,
                reason: crate::event::RejectReason::DuplicateOrderId,
            });
            return Ok(());
        }

        if !self.config.enabled_kinds.supports(cmd.kind) {
            emit(EventKind::Rejected {
                order_id: cmd.order_id,
                reason: crate::event::RejectReason::UnsupportedKind,
            });
            return Ok(());
        }

        let is_stop = matches!(cmd.kind, OrderKind::StopLoss | OrderKind::StopLimit);
        if is_stop != cmd.stop_price.is_some() {
            emit(EventKind::Rejected {
                order_id: cmd.order_id,
                reason: crate::event::RejectReason::InvalidPrice,
            });
            return Ok(());
        }

        let displayed = cmd.displayed_quantity.unwrap_or(cmd.quantity);
        let validate_price = if is_stop { cmd.stop_price } else { cmd.price };
        if let Err(err) =
            Order::validate(cmd.kind, validate_price, cmd.quantity, displayed, self.config.tick_size)
        {
            emit(EventKind::Rejected {
                order_id: cmd.order_id,
                reason: Self::reject_reason(&err),
            });
            return Ok(());
        }
        if let Some(lot) = self.config.lot_size {
            if lot > 0 && cmd.quantity % lot != 0 {
                emit(EventKind::Rejected {
                    order_id: cmd.order_id,
                    reason: crate::event::RejectReason::InvalidQuantity,
                });
                return Ok(());
            }
        }
        if self.config.min_order_size.is_some_and(|min| cmd.quantity < min)
            || self.config.max_order_size.is_some_and(|max| cmd.quantity > max)
        {
            emit(EventKind::Rejected {
                order_id: cmd.order_id,
                reason: crate::event::RejectReason::InvalidQuantity,
            });
            return Ok(());
        }

        let order = Order {
            id: cmd.order_id,
            symbol: self.symbol.clone(),
            side: cmd.side,
            kind: cmd.kind,
            price: cmd.price,
            stop_price: cmd.stop_price,
            quantity: cmd.quantity,
            displayed_quantity: displayed,
            residual: cmd.quantity,
            arrival_seq: self.next_seq(),
            ts_arrival: self.clock.now_millis(),
            status: OrderStatus::Pending,
            owner: cmd.owner,
        };

        if is_stop {
            self.index.insert(order.id, IndexEntry::Stopped);
            self.stops.insert(order.clone());
            emit(EventKind::Accepted { order_id: order.id });
            return Ok(());
        }

        // FOK's liquidity dry run happens before `Accepted` is emitted: a
        // rejected FOK produces a single `Rejected` event, not an
        // `Accepted` immediately followed by one (§4.4 "one Accepted (or
        // Rejected)").
        if order.kind == OrderKind::Fok {
            let available = self.peek_available(order.side, order.price);
            if available < order.residual {
                let err = EngineError::FokInfeasible {
                    requested: order.residual,
                    available,
                };
                self.index.insert(
                    order.id,
                    IndexEntry::Terminal {
                        status: OrderStatus::Rejected,
                    },
                );
                emit(EventKind::Rejected {
                    order_id: order.id,
                    reason: Self::reject_reason(&err),
                });
                return Ok(());
            }
        }

        emit(EventKind::Accepted { order_id: order.id });

        self.process_new_order(order, emit)
    }

    /// Cancels a live order (§4.4, §6).
    pub fn cancel(&self, order_id: OrderId, emit: &mut dyn FnMut(EventKind)) -> Result<(), EngineError> {
        use crate::event::RejectReason;
        trace!("book {}: cancel order {}", self.symbol, order_id);
        let Some(entry) = self.index.get(&order_id).map(|e| *e) else {
            emit(EventKind::CancelReject {
                order_id,
                reason: RejectReason::OrderNotFound,
            });
            return Ok(());
        };
        match entry {
            IndexEntry::Terminal { status } => {
                emit(EventKind::CancelReject {
                    order_id,
                    reason: RejectReason::AlreadyTerminal,
                });
                let _ = status;
            }
            IndexEntry::Stopped => {
                self.stops.remove(order_id);
                self.index.insert(
                    order_id,
                    IndexEntry::Terminal {
                        status: OrderStatus::Canceled,
                    },
                );
                emit(EventKind::Canceled {
                    order_id,
                    reason: None,
                });
            }
            IndexEntry::Resting { side, price } => {
                let book = self.side_book(side);
                if let Some(level) = book.get(price) {
                    level.remove(order_id);
                    if level.is_empty() {
                        book.remove_level(price);
                    }
                }
                self.index.insert(
                    order_id,
                    IndexEntry::Terminal {
                        status: OrderStatus::Canceled,
                    },
                );
                emit(EventKind::Canceled {
                    order_id,
                    reason: None,
                });
            }
        }
        Ok(())
    }

    /// Modifies a resting order's price and/or residual quantity (§4.4).
    ///
    /// A price change, or a quantity *increase*, is a cancel-and-resubmit:
    /// the order gets a fresh `arrival_seq` and loses price-time priority.
    /// A pure quantity decrease at the same price keeps its queue position.
    /// A modify to zero residual is rejected — use `cancel` instead.
    pub fn modify(
        &self,
        order_id: OrderId,
        new_price: i64,
        new_quantity: u64,
        emit: &mut dyn FnMut(EventKind),
    ) -> Result<(), EngineError> {
        use crate::event::RejectReason;
        trace!(
            "book {}: modify order {} -> price {} qty {}",
            self.symbol, order_id, new_price, new_quantity
        );
        let Some(entry) = self.index.get(&order_id).map(|e| *e) else {
            emit(EventKind::ModifyReject {
                order_id,
                reason: RejectReason::OrderNotFound,
            });
            return Ok(());
        };
        let IndexEntry::Resting { side, price } = entry else {
            let reason = match entry {
                IndexEntry::Terminal { .. } => RejectReason::AlreadyTerminal,
                IndexEntry::Stopped => RejectReason::UnsupportedKind,
                IndexEntry::Resting { .. } => unreachable!(),
            };
            emit(EventKind::ModifyReject { order_id, reason });
            return Ok(());
        };

        if new_quantity == 0 {
            emit(EventKind::ModifyReject {
                order_id,
                reason: RejectReason::InvalidQuantity,
            });
            return Ok(());
        }

        let book = self.side_book(side);
        let Some(level) = book.get(price) else {
            return Err(EngineError::Internal {
                message: format!("index points resting order {order_id} at a level that doesn't exist"),
            });
        };
        let Some(current) = level.get(order_id) else {
            return Err(EngineError::Internal {
                message: format!("index points resting order {order_id} at a level that doesn't hold it"),
            });
        };

        if new_price != price || new_quantity > current.residual {
            level.remove(order_id);
            if level.is_empty() {
                book.remove_level(price);
            }
            let mut fresh = current;
            fresh.price = Some(new_price);
            fresh.quantity = new_quantity;
            fresh.residual = new_quantity;
            fresh.displayed_quantity = fresh.displayed_quantity.min(new_quantity).max(1);
            fresh.arrival_seq = self.next_seq();
            fresh.status = OrderStatus::Pending;
            self.index.insert(
                order_id,
                IndexEntry::Resting {
                    side,
                    price: new_price,
                },
            );
            self.side_book(side).get_or_create(new_price).push_back(fresh);
            emit(EventKind::Modified {
                order_id,
                lost_priority: true,
            });
        } else {
            let mut updated = current;
            updated.residual = new_quantity;
            updated.status = if new_quantity == updated.quantity {
                OrderStatus::Pending
            } else {
                OrderStatus::PartiallyFilled
            };
            level.replace(updated);
            emit(EventKind::Modified {
                order_id,
                lost_priority: false,
            });
        }
        Ok(())
    }

    fn peek_available(&self, taker_side: Side, limit_price: Option<i64>) -> u64 {
        let opposing = self.opposing_book(taker_side);
        let mut total = 0u64;
        for (level_price, level) in opposing.iterate_from_best() {
            if let Some(limit) = limit_price {
                let crosses = match taker_side {
                    Side::Buy => level_price <= limit,
                    Side::Sell => level_price >= limit,
                };
                if !crosses {
                    break;
                }
            }
            total += level.total_qty();
        }
        total
    }

    fn insert_resting(&self, order: Order) {
        self.index.insert(
            order.id,
            IndexEntry::Resting {
                side: order.side,
                price: order.price.expect("resting order always carries a price"),
            },
        );
        self.side_book(order.side)
            .get_or_create(order.price.unwrap())
            .push_back(order);
    }

    fn mark_terminal(&self, order_id: OrderId, status: OrderStatus) {
        self.index.insert(order_id, IndexEntry::Terminal { status });
    }

    /// Number of distinct price levels across both sides, for `SnapshotTaken`.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.bids.level_count() + self.asks.level_count()
    }
}
