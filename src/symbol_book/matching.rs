//! The core match loop: taker/maker crossing, partial fills, iceberg
//! slice refresh, self-trade prevention, and the stop-trigger cascade
//! (§4.4). Grounded on the teacher's `matching.rs` step structure
//! (peek best level -> check price cross -> pop maker -> fill -> requeue
//! or remove) and its `peek_match` dry-run used here for FOK.

use super::stp::StpAction;
use super::SymbolBook;
use crate::error::EngineError;
use crate::event::{EventKind, RejectReason, TradePayload};
use crate::order::{Order, OrderKind, OrderStatus, Side};
use std::sync::atomic::Ordering;
use tracing::trace;

impl SymbolBook {
    /// Runs the match loop for a freshly-admitted `Limit`/`Market`/`Ioc`/
    /// `Fok`/`Iceberg` order, then applies the kind-specific residual
    /// disposition: rests (`Limit`/`Iceberg`), or auto-cancels the
    /// remainder (`Market`/`Ioc`). `Fok` is guaranteed to exhaust fully
    /// by the caller's dry run and asserts that here.
    pub(super) fn process_new_order(
        &self,
        mut order: Order,
        emit: &mut dyn FnMut(EventKind),
    ) -> Result<(), EngineError> {
        let stopped_by_stp = self.run_match_loop(&mut order, emit)?;

        if order.residual == 0 {
            self.mark_terminal(order.id, OrderStatus::Filled);
            return Ok(());
        }

        match order.kind {
            OrderKind::Limit | OrderKind::Iceberg => {
                self.insert_resting(order);
            }
            OrderKind::Market => {
                self.mark_terminal(order.id, OrderStatus::Canceled);
                let reason = stopped_by_stp.unwrap_or(RejectReason::UnfilledLiquidity);
                emit(EventKind::Canceled {
                    order_id: order.id,
                    reason: Some(reason),
                });
            }
            OrderKind::Ioc => {
                self.mark_terminal(order.id, OrderStatus::Canceled);
                emit(EventKind::Canceled {
                    order_id: order.id,
                    reason: stopped_by_stp,
                });
            }
            OrderKind::Fok => {
                return Err(EngineError::Internal {
                    message: format!(
                        "FOK order {} left a residual after its liquidity dry run passed",
                        order.id
                    ),
                });
            }
            OrderKind::StopLoss | OrderKind::StopLimit => {
                return Err(EngineError::Internal {
                    message: "stop orders must not reach process_new_order directly".into(),
                });
            }
        }
        Ok(())
    }

    /// Crosses `order` against the opposing side until it's filled, runs
    /// out of crossable price levels, or self-trade prevention stops it.
    /// Evaluates the stop-trigger cascade after every individual fill,
    /// since a cascading stop can itself move the price further.
    ///
    /// Returns `Some(RejectReason::SelfTradePrevented)` if self-trade
    /// prevention is what stopped the taker short of a full fill, so the
    /// caller can report that instead of conflating it with ordinary
    /// liquidity exhaustion; `None` means the loop ran its natural course
    /// (filled, or the opposing book simply ran out).
    pub(super) fn run_match_loop(
        &self,
        order: &mut Order,
        emit: &mut dyn FnMut(EventKind),
    ) -> Result<Option<RejectReason>, EngineError> {
        loop {
            if order.residual == 0 {
                return Ok(None);
            }
            let opposing = self.opposing_book(order.side);
            let Some((level_price, level)) = opposing.best() else {
                return Ok(None);
            };
            if let Some(limit) = order.price {
                let crosses = match order.side {
                    Side::Buy => level_price <= limit,
                    Side::Sell => level_price >= limit,
                };
                if !crosses {
                    return Ok(None);
                }
            }

            let Some(maker) = level.peek_front() else {
                opposing.remove_level(level_price);
                continue;
            };

            let same_owner = !order.owner.is_anonymous() && maker.owner == order.owner;
            match self.config.stp_mode.action(same_owner) {
                StpAction::Proceed => {}
                StpAction::SkipMaker => {
                    self.cancel_stp_maker(&level, opposing, level_price, maker.id);
                    emit(EventKind::Canceled {
                        order_id: maker.id,
                        reason: Some(RejectReason::SelfTradePrevented),
                    });
                    continue;
                }
                StpAction::StopTaker => {
                    trace!(
                        "book {}: self-trade prevention stopped taker {}",
                        self.symbol, order.id
                    );
                    let err = EngineError::SelfTradePrevented { taker_id: order.id };
                    return Ok(Some(Self::reject_reason(&err)));
                }
                StpAction::SkipMakerAndStopTaker => {
                    self.cancel_stp_maker(&level, opposing, level_price, maker.id);
                    emit(EventKind::Canceled {
                        order_id: maker.id,
                        reason: Some(RejectReason::SelfTradePrevented),
                    });
                    trace!(
                        "book {}: self-trade prevention stopped taker {}",
                        self.symbol, order.id
                    );
                    let err = EngineError::SelfTradePrevented { taker_id: order.id };
                    return Ok(Some(Self::reject_reason(&err)));
                }
            }

            let trade_qty = order.residual.min(maker.residual);
            let trade_price = maker
                .price
                .expect("a resting maker always carries a concrete price");

            order.apply_fill(trade_qty);
            let mut maker = maker;
            maker.apply_fill(trade_qty);

            emit(EventKind::Trade(TradePayload {
                taker_id: order.id,
                maker_id: maker.id,
                price: trade_price,
                qty: trade_qty,
                aggressor_side: order.side,
            }));
            self.last_trade_price.store(Some(trade_price));
            self.last_trade_seq.fetch_add(1, Ordering::SeqCst);

            if maker.residual == 0 {
                level.pop_front();
                self.mark_terminal(maker.id, OrderStatus::Filled);
                if level.is_empty() {
                    opposing.remove_level(level_price);
                }
            } else if maker.kind == OrderKind::Iceberg {
                // A partially-filled iceberg's visible slice refreshes and
                // loses priority: fresh arrival_seq, back of the FIFO.
                level.remove(maker.id);
                maker.arrival_seq = self.next_seq();
                level.push_back(maker);
            } else {
                level.replace(maker);
            }

            self.evaluate_stop_triggers(emit)?;
        }
    }

    /// Removes a same-owner maker from its level for self-trade
    /// prevention, dropping the level too if it's now empty. Marking the
    /// maker terminal and emitting its `Canceled` event is the caller's
    /// job — this only touches the book/index bookkeeping.
    fn cancel_stp_maker(
        &self,
        level: &crate::price_level::PriceLevel,
        opposing: &crate::side_book::SideBook,
        level_price: i64,
        maker_id: crate::order::OrderId,
    ) {
        level.remove(maker_id);
        if level.is_empty() {
            opposing.remove_level(level_price);
        }
        self.mark_terminal(maker_id, OrderStatus::Canceled);
    }

    /// Checks the stop book against the latest trade price and
    /// reintroduces every order that triggers, as a fresh Market/Limit
    /// submission with a brand-new `arrival_seq`. Terminates because
    /// each pass either drains the stop book further or finds nothing
    /// left to trigger (§4.4 "cascade terminates").
    fn evaluate_stop_triggers(&self, emit: &mut dyn FnMut(EventKind)) -> Result<(), EngineError> {
        loop {
            let Some(last) = self.last_trade_price.load() else {
                return Ok(());
            };
            let triggered = self.stops.drain_triggered(last);
            if triggered.is_empty() {
                return Ok(());
            }
            for stop_order in triggered {
                let fresh_seq = self.next_seq();
                let mut live = super::stops::reintroduce(stop_order, fresh_seq);
                emit(EventKind::Triggered {
                    order_id: live.id,
                    new_arrival_seq: fresh_seq,
                });
                live.ts_arrival = self.clock.now_millis();
                self.process_new_order(live, emit)?;
            }
        }
    }
}
