use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lob_engine::clock::ManualClock;
use lob_engine::order::{OrderId, OrderKind, Owner, Side};
use lob_engine::symbol_book::{SubmitCommand, SymbolBook, SymbolBookConfig};
use std::hint::black_box;
use std::sync::Arc;

fn resting_side_order(id: u64, side: Side, price: i64) -> SubmitCommand {
    SubmitCommand {
        order_id: OrderId(id),
        side,
        kind: OrderKind::Limit,
        price: Some(price),
        stop_price: None,
        quantity: 10,
        displayed_quantity: None,
        owner: Owner::ANONYMOUS,
    }
}

fn book_with_resting_orders(count: u64) -> SymbolBook {
    let book = SymbolBook::new("BENCH", SymbolBookConfig::default(), Arc::new(ManualClock::new(0)));
    let mut sink = |_kind| {};
    for i in 0..count {
        let price = 1_000 + (i % 500) as i64;
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let _ = book.submit(resting_side_order(i + 1, side, price), &mut sink);
    }
    book
}

/// Fully crossing one-shot matches against a deep two-sided book.
fn bench_full_cross(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching - full cross");
    for &order_count in &[100, 1_000, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::new("single_fill", order_count), &order_count, |b, &count| {
            b.iter_with_setup(
                || book_with_resting_orders(count),
                |book| {
                    let mut sink = |_kind| {};
                    let taker = SubmitCommand {
                        order_id: OrderId(count + 1),
                        side: Side::Sell,
                        kind: OrderKind::Limit,
                        price: Some(1_000),
                        stop_price: None,
                        quantity: 10,
                        displayed_quantity: None,
                        owner: Owner::ANONYMOUS,
                    };
                    book.submit(taker, &mut sink).unwrap();
                    black_box(());
                },
            );
        });
    }
    group.finish();
}

/// A Market sweep walking several price levels deep into a resting book.
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching - sweep");
    for &depth in &[10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("market_sweep", depth), &depth, |b, &levels| {
            b.iter_with_setup(
                || {
                    let book = SymbolBook::new("BENCH", SymbolBookConfig::default(), Arc::new(ManualClock::new(0)));
                    let mut sink = |_kind| {};
                    for i in 0..levels {
                        let price = 1_000 + i as i64;
                        let _ = book.submit(resting_side_order(i + 1, Side::Sell, price), &mut sink);
                    }
                    book
                },
                |book| {
                    let mut sink = |_kind| {};
                    let taker = SubmitCommand {
                        order_id: OrderId(levels + 1),
                        side: Side::Buy,
                        kind: OrderKind::Market,
                        price: None,
                        stop_price: None,
                        quantity: levels * 10,
                        displayed_quantity: None,
                        owner: Owner::ANONYMOUS,
                    };
                    book.submit(taker, &mut sink).unwrap();
                    black_box(());
                },
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_full_cross, bench_sweep);
criterion_main!(benches);
