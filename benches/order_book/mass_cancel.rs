use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lob_engine::clock::ManualClock;
use lob_engine::order::{OrderId, OrderKind, Owner, Side};
use lob_engine::symbol_book::{SubmitCommand, SymbolBook, SymbolBookConfig};
use std::hint::black_box;
use std::sync::Arc;

fn populated_book(count: u64) -> SymbolBook {
    let book = SymbolBook::new("BENCH", SymbolBookConfig::default(), Arc::new(ManualClock::new(0)));
    let mut sink = |_kind| {};
    for i in 0..count {
        let price = 1_000 + (i % 500) as i64;
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let cmd = SubmitCommand {
            order_id: OrderId(i + 1),
            side,
            kind: OrderKind::Limit,
            price: Some(price),
            stop_price: None,
            quantity: 10,
            displayed_quantity: None,
            owner: Owner::ANONYMOUS,
        };
        let _ = book.submit(cmd, &mut sink);
    }
    book
}

/// Canceling every resting order one at a time, in submission order.
fn bench_cancel_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("mass cancel - cancel_all");
    for &order_count in &[100, 1_000, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::new("sequential_cancel", order_count), &order_count, |b, &count| {
            b.iter_with_setup(
                || populated_book(count),
                |book| {
                    let mut sink = |_kind| {};
                    for i in 0..count {
                        book.cancel(OrderId(i + 1), &mut sink).unwrap();
                        black_box(());
                    }
                },
            );
        });
    }
    group.finish();
}

/// Canceling only one side of a two-sided book.
fn bench_cancel_one_side(c: &mut Criterion) {
    let mut group = c.benchmark_group("mass cancel - cancel_by_side");
    for &order_count in &[100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("buy_side_only", order_count), &order_count, |b, &count| {
            b.iter_with_setup(
                || populated_book(count),
                |book| {
                    let mut sink = |_kind| {};
                    for i in (0..count).step_by(2) {
                        book.cancel(OrderId(i + 1), &mut sink).unwrap();
                        black_box(());
                    }
                },
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cancel_all, bench_cancel_one_side);
criterion_main!(benches);
