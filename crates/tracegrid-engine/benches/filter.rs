use criterion::{criterion_group, criterion_main, Criterion};
use smallvec::smallvec;
use tracegrid_columnar::BitVec;
use tracegrid_engine::overlay::{Overlay, SelectorOverlay};
use tracegrid_engine::storage::{NullStorage, NumericStorage};
use tracegrid_engine::{Column, Constraint, FilterOp, QueryExecutor, SqlValue};

const ROWS: u32 = 1 << 20;

fn bench_sorted_bounded(c: &mut Criterion) {
    let data: Vec<i64> = (0..ROWS as i64).collect();
    let storage = NumericStorage::new_sorted(&data);

    c.bench_function("filter/sorted_ge_bounded", |b| {
        let exec = QueryExecutor::new(vec![Column::new(&storage)], ROWS);
        let constraints = [Constraint::new(0, FilterOp::Ge, SqlValue::Long(ROWS as i64 / 2))];
        b.iter(|| exec.filter(&constraints))
    });
}

fn bench_unsorted_scan(c: &mut Criterion) {
    let data: Vec<i64> = (0..ROWS as i64).map(|i| i.wrapping_mul(2654435761) % 1000).collect();
    let storage = NumericStorage::new(&data);

    c.bench_function("filter/unsorted_scan", |b| {
        let exec = QueryExecutor::new(vec![Column::new(&storage)], ROWS);
        let constraints = [Constraint::new(0, FilterOp::Lt, SqlValue::Long(100))];
        b.iter(|| exec.filter(&constraints))
    });
}

fn bench_null_selector_chain(c: &mut Criterion) {
    let dense: Vec<i64> = (0..ROWS as i64 / 2).collect();
    let presence: BitVec = (0..ROWS).map(|i| i % 2 == 0).collect();
    let storage = NullStorage::new(Box::new(NumericStorage::new(&dense)), &presence);
    let selector: BitVec = (0..ROWS).map(|i| i % 4 != 3).collect();
    let overlay = SelectorOverlay::new(&selector);
    let table_rows = selector.count_set_bits();

    c.bench_function("filter/null_selector_chain", |b| {
        let column = Column::with_overlays(smallvec![&overlay as &dyn Overlay], &storage);
        let exec = QueryExecutor::new(vec![column], table_rows);
        let constraints = [Constraint::new(0, FilterOp::Ge, SqlValue::Long(1000))];
        b.iter(|| exec.filter(&constraints))
    });
}

criterion_group!(
    benches,
    bench_sorted_bounded,
    bench_unsorted_scan,
    bench_null_selector_chain
);
criterion_main!(benches);
