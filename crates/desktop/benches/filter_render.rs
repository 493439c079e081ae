use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use challan_desktop::cache::encode;
use challan_desktop::filter::{self, FilterState, StatusFilter};
use challan_desktop::render::{render, RenderOptions};
use challan_desktop::state::Session;
use challan_records::{Dataset, DatasetKind, DatasetSnapshot, FieldNames, Row};

const STATUSES: [&str; 3] = ["Pending", "Partial", "Received"];

fn snapshot(rows: usize) -> DatasetSnapshot {
    DatasetSnapshot {
        rows: (0..rows)
            .map(|i| {
                Row::new()
                    .with("code", format!("IT-{i:05}"))
                    .with("item", format!("Hex bolt M{}", i % 24))
                    .with("orderedQty", 100)
                    .with("receivedQty", (i % 3) as i64 * 50)
                    .with("status", STATUSES[i % 3])
                    .with("PO Date", "2024-03-01")
            })
            .collect(),
        display_columns: ["code", "item", "orderedQty", "receivedQty", "status", "PO Date"]
            .map(String::from)
            .to_vec(),
        ..DatasetSnapshot::default()
    }
}

fn dataset(rows: usize) -> Dataset {
    Dataset::from_snapshot(DatasetKind::PurchaseOrders, FieldNames::default(), snapshot(rows)).unwrap()
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_apply");
    for size in [100usize, 1_000, 10_000] {
        let ds = dataset(size);
        let state = FilterState::new("m12", StatusFilter::Open);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ds, |b, ds| {
            b.iter(|| filter::apply(black_box(ds), black_box(&state)).len())
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_main_view");
    let options = RenderOptions {
        writable: true,
        ..RenderOptions::default()
    };
    for size in [100usize, 1_000] {
        let mut session = Session::new(DatasetKind::PurchaseOrders, FieldNames::default());
        session.install(dataset(size));
        session.filter.search = "bolt".into();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &session, |b, session| {
            b.iter(|| render(black_box(session), &options))
        });
    }
    group.finish();
}

/// Staleness detection encodes every fetched dataset.
fn bench_encode(c: &mut Criterion) {
    let snap = snapshot(5_000);
    c.bench_function("encode_snapshot_5000", |b| b.iter(|| encode(black_box(&snap)).unwrap()));
}

criterion_group!(benches, bench_filter, bench_render, bench_encode);
criterion_main!(benches);
