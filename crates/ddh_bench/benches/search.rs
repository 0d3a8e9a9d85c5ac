//! Search pagination benchmarks against the in-memory fake server.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ddh_client::SearchQuery;
use ddh_testkit::{test_client, FakeNodeServer};

/// Benchmark draining a search of increasing size.
fn bench_search_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for count in [250u64, 1_000, 5_000] {
        let client = test_client(FakeNodeServer::new().with_search_results(count));
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("drain", count), &client, |b, client| {
            b.iter(|| {
                let hits = client
                    .search(SearchQuery::new())
                    .map(|iter| iter.filter_map(Result::ok).count())
                    .unwrap_or(0);
                black_box(hits);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_search_drain);
criterion_main!(benches);
