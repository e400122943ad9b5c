use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use prefetchlib::config::{ByteSize, CacheConfig, PrefetcherConfig, ReplacementPolicyConfig};
use prefetchlib::simulator::Simulator;
use prefetchlib::util::{random_trace, strided_trace};

/// Every policy and prefetcher pairing over a streaming and a random trace
pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Policies");

    // For the purposes of this we aren't interested in parsing, the traces are built up front
    let traces = [
        ("strided", strided_trace(0x1000, 64, 200_000, 4)),
        ("random", random_trace(1, 1 << 20, 200_000)),
    ];
    let policies = [
        ReplacementPolicyConfig::LeastRecentlyUsed,
        ReplacementPolicyConfig::LruPreferClean,
        ReplacementPolicyConfig::Random,
    ];
    let prefetchers = [
        PrefetcherConfig::Null,
        PrefetcherConfig::Sequential,
        PrefetcherConfig::Adjacent,
        PrefetcherConfig::Custom,
    ];

    for (trace_name, trace) in &traces {
        for policy in policies {
            for prefetcher in prefetchers {
                let config = CacheConfig {
                    cache_size: ByteSize(32 * 1024),
                    line_size: ByteSize(64),
                    associativity: 8,
                    replacement_policy: policy,
                    prefetcher,
                    prefetch_amount: Some(4),
                    seed: Some(0),
                };
                let id = format!("{trace_name}/{policy:?}/{prefetcher:?}");
                group.bench_with_input(BenchmarkId::new("Trace", id), &config, |bench, conf| {
                    bench.iter(|| {
                        Simulator::new(conf).unwrap().run(trace.iter().copied());
                    });
                });
            }
        }
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = criterion_benchmark
);
criterion_main!(benches);
