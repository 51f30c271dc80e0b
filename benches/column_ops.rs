use corpus_fabric::column::{Encoding, IntColumn, StrColumn};
use corpus_fabric::width::select;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Keyed values with runs of equal values and occasional gaps, like a
/// typical node feature.
fn feature_values(n: u32, seed: u64) -> Vec<(u32, i64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut value = 0i64;
    (1..=n)
        .filter(|_| rng.gen_bool(0.9))
        .map(|k| {
            if rng.gen_bool(0.2) {
                value = rng.gen_range(-50..5000);
            }
            (k, value)
        })
        .collect()
}

fn bench_width_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("width_select");

    group.bench_function("select_small", |bencher| {
        bencher.iter(|| select(black_box(0), black_box(200)))
    });

    group.bench_function("select_signed_wide", |bencher| {
        bencher.iter(|| select(black_box(-1), black_box(u32::MAX as i128 + 1)))
    });

    group.finish();
}

fn bench_int_columns(c: &mut Criterion) {
    let sizes = [1_000u32, 10_000, 100_000];

    let mut group = c.benchmark_group("int_column");
    for size in sizes {
        let items = feature_values(size, 7);

        for (label, encoding) in [("dense", Encoding::Dense), ("sparse", Encoding::Sparse)] {
            group.bench_with_input(
                BenchmarkId::new(format!("build_{label}"), size),
                &items,
                |bencher, items| {
                    bencher.iter(|| IntColumn::build(black_box(items.iter().copied()), encoding))
                },
            );

            let Ok(column) = IntColumn::build(items.iter().copied(), encoding) else {
                continue;
            };
            group.bench_with_input(
                BenchmarkId::new(format!("get_all_{label}"), size),
                &column,
                |bencher, column| {
                    bencher.iter(|| {
                        let mut acc = 0i64;
                        for k in 1..=size {
                            acc = acc.wrapping_add(column.get(black_box(k)).unwrap_or(0));
                        }
                        black_box(acc)
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_str_columns(c: &mut Criterion) {
    let size = 50_000u32;
    let items: Vec<(u32, String)> = feature_values(size, 11)
        .into_iter()
        .map(|(k, v)| (k, format!("lex{}", v % 300)))
        .collect();

    let mut group = c.benchmark_group("str_column");

    for (label, encoding) in [("dense", Encoding::Dense), ("sparse", Encoding::Sparse)] {
        group.bench_function(format!("build_{label}"), |bencher| {
            bencher.iter(|| {
                let pairs = items.iter().map(|(k, v)| (*k, v.as_str()));
                StrColumn::build(black_box(pairs), encoding)
            })
        });

        let pairs = items.iter().map(|(k, v)| (*k, v.as_str()));
        let Ok(column) = StrColumn::build(pairs, encoding) else {
            continue;
        };
        group.bench_function(format!("freq_list_{label}"), |bencher| {
            bencher.iter(|| black_box(&column).freq_list())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_width_select, bench_int_columns, bench_str_columns);
criterion_main!(benches);
