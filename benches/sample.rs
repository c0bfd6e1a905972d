use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use gentrace::{
    regression::{block_schedule, observations, regression_with_outliers, RegressionSettings},
    GenerativeFunction, Selection,
};
use rand::{rngs::StdRng, SeedableRng};

fn data(n: usize) -> (Vec<f64>, Vec<f64>) {
    let xs: Vec<f64> = (0..n).map(|i| i as f64 / n as f64 * 10. - 5.).collect();
    let ys = xs.iter().map(|x| -x + 2.).collect();
    (xs, ys)
}

fn criterion_benchmark(c: &mut Criterion) {
    let model = regression_with_outliers(RegressionSettings::default());
    let schedule = block_schedule();

    for n in [10, 100] {
        let (xs, ys) = data(n);
        let constraints = observations(&ys).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let trace = model.generate(&mut rng, xs.clone(), &constraints).unwrap().trace;

        c.bench_function(&format!("generate {}", n), |b| {
            b.iter(|| {
                model
                    .generate(&mut rng, black_box(xs.clone()), &constraints)
                    .unwrap()
            })
        });

        c.bench_function(&format!("regenerate slope {}", n), |b| {
            let selection = Selection::from("slope");
            b.iter(|| {
                model
                    .regenerate(&mut rng, &trace, xs.clone(), black_box(&selection))
                    .unwrap()
            })
        });

        c.bench_function(&format!("sweep {}", n), |b| {
            b.iter_batched(
                || (StdRng::seed_from_u64(42), trace.clone()),
                |(mut rng, trace)| schedule.sweep(&mut rng, &model, trace).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
