use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stackwise::datasets::make_friedman1;
use stackwise::ensemble::{AveragingRegressor, OutOfFoldStacker, StackingConfig, StackingRegressor};
use stackwise::training::{
    DecisionTreeRegressor, GradientBoostingConfig, GradientBoostingRegressor, LinearRegression, Regressor,
    RidgeRegression,
};

fn members() -> Vec<Box<dyn Regressor>> {
    vec![
        Box::new(RidgeRegression::new(1.0)),
        Box::new(DecisionTreeRegressor::new().with_max_depth(5).with_random_state(0)),
        Box::new(GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 50,
            ..Default::default()
        })),
    ]
}

fn bench_stacking_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("stacking_fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [200, 1000].iter() {
        let (x, y) = make_friedman1(*n_rows, 8, 1.0, 42).unwrap();

        for parallel in [false, true] {
            let label = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(label, n_rows), &(&x, &y), |b, (x, y)| {
                b.iter(|| {
                    let config = StackingConfig {
                        parallel,
                        ..Default::default()
                    };
                    let mut stack =
                        StackingRegressor::new(members(), Box::new(LinearRegression::new())).with_config(config);
                    stack.fit(black_box(x), black_box(y)).unwrap()
                })
            });
        }
    }

    group.finish();
}

fn bench_out_of_fold_stacker(c: &mut Criterion) {
    let mut group = c.benchmark_group("out_of_fold_stacker");
    group.sample_size(10);

    let (x, y) = make_friedman1(500, 8, 1.0, 7).unwrap();
    let (t, _) = make_friedman1(200, 8, 1.0, 8).unwrap();
    let stacker = OutOfFoldStacker::new(5, Box::new(LinearRegression::new()), members());

    group.bench_function("fit_predict", |b| {
        b.iter(|| stacker.fit_predict(black_box(&x), black_box(&y), black_box(&t)).unwrap())
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train ensembles once
    let (x, y) = make_friedman1(1000, 8, 1.0, 1).unwrap();
    let mut averaging = AveragingRegressor::new(members());
    averaging.fit(&x, &y).unwrap();
    let mut stacking = StackingRegressor::new(members(), Box::new(LinearRegression::new()));
    stacking.fit(&x, &y).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let (test_x, _) = make_friedman1(*n_rows, 8, 1.0, 2).unwrap();

        group.bench_with_input(BenchmarkId::new("averaging", n_rows), &test_x, |b, x| {
            b.iter(|| averaging.predict(black_box(x)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("stacking", n_rows), &test_x, |b, x| {
            b.iter(|| stacking.predict(black_box(x)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_stacking_fit, bench_out_of_fold_stacker, bench_prediction);
criterion_main!(benches);
