use coexpress::{agglomerate, KMeans, Matrix};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Sinusoidal profiles with a per-gene phase, so the data has a few loose
/// groups without pulling in a random source.
fn expression_profiles(n_genes: usize, n_points: usize) -> Matrix {
    Matrix::from_shape_fn((n_genes, n_points), |(gene, t)| {
        let phase = (gene % 4) as f64 * std::f64::consts::FRAC_PI_2;
        let jitter = ((gene * 7919 + t * 104729) % 1000) as f64 / 5000.0;
        (t as f64 * 0.4 + phase).sin() + jitter
    })
}

fn bench_kmeans(c: &mut Criterion) {
    let x = expression_profiles(500, 16);
    c.bench_function("kmeans_500x16_k8", |b| {
        b.iter(|| {
            let mut model = KMeans::new(8).random_state(42);
            black_box(model.fit(black_box(&x)).unwrap());
        })
    });
}

fn bench_agglomerate(c: &mut Criterion) {
    let x = expression_profiles(200, 16);
    c.bench_function("agglomerate_200x16", |b| {
        b.iter(|| black_box(agglomerate(black_box(&x)).unwrap()))
    });
}

criterion_group!(benches, bench_kmeans, bench_agglomerate);
criterion_main!(benches);
