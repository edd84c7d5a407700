use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;

use rand::{Rng, SeedableRng};

use maxtree::prelude::*;

fn construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    group
        .significance_level(0.05)
        .measurement_time(std::time::Duration::new(10, 0));

    for &(width, height) in [(64, 64), (256, 256)].iter() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let pixels = (0..width * height).map(|_| rng.gen::<u8>()).collect();
        let image = Image::from_vec(width, height, 1, pixels);

        let bench_name = format!("random-{}x{}", width, height);
        group.bench_function(&bench_name, |b| {
            b.iter_with_large_drop(|| ComponentTree::new(image.clone()).build())
        });
    }

    group.finish();
}

criterion_group!(benches, construction);
criterion_main!(benches);
