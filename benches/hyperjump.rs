//! §8.3.3: benchmarks the R-pentomino's long-run "hyperjump" behaviour —
//! the scenario HashLife is built for, where a tiny pattern is stepped an
//! astronomically large number of generations by repeated quadtree reuse
//! rather than cell-by-cell simulation.

use criterion::{criterion_group, criterion_main, Criterion};
use hashlife::{BigInt, Engine, EngineConfig};

const R_PENTOMINO: [(i64, i64); 5] = [(0, -1), (1, -1), (-1, 0), (0, 0), (0, 1)];

fn build_r_pentomino() -> Engine {
    let mut engine = Engine::new_engine("B3/S23", EngineConfig::default()).expect("valid rule");
    for &(x, y) in &R_PENTOMINO {
        engine.set_cell(x, y, true);
    }
    engine
}

fn bench_small_jump(c: &mut Criterion) {
    c.bench_function("r_pentomino_step_1024", |b| {
        b.iter(|| {
            let mut engine = build_r_pentomino();
            engine.set_increment(&BigInt::from_u64(1024)).unwrap();
            engine.step();
            std::hint::black_box(engine.get_population());
        })
    });
}

fn bench_hyperjump(c: &mut Criterion) {
    c.bench_function("r_pentomino_hyperjump_2_30", |b| {
        b.iter(|| {
            let mut engine = build_r_pentomino();
            let increment = BigInt::from_u64(1).shl(30);
            engine.set_increment(&increment).unwrap();
            engine.step();
            std::hint::black_box(engine.get_population());
        })
    });
}

criterion_group!(benches, bench_small_jump, bench_hyperjump);
criterion_main!(benches);
