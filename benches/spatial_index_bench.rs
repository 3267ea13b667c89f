//! Spatial index benchmarks.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hilbert_spatial_index::{Coordinate, HilbertCodec, IndexedCollection, IndexedItem, LinearProjection, WgsGeodesy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

#[derive(Clone, Copy)]
struct Point {
    hid: u64,
    x: u64,
    y: u64,
}

impl IndexedItem for Point {
    fn hid(&self) -> u64 {
        self.hid
    }
    fn x(&self) -> u64 {
        self.x
    }
    fn y(&self) -> u64 {
        self.y
    }
}

const ORDER: u32 = 20;

fn random_points(count: usize) -> Vec<Point> {
    let codec = HilbertCodec::new(ORDER, Box::new(LinearProjection)).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let mut points: Vec<Point> = (0..count)
        .map(|_| {
            let lon = rng.gen_range(-180.0..180.0);
            let lat = rng.gen_range(-85.0..85.0);
            let p = codec.project(Coordinate::new(lon, lat));
            Point {
                hid: codec.encode_point(p.x, p.y),
                x: p.x,
                y: p.y,
            }
        })
        .collect();
    points.sort_by_key(|p| p.hid);
    points
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("IndexedCollection build");

    for size in [1_000, 10_000, 100_000].iter() {
        let points = random_points(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter_with_setup(
                || points.clone(),
                |points| {
                    let codec = HilbertCodec::new(ORDER, Box::new(LinearProjection)).unwrap();
                    let collection =
                        IndexedCollection::build(points, codec, Box::new(WgsGeodesy)).unwrap();
                    black_box(collection.len())
                },
            );
        });
    }

    group.finish();
}

fn bench_within(c: &mut Criterion) {
    let mut group = c.benchmark_group("IndexedCollection within");

    let points = random_points(1_000_000);
    let codec = HilbertCodec::new(ORDER, Box::new(LinearProjection)).unwrap();
    let collection = IndexedCollection::build(points, codec, Box::new(WgsGeodesy)).unwrap();

    for radius_meters in [1_000.0, 50_000.0, 500_000.0].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(radius_meters),
            radius_meters,
            |b, &radius| {
                b.iter(|| {
                    let query = Coordinate::new(18.0, 59.0);
                    black_box(collection.within(query, radius).unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("IndexedCollection nearest");

    let points = random_points(1_000_000);
    let codec = HilbertCodec::new(ORDER, Box::new(LinearProjection)).unwrap();
    let collection = IndexedCollection::build(points, codec, Box::new(WgsGeodesy)).unwrap();

    group.bench_function("nearest_1m_points", |b| {
        b.iter(|| {
            let query = Coordinate::new(18.0, 59.0);
            black_box(collection.nearest(query).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_build, bench_within, bench_nearest);
criterion_main!(benches);
