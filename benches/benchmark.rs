use camera_movement_detection::flow::{FlowParams, dense_flow};
use camera_movement_detection::homography::find_homography;
use camera_movement_detection::imgproc::GrayF32;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::Vec2;

fn bench_find_homography(c: &mut Criterion) {
    let mut src = Vec::new();
    for y in 0..12 {
        for x in 0..12 {
            src.push(Vec2::new(10.0 + 25.0 * x as f32, 8.0 + 20.0 * y as f32));
        }
    }
    let dst: Vec<Vec2> = src
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if i % 5 == 0 {
                *p + Vec2::new(70.0 + i as f32, -50.0)
            } else {
                *p + Vec2::new(14.0, -6.0)
            }
        })
        .collect();

    c.bench_function("find_homography_ransac", |b| {
        b.iter(|| find_homography(black_box(&src), black_box(&dst)))
    });
}

fn bench_dense_flow(c: &mut Criterion) {
    let mut img1 = GrayF32::new(160, 120);
    for y in 0..120 {
        for x in 0..160 {
            let v = 128.0 + 60.0 * (x as f32 / 15.0).sin() * (y as f32 / 21.0).cos();
            img1.set(x, y, v);
        }
    }
    let mut img2 = GrayF32::new(160, 120);
    for y in 0..120 {
        for x in 0..160 {
            let v = 128.0 + 60.0 * ((x as f32 - 3.0) / 15.0).sin() * (y as f32 / 21.0).cos();
            img2.set(x, y, v);
        }
    }
    let params = FlowParams::default();

    c.bench_function("dense_flow_160x120", |b| {
        b.iter(|| dense_flow(black_box(&img1), black_box(&img2), &params))
    });
}

criterion_group!(benches, bench_find_homography, bench_dense_flow);
criterion_main!(benches);
