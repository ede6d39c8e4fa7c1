use nalgebra::Vector3;
use tsdf3d::camera::CameraIntrinsics;
use tsdf3d::render::{RenderParams, SurfaceRenderer};
use tsdf3d::synthetic::{orbit_pose, SyntheticScene};
use tsdf3d::transform::Transform;
use tsdf3d::tsdf::{TsdfFusion, TsdfParams};

use criterion::{criterion_group, criterion_main, Criterion};
use pprof::criterion::{Output, PProfProfiler};

fn fusion_benchmark(c: &mut Criterion) {
    const NUM_FRAMES: usize = 4;
    let intrinsics = CameraIntrinsics::default();
    let scene = SyntheticScene::tabletop();
    let center = Vector3::new(0.0, 0.0, 0.5);

    let frames: Vec<_> = (0..NUM_FRAMES)
        .map(|k| {
            let pose = orbit_pose(&center, k as f32);
            let frame = scene.render_depth(&intrinsics, 640, 480, &pose);
            (frame, pose.inverse())
        })
        .collect();

    let mut fusion = TsdfFusion::new(TsdfParams::default()).unwrap();
    c.bench_function("tsdf integrate", |b| {
        b.iter(|| {
            for (frame, world_to_camera) in frames.iter() {
                fusion.integrate(frame, &intrinsics, world_to_camera);
            }
        });
    });

    let renderer = SurfaceRenderer::new(RenderParams::default(), intrinsics.clone(), 640, 480);
    c.bench_function("tsdf render", |b| {
        b.iter(|| renderer.render(fusion.current(), &Transform::eye()));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
    targets = fusion_benchmark
}

criterion_main!(benches);
