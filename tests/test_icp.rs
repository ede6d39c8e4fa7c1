use nalgebra::Vector3;
use rstest::*;

use tsdf3d::{
    camera::CameraIntrinsics,
    error::Error,
    icp::{DepthIcp, IcpParams, IcpStatus},
    image::{DepthFrame, NormalMap},
    synthetic::{orbit_pose, SyntheticScene},
    transform::Transform,
};

const SIZE: usize = 128;

#[fixture]
fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::default()
}

#[fixture]
fn sphere_frame(intrinsics: CameraIntrinsics) -> DepthFrame {
    SyntheticScene::sphere().render_depth(&intrinsics, SIZE, SIZE, &Transform::eye())
}

#[rstest]
#[case::parallel(true, true)]
#[case::sequential(false, true)]
#[case::estimated_normals(true, false)]
fn test_identical_frames_give_identity(
    intrinsics: CameraIntrinsics,
    sphere_frame: DepthFrame,
    #[case] parallel: bool,
    #[case] precomputed: bool,
) {
    let mut params = IcpParams::default();
    params.parallel(parallel).use_precomputed_normals(precomputed);

    let icp = DepthIcp::new(params, intrinsics, &sphere_frame).unwrap();
    let result = icp.align(&sphere_frame, &Transform::eye()).unwrap();

    assert_eq!(result.diagnostics.status, IcpStatus::Converged);
    assert_eq!(result.movement, Transform::eye());
    assert!(result.diagnostics.points_used > 1000);
}

#[rstest]
fn test_known_motion(intrinsics: CameraIntrinsics) {
    let scene = SyntheticScene::tabletop();
    let center = Vector3::new(0.0, 0.0, 0.5);
    let pose0 = Transform::eye();
    let pose1 = orbit_pose(&center, 3.0);

    let dest = scene.render_depth(&intrinsics, SIZE, SIZE, &pose0);
    let source = scene.render_depth(&intrinsics, SIZE, SIZE, &pose1);

    let icp = DepthIcp::new(IcpParams::default(), intrinsics, &dest).unwrap();
    let result = icp.align(&source, &Transform::eye()).unwrap();

    let expected = Transform::relative(&pose1, &pose0);
    assert!(
        result.movement.max_abs_difference(&expected) < 1e-3,
        "estimated {:?}, expected {:?}",
        result.movement,
        expected
    );
    assert!(result.diagnostics.steps > 1);
    assert!(result.diagnostics.inlier_ratio() > 0.5);
}

#[rstest]
fn test_known_rotation(intrinsics: CameraIntrinsics) {
    const YAW_SIZE: usize = 2 * SIZE;
    let scene = SyntheticScene::tabletop();
    let pose0 = Transform::eye();
    let pose1 = Transform::from_euler_angles(0.0, 3f32.to_radians(), 0.0);

    let dest = scene.render_depth(&intrinsics, YAW_SIZE, YAW_SIZE, &pose0);
    let source = scene.render_depth(&intrinsics, YAW_SIZE, YAW_SIZE, &pose1);

    // The whole image shifts, so let it refine past the default plateau.
    let mut params = IcpParams::default();
    params.max_steps(50);
    params.error_diff_threshold = 1e-8;
    let icp = DepthIcp::new(params, intrinsics, &dest).unwrap();
    let result = icp.align(&source, &Transform::eye()).unwrap();

    let expected = Transform::relative(&pose1, &pose0);
    assert!(expected.translation().norm() < 1e-6);
    assert!(
        result.movement.max_abs_difference(&expected) < 1e-3,
        "estimated {:?}, expected {:?}",
        result.movement,
        expected
    );
}

#[rstest]
fn test_large_motion_is_outside_the_basin(intrinsics: CameraIntrinsics) {
    let scene = SyntheticScene::tabletop();
    let pose1 = orbit_pose(&Vector3::new(0.0, 0.0, 0.5), 30.0);

    let dest = scene.render_depth(&intrinsics, SIZE, SIZE, &Transform::eye());
    let source = scene.render_depth(&intrinsics, SIZE, SIZE, &pose1);

    let icp = DepthIcp::new(IcpParams::default(), intrinsics, &dest).unwrap();
    let result = icp.align(&source, &Transform::eye()).unwrap();

    // The error plateaus on a wrong pose; only the inlier ratio tells it apart.
    let expected = Transform::relative(&pose1, &Transform::eye());
    assert_eq!(result.diagnostics.status, IcpStatus::Converged);
    assert!(result.movement.max_abs_difference(&expected) > 0.1);
    assert!(result.diagnostics.inlier_ratio() < 0.5);
}

#[rstest]
fn test_parallel_and_sequential_systems_agree(intrinsics: CameraIntrinsics) {
    let scene = SyntheticScene::tabletop();
    let dest = scene.render_depth(&intrinsics, SIZE, SIZE, &Transform::eye());
    let source = scene.render_depth(
        &intrinsics,
        SIZE,
        SIZE,
        &orbit_pose(&Vector3::new(0.0, 0.0, 0.5), 1.0),
    );
    let source_normals = NormalMap::compute(&source, &intrinsics);

    let mut params = IcpParams::default();
    let parallel = DepthIcp::new(params.clone(), intrinsics.clone(), &dest)
        .unwrap()
        .build_system(&source, &source_normals, &Transform::eye());
    params.parallel(false);
    let sequential = DepthIcp::new(params, intrinsics, &dest)
        .unwrap()
        .build_system(&source, &source_normals, &Transform::eye());

    assert_eq!(parallel.points_found, sequential.points_found);
    assert_eq!(parallel.points_used, sequential.points_used);
    assert!(parallel.is_symmetric(0.0));
    assert!(sequential.is_symmetric(0.0));
    assert!((parallel.a - sequential.a).abs().max() < 1e-6);
    assert!((parallel.b - sequential.b).abs().max() < 1e-6);
    assert!((parallel.error - sequential.error).abs() < 1e-9);
}

#[rstest]
fn test_precomputed_and_estimated_normals_agree(intrinsics: CameraIntrinsics) {
    let scene = SyntheticScene::tabletop();
    let dest = scene.render_depth(&intrinsics, SIZE, SIZE, &Transform::eye());
    let source = scene.render_depth(
        &intrinsics,
        SIZE,
        SIZE,
        &orbit_pose(&Vector3::new(0.0, 0.0, 0.5), 2.0),
    );
    let source_normals = NormalMap::compute(&source, &intrinsics);

    let mut params = IcpParams::default();
    params.parallel(false);
    let precomputed = DepthIcp::new(params.clone(), intrinsics.clone(), &dest)
        .unwrap()
        .build_system(&source, &source_normals, &Transform::eye());
    params.use_precomputed_normals(false);
    let estimated = DepthIcp::new(params, intrinsics, &dest)
        .unwrap()
        .build_system(&source, &source_normals, &Transform::eye());

    assert_eq!(precomputed, estimated);
}

#[rstest]
fn test_empty_frame_has_no_correspondences(
    intrinsics: CameraIntrinsics,
    sphere_frame: DepthFrame,
) {
    let icp = DepthIcp::new(IcpParams::default(), intrinsics, &sphere_frame).unwrap();
    let result = icp.align(&DepthFrame::new(SIZE, SIZE), &Transform::eye());

    assert!(matches!(
        result,
        Err(Error::NoCorrespondences { points_found: 0 })
    ));
}

#[rstest]
fn test_single_plane_is_degenerate(intrinsics: CameraIntrinsics) {
    let dest = DepthFrame::from_vec(SIZE, SIZE, vec![0.5; SIZE * SIZE]).unwrap();
    let source = DepthFrame::from_vec(SIZE, SIZE, vec![0.51; SIZE * SIZE]).unwrap();

    let icp = DepthIcp::new(IcpParams::default(), intrinsics, &dest).unwrap();
    let result = icp.align(&source, &Transform::eye());

    assert!(matches!(result, Err(Error::DegenerateSystem(_))));
}

#[rstest]
fn test_time_budget(intrinsics: CameraIntrinsics) {
    let scene = SyntheticScene::tabletop();
    let dest = scene.render_depth(&intrinsics, SIZE, SIZE, &Transform::eye());
    let source = scene.render_depth(
        &intrinsics,
        SIZE,
        SIZE,
        &orbit_pose(&Vector3::new(0.0, 0.0, 0.5), 2.0),
    );

    let mut params = IcpParams::default();
    params.max_duration_ms(Some(0));
    let icp = DepthIcp::new(params, intrinsics, &dest).unwrap();
    let result = icp.align(&source, &Transform::eye()).unwrap();

    assert_eq!(result.diagnostics.status, IcpStatus::TimeBudgetExceeded);
}
