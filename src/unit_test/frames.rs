use nalgebra::Vector3;
use rstest::*;

use crate::camera::CameraIntrinsics;
use crate::image::DepthFrame;
use crate::synthetic::{orbit_pose, SyntheticScene};
use crate::transform::Transform;

#[fixture]
pub fn sphere_frame() -> DepthFrame {
    SyntheticScene::sphere().render_depth(&CameraIntrinsics::default(), 64, 64, &Transform::eye())
}

/// Two views of the tabletop scene and the motion between them.
pub struct FramePair {
    pub intrinsics: CameraIntrinsics,
    /// Seen from the second pose.
    pub source: DepthFrame,
    /// Seen from the identity pose.
    pub dest: DepthFrame,
    /// Takes source camera points into the destination camera.
    pub movement: Transform,
}

#[fixture]
pub fn tabletop_pair() -> FramePair {
    let intrinsics = CameraIntrinsics::default();
    let scene = SyntheticScene::tabletop();
    let pose = orbit_pose(&Vector3::new(0.0, 0.0, 0.5), 3.0);

    FramePair {
        source: scene.render_depth(&intrinsics, 128, 128, &pose),
        dest: scene.render_depth(&intrinsics, 128, 128, &Transform::eye()),
        movement: Transform::relative(&pose, &Transform::eye()),
        intrinsics,
    }
}
