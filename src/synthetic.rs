use nalgebra::Vector3;
use ndarray::{Array2, Zip};

use crate::camera::{coord_from_index, CameraIntrinsics};
use crate::image::DepthFrame;
use crate::transform::Transform;

const MAX_STEPS: usize = 256;
const HIT_EPSILON: f32 = 1e-6;
const MAX_DISTANCE: f32 = 10.0;

/// Analytic shape with an exact (or lower bound) signed distance.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Sphere {
        center: Vector3<f32>,
        radius: f32,
    },
    /// Axis aligned box.
    Box {
        center: Vector3<f32>,
        half_size: Vector3<f32>,
    },
    /// Infinite plane, positive on the side `normal` points to.
    Plane {
        point: Vector3<f32>,
        normal: Vector3<f32>,
    },
}

impl Shape {
    pub fn signed_distance(&self, position: &Vector3<f32>) -> f32 {
        match self {
            Shape::Sphere { center, radius } => (position - center).norm() - radius,
            Shape::Box { center, half_size } => {
                let d = (position - center).abs() - half_size;
                d.max().min(0.0) + d.map(|v| v.max(0.0)).norm()
            }
            Shape::Plane { point, normal } => (position - point).dot(normal),
        }
    }
}

/// Union of shapes, rendered into depth frames for tests, benchmarks and demos.
#[derive(Clone, Debug, Default)]
pub struct SyntheticScene {
    pub shapes: Vec<Shape>,
}

impl SyntheticScene {
    pub fn new(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    /// Sphere of radius 0.1 at (0, 0, 0.5).
    pub fn sphere() -> Self {
        Self::new(vec![Shape::Sphere {
            center: Vector3::new(0.0, 0.0, 0.5),
            radius: 0.1,
        }])
    }

    /// Off-axis sphere, a box and a back wall. Constrains every degree of
    /// freedom of the camera motion.
    pub fn tabletop() -> Self {
        Self::new(vec![
            Shape::Sphere {
                center: Vector3::new(0.05, 0.02, 0.5),
                radius: 0.1,
            },
            Shape::Box {
                center: Vector3::new(-0.12, 0.08, 0.55),
                half_size: Vector3::new(0.04, 0.04, 0.04),
            },
            Shape::Plane {
                point: Vector3::new(0.0, 0.0, 0.9),
                normal: Vector3::new(0.0, 0.0, -1.0),
            },
        ])
    }

    pub fn signed_distance(&self, position: &Vector3<f32>) -> f32 {
        self.shapes
            .iter()
            .map(|shape| shape.signed_distance(position))
            .fold(f32::INFINITY, f32::min)
    }

    /// Sphere traces a ray.
    ///
    /// # Returns
    ///
    /// * The hit position, `None` when nothing is hit.
    pub fn raymarch(&self, origin: &Vector3<f32>, direction: &Vector3<f32>) -> Option<Vector3<f32>> {
        let mut travelled = 0.0;
        for _ in 0..MAX_STEPS {
            let position = origin + direction * travelled;
            let distance = self.signed_distance(&position);
            if distance < HIT_EPSILON {
                return Some(position);
            }
            travelled += distance;
            if travelled > MAX_DISTANCE {
                break;
            }
        }
        None
    }

    /// Renders the depth frame seen by a camera.
    ///
    /// # Arguments
    ///
    /// * `intrinsics` - Camera model, depths are divided by its scale.
    /// * `width`, `height` - Frame size.
    /// * `camera_to_world` - Camera pose.
    pub fn render_depth(
        &self,
        intrinsics: &CameraIntrinsics,
        width: usize,
        height: usize,
        camera_to_world: &Transform,
    ) -> DepthFrame {
        let origin = camera_to_world.translation();
        let world_to_camera = camera_to_world.inverse();
        let mut depth = Array2::<f32>::zeros((height, width));

        Zip::indexed(&mut depth).par_for_each(|(j, i), value| {
            let coord = coord_from_index(i, j, width, height);
            let direction = camera_to_world.rotate_vector(&intrinsics.ray_direction(&coord));
            if let Some(hit) = self.raymarch(&origin, &direction) {
                let z = (&world_to_camera * &hit)[2];
                if z > 0.0 {
                    *value = z / intrinsics.depth_scale;
                }
            }
        });

        DepthFrame::from_array(depth)
    }
}

/// Camera pose rotated by `yaw_degrees` around the vertical axis through `center`,
/// starting from the identity pose.
pub fn orbit_pose(center: &Vector3<f32>, yaw_degrees: f32) -> Transform {
    &(&Transform::from_translation(center)
        * &Transform::from_euler_angles(0.0, yaw_degrees.to_radians(), 0.0))
        * &Transform::from_translation(&-center)
}
