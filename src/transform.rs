use nalgebra::{Isometry3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3, Vector6};
use ordered_float::OrderedFloat;

use std::ops;

/// Rigid transform (rotation + translation) between two 3D frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform(Isometry3<f32>);

impl Default for Transform {
    fn default() -> Self {
        Self::eye()
    }
}

impl Transform {
    /// Identity transform.
    pub fn eye() -> Self {
        Self(Isometry3::identity())
    }

    pub fn from_translation(translation: &Vector3<f32>) -> Self {
        Self(Isometry3::from_parts(
            Translation3::from(*translation),
            UnitQuaternion::identity(),
        ))
    }

    /// Rotation `Rz(yaw) * Ry(pitch) * Rx(roll)`, no translation.
    pub fn from_euler_angles(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self(Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        ))
    }

    /// Builds the incremental motion solved by one ICP step.
    ///
    /// # Arguments
    ///
    /// * `twist` - `[rx, ry, rz, tx, ty, tz]`: rotation angles about x, y and z
    ///   (applied in that order) followed by the translation.
    pub fn from_twist(twist: &Vector6<f64>) -> Self {
        let twist: Vector6<f32> = nalgebra::convert(*twist);
        let rotation = Rotation3::from_euler_angles(twist[0], twist[1], twist[2]);
        Self(Isometry3::from_parts(
            Translation3::new(twist[3], twist[4], twist[5]),
            UnitQuaternion::from_rotation_matrix(&rotation),
        ))
    }

    /// Motion of points from the `src` camera into the `dest` camera,
    /// given both camera-to-world poses: `inverse(dest) * src`.
    pub fn relative(src: &Transform, dest: &Transform) -> Self {
        &dest.inverse() * src
    }

    pub fn inverse(&self) -> Self {
        Self(self.0.inverse())
    }

    /// Applies rotation and translation to a point.
    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.0.rotation * point + self.0.translation.vector
    }

    /// Applies only the rotation, used for normals and directions.
    pub fn rotate_vector(&self, vector: &Vector3<f32>) -> Vector3<f32> {
        self.0.rotation * vector
    }

    pub fn translation(&self) -> Vector3<f32> {
        self.0.translation.vector
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f32 {
        self.0.rotation.angle()
    }

    /// Largest absolute difference between the 4x4 matrices of two transforms.
    pub fn max_abs_difference(&self, other: &Transform) -> f32 {
        let lhs: Matrix4<f32> = self.0.to_homogeneous();
        let rhs: Matrix4<f32> = other.0.to_homogeneous();
        lhs.iter()
            .zip(rhs.iter())
            .map(|(a, b)| OrderedFloat((a - b).abs()))
            .max()
            .map(|value| value.0)
            .unwrap_or(0.0)
    }
}

impl ops::Mul<&Vector3<f32>> for &Transform {
    type Output = Vector3<f32>;

    fn mul(self, rhs: &Vector3<f32>) -> Self::Output {
        self.transform_point(rhs)
    }
}

impl ops::Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Self::Output {
        Transform(self.0 * rhs.0)
    }
}
