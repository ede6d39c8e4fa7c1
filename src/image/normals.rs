use image::{Rgb, RgbImage};
use nalgebra::Vector3;
use ndarray::{Array2, Zip};

use crate::camera::CameraIntrinsics;
use crate::image::DepthFrame;

/// Estimates the surface normal at pixel `(i, j)` by finite differences.
///
/// Uses the right `(i - 1, j)` and top `(i, j + 1)` neighbours and returns
/// `normalize(cross(top - p, right - p))`.
///
/// # Returns
///
/// * The unit normal or the zero vector if any of the three points is missing.
pub fn estimate_normal_at_index(
    frame: &DepthFrame,
    intrinsics: &CameraIntrinsics,
    i: usize,
    j: usize,
) -> Vector3<f32> {
    if i == 0 || j + 1 >= frame.height() || i >= frame.width() {
        return Vector3::zeros();
    }

    let position = intrinsics.deproject_index(frame, i, j);
    let right = intrinsics.deproject_index(frame, i - 1, j);
    let top = intrinsics.deproject_index(frame, i, j + 1);
    if position[2] == 0.0 || right[2] == 0.0 || top[2] == 0.0 {
        return Vector3::zeros();
    }

    let normal = (top - position).cross(&(right - position));
    let norm = normal.norm();
    if norm > 0.0 && norm.is_finite() {
        normal / norm
    } else {
        Vector3::zeros()
    }
}

/// Per-pixel normals of a depth frame, zero where undefined.
#[derive(Clone, Debug)]
pub struct NormalMap {
    pub normals: Array2<Vector3<f32>>,
}

impl NormalMap {
    /// Computes the normals of every pixel in parallel.
    pub fn compute(frame: &DepthFrame, intrinsics: &CameraIntrinsics) -> Self {
        let mut normals = Array2::from_elem((frame.height(), frame.width()), Vector3::zeros());
        Zip::indexed(&mut normals).par_for_each(|(j, i), normal| {
            *normal = estimate_normal_at_index(frame, intrinsics, i, j);
        });
        Self { normals }
    }

    pub fn width(&self) -> usize {
        self.normals.ncols()
    }

    pub fn height(&self) -> usize {
        self.normals.nrows()
    }

    pub fn get(&self, i: usize, j: usize) -> Vector3<f32> {
        self.normals[[j, i]]
    }

    /// Number of pixels with a defined normal.
    pub fn defined_count(&self) -> usize {
        self.normals.iter().filter(|n| n[2] != 0.0 || n[0] != 0.0 || n[1] != 0.0).count()
    }

    /// Debug view, each channel is the absolute value of a normal component.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let normal = self.get(x as usize, y as usize);
            let channel = |v: f32| (v.abs().min(1.0) * 255.0).round() as u8;
            Rgb([channel(normal[0]), channel(normal[1]), channel(normal[2])])
        })
    }
}
