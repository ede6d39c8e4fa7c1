use nalgebra::{Vector2, Vector3};
use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::image::DepthFrame;

/// Camera intrinsic parameters in normalized projection-plane units.
///
/// Image coordinates live in `[-0.5, 0.5)²`, so the focal length and
/// principal offset do not depend on the sensor resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in the X-axis, relative to the image width.
    pub fx: f32,
    /// Focal length in the Y-axis, relative to the image height.
    pub fy: f32,
    /// Principal point offset in the X-axis.
    pub ox: f32,
    /// Principal point offset in the Y-axis.
    pub oy: f32,
    /// Multiplier converting raw depth units into meters.
    pub depth_scale: f32,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::new(1.0, 1.0, 0.0, 0.0, 1.0)
    }
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, ox: f32, oy: f32, depth_scale: f32) -> Self {
        Self {
            fx,
            fy,
            ox,
            oy,
            depth_scale,
        }
    }

    /// Creates normalized intrinsics from the usual pixel-unit parameters.
    ///
    /// # Arguments
    ///
    /// * `fx`, `fy` - Focal lengths in pixels.
    /// * `cx`, `cy` - Principal point in pixels.
    /// * `width`, `height` - Image size in pixels.
    /// * `depth_scale` - Raw depth to meters factor.
    pub fn from_pixel_intrinsics(
        fx: f32,
        fy: f32,
        cx: f32,
        cy: f32,
        width: usize,
        height: usize,
        depth_scale: f32,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_parameter("Image size must be non-zero"));
        }
        let (w, h) = (width as f32, height as f32);
        let intrinsics = Self::new(fx / w, fy / h, cx / w - 0.5, cy / h - 0.5, depth_scale);
        intrinsics.validate()?;
        Ok(intrinsics)
    }

    /// Checks the intrinsics can be used for projection.
    pub fn validate(&self) -> Result<()> {
        if self.fx == 0.0 || self.fy == 0.0 || !self.fx.is_finite() || !self.fy.is_finite() {
            return Err(Error::invalid_input_frame(format!(
                "Degenerate focal length ({}, {})",
                self.fx, self.fy
            )));
        }
        if !(self.depth_scale.is_finite() && self.depth_scale > 0.0) {
            return Err(Error::invalid_input_frame(format!(
                "Depth scale must be positive, got {}",
                self.depth_scale
            )));
        }
        Ok(())
    }

    /// Project a 3D camera-space point into normalized image coordinates.
    /// Callers must guard against `point.z == 0`.
    ///
    /// # Arguments
    ///
    /// * point: The 3D point.
    ///
    /// # Returns
    ///
    /// * The projection-plane coordinate.
    pub fn project(&self, point: &Vector3<f32>) -> Vector2<f32> {
        Vector2::new(
            point[0] / point[2] * self.fx + self.ox,
            point[1] / point[2] * self.fy + self.oy,
        )
    }

    /// Lifts a normalized coordinate with a metric depth into camera space.
    pub fn backproject(&self, coord: &Vector2<f32>, depth: f32) -> Vector3<f32> {
        Vector3::new(
            (coord[0] - self.ox) / self.fx * depth,
            (coord[1] - self.oy) / self.fy * depth,
            depth,
        )
    }

    /// Samples the frame at `coord` (nearest pixel) and lifts it into camera space.
    ///
    /// # Returns
    ///
    /// * The 3D point, or the zero vector when the coordinate falls outside the
    ///   frame or the depth is invalid.
    pub fn deproject(&self, frame: &DepthFrame, coord: &Vector2<f32>) -> Vector3<f32> {
        match index_from_coord(coord, frame.width(), frame.height()) {
            Some((i, j)) => self.deproject_index(frame, i, j),
            None => Vector3::zeros(),
        }
    }

    /// Same as `deproject`, for an exact pixel index.
    pub fn deproject_index(&self, frame: &DepthFrame, i: usize, j: usize) -> Vector3<f32> {
        let depth = frame.get(i, j) * self.depth_scale;
        if depth > 0.0 && depth.is_finite() {
            let coord = coord_from_index(i, j, frame.width(), frame.height());
            self.backproject(&coord, depth)
        } else {
            Vector3::zeros()
        }
    }

    /// Unit-length viewing ray through a normalized coordinate.
    pub fn ray_direction(&self, coord: &Vector2<f32>) -> Vector3<f32> {
        self.backproject(coord, 1.0).normalize()
    }
}

/// Converts a pixel index into its normalized coordinate. The x axis is
/// mirrored, the y axis is not.
pub fn coord_from_index(i: usize, j: usize, width: usize, height: usize) -> Vector2<f32> {
    Vector2::new(
        -((i as f32 + 0.5) / width as f32 - 0.5),
        (j as f32 + 0.5) / height as f32 - 0.5,
    )
}

/// Inverse of `coord_from_index`, rounding to the nearest pixel.
///
/// # Returns
///
/// * `None` if the coordinate maps outside the image or is not finite.
pub fn index_from_coord(coord: &Vector2<f32>, width: usize, height: usize) -> Option<(usize, usize)> {
    let i = ((-coord[0] + 0.5) * width as f32 - 0.5).round();
    let j = ((coord[1] + 0.5) * height as f32 - 0.5).round();

    if !(i.is_finite() && j.is_finite()) {
        return None;
    }
    if i < 0.0 || j < 0.0 || i >= width as f32 || j >= height as f32 {
        return None;
    }
    Some((i as usize, j as usize))
}
