use image::{Rgb, RgbImage};
use nalgebra::Vector3;
use ndarray::{Array2, Zip};
use serde_derive::{Deserialize, Serialize};

use crate::camera::{coord_from_index, CameraIntrinsics};
use crate::image::DepthFrame;
use crate::transform::Transform;
use crate::tsdf::TsdfVolume;

/// Raymarching and Phong shading parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    pub max_steps: usize,
    /// A ray hits the surface once the signed distance drops below this.
    pub epsilon: f32,
    /// Rays farther than this from the camera are misses.
    pub escape_radius: f32,
    pub light_position: [f32; 3],
    pub ambient_strength: f32,
    pub specular_strength: f32,
    pub shininess: f32,
    pub object_color: [f32; 3],
    pub background: [u8; 3],
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            max_steps: 512,
            epsilon: 1e-5,
            escape_radius: 10.0,
            light_position: [1.0, 0.8, -0.8],
            ambient_strength: 0.5,
            specular_strength: 0.2,
            shininess: 128.0,
            object_color: [0.5, 0.5, 0.5],
            background: [0, 0, 0],
        }
    }
}

/// Renders the zero level set of a TSDF volume.
pub struct SurfaceRenderer {
    pub params: RenderParams,
    intrinsics: CameraIntrinsics,
    width: usize,
    height: usize,
}

impl SurfaceRenderer {
    pub fn new(
        params: RenderParams,
        intrinsics: CameraIntrinsics,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            params,
            intrinsics,
            width,
            height,
        }
    }

    /// Signed distance of the model: the sampled TSDF clipped by the volume's
    /// bounding cube, so rays starting outside are pulled towards it.
    pub fn signed_distance(volume: &TsdfVolume, position: &Vector3<f32>) -> f32 {
        volume.box_distance(position).max(volume.sample(position))
    }

    /// Marches a ray until it hits the surface.
    ///
    /// # Arguments
    ///
    /// * `origin` - Ray start in world coordinates.
    /// * `direction` - Unit direction.
    ///
    /// # Returns
    ///
    /// * The hit position, or `None` if the ray escapes or runs out of steps.
    pub fn raymarch(
        &self,
        volume: &TsdfVolume,
        origin: &Vector3<f32>,
        direction: &Vector3<f32>,
    ) -> Option<Vector3<f32>> {
        let mut position = *origin;
        for _ in 0..self.params.max_steps {
            let distance = Self::signed_distance(volume, &position);
            if distance < self.params.epsilon {
                return Some(position);
            }
            if (position - origin).norm() > self.params.escape_radius {
                break;
            }
            position += direction * distance;
        }
        None
    }

    /// Surface normal from a 6-tap central difference, half a voxel apart.
    pub fn estimate_normal(volume: &TsdfVolume, position: &Vector3<f32>) -> Vector3<f32> {
        let unit = volume.grid_unit() * 0.5;
        let gradient = Vector3::from_fn(|axis, _| {
            let mut offset = Vector3::zeros();
            offset[axis] = unit;
            Self::signed_distance(volume, &(position + offset))
                - Self::signed_distance(volume, &(position - offset))
        });
        gradient.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
    }

    /// Phong color in `[0, 1]` of a surface point.
    ///
    /// # Arguments
    ///
    /// * `position` - Surface point.
    /// * `normal` - Unit surface normal.
    /// * `view_direction` - Unit ray direction, from the eye to the point.
    pub fn shade(
        &self,
        position: &Vector3<f32>,
        normal: &Vector3<f32>,
        view_direction: &Vector3<f32>,
    ) -> Vector3<f32> {
        let params = &self.params;
        let light_direction = (Vector3::from(params.light_position) - position)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros);
        let reflection = -light_direction + normal * (2.0 * normal.dot(&light_direction));

        let diffuse = normal.dot(&light_direction).max(0.0);
        let specular = params.specular_strength
            * (-view_direction)
                .dot(&reflection)
                .max(0.0)
                .powf(params.shininess);
        let intensity = params.ambient_strength + diffuse + specular;

        Vector3::from(params.object_color).map(|channel| (channel * intensity).clamp(0.0, 1.0))
    }

    /// World ray of pixel `(i, j)` for a camera pose.
    fn pixel_ray(&self, camera_to_world: &Transform, i: usize, j: usize) -> Vector3<f32> {
        let coord = coord_from_index(i, j, self.width, self.height);
        camera_to_world.rotate_vector(&self.intrinsics.ray_direction(&coord))
    }

    /// Renders a shaded image of the surface.
    ///
    /// # Arguments
    ///
    /// * `volume` - The model.
    /// * `camera_to_world` - Pose of the virtual camera.
    pub fn render(&self, volume: &TsdfVolume, camera_to_world: &Transform) -> RgbImage {
        let origin = camera_to_world.translation();
        let mut colors = Array2::from_elem((self.height, self.width), self.params.background);

        Zip::indexed(&mut colors).par_for_each(|(j, i), color| {
            let direction = self.pixel_ray(camera_to_world, i, j);
            if let Some(hit) = self.raymarch(volume, &origin, &direction) {
                let normal = Self::estimate_normal(volume, &hit);
                let shaded = self.shade(&hit, &normal, &direction);
                *color = [
                    (shaded[0] * 255.0).round() as u8,
                    (shaded[1] * 255.0).round() as u8,
                    (shaded[2] * 255.0).round() as u8,
                ];
            }
        });

        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            Rgb(colors[[y as usize, x as usize]])
        })
    }

    /// Renders the model as a depth frame in the camera's raw depth units, for
    /// aligning new frames against the model.
    pub fn render_depth(&self, volume: &TsdfVolume, camera_to_world: &Transform) -> DepthFrame {
        let origin = camera_to_world.translation();
        let world_to_camera = camera_to_world.inverse();
        let depth_scale = self.intrinsics.depth_scale;
        let mut depth = Array2::<f32>::zeros((self.height, self.width));

        Zip::indexed(&mut depth).par_for_each(|(j, i), value| {
            let direction = self.pixel_ray(camera_to_world, i, j);
            if let Some(hit) = self.raymarch(volume, &origin, &direction) {
                let z = (&world_to_camera * &hit)[2];
                if z > 0.0 {
                    *value = z / depth_scale;
                }
            }
        });

        DepthFrame::from_array(depth)
    }
}
