use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::Vector3;
use ndarray::Zip;
use serde_derive::{Deserialize, Serialize};

use crate::camera::CameraIntrinsics;
use crate::error::{Error, Result};
use crate::image::DepthFrame;
use crate::transform::Transform;

use super::voxel::{TsdfVolume, Voxel};

/// Parameters of the volumetric fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsdfParams {
    /// Voxels per axis.
    pub cube_size: usize,
    /// Observations farther than this from the voxel are ignored.
    pub sdf_truncation: f32,
    pub max_weight: f32,
    /// World size of the volume.
    pub side_length: f32,
    /// World position of the volume center.
    pub center: [f32; 3],
}

impl Default for TsdfParams {
    fn default() -> Self {
        Self {
            cube_size: 128,
            sdf_truncation: 0.01,
            max_weight: 20.0,
            side_length: 1.0,
            center: [0.0, 0.0, 0.5],
        }
    }
}

impl TsdfParams {
    pub fn validate(&self) -> Result<()> {
        if self.cube_size == 0 {
            return Err(Error::invalid_parameter("cube_size must be positive"));
        }
        if !(self.sdf_truncation > 0.0) {
            return Err(Error::invalid_parameter("sdf_truncation must be positive"));
        }
        if !(self.max_weight >= 1.0) {
            return Err(Error::invalid_parameter("max_weight must be at least 1"));
        }
        if !(self.side_length > 0.0) {
            return Err(Error::invalid_parameter("side_length must be positive"));
        }
        Ok(())
    }

    pub fn center(&self) -> Vector3<f32> {
        Vector3::from(self.center)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusionSummary {
    pub updated: usize,
    pub unchanged: usize,
}

/// Fuses one observation into a voxel.
///
/// # Arguments
///
/// * `voxel` - Current value.
/// * `position` - Voxel center in world coordinates.
/// * `frame` - Depth frame.
/// * `intrinsics` - Camera of the depth frame.
/// * `world_to_camera` - Current camera pose, inverted.
///
/// # Returns
///
/// * The new value, or `None` when the voxel must stay unchanged: behind the
///   camera, outside the image, without depth, or outside the truncation band.
pub fn update_voxel(
    voxel: &Voxel,
    position: &Vector3<f32>,
    frame: &DepthFrame,
    intrinsics: &CameraIntrinsics,
    world_to_camera: &Transform,
    params: &TsdfParams,
) -> Option<Voxel> {
    let position = world_to_camera * position;
    if !(position[2] > 0.0) {
        return None;
    }

    let coord = intrinsics.project(&position);
    if !(coord[0] >= -0.5 && coord[0] < 0.5 && coord[1] >= -0.5 && coord[1] < 0.5) {
        return None;
    }

    let observed = intrinsics.deproject(frame, &coord);
    if observed[2] == 0.0 {
        return None;
    }

    let sdf = observed.norm() - position.norm();
    if !(sdf.abs() <= params.sdf_truncation) {
        return None;
    }

    let weight = voxel.weight;
    Some(Voxel {
        sdf: (voxel.sdf * weight + sdf) / (weight + 1.0),
        weight: (weight + 1.0).min(params.max_weight),
    })
}

/// Double buffered TSDF. Each pass reads one volume and writes the other, then
/// the roles flip.
pub struct TsdfFusion {
    pub params: TsdfParams,
    volumes: [TsdfVolume; 2],
    read_index: usize,
    frames_fused: usize,
}

impl TsdfFusion {
    pub fn new(params: TsdfParams) -> Result<Self> {
        params.validate()?;
        let volume = TsdfVolume::new(params.cube_size, params.side_length, params.center());
        Ok(Self {
            volumes: [volume.clone(), volume],
            params,
            read_index: 0,
            frames_fused: 0,
        })
    }

    /// The volume holding the latest fused state.
    pub fn current(&self) -> &TsdfVolume {
        &self.volumes[self.read_index]
    }

    pub fn frames_fused(&self) -> usize {
        self.frames_fused
    }

    /// Fuses a depth frame into the model.
    ///
    /// # Arguments
    ///
    /// * `frame` - Depth frame.
    /// * `intrinsics` - Camera of the depth frame.
    /// * `world_to_camera` - Transform from the volume's world frame into the camera.
    ///
    /// # Returns
    ///
    /// * How many voxels changed.
    pub fn integrate(
        &mut self,
        frame: &DepthFrame,
        intrinsics: &CameraIntrinsics,
        world_to_camera: &Transform,
    ) -> FusionSummary {
        let (first, second) = self.volumes.split_at_mut(1);
        let (read, write) = if self.read_index == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        };

        let params = &self.params;
        let updated = AtomicUsize::new(0);
        Zip::indexed(&mut write.voxels)
            .and(&read.voxels)
            .par_for_each(|(x, y, z), out, voxel| {
                let position = read.voxel_position(x, y, z);
                *out = match update_voxel(voxel, &position, frame, intrinsics, world_to_camera, params)
                {
                    Some(fused) => {
                        updated.fetch_add(1, Ordering::Relaxed);
                        fused
                    }
                    None => *voxel,
                };
            });

        self.read_index = 1 - self.read_index;
        self.frames_fused += 1;

        let updated = updated.into_inner();
        let summary = FusionSummary {
            updated,
            unchanged: self.current().voxels.len() - updated,
        };
        if summary.updated == 0 {
            log::warn!("Fusion pass {} did not update any voxel", self.frames_fused);
        } else {
            log::info!(
                "Fused frame {}: {} voxels updated",
                self.frames_fused,
                summary.updated
            );
        }
        summary
    }

    /// Empties both volumes.
    pub fn reset(&mut self) {
        for volume in self.volumes.iter_mut() {
            volume.reset();
        }
        self.read_index = 0;
        self.frames_fused = 0;
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use ndarray::Array2;

    use super::*;

    fn params() -> TsdfParams {
        TsdfParams {
            cube_size: 16,
            sdf_truncation: 0.05,
            ..Default::default()
        }
    }

    #[test]
    fn test_update_voxel() {
        let params = params();
        let frame = DepthFrame::from_array(Array2::from_elem((32, 32), 0.5));
        let intrinsics = CameraIntrinsics::default();
        let eye = Transform::eye();

        // On the optical axis, 2cm in front of the surface.
        let position = Vector3::new(0.0, 0.0, 0.48);
        let fused = update_voxel(
            &Voxel::empty(0.1),
            &position,
            &frame,
            &intrinsics,
            &eye,
            &params,
        )
        .unwrap();
        assert_eq!(fused.weight, 1.0);
        assert!(fused.sdf > 0.0 && fused.sdf < 0.03);

        let averaged = update_voxel(&fused, &position, &frame, &intrinsics, &eye, &params).unwrap();
        assert_eq!(averaged.weight, 2.0);

        // Behind the truncation band and behind the camera.
        assert!(update_voxel(&fused, &Vector3::new(0.0, 0.0, 0.7), &frame, &intrinsics, &eye, &params).is_none());
        assert!(update_voxel(&fused, &Vector3::new(0.0, 0.0, -0.5), &frame, &intrinsics, &eye, &params).is_none());
        // Outside the field of view.
        assert!(update_voxel(&fused, &Vector3::new(0.4, 0.0, 0.5), &frame, &intrinsics, &eye, &params).is_none());
    }

    #[test]
    fn test_buffers_flip() {
        let mut fusion = TsdfFusion::new(params()).unwrap();
        let frame = DepthFrame::from_array(Array2::from_elem((32, 32), 0.5));
        let intrinsics = CameraIntrinsics::default();

        let summary = fusion.integrate(&frame, &intrinsics, &Transform::eye());
        assert!(summary.updated > 0);
        assert_eq!(summary.updated + summary.unchanged, 16 * 16 * 16);
        assert_eq!(fusion.current().observed_count(), summary.updated);
        assert_eq!(fusion.read_index, 1);

        fusion.integrate(&frame, &intrinsics, &Transform::eye());
        assert_eq!(fusion.read_index, 0);
        assert_eq!(fusion.frames_fused(), 2);

        fusion.reset();
        assert_eq!(fusion.current().observed_count(), 0);
    }

    #[test]
    fn test_invalid_params() {
        let mut params = params();
        params.cube_size = 0;
        assert!(TsdfFusion::new(params).is_err());
    }
}
