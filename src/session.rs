use image::RgbImage;

use crate::camera::CameraIntrinsics;
use crate::config::{ReconstructionConfig, TrackingMode};
use crate::error::{Error, Result};
use crate::icp::{DepthIcp, IcpDiagnostics};
use crate::image::DepthFrame;
use crate::render::{SurfaceRenderer, ViewerState};
use crate::trajectory::Trajectory;
use crate::transform::Transform;
use crate::tsdf::{FusionSummary, TsdfFusion, TsdfVolume};

/// What happened to a processed frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// First frame after creation or reset, fused at the current pose.
    Initialized,
    /// Aligned and fused.
    Tracked(IcpDiagnostics),
    /// Alignment failed. The frame was not fused and the pose was kept.
    TrackingLost { reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub frame_index: usize,
    pub outcome: FrameOutcome,
    /// Camera pose after the frame.
    pub camera_to_world: Transform,
    pub fusion: Option<FusionSummary>,
}

/// Streaming reconstruction: tracks each incoming depth frame with ICP and
/// fuses it into a TSDF volume at the tracked pose.
///
/// The first frame defines the world frame.
pub struct ReconstructionSession {
    config: ReconstructionConfig,
    fusion: TsdfFusion,
    renderer: SurfaceRenderer,
    camera_to_world: Transform,
    reference: Option<DepthFrame>,
    trajectory: Trajectory,
    frames_seen: usize,
}

impl ReconstructionSession {
    /// Creates a session, allocating the volumes.
    ///
    /// # Arguments
    ///
    /// * `config` - Camera, frame size and algorithm parameters.
    pub fn new(config: ReconstructionConfig) -> Result<Self> {
        config.validate()?;
        let fusion = TsdfFusion::new(config.tsdf.clone())?;
        let renderer = SurfaceRenderer::new(
            config.render.clone(),
            config.intrinsics.clone(),
            config.width,
            config.height,
        );
        log::info!(
            "Reconstruction session: {}x{} frames, {} voxels per axis, {:?}",
            config.width,
            config.height,
            config.tsdf.cube_size,
            config.tracking
        );

        Ok(Self {
            config,
            fusion,
            renderer,
            camera_to_world: Transform::eye(),
            reference: None,
            trajectory: Trajectory::default(),
            frames_seen: 0,
        })
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.config.intrinsics
    }

    /// The fused model.
    pub fn volume(&self) -> &TsdfVolume {
        self.fusion.current()
    }

    /// Current camera to world pose.
    pub fn pose(&self) -> &Transform {
        &self.camera_to_world
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn frames_fused(&self) -> usize {
        self.fusion.frames_fused()
    }

    /// Tracks and fuses the next depth frame.
    ///
    /// # Returns
    ///
    /// * The frame report. Tracking failures are reported as
    ///   `FrameOutcome::TrackingLost`; only invalid frames are errors.
    pub fn process_frame(&mut self, frame: DepthFrame) -> Result<FrameReport> {
        frame.check_dimensions(self.config.width, self.config.height)?;
        let frame_index = self.frames_seen;
        self.frames_seen += 1;

        if self.reference.is_none() {
            let fusion = self.fuse(&frame);
            self.trajectory
                .push(self.camera_to_world.clone(), frame_index, true);
            self.reference = Some(frame);
            return Ok(FrameReport {
                frame_index,
                outcome: FrameOutcome::Initialized,
                camera_to_world: self.camera_to_world.clone(),
                fusion: Some(fusion),
            });
        }

        let alignment = {
            let model_depth;
            let dest = match (self.config.tracking, self.reference.as_ref()) {
                (TrackingMode::FrameToModel, _) => {
                    model_depth = self.model_depth(&self.camera_to_world);
                    &model_depth
                }
                (TrackingMode::FrameToFrame, Some(reference)) => reference,
                (TrackingMode::FrameToFrame, None) => {
                    return Err(Error::invalid_parameter("Missing reference frame"))
                }
            };
            DepthIcp::new(self.config.icp.clone(), self.config.intrinsics.clone(), dest)?
                .align(&frame, &Transform::eye())
        };

        match alignment {
            Ok(result) => {
                self.camera_to_world = &self.camera_to_world * &result.movement;
                let fusion = self.fuse(&frame);
                self.trajectory
                    .push(self.camera_to_world.clone(), frame_index, true);
                self.reference = Some(frame);
                Ok(FrameReport {
                    frame_index,
                    outcome: FrameOutcome::Tracked(result.diagnostics),
                    camera_to_world: self.camera_to_world.clone(),
                    fusion: Some(fusion),
                })
            }
            Err(err) if err.is_tracking_failure() => {
                log::warn!("Tracking lost at frame {}: {}", frame_index, err);
                self.trajectory
                    .push(self.camera_to_world.clone(), frame_index, false);
                Ok(FrameReport {
                    frame_index,
                    outcome: FrameOutcome::TrackingLost {
                        reason: err.to_string(),
                    },
                    camera_to_world: self.camera_to_world.clone(),
                    fusion: None,
                })
            }
            Err(err) => Err(err),
        }
    }

    fn fuse(&mut self, frame: &DepthFrame) -> FusionSummary {
        let world_to_camera = self.camera_to_world.inverse();
        self.fusion
            .integrate(frame, &self.config.intrinsics, &world_to_camera)
    }

    /// Depth frame of the model as seen from a pose, in raw depth units.
    pub fn model_depth(&self, camera_to_world: &Transform) -> DepthFrame {
        self.renderer
            .render_depth(self.fusion.current(), camera_to_world)
    }

    /// Shaded view of the model from the orbit viewer's camera.
    pub fn render(&self, viewer: &ViewerState) -> RgbImage {
        self.render_at(&viewer.camera_to_world())
    }

    /// Shaded view of the model from any camera pose.
    pub fn render_at(&self, camera_to_world: &Transform) -> RgbImage {
        self.renderer.render(self.fusion.current(), camera_to_world)
    }

    /// Empties the model and restarts tracking at the identity pose.
    pub fn reset(&mut self) {
        self.fusion.reset();
        self.camera_to_world = Transform::eye();
        self.reference = None;
        self.trajectory = Trajectory::default();
        self.frames_seen = 0;
        log::info!("Reconstruction session reset");
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::tsdf::TsdfParams;

    fn small_config() -> ReconstructionConfig {
        ReconstructionConfig {
            width: 16,
            height: 16,
            tsdf: TsdfParams {
                cube_size: 16,
                sdf_truncation: 0.05,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_first_frame_initializes() {
        let mut session = ReconstructionSession::new(small_config()).unwrap();
        let frame = DepthFrame::from_array(Array2::from_elem((16, 16), 0.5));

        let report = session.process_frame(frame).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Initialized);
        assert_eq!(report.frame_index, 0);
        assert_eq!(session.frames_fused(), 1);
        assert_eq!(session.trajectory().len(), 1);
        assert!(session.volume().observed_count() > 0);
    }

    #[test]
    fn test_wrong_size_is_rejected() {
        let mut session = ReconstructionSession::new(small_config()).unwrap();
        let result = session.process_frame(DepthFrame::new(8, 16));
        assert!(matches!(result, Err(Error::InvalidInputFrame(_))));
        assert_eq!(session.frames_fused(), 0);
    }

    #[test]
    fn test_reset() {
        let mut session = ReconstructionSession::new(small_config()).unwrap();
        session
            .process_frame(DepthFrame::from_array(Array2::from_elem((16, 16), 0.5)))
            .unwrap();
        session.reset();
        assert_eq!(session.frames_fused(), 0);
        assert!(session.trajectory().is_empty());
        assert_eq!(session.volume().observed_count(), 0);

        let report = session
            .process_frame(DepthFrame::from_array(Array2::from_elem((16, 16), 0.5)))
            .unwrap();
        assert_eq!(report.outcome, FrameOutcome::Initialized);
    }
}
