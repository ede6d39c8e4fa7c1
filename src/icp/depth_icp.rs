use std::time::{Duration, Instant};

use crate::camera::CameraIntrinsics;
use crate::error::Result;
use crate::image::{DepthFrame, NormalMap};
use crate::transform::Transform;

use super::correspondence::CorrespondenceFinder;
use super::icp_params::IcpParams;
use super::linear_system::LinearSystem;
use super::reduction::{accumulate_parallel, accumulate_sequential};

/// How the ICP loop terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IcpStatus {
    /// The error changed less than the threshold between two iterations.
    Converged,
    /// Ran all the iterations.
    MaxStepsReached,
    /// Stopped by the wall clock budget.
    TimeBudgetExceeded,
}

/// Per-alignment record for logging and testing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IcpDiagnostics {
    /// Number of correspondence passes run.
    pub steps: usize,
    /// Squared error of the last correspondence pass.
    pub error: f64,
    /// `error` divided by `points_used`.
    pub mean_squared_error: f64,
    pub points_found: usize,
    pub points_used: usize,
    pub status: IcpStatus,
}

impl IcpDiagnostics {
    /// Fraction of the located correspondences that passed the distance and
    /// normal gates, 0 when none was located.
    ///
    /// A `Converged` alignment with a low ratio usually means the motion was
    /// outside the basin of projective association.
    pub fn inlier_ratio(&self) -> f64 {
        if self.points_found == 0 {
            0.0
        } else {
            self.points_used as f64 / self.points_found as f64
        }
    }
}

#[derive(Clone, Debug)]
pub struct IcpResult {
    /// Motion taking source camera points into the destination camera.
    pub movement: Transform,
    pub diagnostics: IcpDiagnostics,
}

/// Point-to-plane ICP between two depth frames, using projective data association.
///
/// The destination frame and its normals are fixed at construction, so several
/// sources can be aligned against it.
pub struct DepthIcp<'dest> {
    pub params: IcpParams,
    intrinsics: CameraIntrinsics,
    dest: &'dest DepthFrame,
    dest_normals: Option<NormalMap>,
}

impl<'dest> DepthIcp<'dest> {
    /// Creates the aligner.
    ///
    /// # Arguments
    ///
    /// * `params` - ICP parameters.
    /// * `intrinsics` - Camera shared by source and destination frames.
    /// * `dest` - Destination (reference) frame.
    pub fn new(
        params: IcpParams,
        intrinsics: CameraIntrinsics,
        dest: &'dest DepthFrame,
    ) -> Result<Self> {
        intrinsics.validate()?;
        let dest_normals = if params.use_precomputed_normals {
            Some(NormalMap::compute(dest, &intrinsics))
        } else {
            None
        };
        Ok(Self {
            params,
            intrinsics,
            dest,
            dest_normals,
        })
    }

    /// Builds the normal equations of one iteration.
    ///
    /// # Arguments
    ///
    /// * `source` - Source frame.
    /// * `source_normals` - Normals of the source frame.
    /// * `movement` - Current estimate of the source to destination motion.
    pub fn build_system(
        &self,
        source: &DepthFrame,
        source_normals: &NormalMap,
        movement: &Transform,
    ) -> LinearSystem {
        let finder = CorrespondenceFinder::new(
            &self.params,
            &self.intrinsics,
            source,
            source_normals,
            self.dest,
            self.dest_normals.as_ref(),
        );
        if self.params.parallel {
            accumulate_parallel(&finder, movement)
        } else {
            accumulate_sequential(&finder, movement)
        }
    }

    /// Estimates the motion that aligns `source` onto the destination frame.
    ///
    /// # Arguments
    ///
    /// * `source` - Frame to align, same size as the destination.
    /// * `initial` - Initial guess of the motion, usually identity.
    ///
    /// # Returns
    ///
    /// * The accumulated motion and diagnostics, or `NoCorrespondences` /
    ///   `DegenerateSystem` if an iteration cannot be solved.
    pub fn align(&self, source: &DepthFrame, initial: &Transform) -> Result<IcpResult> {
        source.check_dimensions(self.dest.width(), self.dest.height())?;

        let start = Instant::now();
        let budget = self.params.max_duration_ms.map(Duration::from_millis);
        let source_normals = NormalMap::compute(source, &self.intrinsics);

        let mut movement = initial.clone();
        let mut previous_error = 0.0;
        let mut diagnostics = IcpDiagnostics {
            steps: 0,
            error: 0.0,
            mean_squared_error: 0.0,
            points_found: 0,
            points_used: 0,
            status: IcpStatus::MaxStepsReached,
        };

        for step in 0..self.params.max_steps {
            if budget.map_or(false, |budget| start.elapsed() > budget) {
                log::warn!(
                    "ICP stopped by time budget after {} steps with error {}",
                    step,
                    diagnostics.error
                );
                diagnostics.status = IcpStatus::TimeBudgetExceeded;
                break;
            }

            let system = self.build_system(source, &source_normals, &movement);
            diagnostics.steps = step + 1;
            diagnostics.error = system.error;
            diagnostics.mean_squared_error = system.mean_squared_residual();
            diagnostics.points_found = system.points_found;
            diagnostics.points_used = system.points_used;

            log::debug!(
                "Iteration: {}, error: {}, points found: {}, points used: {}",
                step,
                system.error,
                system.points_found,
                system.points_used
            );

            if system.points_used > 0
                && (system.error - previous_error).abs() < self.params.error_diff_threshold
            {
                diagnostics.status = IcpStatus::Converged;
                break;
            }

            let update = system.solve()?;
            let drift = system.relative_residual(&update);
            if drift > self.params.solution_tolerance {
                log::warn!(
                    "Numerical drift at step {}: |Ax - b| / |b| = {:e}",
                    step,
                    drift
                );
            }

            movement = &Transform::from_twist(&update) * &movement;
            previous_error = system.error;
        }

        if diagnostics.status == IcpStatus::Converged {
            log::info!(
                "ICP converged in {} iterations with error {}",
                diagnostics.steps,
                diagnostics.error
            );
        }

        Ok(IcpResult {
            movement,
            diagnostics,
        })
    }
}
