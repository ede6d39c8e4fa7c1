use crate::error::{Error, Result};
use crate::trajectory::Trajectory;
use crate::transform::Transform;

/// Metrics for comparing two transforms.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformMetrics {
    /// Angle between the two transforms in radians.
    pub angle: f32,
    /// Translation vector size between the two transforms.
    pub translation: f32,
}

impl TransformMetrics {
    /// Creates a new `TransformMetrics` from two transforms.
    pub fn new(lhs: &Transform, rhs: &Transform) -> Self {
        let diff = &lhs.inverse() * rhs;

        Self {
            angle: diff.angle(),
            translation: diff.translation().norm(),
        }
    }

    /// Average pose error of an estimated trajectory against the ground truth.
    pub fn mean_trajectory_error(
        pred_trajectory: &Trajectory,
        gt_trajectory: &Trajectory,
    ) -> Result<Self> {
        if pred_trajectory.len() != gt_trajectory.len() {
            return Err(Error::invalid_parameter(format!(
                "Trajectories have different lengths: {} and {}",
                pred_trajectory.len(),
                gt_trajectory.len()
            )));
        }
        if pred_trajectory.is_empty() {
            return Ok(Self::default());
        }

        let mut accum_metrics = TransformMetrics::default();
        for (pred, gt) in pred_trajectory.poses().zip(gt_trajectory.poses()) {
            let metrics = Self::new(pred, gt);
            accum_metrics.angle += metrics.angle;
            accum_metrics.translation += metrics.translation;
        }

        let count = pred_trajectory.len() as f32;
        accum_metrics.angle /= count;
        accum_metrics.translation /= count;
        Ok(accum_metrics)
    }

    /// Returns the total error of the two transforms.
    pub fn total(&self) -> f32 {
        self.angle + self.translation
    }
}

impl std::fmt::Display for TransformMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "angle: {:.2}°, translation: {:.5}",
            self.angle.to_degrees(),
            self.translation
        )
    }
}
