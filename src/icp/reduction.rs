use std::ops::{Add, AddAssign};

use itertools::iproduct;
use nalgebra::{Matrix6, Vector3, Vector6};
use rayon::prelude::*;

use crate::transform::Transform;

use super::correspondence::{CorrespondenceFinder, Match};
use super::linear_system::LinearSystem;

/// Number of 3-vector accumulators produced per pixel.
pub const NUM_BLOCKS: usize = 15;

/// Per-pixel contribution to the normal equations, laid out as 15 blocks:
///
/// * `0..3`: `c * c[k]`
/// * `3..6`: `c * n[k]`
/// * `6..9`: `n * c[k]`
/// * `9..12`: `n * n[k]`
/// * `12`: `c * d`
/// * `13`: `n * d`
/// * `14`: `(d², used, found)`
///
/// where `c = p x n` and `d = (p - q) . n`. Summing blocks is associative, so
/// any reduction tree gives the same system up to rounding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EquationBlocks(pub [Vector3<f64>; NUM_BLOCKS]);

impl Default for EquationBlocks {
    fn default() -> Self {
        Self([Vector3::zeros(); NUM_BLOCKS])
    }
}

impl EquationBlocks {
    /// Contribution of a single pixel's match.
    pub fn from_match(pixel_match: &Match) -> Self {
        let mut blocks = Self::default();
        match pixel_match {
            Match::NotFound => {}
            Match::Rejected => {
                blocks.0[14] = Vector3::new(0.0, 0.0, 1.0);
            }
            Match::Accepted(correspondence) => {
                let (jacobian, d) = correspondence.jacobian();
                let c = Vector3::new(jacobian[0], jacobian[1], jacobian[2]);
                let n = Vector3::new(jacobian[3], jacobian[4], jacobian[5]);
                for k in 0..3 {
                    blocks.0[k] = c * c[k];
                    blocks.0[3 + k] = c * n[k];
                    blocks.0[6 + k] = n * c[k];
                    blocks.0[9 + k] = n * n[k];
                }
                blocks.0[12] = c * d;
                blocks.0[13] = n * d;
                blocks.0[14] = Vector3::new(d * d, 1.0, 1.0);
            }
        }
        blocks
    }

    /// Unpacks the blocks into `A`, `b`, error and counters.
    pub fn into_linear_system(self) -> LinearSystem {
        let blocks = self.0;
        let mut a = Matrix6::zeros();
        for k in 0..3 {
            for r in 0..3 {
                a[(r, k)] = blocks[k][r];
                a[(r, 3 + k)] = blocks[3 + k][r];
                a[(3 + r, k)] = blocks[6 + k][r];
                a[(3 + r, 3 + k)] = blocks[9 + k][r];
            }
        }
        let b = Vector6::new(
            blocks[12][0],
            blocks[12][1],
            blocks[12][2],
            blocks[13][0],
            blocks[13][1],
            blocks[13][2],
        );

        LinearSystem {
            a,
            b,
            error: blocks[14][0],
            points_used: blocks[14][1].round() as usize,
            points_found: blocks[14][2].round() as usize,
        }
    }
}

impl Add for EquationBlocks {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for EquationBlocks {
    fn add_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0.iter()) {
            *lhs += rhs;
        }
    }
}

/// Builds the system visiting pixels one by one, stepping the system directly.
pub fn accumulate_sequential(finder: &CorrespondenceFinder, movement: &Transform) -> LinearSystem {
    let mut system = LinearSystem::new();
    for (j, i) in iproduct!(0..finder.height(), 0..finder.width()) {
        match finder.find(movement, i, j) {
            Match::NotFound => {}
            Match::Rejected => system.step_rejected(),
            Match::Accepted(correspondence) => {
                let (jacobian, residual) = correspondence.jacobian();
                system.step(residual, &jacobian);
            }
        }
    }
    system
}

/// Builds the system with a parallel map over rows followed by a tree reduction
/// of the 15 blocks.
pub fn accumulate_parallel(finder: &CorrespondenceFinder, movement: &Transform) -> LinearSystem {
    let width = finder.width();
    (0..finder.height())
        .into_par_iter()
        .map(|j| {
            (0..width).fold(EquationBlocks::default(), |mut acc, i| {
                acc += EquationBlocks::from_match(&finder.find(movement, i, j));
                acc
            })
        })
        .reduce(EquationBlocks::default, |lhs, rhs| lhs + rhs)
        .into_linear_system()
}
