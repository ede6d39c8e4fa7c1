use approx::RelativeEq;
use nalgebra::{Cholesky, Matrix6, Vector6};

use crate::error::{Error, Result};

/// Below this ratio between `det(A)` and the product of its diagonal, the
/// normal equations are considered singular.
const DEGENERATE_DETERMINANT_RATIO: f64 = 1e-12;

/// Normal equations `A x = -b` of the point-to-plane ICP.
///
/// `A` is built from outer products of jacobian rows, so it is symmetric
/// positive semi-definite.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearSystem {
    pub a: Matrix6<f64>,
    pub b: Vector6<f64>,
    /// Sum of squared residuals.
    pub error: f64,
    /// Pixels where a destination point was located.
    pub points_found: usize,
    /// Pixels that passed every gate and were summed.
    pub points_used: usize,
}

impl Default for LinearSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSystem {
    pub fn new() -> Self {
        Self {
            a: Matrix6::zeros(),
            b: Vector6::zeros(),
            error: 0.0,
            points_found: 0,
            points_used: 0,
        }
    }

    /// Adds one accepted correspondence.
    ///
    /// # Arguments
    ///
    /// * `residual` - Point-to-plane distance of the pair.
    /// * `jacobian` - The `[c; n]` row of the pair.
    pub fn step(&mut self, residual: f64, jacobian: &[f64; 6]) {
        for i in 0..6 {
            let ival = jacobian[i];
            self.b[i] += ival * residual;

            self.a[(i, i)] += ival * ival;
            for j in i + 1..6 {
                let mul = ival * jacobian[j];
                self.a[(i, j)] += mul;
                self.a[(j, i)] += mul;
            }
        }

        self.error += residual * residual;
        self.points_found += 1;
        self.points_used += 1;
    }

    /// Counts a correspondence that was located but rejected.
    pub fn step_rejected(&mut self) {
        self.points_found += 1;
    }

    pub fn is_symmetric(&self, epsilon: f64) -> bool {
        self.a
            .relative_eq(&self.a.transpose(), epsilon, epsilon)
    }

    pub fn determinant(&self) -> f64 {
        self.a.determinant()
    }

    /// Solves for the incremental twist `[rx, ry, rz, tx, ty, tz]`.
    /// The accumulated `b` is negated once here.
    ///
    /// # Returns
    ///
    /// * `NoCorrespondences` if nothing was summed.
    /// * `DegenerateSystem` if `A` is singular or the solve is not finite.
    pub fn solve(&self) -> Result<Vector6<f64>> {
        if self.points_used == 0 {
            return Err(Error::NoCorrespondences {
                points_found: self.points_found,
            });
        }

        let determinant = self.determinant();
        let diagonal_product: f64 = self.a.diagonal().iter().product();
        if !determinant.is_finite()
            || !(diagonal_product > 0.0)
            || determinant.abs() <= DEGENERATE_DETERMINANT_RATIO * diagonal_product
        {
            return Err(Error::DegenerateSystem(format!(
                "det(A) = {determinant:e} with {} points used",
                self.points_used
            )));
        }

        let rhs = -self.b;
        let solution = Cholesky::new(self.a)
            .map(|cholesky| cholesky.solve(&rhs))
            .or_else(|| self.a.lu().solve(&rhs))
            .ok_or_else(|| Error::DegenerateSystem("Factorization failed".to_string()))?;

        if solution.iter().any(|value| !value.is_finite()) {
            return Err(Error::DegenerateSystem(
                "Solution has non-finite values".to_string(),
            ));
        }
        Ok(solution)
    }

    /// Relative residual `|A x + b| / |b|` of a solution.
    pub fn relative_residual(&self, solution: &Vector6<f64>) -> f64 {
        let residual = (self.a * solution + self.b).norm();
        let scale = self.b.norm();
        if scale > 0.0 {
            residual / scale
        } else {
            residual
        }
    }

    /// Returns the mean squared residual.
    pub fn mean_squared_residual(&self) -> f64 {
        if self.points_used == 0 {
            0.0
        } else {
            self.error / self.points_used as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::{Matrix6, Vector6};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    #[test]
    fn test_step() {
        let mut system = LinearSystem::new();

        system.step(1.0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        system.step(2.0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        system.step(3.0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        system.step_rejected();

        #[rustfmt::skip]
        let expected_a = Matrix6::from_row_slice(&[
            3.0, 6.0, 9.0, 12.0, 15.0, 18.0,
            6.0, 12.0, 18.0, 24.0, 30.0, 36.0,
            9.0, 18.0, 27.0, 36.0, 45.0, 54.0,
            12.0, 24.0, 36.0, 48.0, 60.0, 72.0,
            15.0, 30.0, 45.0, 60.0, 75.0, 90.0,
            18.0, 36.0, 54.0, 72.0, 90.0, 108.0,
        ]);
        assert_eq!(system.a, expected_a);
        assert_eq!(
            system.b,
            Vector6::new(6.0, 12.0, 18.0, 24.0, 30.0, 36.0)
        );
        assert_eq!(system.error, 14.0);
        assert_eq!(system.points_found, 4);
        assert_eq!(system.points_used, 3);
        assert_abs_diff_eq!(system.mean_squared_residual(), 14.0 / 3.0);
        assert_eq!(LinearSystem::new().mean_squared_residual(), 0.0);
    }

    #[test]
    fn test_symmetry_is_exact() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut system = LinearSystem::new();
        for _ in 0..5000 {
            let jacobian: [f64; 6] = [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ];
            system.step(rng.gen_range(-0.1..0.1), &jacobian);
        }

        for i in 0..6 {
            for j in 0..6 {
                assert_eq!(system.a[(i, j)], system.a[(j, i)]);
            }
        }
        assert!(system.is_symmetric(0.0));
    }

    #[test]
    fn test_solve_recovers_twist() {
        let expected = Vector6::new(0.01, -0.02, 0.005, 0.1, 0.0, -0.05);
        let mut rng = StdRng::seed_from_u64(3);
        let mut system = LinearSystem::new();
        for _ in 0..200 {
            let jacobian: [f64; 6] = [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ];
            // Residual that the twist `expected` cancels exactly.
            let residual = -Vector6::from_row_slice(&jacobian).dot(&expected);
            system.step(residual, &jacobian);
        }

        let solution = system.solve().unwrap();
        assert_abs_diff_eq!(solution, expected, epsilon = 1e-9);
        assert!(system.relative_residual(&solution) < 1e-9);
    }

    #[test]
    fn test_solve_failures() {
        let system = LinearSystem::new();
        assert!(matches!(
            system.solve(),
            Err(Error::NoCorrespondences { points_found: 0 })
        ));

        // Only the plane constraints: tz, rx and ry.
        let mut system = LinearSystem::new();
        system.step(0.1, &[0.5, 0.0, 0.0, 0.0, 0.0, -1.0]);
        system.step(0.1, &[0.0, 0.5, 0.0, 0.0, 0.0, -1.0]);
        system.step(0.1, &[0.2, 0.3, 0.0, 0.0, 0.0, -1.0]);
        assert!(matches!(system.solve(), Err(Error::DegenerateSystem(_))));
    }
}
