use nalgebra::Vector3;

use crate::camera::{index_from_coord, CameraIntrinsics};
use crate::image::{estimate_normal_at_index, DepthFrame, NormalMap};
use crate::transform::Transform;

use super::icp_params::IcpParams;

/// Pair of points hypothesized to be the same surface location.
#[derive(Clone, Debug, PartialEq)]
pub struct Correspondence {
    /// Source point already moved into the destination camera.
    pub source_point: Vector3<f32>,
    pub dest_point: Vector3<f32>,
    /// Source normal rotated into the destination camera. Zero if undefined.
    pub source_normal: Vector3<f32>,
    /// Normal used by the point-to-plane equations.
    pub dest_normal: Vector3<f32>,
}

impl Correspondence {
    /// Point-to-plane linearization of this pair.
    ///
    /// # Returns
    ///
    /// * The jacobian row `[p x n; n]` and the residual `(p - q) . n`.
    pub fn jacobian(&self) -> ([f64; 6], f64) {
        let p: Vector3<f64> = nalgebra::convert(self.source_point);
        let q: Vector3<f64> = nalgebra::convert(self.dest_point);
        let n: Vector3<f64> = nalgebra::convert(self.dest_normal);

        let c = p.cross(&n);
        let residual = (p - q).dot(&n);
        ([c[0], c[1], c[2], n[0], n[1], n[2]], residual)
    }
}

/// Outcome of searching a correspondence for one source pixel.
#[derive(Clone, Debug, PartialEq)]
pub enum Match {
    /// No destination point exists for the pixel.
    NotFound,
    /// A destination point exists but the pair failed a gate.
    Rejected,
    /// The pair enters the linear system.
    Accepted(Correspondence),
}

impl Match {
    /// Counts towards `points_found`.
    pub fn is_found(&self) -> bool {
        !matches!(self, Match::NotFound)
    }

    /// Counts towards `points_used`.
    pub fn is_used(&self) -> bool {
        matches!(self, Match::Accepted(_))
    }

    /// Applies the distance and normal gates to a located pair.
    pub fn classify(params: &IcpParams, correspondence: Correspondence) -> Self {
        let distance = (correspondence.source_point - correspondence.dest_point).norm();
        if !(distance < params.max_distance) {
            return Match::Rejected;
        }

        if is_zero(&correspondence.dest_normal) {
            return Match::Rejected;
        }

        if params.normal_gating {
            if is_zero(&correspondence.source_normal) {
                return Match::Rejected;
            }
            let dot = correspondence.source_normal.dot(&correspondence.dest_normal);
            if !(dot > params.min_normal_dot) {
                return Match::Rejected;
            }
        }

        Match::Accepted(correspondence)
    }
}

fn is_zero(vector: &Vector3<f32>) -> bool {
    vector[0] == 0.0 && vector[1] == 0.0 && vector[2] == 0.0
}

/// Projective data association between a source and a destination depth frame.
pub struct CorrespondenceFinder<'a> {
    params: &'a IcpParams,
    intrinsics: &'a CameraIntrinsics,
    source: &'a DepthFrame,
    source_normals: &'a NormalMap,
    dest: &'a DepthFrame,
    dest_normals: Option<&'a NormalMap>,
}

impl<'a> CorrespondenceFinder<'a> {
    /// Creates a finder.
    ///
    /// # Arguments
    ///
    /// * `source_normals` - Normals of the source frame.
    /// * `dest_normals` - Normals of the destination frame. When `None`, they are
    ///   estimated for each located destination pixel.
    pub fn new(
        params: &'a IcpParams,
        intrinsics: &'a CameraIntrinsics,
        source: &'a DepthFrame,
        source_normals: &'a NormalMap,
        dest: &'a DepthFrame,
        dest_normals: Option<&'a NormalMap>,
    ) -> Self {
        Self {
            params,
            intrinsics,
            source,
            source_normals,
            dest,
            dest_normals,
        }
    }

    pub fn width(&self) -> usize {
        self.source.width()
    }

    pub fn height(&self) -> usize {
        self.source.height()
    }

    /// Searches the destination point of source pixel `(i, j)` under `movement`.
    pub fn find(&self, movement: &Transform, i: usize, j: usize) -> Match {
        let source_point = self.intrinsics.deproject_index(self.source, i, j);
        if source_point[2] == 0.0 {
            return Match::NotFound;
        }

        let source_point = movement * &source_point;
        if !(source_point[2] > 0.0) || source_point.iter().any(|v| !v.is_finite()) {
            return Match::NotFound;
        }

        let coord = self.intrinsics.project(&source_point);
        let (di, dj) = match index_from_coord(&coord, self.dest.width(), self.dest.height()) {
            Some(index) => index,
            None => return Match::NotFound,
        };

        let dest_point = self.intrinsics.deproject_index(self.dest, di, dj);
        if dest_point[2] == 0.0 {
            return Match::NotFound;
        }

        let dest_normal = match self.dest_normals {
            Some(normals) => normals.get(di, dj),
            None => estimate_normal_at_index(self.dest, self.intrinsics, di, dj),
        };
        let source_normal = movement.rotate_vector(&self.source_normals.get(i, j));

        Match::classify(
            self.params,
            Correspondence {
                source_point,
                dest_point,
                source_normal,
                dest_normal,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;
    use ndarray::Array2;

    use super::*;

    fn pair(dest_y: f32) -> Correspondence {
        Correspondence {
            source_point: Vector3::new(0.0, 0.0, 0.5),
            dest_point: Vector3::new(0.0, dest_y, 0.5),
            source_normal: Vector3::new(0.0, 0.0, -1.0),
            dest_normal: Vector3::new(0.0, 0.0, -1.0),
        }
    }

    #[test]
    fn test_rejection_boundary() {
        let params = IcpParams::default();
        assert_eq!(params.max_distance, 0.2);

        assert_eq!(Match::classify(&params, pair(0.2)), Match::Rejected);
        assert!(Match::classify(&params, pair(0.2 - 1e-3)).is_used());
        assert!(Match::classify(&params, pair(0.2)).is_found());
    }

    #[test]
    fn test_normal_gating() {
        let mut params = IcpParams::default();
        let mut correspondence = pair(0.0);
        // 45 degrees apart, below the 0.9 gate.
        correspondence.source_normal = Vector3::new(0.0, 1.0, -1.0).normalize();
        assert_eq!(Match::classify(&params, correspondence.clone()), Match::Rejected);

        params.normal_gating(false);
        assert!(Match::classify(&params, correspondence.clone()).is_used());

        correspondence.dest_normal = Vector3::zeros();
        assert_eq!(Match::classify(&params, correspondence), Match::Rejected);
    }

    #[test]
    fn test_jacobian() {
        let correspondence = Correspondence {
            source_point: Vector3::new(1.0, 0.0, 0.5),
            dest_point: Vector3::new(1.0, 0.0, 0.25),
            source_normal: Vector3::new(0.0, 0.0, -1.0),
            dest_normal: Vector3::new(0.0, 0.0, -1.0),
        };
        let (jacobian, residual) = correspondence.jacobian();
        assert_eq!(jacobian, [0.0, 1.0, 0.0, 0.0, 0.0, -1.0]);
        assert_eq!(residual, -0.25);
    }

    #[test]
    fn test_find_on_identical_frames() {
        let frame = DepthFrame::from_array(Array2::from_elem((10, 10), 0.5));
        let intrinsics = CameraIntrinsics::default();
        let normals = NormalMap::compute(&frame, &intrinsics);
        let params = IcpParams::default();
        let finder =
            CorrespondenceFinder::new(&params, &intrinsics, &frame, &normals, &frame, Some(&normals));

        match finder.find(&Transform::eye(), 4, 4) {
            Match::Accepted(correspondence) => {
                assert_eq!(correspondence.source_point, correspondence.dest_point);
                assert_eq!(correspondence.jacobian().1, 0.0);
            }
            other => panic!("Expected a correspondence, got {other:?}"),
        }
        // Source pixel without a defined normal.
        assert_eq!(finder.find(&Transform::eye(), 0, 4), Match::Rejected);

        // Moving everything behind the camera.
        let behind = Transform::from_translation(&Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(finder.find(&behind, 4, 4), Match::NotFound);
    }

    #[test]
    fn test_find_missing_dest() {
        let source = DepthFrame::from_array(Array2::from_elem((10, 10), 0.5));
        let dest = DepthFrame::new(10, 10);
        let intrinsics = CameraIntrinsics::default();
        let normals = NormalMap::compute(&source, &intrinsics);
        let params = IcpParams::default();
        let finder = CorrespondenceFinder::new(&params, &intrinsics, &source, &normals, &dest, None);

        assert_eq!(finder.find(&Transform::eye(), 4, 4), Match::NotFound);
    }
}
