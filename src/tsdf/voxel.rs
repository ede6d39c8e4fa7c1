use nalgebra::Vector3;
use ndarray::Array3;

/// One cell of the TSDF grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Voxel {
    /// Running average of the truncated signed distance, positive in free space.
    pub sdf: f32,
    /// Number of fused observations, capped.
    pub weight: f32,
}

impl Voxel {
    /// The far/empty sentinel.
    pub fn empty(grid_unit: f32) -> Self {
        Self {
            sdf: grid_unit,
            weight: 0.0,
        }
    }

    pub fn is_observed(&self) -> bool {
        self.weight > 0.0
    }
}

/// Cubic grid of voxels covering `center ± side_length / 2` in world space.
///
/// Voxels are indexed `[x, y, z]`.
#[derive(Clone, Debug)]
pub struct TsdfVolume {
    pub voxels: Array3<Voxel>,
    side_length: f32,
    center: Vector3<f32>,
}

impl TsdfVolume {
    /// Allocates a volume with every voxel set to the empty sentinel.
    ///
    /// # Arguments
    ///
    /// * `size` - Number of voxels per axis.
    /// * `side_length` - World size of the cube.
    /// * `center` - World position of the cube's center.
    pub fn new(size: usize, side_length: f32, center: Vector3<f32>) -> Self {
        let grid_unit = side_length / size as f32;
        Self {
            voxels: Array3::from_elem((size, size, size), Voxel::empty(grid_unit)),
            side_length,
            center,
        }
    }

    /// Number of voxels per axis.
    pub fn size(&self) -> usize {
        self.voxels.dim().0
    }

    pub fn side_length(&self) -> f32 {
        self.side_length
    }

    pub fn center(&self) -> Vector3<f32> {
        self.center
    }

    /// World size of a voxel.
    pub fn grid_unit(&self) -> f32 {
        self.side_length / self.size() as f32
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Voxel {
        self.voxels[[x, y, z]]
    }

    /// Sets every voxel back to the empty sentinel.
    pub fn reset(&mut self) {
        let empty = Voxel::empty(self.grid_unit());
        self.voxels.fill(empty);
    }

    /// World position of a voxel center.
    pub fn voxel_position(&self, x: usize, y: usize, z: usize) -> Vector3<f32> {
        let size = self.size() as f32;
        let texel = Vector3::new(
            (x as f32 + 0.5) / size,
            (y as f32 + 0.5) / size,
            (z as f32 + 0.5) / size,
        );
        self.center + (texel - Vector3::repeat(0.5)) * self.side_length
    }

    /// Signed distance from `position` to the cube's boundary, negative inside.
    pub fn box_distance(&self, position: &Vector3<f32>) -> f32 {
        let half = self.side_length * 0.5;
        let d = (position - self.center).abs() - Vector3::repeat(half);
        let outside = d.map(|v| v.max(0.0)).norm();
        let inside = d.max().min(0.0);
        outside + inside
    }

    /// Trilinear interpolation of the signed distance at a world position.
    /// Positions outside the grid are clamped to its border voxels.
    pub fn sample(&self, position: &Vector3<f32>) -> f32 {
        let size = self.size();
        if size == 0 {
            return 0.0;
        }
        let max_index = (size - 1) as f32;
        let continuous =
            ((position - self.center) / self.side_length + Vector3::repeat(0.5)) * size as f32
                - Vector3::repeat(0.5);

        let mut base = [0usize; 3];
        let mut frac = [0.0f32; 3];
        for axis in 0..3 {
            let u = if continuous[axis].is_finite() {
                continuous[axis].clamp(0.0, max_index)
            } else {
                0.0
            };
            let index = (u.floor() as usize).min(size.saturating_sub(2));
            base[axis] = index;
            frac[axis] = (u - index as f32).clamp(0.0, 1.0);
        }

        let upper = |axis: usize| (base[axis] + 1).min(size - 1);
        let mut value = 0.0;
        for (dx, wx) in [(0, 1.0 - frac[0]), (1, frac[0])] {
            let x = if dx == 0 { base[0] } else { upper(0) };
            for (dy, wy) in [(0, 1.0 - frac[1]), (1, frac[1])] {
                let y = if dy == 0 { base[1] } else { upper(1) };
                for (dz, wz) in [(0, 1.0 - frac[2]), (1, frac[2])] {
                    let z = if dz == 0 { base[2] } else { upper(2) };
                    value += wx * wy * wz * self.voxels[[x, y, z]].sdf;
                }
            }
        }
        value
    }

    /// Number of voxels that received at least one observation.
    pub fn observed_count(&self) -> usize {
        self.voxels.iter().filter(|voxel| voxel.is_observed()).count()
    }
}
