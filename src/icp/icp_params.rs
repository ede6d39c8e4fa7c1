use serde_derive::{Deserialize, Serialize};

/// Parameters of the depth-to-depth point-to-plane ICP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpParams {
    /// Maximum number of correspondence/solve iterations.
    pub max_steps: usize,
    /// The loop stops when the squared error changes less than this between iterations.
    pub error_diff_threshold: f64,
    /// Pairs this far apart (or more) are rejected.
    pub max_distance: f32,
    /// Pairs whose normals have a dot product at or below this are rejected.
    pub min_normal_dot: f32,
    /// Enables the normal-angle gate.
    pub normal_gating: bool,
    /// Reads destination normals from a buffer computed once per alignment
    /// instead of estimating them per correspondence.
    pub use_precomputed_normals: bool,
    /// Uses the parallel block reduction instead of the sequential accumulation.
    pub parallel: bool,
    /// Relative residual of `A x = b` above which a drift warning is logged.
    pub solution_tolerance: f64,
    /// Optional wall clock budget for one alignment.
    pub max_duration_ms: Option<u64>,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_steps: 20,
            error_diff_threshold: 1e-4,
            max_distance: 0.2,
            min_normal_dot: 0.9,
            normal_gating: true,
            use_precomputed_normals: true,
            parallel: true,
            solution_tolerance: 1e-4,
            max_duration_ms: None,
        }
    }
}

impl IcpParams {
    pub fn max_steps(&'_ mut self, value: usize) -> &'_ mut IcpParams {
        self.max_steps = value;
        self
    }

    pub fn max_distance(&'_ mut self, value: f32) -> &'_ mut IcpParams {
        self.max_distance = value;
        self
    }

    pub fn normal_gating(&'_ mut self, value: bool) -> &'_ mut IcpParams {
        self.normal_gating = value;
        self
    }

    pub fn use_precomputed_normals(&'_ mut self, value: bool) -> &'_ mut IcpParams {
        self.use_precomputed_normals = value;
        self
    }

    pub fn parallel(&'_ mut self, value: bool) -> &'_ mut IcpParams {
        self.parallel = value;
        self
    }

    pub fn max_duration_ms(&'_ mut self, value: Option<u64>) -> &'_ mut IcpParams {
        self.max_duration_ms = value;
        self
    }
}
