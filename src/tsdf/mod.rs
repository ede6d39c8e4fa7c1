mod voxel;
pub use voxel::{TsdfVolume, Voxel};
mod fusion;
pub use fusion::{update_voxel, FusionSummary, TsdfFusion, TsdfParams};
