pub mod camera;
pub mod config;
pub mod error;
pub mod icp;
pub mod image;
pub mod metrics;
pub mod render;
pub mod session;
pub mod synthetic;
pub mod trajectory;
pub mod transform;
pub mod tsdf;

#[cfg(test)]
mod unit_test;

pub use crate::config::{ReconstructionConfig, TrackingMode};
pub use crate::session::{FrameOutcome, FrameReport, ReconstructionSession};
