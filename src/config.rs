use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::camera::CameraIntrinsics;
use crate::error::{Error, Result};
use crate::icp::IcpParams;
use crate::render::RenderParams;
use crate::tsdf::TsdfParams;

/// Which depth frame new frames are aligned against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// The previous input frame.
    #[default]
    FrameToFrame,
    /// The model raycast from the previous pose.
    FrameToModel,
}

/// Everything a reconstruction session needs, loadable from JSON. Missing
/// fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub intrinsics: CameraIntrinsics,
    /// Width of the depth frames.
    pub width: usize,
    /// Height of the depth frames.
    pub height: usize,
    pub tracking: TrackingMode,
    pub icp: IcpParams,
    pub tsdf: TsdfParams,
    pub render: RenderParams,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            intrinsics: CameraIntrinsics::default(),
            width: 640,
            height: 480,
            tracking: TrackingMode::default(),
            icp: IcpParams::default(),
            tsdf: TsdfParams::default(),
            render: RenderParams::default(),
        }
    }
}

impl ReconstructionConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid_parameter(format!(
                "Frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        self.intrinsics.validate()?;
        self.tsdf.validate()
    }
}
