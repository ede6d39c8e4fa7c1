use std::path::{Path, PathBuf};

use clap::Parser;
use kdam::tqdm;
use nalgebra::Vector3;
use tsdf3d::{
    camera::CameraIntrinsics,
    image::{DepthFrame, NormalMap},
    metrics::TransformMetrics,
    render::ViewerState,
    synthetic::{orbit_pose, SyntheticScene},
    trajectory::Trajectory,
    FrameOutcome, ReconstructionConfig, ReconstructionSession,
};

#[derive(Parser)]
#[command(author, version, about = "Fuses a depth sequence into a TSDF volume and renders it")]
struct Args {
    /// JSON configuration, defaults are used for missing fields
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Glob of 16 bits depth PNGs, sorted by name. Renders a synthetic orbit if absent
    #[arg(long, short)]
    input: Option<String>,
    /// Maximum number of frames to process
    #[arg(long, default_value_t = 30)]
    max_frames: usize,
    /// Degrees between consecutive synthetic frames
    #[arg(long, default_value_t = 1.0)]
    step_degrees: f32,
    /// Viewer yaw for the output image, in degrees
    #[arg(long, default_value_t = 0.0)]
    yaw: f32,
    /// Viewer pitch for the output image, in degrees
    #[arg(long, default_value_t = 0.0)]
    pitch: f32,
    /// Where to save the rendered model
    #[arg(long, short, default_value = "reconstruction.png")]
    output: PathBuf,
    /// Saves depth and normal views of the first frame into this directory
    #[arg(long)]
    debug_dir: Option<PathBuf>,
}

/// Depth range, in meters, mapped to the red channel of the depth view.
const DEBUG_DEPTH_RANGE: (f32, f32) = (0.7, 1.2);

fn save_debug_views(
    dir: &Path,
    frame: &DepthFrame,
    intrinsics: &CameraIntrinsics,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let (near, far) = DEBUG_DEPTH_RANGE;
    frame
        .to_rgb_image(near / intrinsics.depth_scale, far / intrinsics.depth_scale)
        .save(dir.join("depth.png"))?;

    let normals = NormalMap::compute(frame, intrinsics);
    normals.to_rgb_image().save(dir.join("normals.png"))?;
    log::info!(
        "Saved debug views to {}: {} pixels with depth, {} with normals",
        dir.display(),
        frame.valid_count(),
        normals.defined_count()
    );
    Ok(())
}

fn load_frames(pattern: &str, max_frames: usize) -> Result<Vec<DepthFrame>, Box<dyn std::error::Error>> {
    let mut paths = glob::glob(pattern)?.collect::<Result<Vec<_>, _>>()?;
    paths.sort();
    paths.truncate(max_frames);
    if paths.is_empty() {
        return Err(format!("No depth images match {pattern}").into());
    }

    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        frames.push(DepthFrame::load(&path)?);
    }
    Ok(frames)
}

fn main() -> Result<(), Box<dyn std::error::Error + 'static>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ReconstructionConfig::from_json_file(path)?,
        None => ReconstructionConfig::default(),
    };

    let (frames, gt_trajectory) = match &args.input {
        Some(pattern) => {
            let frames = load_frames(pattern, args.max_frames)?;
            config.width = frames[0].width();
            config.height = frames[0].height();
            (frames, None)
        }
        None => {
            let scene = SyntheticScene::tabletop();
            let center = Vector3::new(0.0, 0.0, 0.5);
            let trajectory: Trajectory = (0..args.max_frames)
                .map(|k| orbit_pose(&center, k as f32 * args.step_degrees))
                .collect();
            let frames = trajectory
                .poses()
                .map(|pose| {
                    scene.render_depth(&config.intrinsics, config.width, config.height, pose)
                })
                .collect();
            (frames, Some(trajectory))
        }
    };

    let mut session = ReconstructionSession::new(config)?;
    if let (Some(dir), Some(first)) = (&args.debug_dir, frames.first()) {
        save_debug_views(dir, first, session.intrinsics())?;
    }

    let total = frames.len();
    for frame in tqdm!(frames.into_iter(), total = total, desc = "Fusing frames") {
        let report = session.process_frame(frame)?;
        match &report.outcome {
            FrameOutcome::Initialized => {}
            FrameOutcome::Tracked(diagnostics) => {
                log::debug!(
                    "Frame {}: {:?} in {} steps, mean squared error {:e}, inliers {:.1}%",
                    report.frame_index,
                    diagnostics.status,
                    diagnostics.steps,
                    diagnostics.mean_squared_error,
                    diagnostics.inlier_ratio() * 100.0
                );
            }
            FrameOutcome::TrackingLost { reason } => {
                log::warn!("Frame {} skipped: {}", report.frame_index, reason);
            }
        }
    }

    println!(
        "Fused {} of {} frames, {} voxels observed",
        session.frames_fused(),
        total,
        session.volume().observed_count()
    );
    if let Some(gt_trajectory) = gt_trajectory {
        let metrics = TransformMetrics::mean_trajectory_error(session.trajectory(), &gt_trajectory)?;
        println!("Mean trajectory error: {metrics}");
    }

    let mut viewer = ViewerState::default();
    viewer.rotate(-args.yaw, args.pitch);
    session.render(&viewer).save(&args.output)?;
    println!("Saved {}", args.output.display());

    Ok(())
}
