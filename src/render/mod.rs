mod raymarcher;
pub use raymarcher::{RenderParams, SurfaceRenderer};
mod viewer;
pub use viewer::ViewerState;
