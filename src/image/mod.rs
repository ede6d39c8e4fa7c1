mod depth;
pub use depth::DepthFrame;

mod normals;
pub use normals::{estimate_normal_at_index, NormalMap};
