mod frames;
pub(crate) use frames::{sphere_frame, tabletop_pair, FramePair};
