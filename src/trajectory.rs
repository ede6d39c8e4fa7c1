use std::ops::Index;

use crate::transform::Transform;

/// One pose of a reconstruction session.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectoryEntry {
    /// Camera pose, transforms points from camera to world.
    pub camera_to_world: Transform,
    /// Index of the frame in the input sequence.
    pub frame_index: usize,
    /// False when tracking was lost and the pose was carried over.
    pub tracked: bool,
}

/// Trajectory of camera poses, recorded while fusing frames.
#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    entries: Vec<TrajectoryEntry>,
}

impl Trajectory {
    /// Adds a new pose to the trajectory.
    ///
    /// # Arguments
    ///
    /// * `camera_to_world` - Transform from camera to world.
    /// * `frame_index` - Input frame of the pose.
    /// * `tracked` - Whether the pose comes from a successful alignment.
    pub fn push(&mut self, camera_to_world: Transform, frame_index: usize, tracked: bool) {
        self.entries.push(TrajectoryEntry {
            camera_to_world,
            frame_index,
            tracked,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the poses only.
    pub fn poses(&self) -> impl Iterator<Item = &Transform> + '_ {
        self.entries.iter().map(|entry| &entry.camera_to_world)
    }

    /// Number of frames whose tracking failed.
    pub fn lost_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.tracked).count()
    }
}

impl FromIterator<Transform> for Trajectory {
    /// Builds a fully tracked trajectory, numbering frames in order. Use it for
    /// ground truth poses.
    fn from_iter<T: IntoIterator<Item = Transform>>(iter: T) -> Self {
        let mut trajectory = Trajectory::default();
        for (frame_index, transform) in iter.into_iter().enumerate() {
            trajectory.push(transform, frame_index, true);
        }
        trajectory
    }
}

impl Index<usize> for Trajectory {
    type Output = Transform;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index].camera_to_world
    }
}
