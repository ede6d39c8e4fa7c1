use nalgebra::Vector3;
use serde_derive::{Deserialize, Serialize};

use crate::transform::Transform;

const YAW_LIMIT: f32 = 120.0;
const PITCH_LIMIT: f32 = 80.0;

/// Orbit camera driven by mouse drags. Only affects rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerState {
    /// Rotation around the vertical axis, in degrees.
    pub yaw: f32,
    /// Rotation around the horizontal axis, in degrees.
    pub pitch: f32,
    /// Distance from the camera to the orbit center.
    pub distance: f32,
    /// Point the camera orbits around.
    pub center: [f32; 3],
    #[serde(skip)]
    last_mouse: Option<(f32, f32)>,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: 0.5,
            center: [0.0, 0.0, 0.5],
            last_mouse: None,
        }
    }
}

impl ViewerState {
    pub fn new(center: [f32; 3], distance: f32) -> Self {
        Self {
            center,
            distance,
            ..Default::default()
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.last_mouse.is_some()
    }

    pub fn mouse_down(&mut self, x: f32, y: f32) {
        self.last_mouse = Some((x, y));
    }

    pub fn mouse_up(&mut self) {
        self.last_mouse = None;
    }

    /// Rotates the view by the drag delta since the last event.
    /// Returns whether the view changed.
    pub fn mouse_move(&mut self, x: f32, y: f32) -> bool {
        match self.last_mouse {
            Some((last_x, last_y)) => {
                self.rotate(x - last_x, y - last_y);
                self.last_mouse = Some((x, y));
                true
            }
            None => false,
        }
    }

    /// Applies a drag of `(dx, dy)` pixels, one degree per pixel.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw = num::clamp(self.yaw - dx, -YAW_LIMIT, YAW_LIMIT);
        self.pitch = num::clamp(self.pitch + dy, -PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Camera pose: `T(center) * Ry(yaw) * Rx(pitch) * T(0, 0, -distance)`.
    pub fn camera_to_world(&self) -> Transform {
        let center = Transform::from_translation(&Vector3::from(self.center));
        let yaw = Transform::from_euler_angles(0.0, self.yaw.to_radians(), 0.0);
        let pitch = Transform::from_euler_angles(self.pitch.to_radians(), 0.0, 0.0);
        let back = Transform::from_translation(&Vector3::new(0.0, 0.0, -self.distance));
        &(&center * &yaw) * &(&pitch * &back)
    }
}
