// SPDX-License-Identifier: MIT OR Apache-2.0
//! Camera poses.

use serde::{Deserialize, Serialize};

/// A position and view orientation in the world.
///
/// Yaw is unbounded and wraps at 360 degrees. Pitch is conventionally kept in
/// `[-90, 90]` but nothing here enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
    /// Yaw in degrees
    #[serde(default)]
    pub yaw: f32,
    /// Pitch in degrees
    #[serde(default)]
    pub pitch: f32,
}

impl Pose {
    /// Create a new pose
    pub fn new(x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        Self { x, y, z, yaw, pitch }
    }

    /// Create a pose at a position with a level, north-facing view
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, 0.0, 0.0)
    }

    /// Position as an array
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Same position, different orientation
    pub fn with_rotation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }
}
