// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observer identity and mode.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of an observer (a connected player)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObserverId(pub Uuid);

impl ObserverId {
    /// Create a new random observer ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Game mode of an observer, saved on entering camera mode and restored on exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObserverMode {
    /// Normal play
    #[default]
    Survival,
    /// Building
    Creative,
    /// Restricted interaction
    Adventure,
    /// Free-flying, no collision
    Spectator,
}
