// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host protocol boundary.
//!
//! Everything the camera layer does to the outside world goes through
//! [`CameraHost`]: querying observers, the proxy/view-redirect protocol, and
//! cue side effects. Implementations are shared as `Arc<dyn CameraHost>`.

use crate::error::HostError;
use crate::observer::{ObserverId, ObserverMode};
use crate::viewpoint::ProxyHandle;
use vcam_sequencer::Pose;

/// What an observer's client renders from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewTarget {
    /// The observer's own entity
    #[default]
    Own,
    /// A proxy entity, by entity id
    Proxy(i32),
}

/// Operations the host exposes to camera playback
pub trait CameraHost: Send + Sync {
    /// Observer is connected
    fn is_online(&self, observer: ObserverId) -> bool;

    /// Current pose of the observer's real entity
    fn observer_pose(&self, observer: ObserverId) -> Option<Pose>;

    /// Current mode of the observer
    fn observer_mode(&self, observer: ObserverId) -> Option<ObserverMode>;

    /// Change the observer's mode
    fn set_observer_mode(&self, observer: ObserverId, mode: ObserverMode);

    /// Move the observer's real entity
    fn teleport(&self, observer: ObserverId, pose: Pose);

    /// Announce a proxy entity to the observer's client
    fn spawn_proxy(&self, observer: ObserverId, proxy: &ProxyHandle, pose: Pose) -> Result<(), HostError>;

    /// Move a proxy entity
    fn move_proxy(&self, observer: ObserverId, proxy: &ProxyHandle, pose: Pose) -> Result<(), HostError>;

    /// Remove a proxy entity from the observer's client
    fn destroy_proxy(&self, observer: ObserverId, proxy: &ProxyHandle);

    /// Redirect what the observer's client renders from
    fn set_view_target(&self, observer: ObserverId, target: ViewTarget) -> Result<(), HostError>;

    /// Show overlay text
    fn show_text(&self, observer: ObserverId, text: &str);

    /// Clear overlay text
    fn clear_text(&self, observer: ObserverId);

    /// Run a command on the host
    fn dispatch_command(&self, command: &str);
}
