// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory host.
//!
//! [`HeadlessHost`] keeps observer state in memory and records every protocol
//! operation, so playback can run without a game server attached.

use crate::error::HostError;
use crate::host::{CameraHost, ViewTarget};
use crate::observer::{ObserverId, ObserverMode};
use crate::viewpoint::{InboundFilter, InboundKind, InboundVerdict, ProxyHandle};
use indexmap::IndexMap;
use parking_lot::Mutex;
use vcam_sequencer::Pose;

/// Host-side state of one simulated observer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObserverState {
    /// Real entity pose
    pub pose: Pose,
    /// Current mode
    pub mode: ObserverMode,
    /// Current view target
    pub view: ViewTarget,
    /// Live proxies, entity id to last known pose
    pub proxies: IndexMap<i32, Pose>,
    /// Overlay text currently shown
    pub text: Option<String>,
    /// Number of teleports applied to the real entity
    pub teleports: usize,
}

#[derive(Debug, Default)]
struct HeadlessState {
    observers: IndexMap<ObserverId, ObserverState>,
    commands: Vec<String>,
    reject_proxies: bool,
    filter: Option<InboundFilter>,
}

/// [`CameraHost`] backed by memory
#[derive(Debug, Default)]
pub struct HeadlessHost {
    state: Mutex<HeadlessState>,
}

impl HeadlessHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect an observer at `pose`
    pub fn join(&self, observer: ObserverId, pose: Pose) {
        tracing::debug!("Observer {} joined at {:?}", observer, pose);
        self.state.lock().observers.insert(
            observer,
            ObserverState {
                pose,
                ..Default::default()
            },
        );
    }

    /// Disconnect an observer
    pub fn leave(&self, observer: ObserverId) {
        tracing::debug!("Observer {} left", observer);
        self.state.lock().observers.shift_remove(&observer);
    }

    /// Make proxy announces and view redirects fail
    pub fn set_reject_proxies(&self, reject: bool) {
        self.state.lock().reject_proxies = reject;
    }

    /// Consult `filter` for simulated client movement
    pub fn set_inbound_filter(&self, filter: InboundFilter) {
        self.state.lock().filter = Some(filter);
    }

    /// Simulate a movement packet from the observer's client. Returns whether
    /// it was applied to the real entity.
    pub fn client_moved(&self, observer: ObserverId, kind: InboundKind, pose: Pose) -> bool {
        let mut state = self.state.lock();
        let verdict = state
            .filter
            .as_ref()
            .map_or(InboundVerdict::Apply, |f| f.filter(observer, kind));
        if verdict == InboundVerdict::Discard {
            tracing::trace!("Discarded {:?} from {}", kind, observer);
            return false;
        }
        let Some(entry) = state.observers.get_mut(&observer) else {
            return false;
        };
        match kind {
            InboundKind::Position => {
                entry.pose = Pose::new(pose.x, pose.y, pose.z, entry.pose.yaw, entry.pose.pitch);
            }
            InboundKind::PositionLook => entry.pose = pose,
            InboundKind::Look => entry.pose = entry.pose.with_rotation(pose.yaw, pose.pitch),
        }
        true
    }

    /// Snapshot of an observer's state
    pub fn observer(&self, observer: ObserverId) -> Option<ObserverState> {
        self.state.lock().observers.get(&observer).cloned()
    }

    /// Commands dispatched so far
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    fn with_observer<R>(
        &self,
        observer: ObserverId,
        f: impl FnOnce(&mut ObserverState) -> R,
    ) -> Option<R> {
        self.state.lock().observers.get_mut(&observer).map(f)
    }
}

impl CameraHost for HeadlessHost {
    fn is_online(&self, observer: ObserverId) -> bool {
        self.state.lock().observers.contains_key(&observer)
    }

    fn observer_pose(&self, observer: ObserverId) -> Option<Pose> {
        self.with_observer(observer, |o| o.pose)
    }

    fn observer_mode(&self, observer: ObserverId) -> Option<ObserverMode> {
        self.with_observer(observer, |o| o.mode)
    }

    fn set_observer_mode(&self, observer: ObserverId, mode: ObserverMode) {
        tracing::debug!("Set mode of {} to {:?}", observer, mode);
        self.with_observer(observer, |o| o.mode = mode);
    }

    fn teleport(&self, observer: ObserverId, pose: Pose) {
        self.with_observer(observer, |o| {
            o.pose = pose;
            o.teleports += 1;
        });
    }

    fn spawn_proxy(&self, observer: ObserverId, proxy: &ProxyHandle, pose: Pose) -> Result<(), HostError> {
        let mut state = self.state.lock();
        if state.reject_proxies {
            return Err(HostError::Rejected(format!("spawn of proxy {}", proxy.entity_id())));
        }
        let entry = state
            .observers
            .get_mut(&observer)
            .ok_or(HostError::ObserverOffline(observer))?;
        tracing::debug!("Spawned proxy {} for {}", proxy.entity_id(), observer);
        entry.proxies.insert(proxy.entity_id(), pose);
        Ok(())
    }

    fn move_proxy(&self, observer: ObserverId, proxy: &ProxyHandle, pose: Pose) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let entry = state
            .observers
            .get_mut(&observer)
            .ok_or(HostError::ObserverOffline(observer))?;
        match entry.proxies.get_mut(&proxy.entity_id()) {
            Some(current) => {
                *current = pose;
                Ok(())
            }
            None => Err(HostError::Rejected(format!("unknown proxy {}", proxy.entity_id()))),
        }
    }

    fn destroy_proxy(&self, observer: ObserverId, proxy: &ProxyHandle) {
        tracing::debug!("Destroyed proxy {} for {}", proxy.entity_id(), observer);
        self.with_observer(observer, |o| o.proxies.shift_remove(&proxy.entity_id()));
    }

    fn set_view_target(&self, observer: ObserverId, target: ViewTarget) -> Result<(), HostError> {
        let mut state = self.state.lock();
        if state.reject_proxies && target != ViewTarget::Own {
            return Err(HostError::Rejected("view redirect".to_string()));
        }
        let entry = state
            .observers
            .get_mut(&observer)
            .ok_or(HostError::ObserverOffline(observer))?;
        tracing::debug!("View of {} now {:?}", observer, target);
        entry.view = target;
        Ok(())
    }

    fn show_text(&self, observer: ObserverId, text: &str) {
        self.with_observer(observer, |o| o.text = Some(text.to_string()));
    }

    fn clear_text(&self, observer: ObserverId) {
        self.with_observer(observer, |o| o.text = None);
    }

    fn dispatch_command(&self, command: &str) {
        tracing::debug!("Dispatching command: {}", command);
        self.state.lock().commands.push(command.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewpoint::ProxyIdAllocator;

    #[test]
    fn test_proxy_lifecycle() {
        let host = HeadlessHost::new();
        let observer = ObserverId::new();
        host.join(observer, Pose::at(0.0, 64.0, 0.0));
        let proxy = ProxyIdAllocator::new(100).allocate();

        host.spawn_proxy(observer, &proxy, Pose::at(1.0, 64.0, 1.0)).unwrap();
        host.set_view_target(observer, ViewTarget::Proxy(proxy.entity_id())).unwrap();
        host.move_proxy(observer, &proxy, Pose::at(2.0, 64.0, 2.0)).unwrap();

        let state = host.observer(observer).unwrap();
        assert_eq!(state.view, ViewTarget::Proxy(99));
        assert_eq!(state.proxies[&99], Pose::at(2.0, 64.0, 2.0));
        assert_eq!(state.pose, Pose::at(0.0, 64.0, 0.0));

        host.destroy_proxy(observer, &proxy);
        assert!(host.move_proxy(observer, &proxy, Pose::default()).is_err());
    }

    #[test]
    fn test_rejection() {
        let host = HeadlessHost::new();
        let observer = ObserverId::new();
        host.join(observer, Pose::default());
        host.set_reject_proxies(true);
        let proxy = ProxyIdAllocator::new(100).allocate();
        assert!(matches!(
            host.spawn_proxy(observer, &proxy, Pose::default()),
            Err(HostError::Rejected(_))
        ));
        assert!(host.set_view_target(observer, ViewTarget::Own).is_ok());
    }

    #[test]
    fn test_offline_observer() {
        let host = HeadlessHost::new();
        let observer = ObserverId::new();
        let proxy = ProxyIdAllocator::new(100).allocate();
        assert_eq!(
            host.spawn_proxy(observer, &proxy, Pose::default()),
            Err(HostError::ObserverOffline(observer))
        );
        assert!(!host.is_online(observer));
    }

    #[test]
    fn test_client_movement_through_filter() {
        let host = HeadlessHost::new();
        let observer = ObserverId::new();
        host.join(observer, Pose::default());
        let filter = InboundFilter::new();
        host.set_inbound_filter(filter.clone());

        assert!(host.client_moved(observer, InboundKind::Position, Pose::at(5.0, 0.0, 0.0)));
        filter.suppress(observer);
        assert!(!host.client_moved(observer, InboundKind::Look, Pose::default().with_rotation(90.0, 0.0)));
        assert_eq!(host.observer(observer).unwrap().pose, Pose::at(5.0, 0.0, 0.0));
    }
}
