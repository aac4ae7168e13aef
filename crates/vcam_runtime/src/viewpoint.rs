// SPDX-License-Identifier: MIT OR Apache-2.0
//! Decoupled viewpoint.
//!
//! The observer's client is told to render from a proxy entity that the
//! controller moves along the path, while the observer's real entity stays
//! where it was. Movement packets from that client are stale while the view
//! is decoupled, so they are discarded through the shared [`InboundFilter`].
//!
//! If the client link rejects the proxy, the controller falls back to
//! teleporting the real entity every tick.

use crate::error::ViewpointError;
use crate::host::{CameraHost, ViewTarget};
use crate::observer::ObserverId;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use uuid::Uuid;
use vcam_sequencer::Pose;

/// Identity of one proxy entity. Owned by exactly one controller; not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct ProxyHandle {
    entity_id: i32,
    token: Uuid,
}

impl ProxyHandle {
    /// Entity id announced to the client
    pub fn entity_id(&self) -> i32 {
        self.entity_id
    }

    /// Unique token announced with the entity
    pub fn token(&self) -> Uuid {
        self.token
    }
}

/// Hands out proxy entity ids counting down from a seed near the top of the
/// id space, away from ids the host allocates itself
#[derive(Debug)]
pub struct ProxyIdAllocator {
    next: AtomicI32,
}

impl ProxyIdAllocator {
    /// The first id handed out is `seed - 1`
    pub fn new(seed: i32) -> Self {
        Self {
            next: AtomicI32::new(seed),
        }
    }

    /// Allocate a fresh proxy handle
    pub fn allocate(&self) -> ProxyHandle {
        let entity_id = self.next.fetch_sub(1, Ordering::Relaxed).wrapping_sub(1);
        ProxyHandle {
            entity_id,
            token: Uuid::new_v4(),
        }
    }
}

/// Client movement packet kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    /// Position only
    Position,
    /// Position and look
    PositionLook,
    /// Look only
    Look,
}

/// What to do with a client movement packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundVerdict {
    /// Apply it to the real entity
    Apply,
    /// Drop it
    Discard,
}

/// Set of observers whose inbound movement is suppressed.
///
/// Cloning shares the set; the network layer holds one clone and the camera
/// layer another.
#[derive(Debug, Clone, Default)]
pub struct InboundFilter {
    suppressed: Arc<RwLock<HashSet<ObserverId>>>,
}

impl InboundFilter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Start discarding movement from `observer`
    pub fn suppress(&self, observer: ObserverId) {
        self.suppressed.write().insert(observer);
    }

    /// Stop discarding movement from `observer`
    pub fn allow(&self, observer: ObserverId) {
        self.suppressed.write().remove(&observer);
    }

    /// Movement from `observer` is currently discarded
    pub fn is_suppressed(&self, observer: ObserverId) -> bool {
        self.suppressed.read().contains(&observer)
    }

    /// Number of suppressed observers
    pub fn len(&self) -> usize {
        self.suppressed.read().len()
    }

    /// No observer is suppressed
    pub fn is_empty(&self) -> bool {
        self.suppressed.read().is_empty()
    }

    /// Verdict for one packet. All movement kinds are treated alike.
    pub fn filter(&self, observer: ObserverId, _kind: InboundKind) -> InboundVerdict {
        if self.is_suppressed(observer) {
            InboundVerdict::Discard
        } else {
            InboundVerdict::Apply
        }
    }
}

/// How the controller is currently showing poses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Through a proxy entity
    #[default]
    Proxy,
    /// By moving the real entity
    DirectTeleport,
}

/// Per-observer view decoupling
pub struct ViewpointController {
    observer: ObserverId,
    host: Arc<dyn CameraHost>,
    ids: Arc<ProxyIdAllocator>,
    filter: InboundFilter,
    proxy: Option<ProxyHandle>,
    mode: ViewMode,
    active: bool,
}

impl ViewpointController {
    /// Create an inactive controller
    pub fn new(
        observer: ObserverId,
        host: Arc<dyn CameraHost>,
        ids: Arc<ProxyIdAllocator>,
        filter: InboundFilter,
    ) -> Self {
        Self {
            observer,
            host,
            ids,
            filter,
            proxy: None,
            mode: ViewMode::Proxy,
            active: false,
        }
    }

    /// Current view mode
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// View is decoupled
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Decouple the view, starting at `pose`.
    ///
    /// On rejection nothing is left redirected: the proxy is removed again,
    /// the controller switches to [`ViewMode::DirectTeleport`] and stays
    /// active, and the error is returned for the caller to log.
    pub fn begin(&mut self, pose: Pose) -> Result<(), ViewpointError> {
        if self.active {
            self.update_pose(pose);
            return Ok(());
        }
        self.active = true;

        let proxy = self.ids.allocate();
        let result = self
            .host
            .spawn_proxy(self.observer, &proxy, pose)
            .and_then(|()| {
                self.host
                    .set_view_target(self.observer, ViewTarget::Proxy(proxy.entity_id()))
                    .inspect_err(|_| self.host.destroy_proxy(self.observer, &proxy))
            });

        match result {
            Ok(()) => {
                tracing::debug!("Observer {} viewing through proxy {}", self.observer, proxy.entity_id());
                self.mode = ViewMode::Proxy;
                self.proxy = Some(proxy);
                Ok(())
            }
            Err(e) => {
                self.mode = ViewMode::DirectTeleport;
                self.host.teleport(self.observer, pose);
                Err(e.into())
            }
        }
    }

    /// Show `pose`. In proxy mode a failed move degrades to direct teleport.
    pub fn update_pose(&mut self, pose: Pose) {
        if self.mode == ViewMode::Proxy {
            if let Some(proxy) = &self.proxy {
                match self.host.move_proxy(self.observer, proxy, pose) {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::warn!("Proxy move failed for {}, switching to teleport: {}", self.observer, e);
                        self.release_proxy();
                        self.mode = ViewMode::DirectTeleport;
                    }
                }
            }
        }
        self.host.teleport(self.observer, pose);
    }

    /// Restore the observer's own view and put the real entity at `original`.
    /// Lifts inbound suppression first. Harmless when inactive.
    pub fn end(&mut self, original: Pose) {
        self.allow_inbound();
        if !self.active {
            return;
        }
        self.active = false;
        self.release_proxy();
        self.host.teleport(self.observer, original);
        self.mode = ViewMode::Proxy;
    }

    /// Discard movement from the observer's client
    pub fn suppress_inbound(&self) {
        self.filter.suppress(self.observer);
    }

    /// Apply movement from the observer's client again
    pub fn allow_inbound(&self) {
        self.filter.allow(self.observer);
    }

    fn release_proxy(&mut self) {
        if let Some(proxy) = self.proxy.take() {
            if let Err(e) = self.host.set_view_target(self.observer, ViewTarget::Own) {
                tracing::warn!("Could not restore view of {}: {}", self.observer, e);
            }
            self.host.destroy_proxy(self.observer, &proxy);
        }
    }
}

impl std::fmt::Debug for ViewpointController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewpointController")
            .field("observer", &self.observer)
            .field("proxy", &self.proxy)
            .field("mode", &self.mode)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;

    fn setup() -> (Arc<HeadlessHost>, ObserverId, ViewpointController, InboundFilter) {
        let host = Arc::new(HeadlessHost::new());
        let observer = ObserverId::new();
        host.join(observer, Pose::at(0.0, 64.0, 0.0));
        let filter = InboundFilter::new();
        let controller = ViewpointController::new(
            observer,
            host.clone(),
            Arc::new(ProxyIdAllocator::new(1000)),
            filter.clone(),
        );
        (host, observer, controller, filter)
    }

    #[test]
    fn test_ids_count_down() {
        let ids = ProxyIdAllocator::new(i32::MAX - 10_000);
        let a = ids.allocate();
        let b = ids.allocate();
        assert_eq!(a.entity_id(), i32::MAX - 10_001);
        assert_eq!(b.entity_id(), i32::MAX - 10_002);
        assert_ne!(a.token(), b.token());
    }

    #[test]
    fn test_ids_wrap_at_minimum() {
        let ids = ProxyIdAllocator::new(i32::MIN);
        assert_eq!(ids.allocate().entity_id(), i32::MAX);
        assert_eq!(ids.allocate().entity_id(), i32::MAX - 1);
    }

    #[test]
    fn test_proxy_view_leaves_entity_in_place() {
        let (host, observer, mut controller, _) = setup();
        controller.begin(Pose::at(10.0, 70.0, 10.0)).unwrap();
        controller.update_pose(Pose::at(20.0, 70.0, 20.0));

        let state = host.observer(observer).unwrap();
        assert_eq!(state.view, ViewTarget::Proxy(999));
        assert_eq!(state.proxies[&999], Pose::at(20.0, 70.0, 20.0));
        assert_eq!(state.pose, Pose::at(0.0, 64.0, 0.0));
        assert_eq!(state.teleports, 0);

        controller.end(Pose::at(0.0, 64.0, 0.0));
        let state = host.observer(observer).unwrap();
        assert_eq!(state.view, ViewTarget::Own);
        assert!(state.proxies.is_empty());
        assert!(!controller.is_active());
    }

    #[test]
    fn test_rejected_proxy_falls_back_to_teleport() {
        let (host, observer, mut controller, _) = setup();
        host.set_reject_proxies(true);

        assert!(controller.begin(Pose::at(5.0, 64.0, 5.0)).is_err());
        assert_eq!(controller.mode(), ViewMode::DirectTeleport);
        assert!(controller.is_active());

        controller.update_pose(Pose::at(6.0, 64.0, 6.0));
        let state = host.observer(observer).unwrap();
        assert_eq!(state.pose, Pose::at(6.0, 64.0, 6.0));
        assert_eq!(state.view, ViewTarget::Own);
        assert!(state.proxies.is_empty());

        controller.end(Pose::at(0.0, 64.0, 0.0));
        assert_eq!(host.observer(observer).unwrap().pose, Pose::at(0.0, 64.0, 0.0));
    }

    #[test]
    fn test_end_lifts_suppression() {
        let (_host, observer, mut controller, filter) = setup();
        controller.begin(Pose::default()).unwrap();
        controller.suppress_inbound();
        assert_eq!(filter.filter(observer, InboundKind::PositionLook), InboundVerdict::Discard);

        controller.end(Pose::default());
        assert_eq!(filter.filter(observer, InboundKind::PositionLook), InboundVerdict::Apply);
        assert!(filter.is_empty());
    }
}
