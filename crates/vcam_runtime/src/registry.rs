// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-observer session registry.

use crate::host::CameraHost;
use crate::observer::ObserverId;
use crate::scheduler::TickScheduler;
use crate::session::PlaybackSession;
use crate::viewpoint::{InboundFilter, ProxyIdAllocator, ViewpointController};
use indexmap::IndexMap;
use std::sync::Arc;

/// One [`PlaybackSession`] per observer, created on first use
pub struct SessionRegistry {
    sessions: IndexMap<ObserverId, PlaybackSession>,
    host: Arc<dyn CameraHost>,
    scheduler: Arc<TickScheduler>,
    ids: Arc<ProxyIdAllocator>,
    filter: InboundFilter,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(
        host: Arc<dyn CameraHost>,
        scheduler: Arc<TickScheduler>,
        ids: Arc<ProxyIdAllocator>,
        filter: InboundFilter,
    ) -> Self {
        Self {
            sessions: IndexMap::new(),
            host,
            scheduler,
            ids,
            filter,
        }
    }

    /// Session for `observer`, creating an idle one if needed
    pub fn get_or_create(&mut self, observer: ObserverId) -> &mut PlaybackSession {
        self.sessions.entry(observer).or_insert_with(|| {
            tracing::debug!("Created session for {}", observer);
            let viewpoint = ViewpointController::new(
                observer,
                self.host.clone(),
                self.ids.clone(),
                self.filter.clone(),
            );
            PlaybackSession::new(observer, self.host.clone(), self.scheduler.clone(), viewpoint)
        })
    }

    /// Session for `observer`, if one exists
    pub fn get(&self, observer: ObserverId) -> Option<&PlaybackSession> {
        self.sessions.get(&observer)
    }

    /// Mutable session for `observer`, if one exists
    pub fn get_mut(&mut self, observer: ObserverId) -> Option<&mut PlaybackSession> {
        self.sessions.get_mut(&observer)
    }

    /// A session exists for `observer`
    pub fn contains(&self, observer: ObserverId) -> bool {
        self.sessions.contains_key(&observer)
    }

    /// Stop and discard `observer`'s session. Returns `false` if there was none.
    pub fn remove(&mut self, observer: ObserverId) -> bool {
        match self.sessions.shift_remove(&observer) {
            Some(mut session) => {
                session.stop();
                tracing::debug!("Removed session for {}", observer);
                true
            }
            None => false,
        }
    }

    /// Stop and discard every session
    pub fn clear_all(&mut self) {
        let count = self.sessions.len();
        for (_, mut session) in self.sessions.drain(..) {
            session.stop();
        }
        if count > 0 {
            tracing::info!("Cleared {} camera sessions", count);
        }
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// No sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of observers in camera mode
    pub fn active_camera_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.is_in_camera_mode())
            .count()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
