// SPDX-License-Identifier: MIT OR Apache-2.0
//! Camera service facade.
//!
//! [`CameraService`] ties sessions, switchers and the preset store together
//! and exposes the operations a command layer calls. The host drives it by
//! calling [`CameraService::tick`] once per tick period.

use crate::config::RuntimeConfig;
use crate::error::CameraError;
use crate::host::CameraHost;
use crate::observer::ObserverId;
use crate::presets::{PresetStore, SaveOutcome};
use crate::registry::SessionRegistry;
use crate::scheduler::{TaskKind, TickScheduler};
use crate::session::PlaybackSession;
use crate::switcher::{SequenceStep, Switchers};
use crate::viewpoint::{InboundFilter, ProxyIdAllocator};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use vcam_sequencer::{CameraType, PresetRecord, Timeline};

/// Entry point for all camera operations
pub struct CameraService {
    registry: SessionRegistry,
    switchers: Switchers,
    store: Arc<PresetStore>,
    scheduler: Arc<TickScheduler>,
    host: Arc<dyn CameraHost>,
    filter: InboundFilter,
}

impl CameraService {
    /// Create a service
    pub fn new(config: &RuntimeConfig, host: Arc<dyn CameraHost>, store: Arc<PresetStore>) -> Self {
        Self::with_rng(config, host, store, StdRng::from_entropy())
    }

    /// Create a service whose random pools draw from `rng`
    pub fn with_rng(
        config: &RuntimeConfig,
        host: Arc<dyn CameraHost>,
        store: Arc<PresetStore>,
        rng: StdRng,
    ) -> Self {
        let scheduler = Arc::new(TickScheduler::new(config.tick_period_ms, config.clock));
        let filter = InboundFilter::new();
        let registry = SessionRegistry::new(
            host.clone(),
            scheduler.clone(),
            Arc::new(ProxyIdAllocator::new(config.proxy_id_seed)),
            filter.clone(),
        );
        Self {
            registry,
            switchers: Switchers::with_rng(scheduler.clone(), rng),
            store,
            scheduler,
            host,
            filter,
        }
    }

    /// Shared inbound movement filter for the host's network layer
    pub fn inbound_filter(&self) -> InboundFilter {
        self.filter.clone()
    }

    /// Preset store
    pub fn store(&self) -> &Arc<PresetStore> {
        &self.store
    }

    /// Tick scheduler
    pub fn scheduler(&self) -> &Arc<TickScheduler> {
        &self.scheduler
    }

    /// Session of `observer`, if any
    pub fn session(&self, observer: ObserverId) -> Option<&PlaybackSession> {
        self.registry.get(observer)
    }

    // ---- Camera mode ----

    /// Enter camera mode
    pub fn try_enter_camera(&mut self, observer: ObserverId) -> Result<(), CameraError> {
        self.registry.get_or_create(observer).enter()
    }

    /// Enter camera mode. Returns `false` if the observer is not connected.
    pub fn enter_camera(&mut self, observer: ObserverId) -> bool {
        Self::report(self.try_enter_camera(observer), observer)
    }

    /// Leave camera mode, stopping playback and both switchers.
    /// Returns `false` if the observer was not in camera mode.
    pub fn exit_camera(&mut self, observer: ObserverId) -> bool {
        self.switchers.stop_all(observer);
        match self.registry.get_mut(observer) {
            Some(session) if session.is_in_camera_mode() => {
                session.stop();
                true
            }
            _ => false,
        }
    }

    // ---- Playback ----

    /// Play a timeline, entering camera mode first if needed
    pub fn try_play_timeline(&mut self, observer: ObserverId, timeline: Timeline) -> Result<(), CameraError> {
        self.registry.get_or_create(observer).play(timeline)
    }

    /// Play a timeline. Returns `false` if it could not start.
    pub fn play_timeline(&mut self, observer: ObserverId, timeline: Timeline) -> bool {
        Self::report(self.try_play_timeline(observer, timeline), observer)
    }

    /// Play a stored preset
    pub fn try_play_preset(&mut self, observer: ObserverId, name: &str) -> Result<(), CameraError> {
        let record = self
            .store
            .get(name)
            .ok_or_else(|| CameraError::UnknownPreset(name.to_string()))?;
        let timeline = record.to_timeline()?;
        let session = self.registry.get_or_create(observer);
        session.play(timeline)?;
        session.apply_camera_type(record.camera_type);
        tracing::debug!("Observer {} switched to preset {}", observer, name);
        Ok(())
    }

    /// Play a stored preset. Returns `false` if it could not start.
    pub fn play_preset(&mut self, observer: ObserverId, name: &str) -> bool {
        Self::report(self.try_play_preset(observer, name), observer)
    }

    /// Halt playback and any switcher, staying in camera mode.
    /// Returns `false` if nothing was playing.
    pub fn stop_playback(&mut self, observer: ObserverId) -> bool {
        self.switchers.stop_all(observer);
        self.registry
            .get_mut(observer)
            .is_some_and(PlaybackSession::halt)
    }

    /// A timeline is advancing for `observer`
    pub fn is_playing(&self, observer: ObserverId) -> bool {
        self.registry.get(observer).is_some_and(PlaybackSession::is_playing)
    }

    /// `observer` is in camera mode
    pub fn is_in_camera_mode(&self, observer: ObserverId) -> bool {
        self.registry
            .get(observer)
            .is_some_and(PlaybackSession::is_in_camera_mode)
    }

    // ---- Switchers ----

    /// Switch between random presets every `interval_ticks`. Unknown names
    /// are ignored.
    ///
    /// Returns the preset played first.
    pub fn try_start_random_pool(
        &mut self,
        observer: ObserverId,
        names: &[String],
        interval_ticks: u64,
    ) -> Result<String, CameraError> {
        let known: Vec<String> = names
            .iter()
            .filter(|n| self.store.contains(n))
            .cloned()
            .collect();
        if known.is_empty() {
            return Err(CameraError::EmptyPool);
        }

        self.switchers.stop_sequence(observer);
        let first = self
            .switchers
            .start_random(observer, known, interval_ticks)
            .ok_or(CameraError::EmptyPool)?;
        if let Err(e) = self.try_play_preset(observer, &first) {
            self.switchers.stop_random(observer);
            return Err(e);
        }
        tracing::info!("Observer {} started a random pool at {}", observer, first);
        Ok(first)
    }

    /// Start a random pool. Returns `false` if none of the names exist.
    pub fn start_random_pool(&mut self, observer: ObserverId, names: &[String], interval_ticks: u64) -> bool {
        Self::report(self.try_start_random_pool(observer, names, interval_ticks), observer)
    }

    /// Stop the random pool. Returns `false` if none was running.
    pub fn stop_random_pool(&mut self, observer: ObserverId) -> bool {
        self.switchers.stop_random(observer)
    }

    /// Presets in `observer`'s random pool
    pub fn random_pool(&self, observer: ObserverId) -> Option<Vec<String>> {
        self.switchers.random_pool(observer).map(<[String]>::to_vec)
    }

    /// Cycle through `names` in order, `delay_ticks` apart, wrapping at the end.
    /// Every name must exist.
    pub fn try_start_fixed_sequence(
        &mut self,
        observer: ObserverId,
        names: &[String],
        delay_ticks: u64,
    ) -> Result<(), CameraError> {
        let steps = names
            .iter()
            .map(|name| SequenceStep::new(name.clone(), delay_ticks))
            .collect();
        self.start_steps(observer, steps, true)
    }

    /// Start a fixed sequence. Returns `false` if it could not start.
    pub fn start_fixed_sequence(&mut self, observer: ObserverId, names: &[String], delay_ticks: u64) -> bool {
        Self::report(self.try_start_fixed_sequence(observer, names, delay_ticks), observer)
    }

    /// Stop the running sequence. Returns `false` if none was running.
    pub fn stop_fixed_sequence(&mut self, observer: ObserverId) -> bool {
        self.switchers.stop_sequence(observer)
    }

    /// Play a stored sequence, each entry for its own duration
    pub fn try_play_sequence(&mut self, observer: ObserverId, name: &str) -> Result<(), CameraError> {
        let record = self
            .store
            .sequence(name)
            .ok_or_else(|| CameraError::UnknownSequence(name.to_string()))?;
        let steps = record
            .entries
            .iter()
            .map(|entry| {
                // Sub-tick remainders are dropped
                let ms = (entry.duration_secs * 1000.0) as u64;
                SequenceStep::new(entry.preset.clone(), self.scheduler.ms_to_ticks(ms))
            })
            .collect();
        self.start_steps(observer, steps, record.looping)?;
        tracing::debug!(
            "Sequence {} runs {:.1}s per pass (looping: {})",
            name,
            record.total_secs(),
            record.looping
        );
        Ok(())
    }

    /// Play a stored sequence. Returns `false` if it could not start.
    pub fn play_sequence(&mut self, observer: ObserverId, name: &str) -> bool {
        Self::report(self.try_play_sequence(observer, name), observer)
    }

    /// Index of the entry `observer`'s sequence is on
    pub fn sequence_index(&self, observer: ObserverId) -> Option<usize> {
        self.switchers.sequence_index(observer)
    }

    fn start_steps(
        &mut self,
        observer: ObserverId,
        steps: Vec<SequenceStep>,
        looping: bool,
    ) -> Result<(), CameraError> {
        if steps.is_empty() {
            return Err(CameraError::EmptyPool);
        }
        if let Some(missing) = steps.iter().find(|s| !self.store.contains(&s.preset)) {
            return Err(CameraError::UnknownPreset(missing.preset.clone()));
        }
        self.switchers.stop_random(observer);
        let count = steps.len();
        let first = self
            .switchers
            .start_sequence(observer, steps, looping)
            .ok_or(CameraError::EmptyPool)?;
        if let Err(e) = self.try_play_preset(observer, &first) {
            self.switchers.stop_sequence(observer);
            return Err(e);
        }
        tracing::info!("Observer {} started a sequence of {} presets", observer, count);
        Ok(())
    }

    // ---- Presets ----

    /// Store `timeline` as a preset. The preset is usable even when writing
    /// it to disk fails.
    pub fn save_preset(&self, name: &str, timeline: &Timeline, camera_type: CameraType) -> SaveOutcome {
        self.store
            .save_preset(name, PresetRecord::from_timeline(timeline, camera_type))
    }

    /// Delete a preset and drop it from every sequence
    pub fn delete_preset(&self, name: &str) -> bool {
        self.store.remove(name)
    }

    // ---- Lifecycle ----

    /// An observer connected. A session left in camera mode from an earlier
    /// connection is exited first.
    pub fn on_join(&mut self, observer: ObserverId) {
        if self.is_in_camera_mode(observer) {
            tracing::info!("Observer {} rejoined in camera mode, exiting", observer);
            self.exit_camera(observer);
        }
    }

    /// An observer disconnected
    pub fn on_disconnect(&mut self, observer: ObserverId) {
        self.switchers.stop_all(observer);
        self.registry.remove(observer);
    }

    /// Stop every switcher and session
    pub fn cleanup_all(&mut self) {
        self.switchers.cleanup_all();
        self.registry.clear_all();
        tracing::info!("Camera service cleaned up");
    }

    /// Number of sessions
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of observers in camera mode
    pub fn active_camera_count(&self) -> usize {
        self.registry.active_camera_count()
    }

    /// Run one tick: every due task, in scheduling order
    pub fn tick(&mut self) {
        for task in self.scheduler.advance() {
            if !self.scheduler.claim(&task) {
                continue;
            }
            match task.kind {
                TaskKind::PlaybackTick(observer) => {
                    if let Some(session) = self.registry.get_mut(observer) {
                        session.on_tick();
                    }
                }
                TaskKind::ClearText(observer) => {
                    if let Some(session) = self.registry.get_mut(observer) {
                        session.expire_text();
                    }
                }
                TaskKind::RandomSwitch(observer) => {
                    if !self.host.is_online(observer) {
                        self.switchers.stop_random(observer);
                    } else if let Some(name) = self.switchers.reroll(observer) {
                        self.switch_to(observer, &name);
                    }
                }
                TaskKind::SequenceStep(observer) => {
                    if !self.host.is_online(observer) {
                        self.switchers.stop_sequence(observer);
                    } else if let Some(name) = self.switchers.advance_sequence(observer) {
                        self.switch_to(observer, &name);
                    }
                }
            }
        }
    }

    fn switch_to(&mut self, observer: ObserverId, name: &str) {
        if let Err(e) = self.try_play_preset(observer, name) {
            tracing::warn!("Observer {} could not switch to {}: {}", observer, name, e);
        }
    }

    fn report<T>(result: Result<T, CameraError>, observer: ObserverId) -> bool {
        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Camera operation for {} failed: {}", observer, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for CameraService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraService")
            .field("registry", &self.registry)
            .field("switchers", &self.switchers)
            .finish_non_exhaustive()
    }
}
