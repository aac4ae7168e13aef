// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-observer playback.
//!
//! This module handles:
//! - Entering and exiting camera mode
//! - Attaching a timeline and driving it once per tick
//! - Text cue display and expiry, command cue dispatch
//! - Saving and restoring the observer's pose and mode

use crate::error::CameraError;
use crate::host::CameraHost;
use crate::observer::{ObserverId, ObserverMode};
use crate::scheduler::{TaskHandle, TaskKind, TickScheduler};
use crate::viewpoint::{ViewMode, ViewpointController};
use std::sync::Arc;
use vcam_sequencer::{CameraType, Pose, TextCue, Timeline, TimelineError};

/// Playback phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    /// Not in camera mode
    #[default]
    Idle,
    /// In camera mode, nothing playing yet
    Entering,
    /// A timeline is advancing
    Playing,
    /// The timeline finished or was halted; still in camera mode
    Stopped,
}

impl PlaybackPhase {
    /// Check if the observer is in camera mode
    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackPhase::Idle)
    }

    /// Check if a timeline is advancing
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackPhase::Playing)
    }
}

/// Playback state of one observer
pub struct PlaybackSession {
    observer: ObserverId,
    host: Arc<dyn CameraHost>,
    scheduler: Arc<TickScheduler>,
    viewpoint: ViewpointController,
    phase: PlaybackPhase,
    in_camera_mode: bool,
    timeline: Option<Timeline>,
    /// Scheduler time at which the current timeline started
    started_at_ms: u64,
    /// Cues below this delay have fired
    cue_cursor_ms: u64,
    original_pose: Option<Pose>,
    original_mode: Option<ObserverMode>,
    tick_task: Option<TaskHandle>,
    text_expiry: Option<TaskHandle>,
    showing_text: bool,
}

impl PlaybackSession {
    /// Create an idle session
    pub fn new(
        observer: ObserverId,
        host: Arc<dyn CameraHost>,
        scheduler: Arc<TickScheduler>,
        viewpoint: ViewpointController,
    ) -> Self {
        Self {
            observer,
            host,
            scheduler,
            viewpoint,
            phase: PlaybackPhase::Idle,
            in_camera_mode: false,
            timeline: None,
            started_at_ms: 0,
            cue_cursor_ms: 0,
            original_pose: None,
            original_mode: None,
            tick_task: None,
            text_expiry: None,
            showing_text: false,
        }
    }

    /// Observer this session belongs to
    pub fn observer(&self) -> ObserverId {
        self.observer
    }

    /// Current phase
    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// A timeline is advancing
    pub fn is_playing(&self) -> bool {
        self.phase.is_playing()
    }

    /// Observer is in camera mode
    pub fn is_in_camera_mode(&self) -> bool {
        self.in_camera_mode
    }

    /// Attached timeline
    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    /// How poses are being shown
    pub fn view_mode(&self) -> ViewMode {
        self.viewpoint.mode()
    }

    /// Milliseconds since the current timeline started
    pub fn elapsed_ms(&self) -> u64 {
        self.scheduler.now_ms().saturating_sub(self.started_at_ms)
    }

    /// Enter camera mode at the observer's current pose.
    ///
    /// Entering twice is harmless. A rejected view proxy is not an error here;
    /// the session carries on by teleporting the observer.
    pub fn enter(&mut self) -> Result<(), CameraError> {
        if self.in_camera_mode {
            return Ok(());
        }
        let pose = self
            .host
            .observer_pose(self.observer)
            .ok_or(CameraError::ObserverOffline(self.observer))?;

        self.original_pose = Some(pose);
        self.original_mode = self.host.observer_mode(self.observer);
        self.in_camera_mode = true;
        self.phase = PlaybackPhase::Entering;

        if let Err(e) = self.viewpoint.begin(pose) {
            tracing::warn!("Observer {}: {}", self.observer, e);
        }
        tracing::info!("Observer {} entered camera mode", self.observer);
        Ok(())
    }

    /// Switch the observer's mode for a camera class. Only spectator cameras
    /// change anything; the saved mode comes back on exit.
    pub fn apply_camera_type(&self, camera_type: CameraType) {
        if self.in_camera_mode && camera_type == CameraType::Spectator {
            self.host.set_observer_mode(self.observer, ObserverMode::Spectator);
        }
    }

    /// Play `timeline` from the start, replacing whatever was playing.
    ///
    /// Enters camera mode first if needed. A timeline without keyframes is
    /// refused and leaves the session untouched.
    pub fn play(&mut self, timeline: Timeline) -> Result<(), CameraError> {
        if timeline.keyframe_count() == 0 {
            return Err(TimelineError::EmptyPath.into());
        }
        self.enter()?;
        self.cancel_tick();

        self.started_at_ms = self.scheduler.now_ms();
        self.cue_cursor_ms = 0;
        if let Some(pose) = timeline.pose_at(0) {
            self.viewpoint.update_pose(pose);
        }
        tracing::info!(
            "Observer {} playing {} keyframes over {} ms",
            self.observer,
            timeline.keyframe_count(),
            timeline.total_duration_ms()
        );
        self.timeline = Some(timeline);
        self.tick_task = Some(
            self.scheduler
                .schedule_repeating(TaskKind::PlaybackTick(self.observer), 0, 1),
        );
        self.phase = PlaybackPhase::Playing;
        self.viewpoint.suppress_inbound();
        Ok(())
    }

    /// Advance playback by one tick: pose, then cues, then the completion check
    pub fn on_tick(&mut self) {
        if self.phase != PlaybackPhase::Playing {
            return;
        }
        let elapsed = self.elapsed_ms();
        let Some(timeline) = &self.timeline else {
            return;
        };

        if let Some(pose) = timeline.pose_at(elapsed) {
            self.viewpoint.update_pose(pose);
        }

        // The window starts where the previous one ended, so a late tick on
        // the wall clock still fires every cue once.
        let window_end = elapsed
            .saturating_add(self.scheduler.period_ms())
            .max(self.cue_cursor_ms);
        let window = timeline.cues_in_window(self.cue_cursor_ms, window_end - self.cue_cursor_ms);
        let texts: Vec<TextCue> = window.texts.into_iter().cloned().collect();
        let commands: Vec<String> = window.commands.into_iter().map(|c| c.command.clone()).collect();
        let total = timeline.total_duration_ms();
        self.cue_cursor_ms = window_end;

        for cue in &texts {
            self.show_text(cue);
        }
        for command in &commands {
            self.host.dispatch_command(command);
        }

        if elapsed >= total {
            self.complete();
        }
    }

    fn show_text(&mut self, cue: &TextCue) {
        if let Some(previous) = self.text_expiry.take() {
            self.scheduler.cancel(previous);
        }
        self.host.show_text(self.observer, &cue.text);
        self.showing_text = true;
        if cue.duration_ms > 0 {
            let ticks = self.scheduler.ms_to_ticks(cue.duration_ms);
            self.text_expiry = Some(
                self.scheduler
                    .schedule_once(TaskKind::ClearText(self.observer), ticks),
            );
        }
    }

    /// Clear cue text whose display time ran out
    pub fn expire_text(&mut self) {
        self.text_expiry = None;
        if self.showing_text {
            self.showing_text = false;
            self.host.clear_text(self.observer);
        }
    }

    fn clear_text(&mut self) {
        if let Some(expiry) = self.text_expiry.take() {
            self.scheduler.cancel(expiry);
        }
        if self.showing_text {
            self.showing_text = false;
            self.host.clear_text(self.observer);
        }
    }

    fn cancel_tick(&mut self) {
        if let Some(task) = self.tick_task.take() {
            self.scheduler.cancel(task);
        }
    }

    /// The timeline ran out. Camera mode stays on at the final pose.
    fn complete(&mut self) {
        self.cancel_tick();
        self.phase = PlaybackPhase::Stopped;
        self.viewpoint.allow_inbound();
        tracing::info!("Observer {} playback finished", self.observer);
    }

    /// Stop the current timeline without leaving camera mode.
    /// Returns `false` if nothing was playing.
    pub fn halt(&mut self) -> bool {
        if self.phase != PlaybackPhase::Playing {
            return false;
        }
        self.cancel_tick();
        self.clear_text();
        self.phase = PlaybackPhase::Stopped;
        self.viewpoint.allow_inbound();
        tracing::info!("Observer {} playback halted", self.observer);
        true
    }

    /// Leave camera mode and restore the observer.
    ///
    /// Valid from any phase and idempotent: an idle session is left alone.
    pub fn stop(&mut self) {
        if self.phase == PlaybackPhase::Idle && !self.in_camera_mode {
            return;
        }
        self.cancel_tick();
        self.clear_text();
        self.timeline = None;

        if self.in_camera_mode {
            self.in_camera_mode = false;
            match self.original_pose.take() {
                Some(original) => self.viewpoint.end(original),
                None => self.viewpoint.allow_inbound(),
            }
            if let Some(mode) = self.original_mode.take() {
                self.host.set_observer_mode(self.observer, mode);
            }
            tracing::info!("Observer {} exited camera mode", self.observer);
        }
        self.viewpoint.allow_inbound();
        self.phase = PlaybackPhase::Idle;
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("observer", &self.observer)
            .field("phase", &self.phase)
            .field("in_camera_mode", &self.in_camera_mode)
            .field("viewpoint", &self.viewpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClockMode;
    use crate::headless::HeadlessHost;
    use crate::host::ViewTarget;
    use crate::viewpoint::{InboundFilter, ProxyIdAllocator};
    use vcam_sequencer::TransitionCurve;

    struct Fixture {
        host: Arc<HeadlessHost>,
        scheduler: Arc<TickScheduler>,
        filter: InboundFilter,
        observer: ObserverId,
        session: PlaybackSession,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(HeadlessHost::new());
        let scheduler = Arc::new(TickScheduler::new(50, ClockMode::Ticks));
        let filter = InboundFilter::new();
        let observer = ObserverId::new();
        host.join(observer, Pose::at(0.0, 64.0, 0.0));
        host.set_observer_mode(observer, ObserverMode::Creative);
        let viewpoint = ViewpointController::new(
            observer,
            host.clone(),
            Arc::new(ProxyIdAllocator::new(5000)),
            filter.clone(),
        );
        let session = PlaybackSession::new(observer, host.clone(), scheduler.clone(), viewpoint);
        Fixture {
            host,
            scheduler,
            filter,
            observer,
            session,
        }
    }

    impl Fixture {
        fn tick(&mut self) {
            for task in self.scheduler.advance() {
                if !self.scheduler.claim(&task) {
                    continue;
                }
                match task.kind {
                    TaskKind::PlaybackTick(_) => self.session.on_tick(),
                    TaskKind::ClearText(_) => self.session.expire_text(),
                    _ => {}
                }
            }
        }

        fn proxy_pose(&self) -> Option<Pose> {
            let state = self.host.observer(self.observer)?;
            match state.view {
                ViewTarget::Proxy(id) => state.proxies.get(&id).copied(),
                ViewTarget::Own => None,
            }
        }
    }

    fn path() -> Timeline {
        let mut timeline = Timeline::from_keyframes([Pose::at(0.0, 64.0, 0.0), Pose::at(100.0, 64.0, 0.0)]);
        timeline.set_segment(0, TransitionCurve::Linear, 1000).unwrap();
        timeline
    }

    #[test]
    fn test_stop_when_idle_is_silent() {
        let mut f = fixture();
        f.session.stop();
        f.session.stop();
        assert_eq!(f.session.phase(), PlaybackPhase::Idle);
        let state = f.host.observer(f.observer).unwrap();
        assert_eq!(state.teleports, 0);
        assert_eq!(state.mode, ObserverMode::Creative);
    }

    #[test]
    fn test_empty_timeline_refused() {
        let mut f = fixture();
        let result = f.session.play(Timeline::new());
        assert!(matches!(result, Err(CameraError::Timeline(TimelineError::EmptyPath))));
        assert_eq!(f.session.phase(), PlaybackPhase::Idle);
        assert!(!f.session.is_in_camera_mode());
    }

    #[test]
    fn test_play_runs_to_completion() {
        let mut f = fixture();
        f.session.play(path()).unwrap();
        assert!(f.session.is_playing());
        assert!(f.filter.is_suppressed(f.observer));

        for _ in 0..10 {
            f.tick();
        }
        let mid = f.proxy_pose().unwrap();
        assert!((mid.x - 50.0).abs() < 1e-9);

        for _ in 0..10 {
            f.tick();
        }
        assert_eq!(f.session.phase(), PlaybackPhase::Stopped);
        assert_eq!(f.proxy_pose(), Some(Pose::at(100.0, 64.0, 0.0)));
        assert!(f.session.is_in_camera_mode());
        assert!(!f.filter.is_suppressed(f.observer));
        assert_eq!(f.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_cues_fire_once_and_text_expires() {
        let mut f = fixture();
        let mut timeline = path();
        timeline.add_text_cue(0, "Welcome", 200);
        timeline.add_command_cue(500, "say halfway");
        timeline.add_command_cue(1000, "say done");
        f.session.play(timeline).unwrap();

        f.tick();
        assert_eq!(f.host.observer(f.observer).unwrap().text.as_deref(), Some("Welcome"));
        for _ in 0..4 {
            f.tick();
        }
        assert_eq!(f.host.observer(f.observer).unwrap().text, None);

        for _ in 0..30 {
            f.tick();
        }
        assert_eq!(f.host.commands(), ["say halfway", "say done"]);
    }

    #[test]
    fn test_late_tick_fires_missed_cues_once() {
        let mut f = fixture();
        let mut timeline = path();
        for (ms, command) in [(100, "one"), (150, "two"), (200, "three"), (250, "four")] {
            timeline.add_command_cue(ms, command);
        }
        f.session.play(timeline).unwrap();

        f.tick();
        assert!(f.host.commands().is_empty());

        f.scheduler.skip_ticks(3);
        f.tick();
        assert_eq!(f.host.commands(), ["one", "two", "three", "four"]);
        assert!((f.proxy_pose().unwrap().x - 25.0).abs() < 1e-9);

        for _ in 0..30 {
            f.tick();
        }
        assert_eq!(f.host.commands(), ["one", "two", "three", "four"]);
        assert_eq!(f.session.phase(), PlaybackPhase::Stopped);
    }

    #[test]
    fn test_replay_restarts_from_zero() {
        let mut f = fixture();
        f.session.play(path()).unwrap();
        for _ in 0..15 {
            f.tick();
        }
        f.session.play(path()).unwrap();
        assert_eq!(f.scheduler.pending_of(TaskKind::PlaybackTick(f.observer)), 1);
        f.tick();
        let pose = f.proxy_pose().unwrap();
        assert!((pose.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_restores_observer() {
        let mut f = fixture();
        f.session.play(path()).unwrap();
        f.session.apply_camera_type(CameraType::Spectator);
        assert_eq!(f.host.observer(f.observer).unwrap().mode, ObserverMode::Spectator);
        for _ in 0..5 {
            f.tick();
        }

        f.session.stop();
        let state = f.host.observer(f.observer).unwrap();
        assert_eq!(state.view, ViewTarget::Own);
        assert!(state.proxies.is_empty());
        assert_eq!(state.pose, Pose::at(0.0, 64.0, 0.0));
        assert_eq!(state.mode, ObserverMode::Creative);
        assert!(!f.filter.is_suppressed(f.observer));
        assert_eq!(f.session.phase(), PlaybackPhase::Idle);
        assert_eq!(f.scheduler.pending_count(), 0);

        f.session.stop();
        assert_eq!(f.session.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_halt_keeps_camera_mode() {
        let mut f = fixture();
        f.session.play(path()).unwrap();
        f.tick();
        assert!(f.session.halt());
        assert!(!f.session.halt());
        assert_eq!(f.session.phase(), PlaybackPhase::Stopped);
        assert!(f.session.is_in_camera_mode());
        assert!(f.proxy_pose().is_some());
    }

    #[test]
    fn test_rejected_proxy_still_plays() {
        let mut f = fixture();
        f.host.set_reject_proxies(true);
        f.session.play(path()).unwrap();
        assert_eq!(f.session.view_mode(), ViewMode::DirectTeleport);
        for _ in 0..20 {
            f.tick();
        }
        assert_eq!(f.host.observer(f.observer).unwrap().pose, Pose::at(100.0, 64.0, 0.0));

        f.session.stop();
        assert_eq!(f.host.observer(f.observer).unwrap().pose, Pose::at(0.0, 64.0, 0.0));
    }

    #[test]
    fn test_offline_observer_cannot_enter() {
        let mut f = fixture();
        f.host.leave(f.observer);
        assert!(matches!(f.session.enter(), Err(CameraError::ObserverOffline(_))));
        assert_eq!(f.session.phase(), PlaybackPhase::Idle);
    }
}
