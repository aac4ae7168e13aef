// SPDX-License-Identifier: MIT OR Apache-2.0
//! Multi-segment camera paths with time-stamped cues.

use crate::cue::{CommandCue, CueWindow, TextCue};
use crate::error::TimelineError;
use crate::interpolation::{Interpolation, TransitionCurve};
use crate::pose::Pose;
use std::collections::BTreeMap;

/// Duration given to a segment created by [`Timeline::add_keyframe`]
pub const DEFAULT_SEGMENT_MS: u64 = 3000;

/// The interpolated span between two consecutive keyframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Easing curve for this span
    pub curve: TransitionCurve,
    /// Span length in milliseconds; 0 is an instant jump
    pub duration_ms: u64,
}

impl Segment {
    /// Create a new segment
    pub fn new(curve: TransitionCurve, duration_ms: u64) -> Self {
        Self { curve, duration_ms }
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::new(TransitionCurve::Smooth, DEFAULT_SEGMENT_MS)
    }
}

/// Ordered keyframes, one [`Segment`] per adjacent pair, and cues keyed by
/// trigger delay.
///
/// The total duration is derived from segments and cues on every query and is
/// never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    keyframes: Vec<Pose>,
    segments: Vec<Segment>,
    texts: BTreeMap<u64, Vec<TextCue>>,
    commands: BTreeMap<u64, Vec<CommandCue>>,
}

impl Timeline {
    /// Create an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a timeline from keyframes joined by default segments
    pub fn from_keyframes(keyframes: impl IntoIterator<Item = Pose>) -> Self {
        let mut timeline = Self::new();
        for pose in keyframes {
            timeline.add_keyframe(pose);
        }
        timeline
    }

    /// Append a keyframe. Every keyframe after the first opens a default segment.
    pub fn add_keyframe(&mut self, pose: Pose) {
        self.keyframes.push(pose);
        if self.keyframes.len() > 1 {
            self.segments.push(Segment::default());
        }
    }

    /// Overwrite the curve and duration of one segment
    pub fn set_segment(
        &mut self,
        index: usize,
        curve: TransitionCurve,
        duration_ms: u64,
    ) -> Result<(), TimelineError> {
        let count = self.segments.len();
        let segment = self
            .segments
            .get_mut(index)
            .ok_or(TimelineError::SegmentOutOfRange { index, count })?;
        *segment = Segment::new(curve, duration_ms);
        Ok(())
    }

    /// Like [`Timeline::set_segment`], with a positive duration in seconds.
    ///
    /// Fractions of a millisecond are truncated.
    pub fn set_segment_secs(
        &mut self,
        index: usize,
        curve: TransitionCurve,
        seconds: f64,
    ) -> Result<(), TimelineError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(TimelineError::InvalidDuration(seconds));
        }
        self.set_segment(index, curve, (seconds * 1000.0) as u64)
    }

    /// Add a text cue
    pub fn add_text_cue(&mut self, delay_ms: u64, text: impl Into<String>, duration_ms: u64) {
        self.push_text(TextCue::new(text, delay_ms, duration_ms));
    }

    /// Add a command cue
    pub fn add_command_cue(&mut self, delay_ms: u64, command: impl Into<String>) {
        self.push_command(CommandCue::new(command, delay_ms));
    }

    pub(crate) fn push_text(&mut self, cue: TextCue) {
        self.texts.entry(cue.delay_ms).or_default().push(cue);
    }

    pub(crate) fn push_command(&mut self, cue: CommandCue) {
        self.commands.entry(cue.delay_ms).or_default().push(cue);
    }

    /// Keyframes in path order
    pub fn keyframes(&self) -> &[Pose] {
        &self.keyframes
    }

    /// Number of keyframes
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Segments in path order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Text cues ordered by delay
    pub fn text_cues(&self) -> impl Iterator<Item = &TextCue> {
        self.texts.values().flatten()
    }

    /// Command cues ordered by delay
    pub fn command_cues(&self) -> impl Iterator<Item = &CommandCue> {
        self.commands.values().flatten()
    }

    /// Total number of cues of both kinds
    pub fn cue_count(&self) -> usize {
        self.text_cues().count() + self.command_cues().count()
    }

    /// No keyframes and no cues
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty() && self.texts.is_empty() && self.commands.is_empty()
    }

    /// Sum of segment durations
    pub fn path_duration_ms(&self) -> u64 {
        self.segments
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.duration_ms))
    }

    /// Path length or the latest cue end, whichever is later
    pub fn total_duration_ms(&self) -> u64 {
        let text_end = self.text_cues().map(TextCue::end_ms).max().unwrap_or(0);
        let command_end = self.commands.keys().next_back().copied().unwrap_or(0);
        self.path_duration_ms().max(text_end).max(command_end)
    }

    /// Pose at `elapsed_ms` after playback start.
    ///
    /// Returns `None` without keyframes and the single keyframe when there is
    /// only one. Past the total duration the last keyframe is returned; the
    /// timeline never loops.
    pub fn pose_at(&self, elapsed_ms: u64) -> Option<Pose> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        if self.segments.is_empty() {
            return Some(*first);
        }
        if elapsed_ms >= self.total_duration_ms() {
            return Some(*last);
        }

        let final_index = self.segments.len() - 1;
        let mut accumulated = 0u64;
        for (i, segment) in self.segments.iter().enumerate() {
            let end = accumulated.saturating_add(segment.duration_ms);
            // The final segment also absorbs time spent waiting on trailing cues.
            if elapsed_ms < end || i == final_index {
                let progress = if segment.duration_ms == 0 {
                    1.0
                } else {
                    ((elapsed_ms - accumulated) as f64 / segment.duration_ms as f64).min(1.0)
                };
                return Some(Interpolation::interpolate(
                    &self.keyframes[i],
                    &self.keyframes[i + 1],
                    progress,
                    segment.curve,
                ));
            }
            accumulated = end;
        }

        Some(*last)
    }

    /// Cues whose delay lies in `[elapsed_ms, elapsed_ms + delta_ms)`.
    ///
    /// Consecutive windows that share a boundary never return the same cue, so
    /// a tick-by-tick sweep with `delta_ms` equal to the tick period fires each
    /// cue exactly once.
    pub fn cues_in_window(&self, elapsed_ms: u64, delta_ms: u64) -> CueWindow<'_> {
        let window = elapsed_ms..elapsed_ms.saturating_add(delta_ms);
        CueWindow {
            texts: self.texts.range(window.clone()).flat_map(|(_, v)| v).collect(),
            commands: self.commands.range(window).flat_map(|(_, v)| v).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn k0() -> Pose {
        Pose::new(0.0, 64.0, 0.0, 0.0, 0.0)
    }

    fn k1() -> Pose {
        Pose::new(10.0, 70.0, -20.0, 90.0, 10.0)
    }

    fn k2() -> Pose {
        Pose::new(40.0, 60.0, 5.0, 180.0, -20.0)
    }

    fn linear_path() -> Timeline {
        let mut timeline = Timeline::from_keyframes([k0(), k1(), k2()]);
        timeline.set_segment(0, TransitionCurve::Linear, 1000).unwrap();
        timeline.set_segment(1, TransitionCurve::Linear, 2000).unwrap();
        timeline
    }

    #[test]
    fn test_default_segments() {
        let timeline = Timeline::from_keyframes([k0(), k1(), k2()]);
        assert_eq!(timeline.segments().len(), 2);
        assert_eq!(timeline.segments()[0], Segment::default());
        assert_eq!(timeline.total_duration_ms(), 2 * DEFAULT_SEGMENT_MS);
    }

    #[test]
    fn test_pose_at_linear_path() {
        let timeline = linear_path();
        assert_eq!(timeline.total_duration_ms(), 3000);
        assert_eq!(
            timeline.pose_at(500),
            Some(Interpolation::lerp_pose(&k0(), &k1(), 0.5))
        );
        assert_eq!(timeline.pose_at(1000), Some(k1()));
        assert_eq!(
            timeline.pose_at(2000),
            Some(Interpolation::lerp_pose(&k1(), &k2(), 0.5))
        );
        assert_eq!(timeline.pose_at(3000), Some(k2()));
        assert_eq!(timeline.pose_at(5000), Some(k2()));
        assert_eq!(timeline.pose_at(0), Some(k0()));
    }

    #[test]
    fn test_pose_at_without_segments() {
        assert_eq!(Timeline::new().pose_at(0), None);

        let single = Timeline::from_keyframes([k1()]);
        for elapsed in [0, 1, 50, 3000, u64::MAX] {
            assert_eq!(single.pose_at(elapsed), Some(k1()));
        }
    }

    #[test]
    fn test_pose_at_clamps_to_last_keyframe() {
        for count in 2..6 {
            let keyframes: Vec<Pose> = (0..count).map(|i| Pose::at(f64::from(i), 0.0, 0.0)).collect();
            let timeline = Timeline::from_keyframes(keyframes.clone());
            let total = timeline.total_duration_ms();
            for elapsed in [total, total + 1, total * 10] {
                assert_eq!(timeline.pose_at(elapsed), keyframes.last().copied());
            }
        }
    }

    #[test]
    fn test_zero_duration_segment_jumps() {
        let mut timeline = Timeline::from_keyframes([k0(), k1(), k2()]);
        timeline.set_segment(0, TransitionCurve::Linear, 0).unwrap();
        timeline.set_segment(1, TransitionCurve::Linear, 1000).unwrap();
        assert_eq!(timeline.pose_at(0), Some(k1()));

        let mut instant = Timeline::from_keyframes([k0(), k1()]);
        instant.set_segment(0, TransitionCurve::Smooth, 0).unwrap();
        assert_eq!(instant.total_duration_ms(), 0);
        assert_eq!(instant.pose_at(0), Some(k1()));
    }

    #[test]
    fn test_trailing_cue_holds_last_keyframe() {
        let mut timeline = linear_path();
        timeline.add_command_cue(4500, "say done");
        assert_eq!(timeline.total_duration_ms(), 4500);
        assert_eq!(timeline.pose_at(3500), Some(k2()));
        assert_eq!(timeline.pose_at(4499), Some(k2()));
    }

    #[test]
    fn test_set_segment_out_of_range() {
        let mut timeline = Timeline::from_keyframes([k0(), k1()]);
        let err = timeline.set_segment(1, TransitionCurve::Linear, 10).unwrap_err();
        assert!(matches!(err, TimelineError::SegmentOutOfRange { index: 1, count: 1 }));
        assert_eq!(timeline.segments()[0], Segment::default());
    }

    #[test]
    fn test_set_segment_secs_rejects_non_positive() {
        let mut timeline = Timeline::from_keyframes([k0(), k1()]);
        assert!(matches!(
            timeline.set_segment_secs(0, TransitionCurve::Linear, 0.0),
            Err(TimelineError::InvalidDuration(_))
        ));
        assert!(timeline.set_segment_secs(0, TransitionCurve::Linear, f64::NAN).is_err());
        timeline.set_segment_secs(0, TransitionCurve::Bounce, 1.5).unwrap();
        assert_eq!(timeline.segments()[0], Segment::new(TransitionCurve::Bounce, 1500));
    }

    #[test]
    fn test_cues_extend_total_duration() {
        let mut timeline = linear_path();
        timeline.add_text_cue(2500, "Welcome", 1000);
        assert_eq!(timeline.total_duration_ms(), 3500);
        timeline.add_command_cue(3200, "time set day");
        assert_eq!(timeline.total_duration_ms(), 3500);
        timeline.set_segment(1, TransitionCurve::Linear, 5000).unwrap();
        assert_eq!(timeline.total_duration_ms(), 6000);
    }

    #[test]
    fn test_cue_window_is_half_open() {
        let mut timeline = linear_path();
        timeline.add_text_cue(100, "a", 0);
        timeline.add_command_cue(150, "b");
        let window = timeline.cues_in_window(100, 50);
        assert_eq!(window.texts.len(), 1);
        assert!(window.commands.is_empty());
        assert_eq!(timeline.cues_in_window(150, 50).commands.len(), 1);
        assert!(timeline.cues_in_window(0, 0).is_empty());
    }

    #[test]
    fn test_tick_sweep_fires_each_cue_once() {
        const TICK_MS: u64 = 50;
        let mut timeline = linear_path();
        for delay in [0, 1, 49, 50, 51, 999, 1000, 2999, 3000] {
            timeline.add_command_cue(delay, format!("cmd {delay}"));
        }
        timeline.add_text_cue(0, "same delay as a command", 700);
        timeline.add_text_cue(1234, "late", 2000);
        let total = timeline.total_duration_ms();

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut elapsed = 0;
        while elapsed <= total {
            let window = timeline.cues_in_window(elapsed, TICK_MS);
            for cue in window.commands {
                *seen.entry(cue.command.clone()).or_default() += 1;
            }
            for cue in window.texts {
                *seen.entry(cue.text.clone()).or_default() += 1;
            }
            elapsed += TICK_MS;
        }

        assert_eq!(seen.len(), timeline.cue_count());
        assert!(seen.values().all(|&count| count == 1));
    }

    #[test]
    fn test_duplicate_delays_are_kept() {
        let mut timeline = Timeline::new();
        timeline.add_command_cue(200, "first");
        timeline.add_command_cue(200, "second");
        let window = timeline.cues_in_window(200, 1);
        let commands: Vec<&str> = window.commands.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(commands, ["first", "second"]);
    }
}
