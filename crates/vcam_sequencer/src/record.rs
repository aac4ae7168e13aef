// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted preset and sequence records.
//!
//! A [`PresetRecord`] is the on-disk shape of one named camera path. It is
//! converted to a [`Timeline`] for playback and built back from one when a
//! path is saved.

use crate::cue::{CommandCue, TextCue};
use crate::error::TimelineError;
use crate::interpolation::TransitionCurve;
use crate::pose::Pose;
use crate::timeline::Timeline;
use serde::{Deserialize, Serialize};

/// Camera class tag stored with each preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraType {
    /// Position and angle never change
    Fixed,
    /// Follows a target from above
    Follow,
    /// Circles a target
    Orbit,
    /// Through the eyes of a target
    FirstPerson,
    /// Behind a target
    ThirdPerson,
    /// Plain path playback
    #[default]
    Normal,
    /// Observer is put in spectator mode while the camera runs
    Spectator,
    /// Film recording
    Cinematic,
}

/// Curve and duration for one segment, addressed by index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Segment index (0 = between keyframes 0 and 1)
    pub index: usize,
    /// Easing curve
    pub curve: TransitionCurve,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// One named camera path as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetRecord {
    /// Camera class tag
    #[serde(default)]
    pub camera_type: CameraType,
    /// Keyframes in path order
    pub positions: Vec<Pose>,
    /// Per-segment overrides; segments not listed keep the defaults
    #[serde(default)]
    pub segments: Vec<SegmentRecord>,
    /// Command cues
    #[serde(default)]
    pub commands: Vec<CommandCue>,
    /// Text cues
    #[serde(default)]
    pub texts: Vec<TextCue>,
}

impl PresetRecord {
    /// Capture a timeline as a record
    pub fn from_timeline(timeline: &Timeline, camera_type: CameraType) -> Self {
        Self {
            camera_type,
            positions: timeline.keyframes().to_vec(),
            segments: timeline
                .segments()
                .iter()
                .enumerate()
                .map(|(index, s)| SegmentRecord {
                    index,
                    curve: s.curve,
                    duration_ms: s.duration_ms,
                })
                .collect(),
            commands: timeline.command_cues().cloned().collect(),
            texts: timeline.text_cues().cloned().collect(),
        }
    }

    /// Rebuild the timeline this record describes.
    ///
    /// Fails with [`TimelineError::EmptyPath`] when there are no positions and
    /// with [`TimelineError::SegmentOutOfRange`] when a segment entry points past
    /// the path.
    pub fn to_timeline(&self) -> Result<Timeline, TimelineError> {
        if self.positions.is_empty() {
            return Err(TimelineError::EmptyPath);
        }

        let mut timeline = Timeline::from_keyframes(self.positions.iter().copied());
        for segment in &self.segments {
            timeline.set_segment(segment.index, segment.curve, segment.duration_ms)?;
        }
        for cue in &self.commands {
            timeline.push_command(cue.clone());
        }
        for cue in &self.texts {
            timeline.push_text(cue.clone());
        }
        Ok(timeline)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, TimelineError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Deserialize from RON
    pub fn from_ron(s: &str) -> Result<Self, TimelineError> {
        Ok(ron::from_str(s)?)
    }

    /// Deserialize from JSON
    pub fn from_json(s: &str) -> Result<Self, TimelineError> {
        Ok(serde_json::from_str(s)?)
    }
}

/// One step of a named sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEntry {
    /// Preset to play
    pub preset: String,
    /// How long to stay on this preset before moving on, in seconds
    pub duration_secs: f64,
}

/// Named, ordered list of presets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// Steps in play order
    pub entries: Vec<SequenceEntry>,
    /// Start over after the last entry
    #[serde(default)]
    pub looping: bool,
}

impl SequenceRecord {
    /// Append an entry
    pub fn push(&mut self, preset: impl Into<String>, duration_secs: f64) {
        self.entries.push(SequenceEntry {
            preset: preset.into(),
            duration_secs,
        });
    }

    /// Drop every entry that plays `preset`
    pub fn remove_preset(&mut self, preset: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.preset != preset);
        before - self.entries.len()
    }

    /// Sum of entry durations in seconds
    pub fn total_secs(&self) -> f64 {
        self.entries.iter().map(|e| e.duration_secs).sum()
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, TimelineError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Deserialize from RON
    pub fn from_ron(s: &str) -> Result<Self, TimelineError> {
        Ok(ron::from_str(s)?)
    }

    /// Deserialize from JSON
    pub fn from_json(s: &str) -> Result<Self, TimelineError> {
        Ok(serde_json::from_str(s)?)
    }
}
