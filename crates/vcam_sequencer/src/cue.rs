// SPDX-License-Identifier: MIT OR Apache-2.0
//! Time-triggered cues that run alongside the camera path.

use serde::{Deserialize, Serialize};

/// Text shown to the observer, then cleared after `duration_ms`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextCue {
    /// Text payload, may contain `&` colour codes
    pub text: String,
    /// Trigger delay from playback start, in milliseconds
    pub delay_ms: u64,
    /// How long the text stays up, in milliseconds (0 = until replaced)
    #[serde(default)]
    pub duration_ms: u64,
}

impl TextCue {
    /// Create a new text cue
    pub fn new(text: impl Into<String>, delay_ms: u64, duration_ms: u64) -> Self {
        Self {
            text: text.into(),
            delay_ms,
            duration_ms,
        }
    }

    /// Time at which the text is cleared
    pub fn end_ms(&self) -> u64 {
        self.delay_ms.saturating_add(self.duration_ms)
    }
}

/// Command dispatched with console authority
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandCue {
    /// Command line, without the leading slash
    pub command: String,
    /// Trigger delay from playback start, in milliseconds
    pub delay_ms: u64,
}

impl CommandCue {
    /// Create a new command cue
    pub fn new(command: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            command: command.into(),
            delay_ms,
        }
    }
}

/// Cues whose trigger delay falls inside one query window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueWindow<'a> {
    /// Text cues, ordered by delay then insertion
    pub texts: Vec<&'a TextCue>,
    /// Command cues, ordered by delay then insertion
    pub commands: Vec<&'a CommandCue>,
}

impl CueWindow<'_> {
    /// No cues in this window
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty() && self.commands.is_empty()
    }

    /// Total number of cues
    pub fn len(&self) -> usize {
        self.texts.len() + self.commands.len()
    }
}
