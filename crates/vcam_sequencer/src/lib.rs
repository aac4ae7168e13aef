// SPDX-License-Identifier: MIT OR Apache-2.0
//! Camera path timelines for vcam.
//!
//! This crate holds the pure motion layer:
//! - Poses and shortest-arc angle blending
//! - Easing curves per path segment
//! - Timelines of keyframes, segments and time-stamped cues
//! - Preset and sequence records as stored on disk
//!
//! Nothing here schedules or performs I/O; the runtime crate drives a
//! [`Timeline`] once per tick and applies what it returns.

pub mod cue;
pub mod error;
pub mod interpolation;
pub mod pose;
pub mod record;
pub mod timeline;

pub use cue::{CommandCue, CueWindow, TextCue};
pub use error::TimelineError;
pub use interpolation::{evaluate, Interpolation, TransitionCurve, UnknownCurve};
pub use pose::Pose;
pub use record::{CameraType, PresetRecord, SegmentRecord, SequenceEntry, SequenceRecord};
pub use timeline::{Segment, Timeline, DEFAULT_SEGMENT_MS};
