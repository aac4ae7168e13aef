// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised while building or decoding timelines.

/// Error type for timeline construction and preset records
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// Segment index does not name an existing segment
    #[error("Segment index {index} out of range (timeline has {count} segments)")]
    SegmentOutOfRange {
        /// Requested index
        index: usize,
        /// Number of segments in the timeline
        count: usize,
    },

    /// Duration is negative, zero where a positive value is required, or not finite
    #[error("Invalid duration: {0}")]
    InvalidDuration(f64),

    /// Path has no keyframes
    #[error("Camera path has no keyframes")]
    EmptyPath,

    /// RON parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
