// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for camera playback.

use crate::observer::ObserverId;
use std::path::PathBuf;
use vcam_sequencer::TimelineError;

/// Failure reported by the host protocol layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The client link refused the operation
    #[error("Rejected by client link: {0}")]
    Rejected(String),

    /// The observer is not connected
    #[error("Observer not connected: {0}")]
    ObserverOffline(ObserverId),
}

/// Failure to set up the decoupled view
#[derive(Debug, thiserror::Error)]
pub enum ViewpointError {
    /// Proxy announce or view redirect was rejected; the controller fell back
    /// to moving the observer directly
    #[error("View proxy rejected, using direct teleport: {0}")]
    ProxyRejected(#[from] HostError),
}

/// Error type for camera operations
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// No preset with this name
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// No sequence with this name
    #[error("Unknown sequence: {0}")]
    UnknownSequence(String),

    /// None of the requested presets exist
    #[error("No usable presets in pool")]
    EmptyPool,

    /// The observer is not connected
    #[error("Observer not connected: {0}")]
    ObserverOffline(ObserverId),

    /// Timeline validation failed
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),
}

/// Error type for preset storage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A record file could not be decoded
    #[error("Invalid record {path:?}: {source}")]
    Record {
        /// File that failed
        path: PathBuf,
        /// Decode error
        source: TimelineError,
    },

    /// File extension is neither `ron` nor `json`
    #[error("Unsupported record format: {0:?}")]
    UnsupportedFormat(PathBuf),

    /// Name cannot be used as a file name
    #[error("Invalid record name: {0}")]
    InvalidName(String),
}
