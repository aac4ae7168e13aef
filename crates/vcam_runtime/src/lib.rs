// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-observer camera playback.
//!
//! Drives [`vcam_sequencer::Timeline`]s on a fixed tick for each connected
//! observer:
//! - Tick scheduling with revocable task handles
//! - Decoupled viewpoints through proxy entities, with inbound movement
//!   suppression and a direct-teleport fallback
//! - Random-pool and sequence preset switching
//! - Preset and sequence storage with directory watching
//!
//! ## Architecture
//!
//! [`CameraService`] is the entry point. It owns one [`PlaybackSession`] per
//! observer and reaches the outside world only through a [`CameraHost`],
//! which the embedding server implements. [`HeadlessHost`] is an in-memory
//! implementation used by the `vcam_headless` binary and the tests.

pub mod config;
pub mod error;
pub mod headless;
pub mod host;
pub mod observer;
pub mod presets;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod switcher;
pub mod viewpoint;
pub mod watch;

pub use config::{ClockMode, RuntimeConfig, CONFIG_FILE_NAME, CONFIG_FORMAT_VERSION};
pub use error::{CameraError, HostError, StoreError, ViewpointError};
pub use headless::{HeadlessHost, ObserverState};
pub use host::{CameraHost, ViewTarget};
pub use observer::{ObserverId, ObserverMode};
pub use presets::{PresetStore, RecordKind, SaveOutcome};
pub use registry::SessionRegistry;
pub use scheduler::{DueTask, TaskHandle, TaskId, TaskKind, TickScheduler};
pub use service::CameraService;
pub use session::{PlaybackPhase, PlaybackSession};
pub use switcher::{SequenceStep, Switchers};
pub use viewpoint::{
    InboundFilter, InboundKind, InboundVerdict, ProxyHandle, ProxyIdAllocator, ViewMode,
    ViewpointController,
};
pub use watch::{PresetWatcher, RecordEvent};
