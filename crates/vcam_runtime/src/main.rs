// SPDX-License-Identifier: MIT OR Apache-2.0
//! `vcam_headless` - runs camera playback against an in-memory host.
//!
//! Usage: `vcam_headless [CONFIG] [PRESET_OR_SEQUENCE]`
//!
//! Loads the configuration (default `vcam.ron`), loads presets and sequences
//! from the configured directories, joins one simulated observer and plays
//! the named preset or sequence, or the first preset found, until it ends.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use vcam_runtime::{
    CameraService, HeadlessHost, ObserverId, PresetStore, PresetWatcher, RuntimeConfig,
    CONFIG_FILE_NAME,
};
use vcam_sequencer::Pose;

fn main() {
    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map_or_else(|| PathBuf::from(CONFIG_FILE_NAME), PathBuf::from);
    let target = args.next();

    let config = match RuntimeConfig::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid config {}: {e}", config_path.display());
            std::process::exit(2);
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting vcam_headless v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config, target) {
        tracing::error!("vcam_headless failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: &RuntimeConfig, target: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(PresetStore::from_config(config));
    store.load_dir()?;
    tracing::info!(
        "Loaded {} presets and sequences {:?}",
        store.len(),
        store.sequence_names()
    );

    let watcher = if config.watch_presets {
        match PresetWatcher::for_store(&store, config.watch_debounce()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!("Preset watching disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let host = Arc::new(HeadlessHost::new());
    let mut service = CameraService::new(config, host.clone(), store.clone());
    host.set_inbound_filter(service.inbound_filter());

    let observer = ObserverId::new();
    host.join(observer, Pose::at(0.0, 64.0, 0.0));
    service.on_join(observer);

    let Some(name) = target.or_else(|| store.names().into_iter().next()) else {
        tracing::info!("No presets in {:?}, nothing to play", config.preset_dir);
        return Ok(());
    };
    if store.contains(&name) {
        service.try_play_preset(observer, &name)?;
    } else {
        service.try_play_sequence(observer, &name)?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(async {
        let mut interval = tokio::time::interval(config.tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while service.is_playing(observer) || service.sequence_index(observer).is_some() {
            interval.tick().await;
            service.tick();
            if let Some(watcher) = &watcher {
                for name in watcher.apply(&store) {
                    tracing::info!("Preset {} changed on disk", name);
                }
            }
        }
    });

    if let Some(state) = host.observer(observer) {
        tracing::info!(
            "Finished {} at {:?} after {} ticks, {} commands dispatched",
            name,
            state.proxies.values().last().copied().unwrap_or(state.pose),
            service.scheduler().current_tick(),
            host.commands().len()
        );
    }
    service.cleanup_all();
    Ok(())
}
