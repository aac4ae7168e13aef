// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named preset and sequence storage.
//!
//! Records live in memory behind read-write locks so lookups from the tick
//! loop stay safe while a reload runs elsewhere. Each record may also be
//! backed by one file, `<name>.ron` (or `<name>.json` when read), in the
//! preset or sequence directory. Memory stays authoritative: a failed save is
//! logged and the record remains usable.

use crate::config::RuntimeConfig;
use crate::error::StoreError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use vcam_sequencer::{PresetRecord, SequenceRecord, TimelineError};

/// Result of persisting a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written to this file
    Saved(PathBuf),
    /// The store has no directory for this kind of record
    InMemoryOnly,
    /// Writing failed; the record is kept in memory only
    Unpersisted(String),
}

impl SaveOutcome {
    /// Record reached disk
    pub fn is_persisted(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }
}

/// Which map a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Camera path preset
    Preset,
    /// Preset sequence
    Sequence,
}

trait StoredRecord: Sized {
    fn decode_ron(s: &str) -> Result<Self, TimelineError>;
    fn decode_json(s: &str) -> Result<Self, TimelineError>;
    fn encode(&self) -> Result<String, TimelineError>;
}

impl StoredRecord for PresetRecord {
    fn decode_ron(s: &str) -> Result<Self, TimelineError> {
        Self::from_ron(s)
    }

    fn decode_json(s: &str) -> Result<Self, TimelineError> {
        Self::from_json(s)
    }

    fn encode(&self) -> Result<String, TimelineError> {
        self.to_ron()
    }
}

impl StoredRecord for SequenceRecord {
    fn decode_ron(s: &str) -> Result<Self, TimelineError> {
        Self::from_ron(s)
    }

    fn decode_json(s: &str) -> Result<Self, TimelineError> {
        Self::from_json(s)
    }

    fn encode(&self) -> Result<String, TimelineError> {
        self.to_ron()
    }
}

/// Record name for a file, if it has a supported extension
fn record_name(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if ext != "ron" && ext != "json" {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

fn read_record<T: StoredRecord>(path: &Path) -> Result<T, StoreError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let content = std::fs::read_to_string(path)?;
    let decoded = match ext.as_str() {
        "ron" => T::decode_ron(&content),
        "json" => T::decode_json(&content),
        _ => return Err(StoreError::UnsupportedFormat(path.to_path_buf())),
    };
    decoded.map_err(|source| StoreError::Record {
        path: path.to_path_buf(),
        source,
    })
}

fn write_record<T: StoredRecord>(dir: &Path, name: &str, record: &T) -> Result<PathBuf, StoreError> {
    validate_name(name)?;
    let content = record.encode().map_err(|source| StoreError::Record {
        path: dir.join(name),
        source,
    })?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{name}.ron"));
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Check that `name` can be used as a file name
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Load every `.ron`/`.json` file in `dir` into `map`. Bad files are logged
/// and skipped.
fn load_into<T: StoredRecord>(dir: &Path, map: &RwLock<IndexMap<String, T>>) -> Result<usize, StoreError> {
    if !dir.is_dir() {
        tracing::info!("Record directory {:?} does not exist, skipping", dir);
        return Ok(0);
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut loaded = 0;
    for path in paths {
        let Some(name) = record_name(&path) else {
            continue;
        };
        match read_record::<T>(&path) {
            Ok(record) => {
                map.write().insert(name, record);
                loaded += 1;
            }
            Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
        }
    }
    Ok(loaded)
}

/// Thread-safe preset and sequence maps with optional file backing
#[derive(Debug, Default)]
pub struct PresetStore {
    presets: RwLock<IndexMap<String, PresetRecord>>,
    sequences: RwLock<IndexMap<String, SequenceRecord>>,
    preset_dir: Option<PathBuf>,
    sequence_dir: Option<PathBuf>,
}

impl PresetStore {
    /// Create a store backed by two directories
    pub fn new(preset_dir: impl Into<PathBuf>, sequence_dir: impl Into<PathBuf>) -> Self {
        Self {
            preset_dir: Some(preset_dir.into()),
            sequence_dir: Some(sequence_dir.into()),
            ..Default::default()
        }
    }

    /// Create a store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Create a store for the configured directories
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.preset_dir.clone(), config.sequence_dir.clone())
    }

    /// Preset directory, if any
    pub fn preset_dir(&self) -> Option<&Path> {
        self.preset_dir.as_deref()
    }

    /// Sequence directory, if any
    pub fn sequence_dir(&self) -> Option<&Path> {
        self.sequence_dir.as_deref()
    }

    /// Look up a preset
    pub fn get(&self, name: &str) -> Option<PresetRecord> {
        self.presets.read().get(name).cloned()
    }

    /// Preset exists
    pub fn contains(&self, name: &str) -> bool {
        self.presets.read().contains_key(name)
    }

    /// Preset names in load order
    pub fn names(&self) -> Vec<String> {
        self.presets.read().keys().cloned().collect()
    }

    /// Number of presets
    pub fn len(&self) -> usize {
        self.presets.read().len()
    }

    /// No presets
    pub fn is_empty(&self) -> bool {
        self.presets.read().is_empty()
    }

    /// Add or replace a preset in memory
    pub fn insert(&self, name: impl Into<String>, record: PresetRecord) {
        self.presets.write().insert(name.into(), record);
    }

    /// Remove a preset, its file, and every sequence entry that plays it.
    /// Returns `false` if there was no such preset.
    pub fn remove(&self, name: &str) -> bool {
        if self.presets.write().shift_remove(name).is_none() {
            return false;
        }

        let mut touched = Vec::new();
        for (seq_name, sequence) in self.sequences.write().iter_mut() {
            if sequence.remove_preset(name) > 0 {
                touched.push(seq_name.clone());
            }
        }
        for seq_name in touched {
            self.persist_sequence(&seq_name);
        }

        if let Some(dir) = &self.preset_dir {
            for ext in ["ron", "json"] {
                let path = dir.join(format!("{name}.{ext}"));
                if path.exists() {
                    if let Err(e) = std::fs::remove_file(&path) {
                        tracing::error!("Failed to delete {:?}: {}", path, e);
                    }
                }
            }
        }
        tracing::info!("Deleted preset {}", name);
        true
    }

    /// Look up a sequence
    pub fn sequence(&self, name: &str) -> Option<SequenceRecord> {
        self.sequences.read().get(name).cloned()
    }

    /// Sequence names in load order
    pub fn sequence_names(&self) -> Vec<String> {
        self.sequences.read().keys().cloned().collect()
    }

    /// Add or replace a sequence in memory
    pub fn insert_sequence(&self, name: impl Into<String>, record: SequenceRecord) {
        self.sequences.write().insert(name.into(), record);
    }

    /// Store a preset and write it to disk
    pub fn save_preset(&self, name: &str, record: PresetRecord) -> SaveOutcome {
        self.insert(name, record);
        self.persist_preset(name)
    }

    /// Store a sequence and write it to disk
    pub fn save_sequence(&self, name: &str, record: SequenceRecord) -> SaveOutcome {
        self.insert_sequence(name, record);
        self.persist_sequence(name)
    }

    fn persist_preset(&self, name: &str) -> SaveOutcome {
        let Some(dir) = &self.preset_dir else {
            return SaveOutcome::InMemoryOnly;
        };
        let Some(record) = self.get(name) else {
            return SaveOutcome::Unpersisted(format!("no preset named {name}"));
        };
        Self::outcome(write_record(dir, name, &record), "preset", name)
    }

    fn persist_sequence(&self, name: &str) -> SaveOutcome {
        let Some(dir) = &self.sequence_dir else {
            return SaveOutcome::InMemoryOnly;
        };
        let Some(record) = self.sequence(name) else {
            return SaveOutcome::Unpersisted(format!("no sequence named {name}"));
        };
        Self::outcome(write_record(dir, name, &record), "sequence", name)
    }

    fn outcome(result: Result<PathBuf, StoreError>, what: &str, name: &str) -> SaveOutcome {
        match result {
            Ok(path) => {
                tracing::info!("Saved {} {} to {:?}", what, name, path);
                SaveOutcome::Saved(path)
            }
            Err(e) => {
                tracing::error!("Failed to save {} {}: {}", what, name, e);
                SaveOutcome::Unpersisted(e.to_string())
            }
        }
    }

    /// Load every record from both directories. Returns the number loaded.
    pub fn load_dir(&self) -> Result<usize, StoreError> {
        let mut loaded = 0;
        if let Some(dir) = &self.preset_dir {
            loaded += load_into(dir, &self.presets)?;
        }
        if let Some(dir) = &self.sequence_dir {
            loaded += load_into(dir, &self.sequences)?;
        }
        tracing::info!(
            "Loaded {} presets and {} sequences",
            self.len(),
            self.sequences.read().len()
        );
        Ok(loaded)
    }

    /// Which kind of record a path in one of the store's directories holds
    pub fn kind_of(&self, path: &Path) -> Option<RecordKind> {
        let parent = path.parent()?;
        if self.preset_dir.as_deref().is_some_and(|d| same_dir(parent, d)) {
            Some(RecordKind::Preset)
        } else if self.sequence_dir.as_deref().is_some_and(|d| same_dir(parent, d)) {
            Some(RecordKind::Sequence)
        } else {
            None
        }
    }

    /// Bring one file's record in line with the disk: reload it if the file
    /// exists, drop it if not. Returns the affected record name, or `None` for
    /// paths the store does not track.
    pub fn reload_path(&self, path: &Path) -> Result<Option<String>, StoreError> {
        let (Some(kind), Some(name)) = (self.kind_of(path), record_name(path)) else {
            return Ok(None);
        };

        if !path.exists() {
            let removed = match kind {
                RecordKind::Preset => self.presets.write().shift_remove(&name).is_some(),
                RecordKind::Sequence => self.sequences.write().shift_remove(&name).is_some(),
            };
            if removed {
                tracing::debug!("Dropped {:?} {} after its file was removed", kind, name);
            }
            return Ok(Some(name));
        }

        match kind {
            RecordKind::Preset => {
                let record = read_record::<PresetRecord>(path)?;
                self.presets.write().insert(name.clone(), record);
            }
            RecordKind::Sequence => {
                let record = read_record::<SequenceRecord>(path)?;
                self.sequences.write().insert(name.clone(), record);
            }
        }
        tracing::debug!("Reloaded {:?} {}", kind, name);
        Ok(Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcam_sequencer::{CameraType, Pose};

    fn temp_store() -> (PathBuf, PresetStore) {
        let root = std::env::temp_dir().join(format!("vcam-store-{}", uuid::Uuid::new_v4()));
        let store = PresetStore::new(root.join("presets"), root.join("sequences"));
        (root, store)
    }

    fn record() -> PresetRecord {
        PresetRecord {
            camera_type: CameraType::Cinematic,
            positions: vec![Pose::at(0.0, 64.0, 0.0), Pose::at(10.0, 64.0, 0.0)],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("intro_shot-2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../escape").is_err());
        assert!(validate_name("with space").is_err());
    }

    #[test]
    fn test_in_memory_save() {
        let store = PresetStore::in_memory();
        assert_eq!(store.save_preset("intro", record()), SaveOutcome::InMemoryOnly);
        assert_eq!(store.get("intro"), Some(record()));
        assert_eq!(store.names(), ["intro"]);
    }

    #[test]
    fn test_remove_strips_sequences() {
        let store = PresetStore::in_memory();
        store.insert("a", record());
        store.insert("b", record());
        let mut sequence = SequenceRecord::default();
        sequence.push("a", 2.0);
        sequence.push("b", 2.0);
        sequence.push("a", 1.0);
        store.insert_sequence("tour", sequence);

        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        let tour = store.sequence("tour").unwrap();
        assert_eq!(tour.entries.len(), 1);
        assert_eq!(tour.entries[0].preset, "b");
    }

    #[test]
    fn test_save_then_load() {
        let (root, store) = temp_store();
        let outcome = store.save_preset("intro", record());
        assert!(outcome.is_persisted());
        let mut sequence = SequenceRecord::default();
        sequence.push("intro", 5.0);
        assert!(store.save_sequence("tour", sequence.clone()).is_persisted());

        let fresh = PresetStore::new(root.join("presets"), root.join("sequences"));
        assert_eq!(fresh.load_dir().unwrap(), 2);
        assert_eq!(fresh.get("intro"), Some(record()));
        assert_eq!(fresh.sequence("tour"), Some(sequence));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_load_skips_bad_files_and_reads_json() {
        let (root, store) = temp_store();
        let dir = root.join("presets");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.ron"), "(positions: [").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        std::fs::write(
            dir.join("flat.json"),
            r#"{"positions": [{"x": 1.0, "y": 2.0, "z": 3.0}], "camera_type": "fixed"}"#,
        )
        .unwrap();

        assert_eq!(store.load_dir().unwrap(), 1);
        let flat = store.get("flat").unwrap();
        assert_eq!(flat.camera_type, CameraType::Fixed);
        assert_eq!(flat.positions, [Pose::at(1.0, 2.0, 3.0)]);
        assert!(!store.contains("broken"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_reload_path_tracks_disk() {
        let (root, store) = temp_store();
        let SaveOutcome::Saved(path) = store.save_preset("intro", record()) else {
            panic!("preset was not written");
        };

        let mut changed = record();
        changed.camera_type = CameraType::Orbit;
        std::fs::write(&path, changed.to_ron().unwrap()).unwrap();
        assert_eq!(store.reload_path(&path).unwrap().as_deref(), Some("intro"));
        assert_eq!(store.get("intro").unwrap().camera_type, CameraType::Orbit);

        std::fs::remove_file(&path).unwrap();
        store.reload_path(&path).unwrap();
        assert!(!store.contains("intro"));

        assert_eq!(store.reload_path(Path::new("/elsewhere/intro.ron")).unwrap(), None);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_missing_directory_loads_nothing() {
        let (_root, store) = temp_store();
        assert_eq!(store.load_dir().unwrap(), 0);
        assert!(store.is_empty());
    }
}
