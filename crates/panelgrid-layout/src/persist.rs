//! Persisted layout records, storage backends, and the store adapter.
//!
//! A workspace layout is saved as a versioned JSON [`LayoutRecord`]:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "panels": [{"id": "mixer", "x": 0, "y": 0, "w": 6, "h": 6}],
//!   "attachments": [{"child": "eq", "parent": "mixer", "edge": "bottom"}]
//! }
//! ```
//!
//! Unknown fields are ignored. The legacy format, a bare array of
//! placements keyed by `i` or `id`, is migrated on load. Records newer than
//! [`LAYOUT_RECORD_SCHEMA_VERSION`] are refused.
//!
//! Where the JSON lives is a [`LayoutStorage`] concern; [`MemoryStorage`]
//! and [`FileStorage`] are provided.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use panelgrid_core::geometry::CellRect;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::attach::{Attachment, AttachmentGraph};
use crate::error::PersistError;
use crate::grid::{GridLimits, place_without_collision};
use crate::panel::{PanelPlacement, PanelRegistry, WorkspaceId};
use crate::store::{ChangeCause, LayoutChange, LayoutStore, Subscription, WorkspaceLayout};

/// Current layout record schema version.
pub const LAYOUT_RECORD_SCHEMA_VERSION: u16 = 1;

/// Serialized form of one workspace layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRecord {
    #[serde(default = "current_schema_version")]
    pub schema_version: u16,
    #[serde(default)]
    pub panels: Vec<PanelPlacement>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

fn current_schema_version() -> u16 {
    LAYOUT_RECORD_SCHEMA_VERSION
}

impl LayoutRecord {
    #[must_use]
    pub fn new(panels: Vec<PanelPlacement>, attachments: Vec<Attachment>) -> Self {
        Self {
            schema_version: LAYOUT_RECORD_SCHEMA_VERSION,
            panels,
            attachments,
        }
    }

    #[must_use]
    pub fn from_layout(layout: &WorkspaceLayout) -> Self {
        Self::new(layout.placements.clone(), layout.attachments.to_vec())
    }
}

/// A decoded record together with the version it was stored as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    pub record: LayoutRecord,
    pub from_version: u16,
    pub to_version: u16,
    pub notes: Vec<String>,
}

/// Decode a stored payload, migrating older formats.
pub fn decode_record(payload: &str) -> Result<MigrationResult, PersistError> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    if value.is_array() {
        let panels: Vec<PanelPlacement> = serde_json::from_value(value)?;
        return Ok(MigrationResult {
            record: LayoutRecord::new(panels, Vec::new()),
            from_version: 0,
            to_version: LAYOUT_RECORD_SCHEMA_VERSION,
            notes: vec!["bare placement array upgraded; no attachments".to_string()],
        });
    }
    let record: LayoutRecord = serde_json::from_value(value)?;
    migrate_record(record)
}

/// Bring a decoded record to the current schema version.
pub fn migrate_record(mut record: LayoutRecord) -> Result<MigrationResult, PersistError> {
    let from_version = record.schema_version;
    match from_version {
        LAYOUT_RECORD_SCHEMA_VERSION => Ok(MigrationResult {
            record,
            from_version,
            to_version: LAYOUT_RECORD_SCHEMA_VERSION,
            notes: Vec::new(),
        }),
        0 => {
            record.schema_version = LAYOUT_RECORD_SCHEMA_VERSION;
            Ok(MigrationResult {
                record,
                from_version,
                to_version: LAYOUT_RECORD_SCHEMA_VERSION,
                notes: vec!["version 0 object upgraded".to_string()],
            })
        }
        found => Err(PersistError::UnsupportedVersion {
            found,
            supported: LAYOUT_RECORD_SCHEMA_VERSION,
        }),
    }
}

pub fn encode_record(record: &LayoutRecord) -> Result<String, PersistError> {
    Ok(serde_json::to_string(record)?)
}

/// Build the layout for `registry` from a persisted record.
///
/// Registered panels keep their persisted placement. Registered panels the
/// record lacks get their default placement, or are dropped below the
/// layout when that default collides with a restored panel. Persisted
/// panels that are no longer registered are discarded, and attachments
/// that fail validation are skipped.
#[must_use]
pub fn merge_with_defaults(
    record: &LayoutRecord,
    registry: &PanelRegistry,
    limits: GridLimits,
) -> WorkspaceLayout {
    let mut restored: BTreeMap<_, PanelPlacement> = BTreeMap::new();
    for placement in &record.panels {
        if !registry.contains(&placement.id) {
            debug!(panel = %placement.id, "persisted panel is no longer registered");
            continue;
        }
        restored
            .entry(placement.id.clone())
            .or_insert_with(|| limits.normalize(placement));
    }

    let mut occupied: Vec<CellRect> = restored.values().map(PanelPlacement::rect).collect();
    let mut placements = Vec::with_capacity(registry.len());
    for registration in registry.iter() {
        if let Some(placement) = restored.remove(&registration.id) {
            placements.push(placement);
            continue;
        }
        let default = limits.normalize(&registration.default_panel_placement());
        let rect = place_without_collision(default.rect(), &occupied);
        occupied.push(rect);
        debug!(panel = %registration.id, "panel missing from record; using default placement");
        placements.push(PanelPlacement::from_rect(registration.id.clone(), rect));
    }

    let (attachments, rejected) =
        AttachmentGraph::from_attachments(record.attachments.iter().cloned(), &placements, limits.columns);
    for (attachment, err) in rejected {
        warn!(
            child = %attachment.child,
            parent = %attachment.parent,
            error = %err,
            "persisted attachment skipped"
        );
    }
    WorkspaceLayout::new(placements).with_attachments(attachments)
}

/// Where serialized records live.
pub trait LayoutStorage {
    /// `Ok(None)` when nothing was saved under `key`.
    fn load(&self, key: &WorkspaceId) -> Result<Option<String>, PersistError>;
    fn save(&self, key: &WorkspaceId, payload: &str) -> Result<(), PersistError>;
    fn remove(&self, key: &WorkspaceId) -> Result<(), PersistError>;
}

/// In-process storage, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<WorkspaceId, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl LayoutStorage for MemoryStorage {
    fn load(&self, key: &WorkspaceId) -> Result<Option<String>, PersistError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn save(&self, key: &WorkspaceId, payload: &str) -> Result<(), PersistError> {
        self.entries
            .borrow_mut()
            .insert(key.clone(), payload.to_string());
        Ok(())
    }

    fn remove(&self, key: &WorkspaceId) -> Result<(), PersistError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// One JSON file per workspace inside a directory.
///
/// Saves write a sibling temp file and rename it over the target, so a
/// crash mid-save leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `key`. Bytes outside `[A-Za-z0-9-]` are hex-escaped.
    #[must_use]
    pub fn path_for(&self, key: &WorkspaceId) -> PathBuf {
        let mut name = String::with_capacity(key.as_str().len() + 5);
        for byte in key.as_str().bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("_{byte:02x}"));
            }
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PersistError {
    PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl LayoutStorage for FileStorage {
    fn load(&self, key: &WorkspaceId) -> Result<Option<String>, PersistError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path, err)),
        }
    }

    fn save(&self, key: &WorkspaceId, payload: &str) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, payload).map_err(|e| io_error(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))
    }

    fn remove(&self, key: &WorkspaceId) -> Result<(), PersistError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path, err)),
        }
    }
}

/// How a workspace was populated by [`PersistenceAdapter::restore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Restored { from_version: u16 },
    Missing,
    Corrupt { reason: String },
}

/// Bridges a [`LayoutStore`] and a [`LayoutStorage`].
pub struct PersistenceAdapter<S> {
    storage: Rc<S>,
}

impl<S> Clone for PersistenceAdapter<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Rc::clone(&self.storage),
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for PersistenceAdapter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("storage", &self.storage)
            .finish()
    }
}

impl<S: LayoutStorage + 'static> PersistenceAdapter<S> {
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self {
            storage: Rc::new(storage),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn save(&self, workspace: &WorkspaceId, layout: &WorkspaceLayout) -> Result<(), PersistError> {
        let payload = encode_record(&LayoutRecord::from_layout(layout))?;
        self.storage.save(workspace, &payload)
    }

    /// Decode the stored record for `workspace`, if any.
    pub fn load(&self, workspace: &WorkspaceId) -> Result<Option<MigrationResult>, PersistError> {
        self.storage
            .load(workspace)?
            .map(|payload| decode_record(&payload))
            .transpose()
    }

    /// Populate `workspace` in `store` from storage, merged with defaults.
    ///
    /// Never fails: a missing record yields the default layout, and an
    /// unreadable one is logged and also yields the default layout.
    pub fn restore(
        &self,
        store: &LayoutStore,
        workspace: &WorkspaceId,
        registry: &PanelRegistry,
    ) -> LoadOutcome {
        let limits = store.limits();
        let (record, outcome) = match self.load(workspace) {
            Ok(Some(migration)) => {
                for note in &migration.notes {
                    debug!(workspace = %workspace, note = %note, "layout record migrated");
                }
                let from_version = migration.from_version;
                (migration.record, LoadOutcome::Restored { from_version })
            }
            Ok(None) => (LayoutRecord::new(Vec::new(), Vec::new()), LoadOutcome::Missing),
            Err(err) => {
                warn!(
                    workspace = %workspace,
                    error = %err,
                    "corrupt layout record; falling back to defaults"
                );
                (
                    LayoutRecord::new(Vec::new(), Vec::new()),
                    LoadOutcome::Corrupt {
                        reason: err.to_string(),
                    },
                )
            }
        };
        let layout = merge_with_defaults(&record, registry, limits);
        store.replace(workspace, layout, ChangeCause::Restore);
        outcome
    }

    /// Save every committed change. Saving stops when the guard drops.
    pub fn install(&self, store: &LayoutStore) -> Subscription {
        let adapter = self.clone();
        store.subscribe(move |change: &LayoutChange| {
            if let Err(err) = adapter.save(&change.workspace, &change.layout) {
                warn!(
                    workspace = %change.workspace,
                    version = change.version,
                    error = %err,
                    "failed to save layout"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{Edge, PanelId, PanelRegistration};

    fn p(id: &str, x: u16, y: u16, w: u16, h: u16) -> PanelPlacement {
        PanelPlacement::new(id, x, y, w, h)
    }

    fn registry() -> PanelRegistry {
        PanelRegistry::new([
            PanelRegistration::new("a", "A", CellRect::new(0, 0, 6, 6)),
            PanelRegistration::new("b", "B", CellRect::new(6, 0, 6, 4)),
            PanelRegistration::new("c", "C", CellRect::new(0, 6, 4, 3)),
        ])
    }

    fn ws() -> WorkspaceId {
        WorkspaceId::new("main")
    }

    // ── records ─────────────────────────────────────────────────────

    #[test]
    fn legacy_array_is_migrated() {
        let result = decode_record(r#"[{"i":"a","x":1,"y":2,"w":3,"h":4,"moved":false}]"#).unwrap();
        assert_eq!(result.from_version, 0);
        assert_eq!(result.record.panels, vec![p("a", 1, 2, 3, 4)]);
        assert!(result.record.attachments.is_empty());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{
            "schema_version": 1,
            "panels": [{"id":"a","x":0,"y":0,"w":6,"h":6,"static":true}],
            "attachments": [{"childId":"b","parentId":"a","edge":"bottom"}],
            "theme": "dark"
        }"#;
        let result = decode_record(json).unwrap();
        assert_eq!(result.from_version, 1);
        assert_eq!(
            result.record.attachments,
            vec![Attachment::new("b", "a", Edge::Bottom)]
        );
    }

    #[test]
    fn newer_version_is_refused() {
        let err = decode_record(r#"{"schema_version": 9, "panels": []}"#).unwrap_err();
        assert!(matches!(
            err,
            PersistError::UnsupportedVersion {
                found: 9,
                supported: 1
            }
        ));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(decode_record("{not json"), Err(PersistError::Json(_))));
    }

    #[test]
    fn encode_decode_preserves_record() {
        let record = LayoutRecord::new(
            vec![p("a", 0, 0, 6, 6), p("b", 0, 6, 6, 4)],
            vec![Attachment::new("b", "a", Edge::Bottom)],
        );
        let decoded = decode_record(&encode_record(&record).unwrap()).unwrap();
        assert_eq!(decoded.record, record);
    }

    // ── merge ───────────────────────────────────────────────────────

    #[test]
    fn merge_adds_missing_panel_at_default() {
        let record = LayoutRecord::new(vec![p("a", 0, 0, 6, 6), p("b", 6, 0, 6, 4)], Vec::new());
        let layout = merge_with_defaults(&record, &registry(), GridLimits::default());
        assert_eq!(
            layout.placements,
            vec![p("a", 0, 0, 6, 6), p("b", 6, 0, 6, 4), p("c", 0, 6, 4, 3)]
        );
    }

    #[test]
    fn merge_moves_colliding_default_below() {
        let record = LayoutRecord::new(vec![p("a", 0, 0, 6, 9), p("b", 6, 0, 6, 4)], Vec::new());
        let layout = merge_with_defaults(&record, &registry(), GridLimits::default());
        assert_eq!(layout.placement(&PanelId::new("c")), Some(&p("c", 0, 9, 4, 3)));
        assert_eq!(layout.placement(&PanelId::new("a")), Some(&p("a", 0, 0, 6, 9)));
    }

    #[test]
    fn merge_drops_unregistered_and_invalid_attachments() {
        let record = LayoutRecord::new(
            vec![p("a", 0, 0, 6, 6), p("gone", 6, 0, 6, 4)],
            vec![
                Attachment::new("gone", "a", Edge::Bottom),
                Attachment::new("c", "a", Edge::Bottom),
            ],
        );
        let layout = merge_with_defaults(&record, &registry(), GridLimits::default());
        assert!(layout.placement(&PanelId::new("gone")).is_none());
        assert_eq!(
            layout.attachments.to_vec(),
            vec![Attachment::new("c", "a", Edge::Bottom)]
        );
    }

    // ── adapter ─────────────────────────────────────────────────────

    #[test]
    fn restore_missing_record_uses_defaults() {
        let store = LayoutStore::new(GridLimits::default());
        let adapter = PersistenceAdapter::new(MemoryStorage::new());
        assert_eq!(adapter.restore(&store, &ws(), &registry()), LoadOutcome::Missing);
        assert_eq!(store.get(&ws()), registry().default_layout());
    }

    #[test]
    fn restore_corrupt_record_uses_defaults() {
        let storage = MemoryStorage::new();
        storage.save(&ws(), "][").unwrap();
        let store = LayoutStore::new(GridLimits::default());
        let adapter = PersistenceAdapter::new(storage);
        let outcome = adapter.restore(&store, &ws(), &registry());
        assert!(matches!(outcome, LoadOutcome::Corrupt { .. }));
        assert_eq!(store.get(&ws()), registry().default_layout());
    }

    #[test]
    fn install_saves_each_commit_and_restores() {
        let store = LayoutStore::new(GridLimits::default());
        let adapter = PersistenceAdapter::new(MemoryStorage::new());
        let _autosave = adapter.install(&store);

        store.set(&ws(), vec![p("a", 3, 0, 6, 6), p("b", 0, 6, 6, 4), p("c", 6, 6, 4, 3)]);
        assert_eq!(adapter.storage().len(), 1);

        let fresh = LayoutStore::new(GridLimits::default());
        let outcome = adapter.restore(&fresh, &ws(), &registry());
        assert_eq!(outcome, LoadOutcome::Restored { from_version: 1 });
        assert_eq!(fresh.get(&ws()), store.get(&ws()));
    }

    #[test]
    fn file_names_escape_unsafe_bytes() {
        let storage = FileStorage::new("/tmp/layouts");
        assert_eq!(
            storage.path_for(&WorkspaceId::new("tab-1")),
            PathBuf::from("/tmp/layouts/tab-1.json")
        );
        assert_eq!(
            storage.path_for(&WorkspaceId::new("../x y")),
            PathBuf::from("/tmp/layouts/_2e_2e_2fx_20y.json")
        );
    }
}
