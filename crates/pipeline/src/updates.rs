//! Overlay update path.
//!
//! Applies descriptor updates from producers to the registry and the asset
//! cache. Asset resolution happens here, never on the frame path, so a slow
//! decode delays an overlay appearing but never a frame.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use overlay_asset_cache::AssetCache;
use overlay_common::config::MissingAssetPolicy;
use overlay_common::error::{OverlayError, OverlayResult};
use overlay_frame_model::element::{OverlayContent, OverlayElement};
use overlay_frame_model::frame::Rgba;
use overlay_frame_model::update::{parse_updates, OverlayUpdate};
use overlay_registry::OverlayRegistry;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::stop::StopSignal;

/// Result of applying one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update changed the registry or the cache.
    Applied,
    /// The update referred to something that does not exist.
    Ignored,
    /// The element's asset failed to resolve and the element was not added.
    Dropped { key: String },
    /// The element's asset failed to resolve and it shows the error marker.
    Marked { key: String },
    /// The element's asset failed to resolve and it was added unchanged.
    Kept { key: String },
}

/// Counters from an update loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub applied: u64,
    pub ignored: u64,
    pub missing_assets: u64,
    pub rejected: u64,
}

impl UpdateStats {
    fn record(&mut self, outcome: &OverlayResult<UpdateOutcome>) {
        match outcome {
            Ok(UpdateOutcome::Applied) => self.applied += 1,
            Ok(UpdateOutcome::Ignored) => self.ignored += 1,
            Ok(UpdateOutcome::Marked { .. } | UpdateOutcome::Kept { .. }) => {
                self.applied += 1;
                self.missing_assets += 1;
            }
            Ok(UpdateOutcome::Dropped { .. }) => self.missing_assets += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

/// Applies [`OverlayUpdate`]s to a registry and asset cache.
///
/// Clones share state, including the descriptors of elements currently
/// shown as error markers.
#[derive(Debug, Clone)]
pub struct OverlayUpdater {
    registry: Arc<OverlayRegistry>,
    assets: Arc<AssetCache>,
    policy: MissingAssetPolicy,
    /// Original descriptors of marked elements, by element id. Restored once
    /// their asset resolves.
    marked: Arc<Mutex<HashMap<String, OverlayElement>>>,
}

impl OverlayUpdater {
    pub fn new(
        registry: Arc<OverlayRegistry>,
        assets: Arc<AssetCache>,
        policy: MissingAssetPolicy,
    ) -> Self {
        Self {
            registry,
            assets,
            policy,
            marked: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> MissingAssetPolicy {
        self.policy
    }

    /// Apply one update. May block on asset decoding.
    ///
    /// Only invalid elements are errors; asset failures are handled by the
    /// missing-asset policy and reported in the outcome.
    pub fn apply(&self, update: OverlayUpdate) -> OverlayResult<UpdateOutcome> {
        let op = update.op_name();
        let outcome = match update {
            OverlayUpdate::Upsert { element } => self.upsert(element),
            OverlayUpdate::Remove { id } => {
                self.marked.lock().remove(&id);
                Ok(applied_if(self.registry.remove(&id)))
            }
            OverlayUpdate::SetVisible { id, visible } => {
                if let Some(original) = self.marked.lock().get_mut(&id) {
                    original.visible = visible;
                }
                Ok(applied_if(self.registry.set_visible(&id, visible)))
            }
            OverlayUpdate::RegisterAsset { key, source } => {
                self.assets.register(key.clone(), source);
                if self.is_referenced(&key) {
                    match self.assets.resolve(&key) {
                        Ok(_) => self.restore_marked(&key),
                        Err(e) => {
                            tracing::warn!(key = %key, error = %e, "Registered asset failed to load")
                        }
                    }
                }
                Ok(UpdateOutcome::Applied)
            }
            OverlayUpdate::InvalidateAsset { key } => Ok(self.invalidate(&key)),
        };

        match &outcome {
            Ok(result) => tracing::debug!(op, outcome = ?result, "Applied overlay update"),
            Err(e) => tracing::warn!(op, error = %e, "Rejected overlay update"),
        }
        outcome
    }

    /// Apply every update in order, stopping at the first invalid one.
    pub fn apply_all(
        &self,
        updates: impl IntoIterator<Item = OverlayUpdate>,
    ) -> OverlayResult<Vec<UpdateOutcome>> {
        updates.into_iter().map(|u| self.apply(u)).collect()
    }

    /// Load a JSONL update script and apply it.
    pub fn apply_file(&self, path: &Path) -> OverlayResult<Vec<UpdateOutcome>> {
        let updates = load_updates_file(path)?;
        tracing::info!(path = %path.display(), count = updates.len(), "Applying update script");
        self.apply_all(updates)
    }

    /// Consume updates until the channel closes or `stop` is signalled.
    ///
    /// Invalid updates are logged and skipped; the loop keeps going.
    pub async fn run_updates(
        &self,
        mut updates: mpsc::Receiver<OverlayUpdate>,
        stop: &StopSignal,
    ) -> OverlayResult<UpdateStats> {
        let mut listener = stop.subscribe();
        let mut stats = UpdateStats::default();

        loop {
            if listener.is_stopped() {
                break;
            }

            let update = tokio::select! {
                biased;
                _ = listener.stopped() => break,
                update = updates.recv() => match update {
                    Some(update) => update,
                    None => {
                        tracing::debug!("Update channel closed");
                        break;
                    }
                },
            };

            let updater = self.clone();
            let outcome = tokio::task::spawn_blocking(move || updater.apply(update))
                .await
                .map_err(|e| OverlayError::pipeline(format!("Update task failed: {e}")))?;
            stats.record(&outcome);
        }

        tracing::info!(
            applied = stats.applied,
            ignored = stats.ignored,
            missing_assets = stats.missing_assets,
            rejected = stats.rejected,
            "Update loop stopped"
        );
        Ok(stats)
    }

    fn upsert(&self, mut element: OverlayElement) -> OverlayResult<UpdateOutcome> {
        let mut outcome = UpdateOutcome::Applied;
        let mut original = None;

        if let Some(key) = element.asset_key().map(str::to_string) {
            if let Err(e) = self.assets.resolve(&key) {
                tracing::warn!(
                    id = %element.id,
                    key = %key,
                    error = %e,
                    policy = ?self.policy,
                    "Overlay asset failed to resolve"
                );
                match self.policy {
                    MissingAssetPolicy::Drop => return Ok(UpdateOutcome::Dropped { key }),
                    MissingAssetPolicy::Marker => {
                        original = Some(element.clone());
                        element.content = OverlayContent::Solid(Rgba::ERROR_MARKER);
                        outcome = UpdateOutcome::Marked { key };
                    }
                    MissingAssetPolicy::Keep => outcome = UpdateOutcome::Kept { key },
                }
            }
        }

        let id = element.id.clone();
        self.registry.upsert(element)?;
        let mut marked = self.marked.lock();
        match original {
            Some(original) => {
                marked.insert(id, original);
            }
            None => {
                marked.remove(&id);
            }
        }
        Ok(outcome)
    }

    /// Drop the decoded copy of `key`. Assets still in use are decoded again
    /// before the old copy is replaced, so frames never see a gap.
    fn invalidate(&self, key: &str) -> UpdateOutcome {
        if !self.is_referenced(key) {
            return applied_if(self.assets.invalidate(key));
        }
        match self.assets.reload(key) {
            Ok(_) => {
                self.restore_marked(key);
                UpdateOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Referenced asset failed to reload");
                applied_if(self.assets.invalidate(key))
            }
        }
    }

    /// Whether a registry element, or a marked element's original, uses `key`.
    fn is_referenced(&self, key: &str) -> bool {
        self.registry
            .snapshot()
            .iter()
            .any(|e| e.asset_key() == Some(key))
            || self
                .marked
                .lock()
                .values()
                .any(|e| e.asset_key() == Some(key))
    }

    /// Put back the original descriptors of elements marked for `key`.
    fn restore_marked(&self, key: &str) {
        let restored: Vec<OverlayElement> = {
            let mut marked = self.marked.lock();
            let ids: Vec<String> = marked
                .iter()
                .filter(|(_, e)| e.asset_key() == Some(key))
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| marked.remove(id)).collect()
        };

        for element in restored {
            if !self.registry.contains(&element.id) {
                continue;
            }
            let id = element.id.clone();
            match self.registry.upsert(element) {
                Ok(_) => tracing::info!(id = %id, key = %key, "Restored overlay after asset loaded"),
                Err(e) => tracing::warn!(id = %id, error = %e, "Failed to restore overlay"),
            }
        }
    }
}

fn applied_if(changed: bool) -> UpdateOutcome {
    if changed {
        UpdateOutcome::Applied
    } else {
        UpdateOutcome::Ignored
    }
}

/// Read a JSONL update script from disk.
pub fn load_updates_file(path: &Path) -> OverlayResult<Vec<OverlayUpdate>> {
    if !path.exists() {
        return Err(OverlayError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_updates(&content)?)
}
