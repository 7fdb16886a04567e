//! Overlay Asset Cache
//!
//! Loads overlay assets (logos, badges, pre-rendered glyph strips) once and
//! hands out shared, read-only handles to the decoded rasters.
//!
//! Lifecycle of a key:
//!
//! ```text
//! register ──► resolve (decode, insert) ──► resolve (cached) ──► ...
//!                  ▲                                │
//!                  └──────── invalidate ◄───────────┘
//! ```
//!
//! Entries are never evicted on their own. `invalidate` drops the cache's
//! reference only; handles already checked out keep their raster alive.

pub mod decoder;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use overlay_common::error::{OverlayError, OverlayResult};
use overlay_frame_model::asset::AssetSource;
use overlay_frame_model::frame::Raster;
use parking_lot::RwLock;

pub use decoder::{AssetDecoder, DecoderRegistry, ImageFileDecoder, RawRgbaDecoder};

/// Shared handle to a decoded asset.
pub type AssetHandle = Arc<Raster>;

#[derive(Debug, Default)]
struct CacheState {
    sources: HashMap<String, RegisteredSource>,
    entries: HashMap<String, AssetHandle>,
}

#[derive(Debug, Clone)]
struct RegisteredSource {
    source: AssetSource,
    /// Bumped whenever the key's source or entry is replaced or dropped, so
    /// a decode that raced with the change is not cached.
    generation: u64,
}

/// Cache of decoded overlay assets.
#[derive(Debug)]
pub struct AssetCache {
    decoders: DecoderRegistry,
    base_dir: Option<PathBuf>,
    state: RwLock<CacheState>,
    next_generation: AtomicU64,
    decodes: AtomicU64,
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new(DecoderRegistry::with_defaults())
    }
}

impl AssetCache {
    /// Create a cache using the given decoder backends.
    pub fn new(decoders: DecoderRegistry) -> Self {
        Self {
            decoders,
            base_dir: None,
            state: RwLock::new(CacheState::default()),
            next_generation: AtomicU64::new(0),
            decodes: AtomicU64::new(0),
        }
    }

    /// Resolve relative file sources against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Make `key` resolvable from `source`.
    ///
    /// Replacing an existing registration drops its decoded entry.
    pub fn register(&self, key: impl Into<String>, source: AssetSource) {
        let key = key.into();
        let generation = self.bump_generation();
        let mut state = self.state.write();
        let replaced = state.entries.remove(&key).is_some();
        state
            .sources
            .insert(key.clone(), RegisteredSource { source, generation });
        tracing::debug!(key = %key, replaced, "Registered asset");
    }

    /// Insert an already-decoded raster under `key`.
    ///
    /// Such entries have no source: once invalidated they cannot be resolved
    /// again until re-inserted or registered.
    pub fn insert(&self, key: impl Into<String>, raster: Raster) -> AssetHandle {
        let key = key.into();
        let handle = Arc::new(raster);
        let generation = self.bump_generation();
        let mut state = self.state.write();
        if let Some(registered) = state.sources.get_mut(&key) {
            registered.generation = generation;
        }
        state.entries.insert(key, Arc::clone(&handle));
        handle
    }

    /// Remove both the registration and any decoded entry.
    pub fn unregister(&self, key: &str) -> bool {
        let mut state = self.state.write();
        let had_source = state.sources.remove(key).is_some();
        let had_entry = state.entries.remove(key).is_some();
        had_source || had_entry
    }

    /// Return the decoded asset for `key`, decoding it on first use.
    pub fn resolve(&self, key: &str) -> OverlayResult<AssetHandle> {
        let registered = {
            let state = self.state.read();
            if let Some(handle) = state.entries.get(key) {
                return Ok(Arc::clone(handle));
            }
            match state.sources.get(key) {
                Some(registered) => registered.clone(),
                None => return Err(OverlayError::asset_not_found(key)),
            }
        };

        // Decode without holding the lock.
        let raster = self.decode(key, &registered.source)?;
        self.decodes.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(raster);

        let mut state = self.state.write();
        if let Some(existing) = state.entries.get(key) {
            // Another resolver won the race.
            return Ok(Arc::clone(existing));
        }
        let current = state.sources.get(key).map(|r| r.generation);
        if current == Some(registered.generation) {
            state.entries.insert(key.to_string(), Arc::clone(&handle));
            tracing::debug!(
                key = %key,
                width = handle.width(),
                height = handle.height(),
                "Decoded asset"
            );
        } else {
            tracing::debug!(key = %key, "Asset changed while decoding; result not cached");
        }
        Ok(handle)
    }

    /// Return the decoded asset for `key` if it has already been resolved.
    ///
    /// Never decodes.
    pub fn get(&self, key: &str) -> Option<AssetHandle> {
        self.state.read().entries.get(key).cloned()
    }

    /// Drop the decoded entry for `key`; the registration is kept.
    ///
    /// Returns whether an entry was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        let generation = self.bump_generation();
        let mut state = self.state.write();
        if let Some(registered) = state.sources.get_mut(key) {
            registered.generation = generation;
        }
        let removed = state.entries.remove(key).is_some();
        if removed {
            tracing::debug!(key = %key, "Invalidated asset");
        }
        removed
    }

    /// Decode `key` again from its registered source and swap the result in.
    ///
    /// The previous entry stays visible to `get` until the new raster is
    /// ready. On failure the previous entry is left as it was.
    pub fn reload(&self, key: &str) -> OverlayResult<AssetHandle> {
        let registered = self
            .state
            .read()
            .sources
            .get(key)
            .cloned()
            .ok_or_else(|| OverlayError::asset_not_found(key))?;

        let raster = self.decode(key, &registered.source)?;
        self.decodes.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(raster);

        let generation = self.bump_generation();
        let mut state = self.state.write();
        let Some(current) = state.sources.get_mut(key) else {
            tracing::debug!(key = %key, "Asset unregistered while reloading; result not cached");
            return Ok(handle);
        };
        if current.generation != registered.generation {
            tracing::debug!(key = %key, "Asset changed while reloading; result not cached");
            return Ok(handle);
        }
        current.generation = generation;
        state.entries.insert(key.to_string(), Arc::clone(&handle));
        tracing::debug!(key = %key, "Reloaded asset");
        Ok(handle)
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.state.read().sources.contains_key(key)
    }

    pub fn is_resolved(&self, key: &str) -> bool {
        self.state.read().entries.contains_key(key)
    }

    /// Live handle count for a decoded entry, the cache's own included.
    pub fn ref_count(&self, key: &str) -> Option<usize> {
        self.state.read().entries.get(key).map(Arc::strong_count)
    }

    /// Number of decoded entries.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total successful decodes since creation.
    pub fn decode_count(&self) -> u64 {
        self.decodes.load(Ordering::Relaxed)
    }

    fn bump_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn decode(&self, key: &str, source: &AssetSource) -> OverlayResult<Raster> {
        let content_type = source.content_type().ok_or_else(|| {
            OverlayError::asset_decode(key, "Cannot determine content type of asset")
        })?;
        let decoder = self.decoders.for_content_type(&content_type).ok_or_else(|| {
            OverlayError::UnsupportedContentType {
                content_type: content_type.clone(),
            }
        })?;

        let raster = match source {
            AssetSource::Bytes { data, .. } => decoder.decode(data),
            AssetSource::File { path, .. } => {
                let data = self.read_file(key, path)?;
                decoder.decode(&data)
            }
        };

        raster.map_err(|e| {
            tracing::warn!(key = %key, decoder = decoder.name(), error = %e, "Asset decode failed");
            OverlayError::asset_decode(key, format!("{e:#}"))
        })
    }

    fn read_file(&self, key: &str, path: &Path) -> OverlayResult<Vec<u8>> {
        let full_path = match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        };
        std::fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                tracing::warn!(key = %key, path = %full_path.display(), "Asset file not found");
                OverlayError::asset_not_found(key)
            } else {
                OverlayError::asset_decode(
                    key,
                    format!("Failed to read {}: {e}", full_path.display()),
                )
            }
        })
    }
}
