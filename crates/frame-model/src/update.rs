//! Overlay descriptor update events.
//!
//! Producers deliver these asynchronously; one JSON object per line when
//! serialized.

use serde::{Deserialize, Serialize};

use crate::asset::AssetSource;
use crate::element::OverlayElement;

/// A change to the overlay set or the asset cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OverlayUpdate {
    /// Insert or replace an element by id.
    Upsert { element: OverlayElement },
    /// Remove an element; unknown ids are ignored.
    Remove { id: String },
    /// Show or hide an element without replacing it.
    SetVisible { id: String, visible: bool },
    /// Make an asset key resolvable.
    RegisterAsset { key: String, source: AssetSource },
    /// Drop the decoded copy of an asset so it is decoded again on next use.
    InvalidateAsset { key: String },
}

impl OverlayUpdate {
    pub fn upsert(element: OverlayElement) -> Self {
        Self::Upsert { element }
    }

    pub fn remove(id: impl Into<String>) -> Self {
        Self::Remove { id: id.into() }
    }

    pub fn invalidate(key: impl Into<String>) -> Self {
        Self::InvalidateAsset { key: key.into() }
    }

    /// Short name of the operation, for logging.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Upsert { .. } => "upsert",
            Self::Remove { .. } => "remove",
            Self::SetVisible { .. } => "set_visible",
            Self::RegisterAsset { .. } => "register_asset",
            Self::InvalidateAsset { .. } => "invalidate_asset",
        }
    }
}

/// Parse updates from JSONL, skipping blank lines and `#` comments.
pub fn parse_updates(jsonl: &str) -> Result<Vec<OverlayUpdate>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Serialize updates to JSONL format.
pub fn serialize_updates(updates: &[OverlayUpdate]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for update in updates {
        output.push_str(&serde_json::to_string(update)?);
        output.push('\n');
    }
    Ok(output)
}
