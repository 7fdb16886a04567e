//! Overlay Registry
//!
//! Holds the active overlay elements for one pipeline. Mutations rebuild
//! a draw-ordered element list and publish it behind an `Arc`, so taking
//! a snapshot is a reference-count bump inside a short read lock:
//!
//! ```text
//! upsert/remove ──► write lock ──► rebuild ordered list ──► Arc swap
//! snapshot      ──► read lock  ──► Arc clone ──────────────► OverlaySnapshot
//! ```
//!
//! A snapshot therefore always reflects a whole number of mutations.

use std::collections::HashMap;
use std::sync::Arc;

use overlay_common::error::{OverlayError, OverlayResult};
use overlay_frame_model::element::OverlayElement;
use overlay_frame_model::snapshot::OverlaySnapshot;
use parking_lot::RwLock;

#[derive(Debug)]
struct Entry {
    element: OverlayElement,
    /// Insertion sequence, used to order equal z-orders.
    seq: u64,
}

#[derive(Debug)]
struct RegistryState {
    entries: HashMap<String, Entry>,
    next_seq: u64,
    version: u64,
    ordered: Arc<[OverlayElement]>,
}

impl RegistryState {
    fn publish(&mut self) {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|entry| (entry.element.z_order, entry.seq));
        self.ordered = entries
            .into_iter()
            .map(|entry| entry.element.clone())
            .collect::<Vec<_>>()
            .into();
        self.version += 1;
        tracing::trace!(
            version = self.version,
            elements = self.ordered.len(),
            "Published overlay set"
        );
    }
}

/// The set of active overlay elements.
#[derive(Debug)]
pub struct OverlayRegistry {
    state: RwLock<RegistryState>,
}

impl Default for OverlayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                entries: HashMap::new(),
                next_seq: 0,
                version: 0,
                ordered: Arc::from(Vec::new()),
            }),
        }
    }

    /// Insert an element, or replace the element with the same id.
    ///
    /// A replaced element keeps its original insertion position among
    /// elements of equal z-order. Opacity is clamped to `[0.0, 1.0]`.
    /// Returns whether an existing element was replaced.
    pub fn upsert(&self, mut element: OverlayElement) -> OverlayResult<bool> {
        if element.id.is_empty() {
            return Err(OverlayError::invalid_element("Element id must not be empty"));
        }
        element.opacity = element.clamped_opacity();

        let mut state = self.state.write();
        let replaced = match state.entries.get_mut(&element.id) {
            Some(entry) => {
                entry.element = element;
                true
            }
            None => {
                let seq = state.next_seq;
                state.next_seq += 1;
                state
                    .entries
                    .insert(element.id.clone(), Entry { element, seq });
                false
            }
        };
        state.publish();
        Ok(replaced)
    }

    /// Remove an element. Unknown ids are a no-op.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.state.write();
        if state.entries.remove(id).is_none() {
            return false;
        }
        state.publish();
        true
    }

    /// Show or hide an element. Returns `false` for unknown ids.
    pub fn set_visible(&self, id: &str, visible: bool) -> bool {
        let mut state = self.state.write();
        let Some(entry) = state.entries.get_mut(id) else {
            return false;
        };
        if entry.element.visible != visible {
            entry.element.visible = visible;
            state.publish();
        }
        true
    }

    /// Remove every element.
    pub fn clear(&self) {
        let mut state = self.state.write();
        if !state.entries.is_empty() {
            state.entries.clear();
            state.publish();
        }
    }

    /// Immutable, draw-ordered copy of the current elements.
    pub fn snapshot(&self) -> OverlaySnapshot {
        let state = self.state.read();
        OverlaySnapshot::from_ordered(Arc::clone(&state.ordered), state.version)
    }

    pub fn get(&self, id: &str) -> Option<OverlayElement> {
        self.state
            .read()
            .entries
            .get(id)
            .map(|entry| entry.element.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().entries.contains_key(id)
    }

    /// Ids in draw order.
    pub fn ids(&self) -> Vec<String> {
        self.state
            .read()
            .ordered
            .iter()
            .map(|element| element.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter bumped by every mutation that changed the element set.
    pub fn version(&self) -> u64 {
        self.state.read().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_frame_model::element::{Geometry, OverlayContent};
    use overlay_frame_model::frame::Rgba;

    fn element(id: &str, z: i32) -> OverlayElement {
        OverlayElement::new(id, Geometry::new(0, 0, 4, 4), OverlayContent::Solid(Rgba::WHITE))
            .with_z_order(z)
    }

    fn snapshot_ids(registry: &OverlayRegistry) -> Vec<String> {
        registry.snapshot().iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn snapshot_orders_by_z_then_insertion() {
        let registry = OverlayRegistry::new();
        registry.upsert(element("top", 5)).unwrap();
        registry.upsert(element("first", 1)).unwrap();
        registry.upsert(element("second", 1)).unwrap();
        registry.upsert(element("bottom", -3)).unwrap();

        assert_eq!(snapshot_ids(&registry), ["bottom", "first", "second", "top"]);
        assert_eq!(registry.ids(), snapshot_ids(&registry));
    }

    #[test]
    fn replace_keeps_insertion_position() {
        let registry = OverlayRegistry::new();
        registry.upsert(element("a", 0)).unwrap();
        registry.upsert(element("b", 0)).unwrap();
        assert!(registry.upsert(element("a", 0).with_opacity(0.5)).unwrap());

        assert_eq!(snapshot_ids(&registry), ["a", "b"]);
        assert_eq!(registry.get("a").unwrap().opacity, 0.5);
    }

    #[test]
    fn replace_can_change_z_order() {
        let registry = OverlayRegistry::new();
        registry.upsert(element("a", 0)).unwrap();
        registry.upsert(element("b", 1)).unwrap();
        registry.upsert(element("a", 2)).unwrap();
        assert_eq!(snapshot_ids(&registry), ["b", "a"]);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let registry = OverlayRegistry::new();
        registry.upsert(element("a", 0)).unwrap();
        let version = registry.version();
        assert!(!registry.remove("missing"));
        assert_eq!(registry.version(), version);
        assert!(registry.remove("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshots_are_immutable() {
        let registry = OverlayRegistry::new();
        registry.upsert(element("a", 0)).unwrap();
        let before = registry.snapshot();
        registry.upsert(element("b", 0)).unwrap();
        registry.remove("a");

        assert_eq!(before.len(), 1);
        assert_eq!(before.elements()[0].id, "a");
        assert!(registry.snapshot().version() > before.version());
    }

    #[test]
    fn set_visible_toggles() {
        let registry = OverlayRegistry::new();
        registry.upsert(element("a", 0)).unwrap();
        assert!(registry.set_visible("a", false));
        assert!(!registry.snapshot().elements()[0].visible);
        assert!(!registry.set_visible("ghost", true));
    }

    #[test]
    fn upsert_validates() {
        let registry = OverlayRegistry::new();
        assert!(matches!(
            registry.upsert(element("", 0)),
            Err(OverlayError::InvalidElement { .. })
        ));
        registry.upsert(element("hot", 0).with_opacity(3.0)).unwrap();
        assert_eq!(registry.get("hot").unwrap().opacity, 1.0);
    }

    #[test]
    fn clear_empties_registry() {
        let registry = OverlayRegistry::new();
        registry.upsert(element("a", 0)).unwrap();
        registry.upsert(element("b", 0)).unwrap();
        registry.clear();
        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.len(), 0);
    }
}
