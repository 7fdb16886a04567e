//! Immutable, z-ordered views of the overlay set.

use std::sync::Arc;

use crate::element::OverlayElement;

/// The overlay set as it stood at one instant.
///
/// Elements are in draw order: ascending z-order, ties in insertion order.
/// A snapshot never changes after creation; cloning shares the element list.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySnapshot {
    elements: Arc<[OverlayElement]>,
    version: u64,
}

impl OverlaySnapshot {
    /// Wrap an element list that is already in draw order.
    pub fn from_ordered(elements: Arc<[OverlayElement]>, version: u64) -> Self {
        Self { elements, version }
    }

    /// Build a snapshot from elements given in insertion order.
    pub fn from_elements(mut elements: Vec<OverlayElement>) -> Self {
        // Stable sort keeps insertion order among equal z-orders.
        elements.sort_by_key(|e| e.z_order);
        Self {
            elements: elements.into(),
            version: 0,
        }
    }

    pub fn empty() -> Self {
        Self {
            elements: Arc::from(Vec::new()),
            version: 0,
        }
    }

    pub fn elements(&self) -> &[OverlayElement] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OverlayElement> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Registry version this snapshot was taken at.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Asset keys referenced by drawable elements, deduplicated, in draw order.
    pub fn asset_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for element in self.elements.iter().filter(|e| e.is_drawable()) {
            if let Some(key) = element.asset_key() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

impl Default for OverlaySnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a OverlaySnapshot {
    type Item = &'a OverlayElement;
    type IntoIter = std::slice::Iter<'a, OverlayElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
