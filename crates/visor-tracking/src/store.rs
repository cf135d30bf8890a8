//! Latest-known anchor records, keyed by id.

use std::collections::HashMap;

use visor_spatial::{Anchor, AnchorId};

/// Each update replaces the record wholesale; there is no merging and no
/// history.
#[derive(Default)]
pub struct AnchorStore {
    anchors: HashMap<AnchorId, Anchor>,
}

impl AnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, anchor: Anchor) {
        self.anchors.insert(anchor.id, anchor);
    }

    pub fn remove(&mut self, id: AnchorId) -> Option<Anchor> {
        self.anchors.remove(&id)
    }

    pub fn get(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.get(&id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.values()
    }

    /// World anchors only, the candidates for origin bookkeeping.
    pub fn world_anchors(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.values().filter(|anchor| anchor.is_world())
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}
