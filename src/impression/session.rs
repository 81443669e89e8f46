//! Per-collection visibility state and the snapshot diff

use crate::ids::IdGenerator;
use crate::impression::record::ImpressionRecord;
use crate::types::{ContentIdentity, ImpressionSourceType, VisibleContent};
use std::collections::{BTreeMap, HashSet};

/// Result of applying one snapshot
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VisibilityDelta {
    /// Content that became visible, in snapshot order
    pub begun: Vec<ImpressionRecord>,
    /// Content that stopped being visible
    pub ended: Vec<ImpressionRecord>,
}

impl VisibilityDelta {
    pub fn is_empty(&self) -> bool {
        self.begun.is_empty() && self.ended.is_empty()
    }
}

/// Visibility state of one mounted collection.
///
/// Holds at most one [`ImpressionRecord`] per content identity.
#[derive(Debug, Clone)]
pub struct CollectionTrackingSession {
    collection_id: String,
    source_type: ImpressionSourceType,
    visible: BTreeMap<ContentIdentity, ImpressionRecord>,
}

impl CollectionTrackingSession {
    pub fn new(collection_id: impl Into<String>, source_type: ImpressionSourceType) -> Self {
        Self {
            collection_id: collection_id.into(),
            source_type,
            visible: BTreeMap::new(),
        }
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn source_type(&self) -> ImpressionSourceType {
        self.source_type
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Live records, ordered by content identity
    pub fn records(&self) -> impl Iterator<Item = &ImpressionRecord> {
        self.visible.values()
    }

    /// Impression id of `identity` if it is currently visible
    pub fn impression_id_for(&self, identity: &ContentIdentity) -> Option<&str> {
        self.visible
            .get(identity)
            .map(|record| record.impression_id.as_str())
    }

    /// Replace the visible set with `snapshot` and report what changed.
    ///
    /// Content present before and after keeps its record untouched, even if
    /// its position moved. Repeated identities within one snapshot count
    /// once; content without an identity cannot be tracked and is skipped.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &[VisibleContent],
        ids: &dyn IdGenerator,
    ) -> VisibilityDelta {
        let mut delta = VisibilityDelta::default();
        let mut seen: HashSet<ContentIdentity> = HashSet::with_capacity(snapshot.len());

        for item in snapshot {
            let Some(identity) = item.content.identity() else {
                log::debug!(
                    "collection {}: skipping content without id or name",
                    self.collection_id
                );
                continue;
            };
            if !seen.insert(identity.clone()) || self.visible.contains_key(&identity) {
                continue;
            }
            let record = ImpressionRecord {
                content: item.content.clone(),
                impression_id: ids.next_id(),
                position: item.position.clone(),
            };
            self.visible.insert(identity, record.clone());
            delta.begun.push(record);
        }

        let gone: Vec<ContentIdentity> = self
            .visible
            .keys()
            .filter(|identity| !seen.contains(*identity))
            .cloned()
            .collect();
        for identity in gone {
            if let Some(record) = self.visible.remove(&identity) {
                delta.ended.push(record);
            }
        }

        delta
    }

    /// Drop every live record, returning them for end-impression logging.
    pub fn hide_all(&mut self) -> Vec<ImpressionRecord> {
        std::mem::take(&mut self.visible).into_values().collect()
    }
}
