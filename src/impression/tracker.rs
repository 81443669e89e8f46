//! Collection impression tracker
//!
//! Owns one [`CollectionTrackingSession`] per mounted collection and turns
//! each visibility snapshot into begin/end impression events.

use crate::emitter::EventEmitter;
use crate::ids::IdGenerator;
use crate::impression::record::ImpressionRecord;
use crate::impression::session::CollectionTrackingSession;
use crate::types::{Content, ImpressionSourceType, VisibleContent};
use std::collections::HashMap;
use std::rc::Rc;

pub struct ImpressionTracker {
    sessions: HashMap<String, CollectionTrackingSession>,
    ids: Rc<dyn IdGenerator>,
    emitter: Rc<dyn EventEmitter>,
    warn_on_insertion_mismatch: bool,
}

impl ImpressionTracker {
    pub fn new(ids: Rc<dyn IdGenerator>, emitter: Rc<dyn EventEmitter>) -> Self {
        Self {
            sessions: HashMap::new(),
            ids,
            emitter,
            warn_on_insertion_mismatch: true,
        }
    }

    /// Toggle warnings for content whose insertion id disagrees with the
    /// collection's source type.
    pub fn warn_on_insertion_mismatch(mut self, warn: bool) -> Self {
        self.warn_on_insertion_mismatch = warn;
        self
    }

    /// Start tracking `collection_id`.
    ///
    /// Mounting a collection that is still live keeps its existing state, so
    /// a refresh without unmount does not restart impressions.
    pub fn mount(&mut self, collection_id: &str, source_type: ImpressionSourceType) {
        if self.sessions.contains_key(collection_id) {
            log::debug!("collection {} already mounted", collection_id);
            return;
        }
        log::info!(
            "mounting collection {} (source {})",
            collection_id,
            source_type.as_str()
        );
        self.sessions.insert(
            collection_id.to_string(),
            CollectionTrackingSession::new(collection_id, source_type),
        );
    }

    /// Apply a visibility snapshot to `collection_id`.
    ///
    /// Begin events for newly visible content are emitted before end events
    /// for content that disappeared. Unknown collections are ignored.
    pub fn on_visibility_changed(
        &mut self,
        collection_id: &str,
        visible: &[VisibleContent],
        view_id: Option<&str>,
    ) {
        let Some(session) = self.sessions.get_mut(collection_id) else {
            log::debug!(
                "visibility change for unknown collection {}, ignoring",
                collection_id
            );
            return;
        };

        let delta = session.apply_snapshot(visible, self.ids.as_ref());
        let source_type = session.source_type();

        for record in &delta.begun {
            if self.warn_on_insertion_mismatch {
                check_insertion_id(collection_id, source_type, &record.content);
            }
            self.emitter
                .emit_begin_impression(&record.begin_event(view_id, source_type));
        }
        for record in &delta.ended {
            self.emitter.emit_end_impression(&record.impression_id);
        }
    }

    /// Impression id of `content` if it is currently visible in
    /// `collection_id`.
    pub fn impression_id_for(&self, collection_id: &str, content: &Content) -> Option<String> {
        let identity = content.identity()?;
        self.sessions
            .get(collection_id)?
            .impression_id_for(&identity)
            .map(str::to_string)
    }

    /// Impression id of `content` in any mounted collection. Collections are
    /// searched in id order, so the first match is stable.
    pub fn find_impression_id(&self, content: &Content) -> Option<String> {
        let identity = content.identity()?;
        let mut collection_ids: Vec<&String> = self.sessions.keys().collect();
        collection_ids.sort();
        collection_ids.into_iter().find_map(|id| {
            self.sessions[id]
                .impression_id_for(&identity)
                .map(str::to_string)
        })
    }

    /// Stop tracking `collection_id`, ending every live impression first.
    pub fn unmount(&mut self, collection_id: &str) {
        let Some(mut session) = self.sessions.remove(collection_id) else {
            log::debug!("unmount of unknown collection {}, ignoring", collection_id);
            return;
        };
        let hidden = session.hide_all();
        log::info!(
            "unmounting collection {} ({} live impressions)",
            collection_id,
            hidden.len()
        );
        self.end_all(&hidden);
    }

    /// Unmount every collection, in collection id order.
    pub fn unmount_all(&mut self) {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        for id in ids {
            self.unmount(&id);
        }
    }

    pub fn is_mounted(&self, collection_id: &str) -> bool {
        self.sessions.contains_key(collection_id)
    }

    pub fn session(&self, collection_id: &str) -> Option<&CollectionTrackingSession> {
        self.sessions.get(collection_id)
    }

    pub fn mounted_count(&self) -> usize {
        self.sessions.len()
    }

    fn end_all(&self, records: &[ImpressionRecord]) {
        for record in records {
            self.emitter.emit_end_impression(&record.impression_id);
        }
    }
}

impl std::fmt::Debug for ImpressionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImpressionTracker")
            .field("sessions", &self.sessions)
            .field("warn_on_insertion_mismatch", &self.warn_on_insertion_mismatch)
            .finish_non_exhaustive()
    }
}

/// Ranking-served content should carry insertion ids; client content should not.
fn check_insertion_id(collection_id: &str, source_type: ImpressionSourceType, content: &Content) {
    match (source_type, content.insertion_id.is_some()) {
        (ImpressionSourceType::Delivery, false) => log::warn!(
            "collection {}: delivery content {:?} has no insertion id",
            collection_id,
            content.identity()
        ),
        (ImpressionSourceType::ClientBackend, true) => log::warn!(
            "collection {}: client content {:?} carries an insertion id",
            collection_id,
            content.identity()
        ),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{BeginImpression, MetricsEvent, RecordingEmitter};
    use crate::ids::SequentialIdGenerator;
    use pretty_assertions::assert_eq;

    fn setup() -> (ImpressionTracker, Rc<RecordingEmitter>) {
        let emitter = Rc::new(RecordingEmitter::new());
        let tracker =
            ImpressionTracker::new(Rc::new(SequentialIdGenerator::new("imp")), emitter.clone());
        (tracker, emitter)
    }

    fn visible(ids: &[&str]) -> Vec<VisibleContent> {
        ids.iter()
            .map(|id| VisibleContent::new(Content::with_id(*id)))
            .collect()
    }

    #[test]
    fn test_begin_events_are_stamped() {
        let (mut tracker, emitter) = setup();
        tracker.mount("feed", ImpressionSourceType::Delivery);
        tracker.on_visibility_changed(
            "feed",
            &[VisibleContent::at(
                Content::with_id("A").insertion("ins-A"),
                vec![0],
            )],
            Some("v-1"),
        );

        assert_eq!(
            emitter.events(),
            vec![MetricsEvent::BeginImpression(BeginImpression {
                impression_id: "imp-1".to_string(),
                content: Content::with_id("A").insertion("ins-A"),
                view_id: Some("v-1".to_string()),
                source_type: ImpressionSourceType::Delivery,
                position: Some(vec![0]),
            })]
        );
    }

    #[test]
    fn test_delta_and_ordering() {
        let (mut tracker, emitter) = setup();
        tracker.mount("feed", ImpressionSourceType::ClientBackend);
        tracker.on_visibility_changed("feed", &visible(&["A", "B", "C"]), Some("v-1"));
        emitter.drain();

        tracker.on_visibility_changed("feed", &visible(&["B", "C", "D"]), Some("v-1"));

        let events = emitter.events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            MetricsEvent::BeginImpression(begin) => {
                assert_eq!(begin.content.content_id.as_deref(), Some("D"));
                assert_eq!(begin.impression_id, "imp-4");
            }
            other => panic!("expected begin impression, got {other:?}"),
        }
        assert_eq!(
            events[1],
            MetricsEvent::EndImpression {
                impression_id: "imp-1".to_string()
            }
        );
        assert_eq!(
            tracker.impression_id_for("feed", &Content::with_id("B")).as_deref(),
            Some("imp-2")
        );
    }

    #[test]
    fn test_idempotent_redelivery() {
        let (mut tracker, emitter) = setup();
        tracker.mount("feed", ImpressionSourceType::Unknown);
        tracker.on_visibility_changed("feed", &visible(&["A", "B"]), None);
        let before = emitter.len();

        tracker.on_visibility_changed("feed", &visible(&["A", "B"]), None);

        assert_eq!(emitter.len(), before);
    }

    #[test]
    fn test_duplicate_mount_keeps_state() {
        let (mut tracker, emitter) = setup();
        tracker.mount("feed", ImpressionSourceType::Unknown);
        tracker.on_visibility_changed("feed", &visible(&["A"]), None);

        tracker.mount("feed", ImpressionSourceType::Delivery);
        tracker.on_visibility_changed("feed", &visible(&["A"]), None);

        assert_eq!(emitter.len(), 1);
        assert_eq!(
            tracker.session("feed").map(|s| s.source_type()),
            Some(ImpressionSourceType::Unknown)
        );
    }

    #[test]
    fn test_unmount_flush() {
        let (mut tracker, emitter) = setup();
        tracker.mount("feed", ImpressionSourceType::Unknown);
        tracker.on_visibility_changed("feed", &visible(&["X", "Y"]), None);
        emitter.drain();

        tracker.unmount("feed");

        assert_eq!(emitter.count("end_impression"), 2);
        assert_eq!(emitter.count("begin_impression"), 0);
        assert!(!tracker.is_mounted("feed"));
        assert_eq!(tracker.impression_id_for("feed", &Content::with_id("X")), None);
    }

    #[test]
    fn test_unknown_collection_tolerance() {
        let (mut tracker, emitter) = setup();

        tracker.on_visibility_changed("never-mounted", &visible(&["A"]), Some("v-1"));
        tracker.unmount("never-mounted");

        tracker.mount("feed", ImpressionSourceType::Unknown);
        tracker.unmount("feed");
        tracker.on_visibility_changed("feed", &visible(&["A"]), Some("v-1"));

        assert!(emitter.is_empty());
    }

    #[test]
    fn test_impression_id_for_hidden_content() {
        let (mut tracker, _emitter) = setup();
        tracker.mount("feed", ImpressionSourceType::Unknown);
        tracker.on_visibility_changed("feed", &visible(&["A"]), None);
        tracker.on_visibility_changed("feed", &visible(&["B"]), None);

        assert_eq!(tracker.impression_id_for("feed", &Content::with_id("A")), None);
        assert_eq!(tracker.impression_id_for("feed", &Content::default()), None);
        assert_eq!(tracker.impression_id_for("other", &Content::with_id("B")), None);
    }

    #[test]
    fn test_reappearing_content_gets_new_impression() {
        let (mut tracker, _emitter) = setup();
        tracker.mount("feed", ImpressionSourceType::Unknown);
        tracker.on_visibility_changed("feed", &visible(&["A"]), None);
        let first = tracker.impression_id_for("feed", &Content::with_id("A"));
        tracker.on_visibility_changed("feed", &[], None);
        tracker.on_visibility_changed("feed", &visible(&["A"]), None);
        let second = tracker.impression_id_for("feed", &Content::with_id("A"));

        assert!(first.is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn test_collections_are_independent() {
        let (mut tracker, emitter) = setup();
        tracker.mount("top", ImpressionSourceType::Unknown);
        tracker.mount("bottom", ImpressionSourceType::Unknown);
        tracker.on_visibility_changed("top", &visible(&["A"]), None);
        tracker.on_visibility_changed("bottom", &visible(&["A"]), None);

        assert_eq!(emitter.count("begin_impression"), 2);
        assert_ne!(
            tracker.impression_id_for("top", &Content::with_id("A")),
            tracker.impression_id_for("bottom", &Content::with_id("A"))
        );

        assert_eq!(
            tracker.find_impression_id(&Content::with_id("A")),
            tracker.impression_id_for("bottom", &Content::with_id("A"))
        );

        tracker.unmount_all();
        assert_eq!(tracker.mounted_count(), 0);
        assert_eq!(emitter.count("end_impression"), 2);
    }

    #[test]
    fn test_unmount_all_ends_in_collection_order() {
        let (mut tracker, emitter) = setup();
        for id in ["carousel", "search", "feed", "banner", "related"] {
            tracker.mount(id, ImpressionSourceType::Unknown);
            tracker.on_visibility_changed(id, &visible(&[id]), None);
        }
        let impression_of = |id: &str| tracker.impression_id_for(id, &Content::with_id(id));
        let expected: Vec<MetricsEvent> = ["banner", "carousel", "feed", "related", "search"]
            .iter()
            .map(|id| MetricsEvent::EndImpression {
                impression_id: impression_of(id).unwrap(),
            })
            .collect();
        emitter.drain();

        tracker.unmount_all();

        assert_eq!(emitter.events(), expected);
    }
}
