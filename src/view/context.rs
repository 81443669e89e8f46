//! Process-scoped view state shared by all view trackers
//!
//! Holds the "most recently logged" session and the route key → view id
//! recency cache. Observers of the same route converge on one view id through
//! this state without talking to each other.

use crate::cache::{RecencyCache, DEFAULT_CACHE_CAPACITY};
use crate::emitter::EventEmitter;
use crate::ids::IdGenerator;
use crate::view::session::ViewSession;
use std::cell::RefCell;
use std::rc::Rc;

/// Handle to a [`ViewContext`] shared between trackers on one UI thread
pub type SharedViewContext = Rc<RefCell<ViewContext>>;

pub struct ViewContext {
    last_logged: Option<ViewSession>,
    route_view_ids: RecencyCache<String, String>,
    resume_remembered: bool,
    ids: Rc<dyn IdGenerator>,
    emitter: Rc<dyn EventEmitter>,
}

impl ViewContext {
    pub fn new(ids: Rc<dyn IdGenerator>, emitter: Rc<dyn EventEmitter>) -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY, ids, emitter)
    }

    pub fn with_capacity(
        capacity: usize,
        ids: Rc<dyn IdGenerator>,
        emitter: Rc<dyn EventEmitter>,
    ) -> Self {
        Self {
            last_logged: None,
            route_view_ids: RecencyCache::new(capacity),
            resume_remembered: true,
            ids,
            emitter,
        }
    }

    /// Whether a refocused route resumes its remembered view id (default) or
    /// starts a new logical view.
    pub fn resume_remembered_ids(mut self, resume: bool) -> Self {
        self.resume_remembered = resume;
        self
    }

    pub fn into_shared(self) -> SharedViewContext {
        Rc::new(RefCell::new(self))
    }

    /// Most recently logged session, if any
    pub fn last_logged(&self) -> Option<&ViewSession> {
        self.last_logged.as_ref()
    }

    /// View id of the most recently logged session
    pub fn last_view_id(&self) -> Option<&str> {
        self.last_logged.as_ref().and_then(|s| s.view_id.as_deref())
    }

    /// Remembered view id for `route_key`, refreshing its recency
    pub fn remembered_view_id(&mut self, route_key: &str) -> Option<String> {
        self.route_view_ids.get(route_key).cloned()
    }

    /// Remembered view id for `route_key` without touching recency
    pub fn peek_view_id(&self, route_key: &str) -> Option<&str> {
        self.route_view_ids.peek(route_key).map(String::as_str)
    }

    pub fn remembered_routes(&self) -> usize {
        self.route_view_ids.len()
    }

    /// Claim `session` as the most recently logged view and remember its id.
    ///
    /// Emits a view event when `is_new` is set; reuse of an existing id never
    /// logs a view.
    pub fn publish(&mut self, session: &ViewSession, is_new: bool) {
        let Some(view_id) = session.view_id.as_deref() else {
            return;
        };
        if is_new {
            log::info!(
                "logging view {} ({}) view_id={}",
                session.route_name,
                session.route_key,
                view_id
            );
            self.emitter
                .emit_view(&session.route_name, &session.route_key, view_id);
        }
        self.route_view_ids
            .set(session.route_key.clone(), view_id.to_string());
        self.last_logged = Some(session.clone());
    }

    /// Log a view unconditionally with a fresh id and make it the most
    /// recently logged session.
    pub fn log_view(&mut self, route_name: &str, route_key: &str) -> ViewSession {
        let session = ViewSession {
            route_name: route_name.to_string(),
            route_key: route_key.to_string(),
            view_id: Some(self.ids.next_id()),
            is_topmost: true,
        };
        self.publish(&session, true);
        session
    }

    pub(crate) fn resumes_remembered(&self) -> bool {
        self.resume_remembered
    }

    pub(crate) fn next_id(&self) -> String {
        self.ids.next_id()
    }

    /// Forget all view state, e.g. at a user session boundary.
    pub fn reset(&mut self) {
        log::debug!(
            "resetting view context ({} remembered routes)",
            self.route_view_ids.len()
        );
        self.last_logged = None;
        self.route_view_ids.clear();
    }
}

impl std::fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewContext")
            .field("last_logged", &self.last_logged)
            .field("route_view_ids", &self.route_view_ids)
            .field("resume_remembered", &self.resume_remembered)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{MetricsEvent, RecordingEmitter};
    use crate::ids::SequentialIdGenerator;

    #[test]
    fn test_log_view_publishes() {
        let emitter = Rc::new(RecordingEmitter::new());
        let mut context =
            ViewContext::new(Rc::new(SequentialIdGenerator::new("v")), emitter.clone());

        let session = context.log_view("Home", "Home-1");

        assert_eq!(session.view_id.as_deref(), Some("v-1"));
        assert_eq!(context.last_view_id(), Some("v-1"));
        assert_eq!(context.peek_view_id("Home-1"), Some("v-1"));
        assert_eq!(
            emitter.events(),
            vec![MetricsEvent::View {
                route_name: "Home".to_string(),
                route_key: "Home-1".to_string(),
                view_id: "v-1".to_string(),
            }]
        );
    }

    #[test]
    fn test_publish_reuse_does_not_emit() {
        let emitter = Rc::new(RecordingEmitter::new());
        let mut context =
            ViewContext::new(Rc::new(SequentialIdGenerator::new("v")), emitter.clone());

        let mut session = ViewSession::new("Home", "Home-1");
        session.view_id = Some("remembered".to_string());
        context.publish(&session, false);

        assert!(emitter.is_empty());
        assert_eq!(context.last_view_id(), Some("remembered"));
    }

    #[test]
    fn test_publish_without_id_is_ignored() {
        let emitter = Rc::new(RecordingEmitter::new());
        let mut context =
            ViewContext::new(Rc::new(SequentialIdGenerator::new("v")), emitter.clone());

        context.publish(&ViewSession::new("Home", "Home-1"), true);

        assert!(emitter.is_empty());
        assert!(context.last_logged().is_none());
    }

    #[test]
    fn test_reset() {
        let emitter = Rc::new(RecordingEmitter::new());
        let mut context =
            ViewContext::with_capacity(2, Rc::new(SequentialIdGenerator::new("v")), emitter);
        context.log_view("Home", "Home-1");
        context.log_view("Detail", "Detail-1");
        context.log_view("Cart", "Cart-1");
        assert_eq!(context.remembered_routes(), 2);

        context.reset();

        assert!(context.last_logged().is_none());
        assert_eq!(context.remembered_routes(), 0);
        assert_eq!(context.remembered_view_id("Cart-1"), None);
    }
}
