//! Per-observer view tracker
//!
//! Each piece of instrumentation mounted on a screen (a metrics logger, a
//! collection tracker, ...) attaches its own [`AutoViewTracker`] and receives
//! its own focus callbacks. All of them must log the screen's view exactly
//! once and agree on its id.

use crate::view::context::SharedViewContext;
use crate::view::session::ViewSession;

/// Live view session handle for one observer of a route
#[derive(Debug)]
pub struct AutoViewTracker {
    context: SharedViewContext,
    session: ViewSession,
}

impl AutoViewTracker {
    /// Attach an observer to `route_key`.
    ///
    /// The handle starts with whatever id is remembered for the route (if
    /// any), so a route mounted in the background still reports a usable id
    /// without ever gaining focus.
    pub fn attach(
        context: &SharedViewContext,
        route_name: impl Into<String>,
        route_key: impl Into<String>,
    ) -> Self {
        let mut session = ViewSession::new(route_name, route_key);
        session.view_id = context.borrow_mut().remembered_view_id(&session.route_key);
        Self {
            context: context.clone(),
            session,
        }
    }

    /// Host callback: the route gained navigation focus.
    pub fn on_focus_gained(&mut self) {
        self.session.is_topmost = true;
        let mut context = self.context.borrow_mut();

        // Another observer of this route already logged the current focus
        // period: adopt its id instead of logging again.
        if let Some(last) = context.last_logged() {
            if last.route_key == self.session.route_key && last.view_id.is_some() {
                // Route keys are the identity; a differing name is only reported.
                if last.route_name != self.session.route_name {
                    log::warn!(
                        "route {} logged as {} but focused as {}",
                        self.session.route_key,
                        last.route_name,
                        self.session.route_name
                    );
                }
                self.session.view_id = last.view_id.clone();
                log::debug!(
                    "reusing view_id {:?} for route {}",
                    self.session.view_id,
                    self.session.route_key
                );
                return;
            }
        }

        // An id this observer already holds outlives its cache entry.
        let remembered = if context.resumes_remembered() {
            context
                .remembered_view_id(&self.session.route_key)
                .or_else(|| self.session.view_id.clone())
        } else {
            None
        };
        let is_new = remembered.is_none();
        let view_id = remembered.unwrap_or_else(|| context.next_id());

        self.session.view_id = Some(view_id);
        context.publish(&self.session, is_new);
    }

    /// Host callback: the route lost focus. The id is kept so the route
    /// resumes it when uncovered.
    pub fn on_focus_lost(&mut self) {
        self.session.is_topmost = false;
    }

    /// Release this observer. The remembered id stays in the shared cache.
    pub fn detach(self) {
        log::debug!(
            "detaching view observer for route {} (view_id {:?})",
            self.session.route_key,
            self.session.view_id
        );
    }

    pub fn session(&self) -> &ViewSession {
        &self.session
    }

    pub fn route_key(&self) -> &str {
        &self.session.route_key
    }

    pub fn is_topmost(&self) -> bool {
        self.session.is_topmost
    }

    /// Best known view id for this route.
    ///
    /// Falls back to the shared cache when this observer has not been
    /// focused yet but a sibling has.
    pub fn view_id(&self) -> Option<String> {
        if let Some(id) = &self.session.view_id {
            return Some(id.clone());
        }
        self.context
            .borrow()
            .peek_view_id(&self.session.route_key)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{MetricsEvent, RecordingEmitter};
    use crate::ids::SequentialIdGenerator;
    use crate::view::context::ViewContext;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn setup() -> (SharedViewContext, Rc<RecordingEmitter>) {
        let emitter = Rc::new(RecordingEmitter::new());
        let context = ViewContext::new(Rc::new(SequentialIdGenerator::new("v")), emitter.clone())
            .into_shared();
        (context, emitter)
    }

    fn view_event(name: &str, key: &str, id: &str) -> MetricsEvent {
        MetricsEvent::View {
            route_name: name.to_string(),
            route_key: key.to_string(),
            view_id: id.to_string(),
        }
    }

    #[test]
    fn test_first_focus_generates_and_logs() {
        let (context, emitter) = setup();
        let mut tracker = AutoViewTracker::attach(&context, "Home", "Home-1");
        assert_eq!(tracker.view_id(), None);
        assert!(!tracker.is_topmost());

        tracker.on_focus_gained();

        assert!(tracker.is_topmost());
        assert_eq!(tracker.view_id().as_deref(), Some("v-1"));
        assert_eq!(emitter.events(), vec![view_event("Home", "Home-1", "v-1")]);
        assert_eq!(context.borrow().last_view_id(), Some("v-1"));
    }

    #[test]
    fn test_sibling_observers_converge() {
        let (context, emitter) = setup();
        let mut logger = AutoViewTracker::attach(&context, "Home", "Home-1");
        let mut collection = AutoViewTracker::attach(&context, "Home", "Home-1");

        logger.on_focus_gained();
        collection.on_focus_gained();

        assert_eq!(logger.view_id(), collection.view_id());
        assert_eq!(emitter.count("view"), 1);
    }

    #[test]
    fn test_duplicate_focus_is_idempotent() {
        let (context, emitter) = setup();
        let mut tracker = AutoViewTracker::attach(&context, "Home", "Home-1");

        tracker.on_focus_gained();
        tracker.on_focus_gained();
        tracker.on_focus_gained();

        assert_eq!(tracker.view_id().as_deref(), Some("v-1"));
        assert_eq!(emitter.count("view"), 1);
    }

    #[test]
    fn test_blur_and_refocus_keeps_id() {
        let (context, emitter) = setup();
        let mut home = AutoViewTracker::attach(&context, "Home", "Home-1");
        home.on_focus_gained();

        // Detail is pushed on top of Home
        home.on_focus_lost();
        assert!(!home.is_topmost());
        assert!(home.session().has_superimposed_views());
        assert_eq!(home.view_id().as_deref(), Some("v-1"));

        let mut detail = AutoViewTracker::attach(&context, "Detail", "Detail-1");
        detail.on_focus_gained();
        detail.on_focus_lost();
        detail.detach();

        // Back to Home: remembered id, no new view event
        home.on_focus_gained();
        assert!(home.is_topmost());
        assert_eq!(home.view_id().as_deref(), Some("v-1"));
        assert_eq!(
            emitter.events(),
            vec![
                view_event("Home", "Home-1", "v-1"),
                view_event("Detail", "Detail-1", "v-2"),
            ]
        );
        assert_eq!(context.borrow().last_view_id(), Some("v-1"));
    }

    #[test]
    fn test_regenerate_on_refocus_when_not_resuming() {
        let emitter = Rc::new(RecordingEmitter::new());
        let context = ViewContext::new(Rc::new(SequentialIdGenerator::new("v")), emitter.clone())
            .resume_remembered_ids(false)
            .into_shared();

        let mut home = AutoViewTracker::attach(&context, "Home", "Home-1");
        home.on_focus_gained();
        home.on_focus_lost();
        let mut detail = AutoViewTracker::attach(&context, "Detail", "Detail-1");
        detail.on_focus_gained();
        home.on_focus_gained();

        assert_eq!(home.view_id().as_deref(), Some("v-3"));
        assert_eq!(emitter.count("view"), 3);
    }

    #[test]
    fn test_background_route_uses_remembered_id() {
        let (context, emitter) = setup();
        let mut first = AutoViewTracker::attach(&context, "Feed", "Feed-1");
        first.on_focus_gained();
        first.detach();

        // Remounted without unmount (e.g. background refresh), never focused
        let remounted = AutoViewTracker::attach(&context, "Feed", "Feed-1");
        assert_eq!(remounted.view_id().as_deref(), Some("v-1"));
        assert!(!remounted.is_topmost());
        assert_eq!(emitter.count("view"), 1);
    }

    #[test]
    fn test_unfocused_observer_sees_sibling_id() {
        let (context, _emitter) = setup();
        let passive = AutoViewTracker::attach(&context, "Home", "Home-1");
        let mut active = AutoViewTracker::attach(&context, "Home", "Home-1");

        active.on_focus_gained();

        assert_eq!(passive.session().view_id, None);
        assert_eq!(passive.view_id().as_deref(), Some("v-1"));
    }

    #[test]
    fn test_same_route_name_different_keys() {
        let (context, emitter) = setup();
        let mut first = AutoViewTracker::attach(&context, "Detail", "Detail-1");
        let mut second = AutoViewTracker::attach(&context, "Detail", "Detail-2");

        first.on_focus_gained();
        second.on_focus_gained();

        assert_ne!(first.view_id(), second.view_id());
        assert_eq!(emitter.count("view"), 2);
    }

    #[test]
    fn test_remembered_id_evicted_from_cache() {
        let emitter = Rc::new(RecordingEmitter::new());
        let context =
            ViewContext::with_capacity(1, Rc::new(SequentialIdGenerator::new("v")), emitter.clone())
                .into_shared();

        let mut home = AutoViewTracker::attach(&context, "Home", "Home-1");
        home.on_focus_gained();
        let mut detail = AutoViewTracker::attach(&context, "Detail", "Detail-1");
        detail.on_focus_gained();
        assert_eq!(context.borrow().peek_view_id("Home-1"), None);

        // Home's cache entry was evicted by Detail, but the observer still
        // holds its id and resumes it
        home.on_focus_lost();
        home.on_focus_gained();
        assert_eq!(home.view_id().as_deref(), Some("v-1"));
        assert_eq!(emitter.count("view"), 2);
        assert_eq!(context.borrow().peek_view_id("Home-1"), Some("v-1"));
        assert_eq!(context.borrow().last_view_id(), Some("v-1"));
    }

    #[test]
    fn test_new_observer_after_eviction_starts_new_view() {
        let emitter = Rc::new(RecordingEmitter::new());
        let context =
            ViewContext::with_capacity(1, Rc::new(SequentialIdGenerator::new("v")), emitter.clone())
                .into_shared();

        let mut home = AutoViewTracker::attach(&context, "Home", "Home-1");
        home.on_focus_gained();
        home.detach();
        let mut detail = AutoViewTracker::attach(&context, "Detail", "Detail-1");
        detail.on_focus_gained();

        let mut home = AutoViewTracker::attach(&context, "Home", "Home-1");
        assert_eq!(home.view_id(), None);
        home.on_focus_gained();
        assert_eq!(home.view_id().as_deref(), Some("v-3"));
        assert_eq!(emitter.count("view"), 3);
    }
}
