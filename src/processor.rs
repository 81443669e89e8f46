//! Processor orchestration
//!
//! This module provides the public API for Engagement Metrics. It wires the
//! view trackers and the impression tracker to one emitter and routes host
//! signals to them.

use crate::config::TrackerConfig;
use crate::emitter::{ActionEvent, BeginImpression, EventEmitter, MetricsEvent, RecordingEmitter};
use crate::error::TrackerError;
use crate::ids::IdGenerator;
use crate::impression::ImpressionTracker;
use crate::signal::{HostSignal, SignalParser};
use crate::types::{ActionType, Cart, Content, ImpressionSourceType, VisibleContent};
use crate::view::{AutoViewTracker, SharedViewContext, ViewContext};
use std::collections::HashMap;
use std::rc::Rc;

/// Run a stream of host signals through a fresh processor.
///
/// # Arguments
/// * `ndjson` - Newline-delimited `engage.host_signal.v1` records
/// * `config` - Tracker configuration
///
/// # Returns
/// Every event emitted, in order. Collections still mounted when the stream
/// ends are unmounted, so their live impressions are ended. Signals the
/// processor rejects are logged and skipped; only undecodable input or an
/// invalid config fails the replay.
///
/// # Example
/// ```ignore
/// let events = replay_signals(ndjson, TrackerConfig::default())?;
/// ```
pub fn replay_signals(
    ndjson: &str,
    config: TrackerConfig,
) -> Result<Vec<MetricsEvent>, TrackerError> {
    let signals = SignalParser::parse_ndjson(ndjson)?;
    replay(signals, config)
}

/// Run already-decoded host signals through a fresh processor.
///
/// See [`replay_signals`].
pub fn replay(
    signals: Vec<HostSignal>,
    config: TrackerConfig,
) -> Result<Vec<MetricsEvent>, TrackerError> {
    config.validate()?;

    let emitter = Rc::new(RecordingEmitter::new());
    let mut processor = MetricsProcessor::new(config, emitter.clone());
    for (index, signal) in signals.into_iter().enumerate() {
        let kind = signal.kind();
        if let Err(e) = processor.apply(signal) {
            log::warn!("skipping {} signal at index {}: {}", kind, index, e);
        }
    }
    processor.shutdown();

    Ok(emitter.drain())
}

/// View scope stamped on impressions and actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewScope {
    pub view_id: Option<String>,
    pub has_superimposed_views: bool,
}

/// Arguments for [`MetricsProcessor::log_action`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRequest {
    /// Observer whose view scopes the action; `None` uses the most recently
    /// logged view
    pub observer: Option<String>,
    pub content: Option<Content>,
    pub action_type: ActionType,
    /// Required for [`ActionType::Custom`]
    pub action_name: Option<String>,
    /// For navigate actions, the screen that will display the content
    pub destination_screen_name: Option<String>,
    pub cart: Option<Cart>,
}

/// Stateful processor owning all tracking state for one app process.
pub struct MetricsProcessor {
    config: TrackerConfig,
    context: SharedViewContext,
    impressions: ImpressionTracker,
    observers: HashMap<String, AutoViewTracker>,
    collection_observers: HashMap<String, String>,
    ids: Rc<dyn IdGenerator>,
    emitter: Rc<dyn EventEmitter>,
}

impl MetricsProcessor {
    /// Create a processor using the id generator selected by `config`
    pub fn new(config: TrackerConfig, emitter: Rc<dyn EventEmitter>) -> Self {
        let ids = config.id_generator();
        Self::with_id_generator(config, ids, emitter)
    }

    /// Create a processor with an explicit id generator
    pub fn with_id_generator(
        config: TrackerConfig,
        ids: Rc<dyn IdGenerator>,
        emitter: Rc<dyn EventEmitter>,
    ) -> Self {
        let context = ViewContext::with_capacity(
            config.view_cache_capacity,
            ids.clone(),
            emitter.clone(),
        )
        .resume_remembered_ids(config.resume_remembered_view_ids)
        .into_shared();
        let impressions = ImpressionTracker::new(ids.clone(), emitter.clone())
            .warn_on_insertion_mismatch(config.warn_on_insertion_mismatch);

        Self {
            config,
            context,
            impressions,
            observers: HashMap::new(),
            collection_observers: HashMap::new(),
            ids,
            emitter,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn view_context(&self) -> &SharedViewContext {
        &self.context
    }

    pub fn impressions(&self) -> &ImpressionTracker {
        &self.impressions
    }

    pub fn observer(&self, observer: &str) -> Option<&AutoViewTracker> {
        self.observers.get(observer)
    }

    /// Validate and route one host signal.
    ///
    /// Only malformed input fails. Signals naming unknown observers or
    /// collections are ignored.
    pub fn apply(&mut self, signal: HostSignal) -> Result<(), TrackerError> {
        signal.validate()?;
        match signal {
            HostSignal::Attach {
                observer,
                route_name,
                route_key,
            } => self.attach(&observer, &route_name, &route_key),
            HostSignal::FocusGained { observer } => self.focus_gained(&observer),
            HostSignal::FocusLost { observer } => self.focus_lost(&observer),
            HostSignal::Detach { observer } => self.detach(&observer),
            HostSignal::CollectionMount {
                collection_id,
                observer,
                source_type,
            } => self.mount_collection(&collection_id, observer.as_deref(), source_type),
            HostSignal::VisibleItemsChanged {
                collection_id,
                items,
            } => {
                let visible = self.config.content_keys.visible_list(&items);
                self.visible_items_changed(&collection_id, &visible);
            }
            HostSignal::CollectionUnmount { collection_id } => {
                self.unmount_collection(&collection_id)
            }
            HostSignal::ItemTapped {
                collection_id,
                item,
                action_type,
                action_name,
            } => {
                let content = self.config.content_keys.content_from_value(&item)?;
                self.item_tapped(&collection_id, content, action_type, action_name);
            }
            HostSignal::Action {
                observer,
                content,
                action_type,
                action_name,
                destination_screen_name,
                cart,
            } => {
                let content = content
                    .map(|value| self.config.content_keys.content_from_value(&value))
                    .transpose()?;
                self.log_action(ActionRequest {
                    observer,
                    content,
                    action_type,
                    action_name,
                    destination_screen_name,
                    cart,
                });
            }
            HostSignal::View {
                route_name,
                route_key,
            } => {
                self.log_view(&route_name, &route_key);
            }
            HostSignal::Impression {
                observer,
                item,
                source_type,
            } => {
                let visible = self.config.content_keys.visible_from_value(&item)?;
                self.log_impression(observer.as_deref(), visible, source_type);
            }
            HostSignal::Reset => self.reset(),
        }
        Ok(())
    }

    /// Attach a named observer to a route. Re-attaching a name replaces its
    /// previous tracker.
    pub fn attach(&mut self, observer: &str, route_name: &str, route_key: &str) {
        let tracker = AutoViewTracker::attach(&self.context, route_name, route_key);
        if let Some(previous) = self.observers.insert(observer.to_string(), tracker) {
            log::debug!("observer {} re-attached", observer);
            previous.detach();
        }
    }

    pub fn focus_gained(&mut self, observer: &str) {
        match self.observers.get_mut(observer) {
            Some(tracker) => tracker.on_focus_gained(),
            None => log::debug!("focus gained for unknown observer {}, ignoring", observer),
        }
    }

    pub fn focus_lost(&mut self, observer: &str) {
        match self.observers.get_mut(observer) {
            Some(tracker) => tracker.on_focus_lost(),
            None => log::debug!("focus lost for unknown observer {}, ignoring", observer),
        }
    }

    pub fn detach(&mut self, observer: &str) {
        match self.observers.remove(observer) {
            Some(tracker) => tracker.detach(),
            None => log::debug!("detach of unknown observer {}, ignoring", observer),
        }
    }

    /// Mount a collection, binding it to `observer` for view-id stamping.
    pub fn mount_collection(
        &mut self,
        collection_id: &str,
        observer: Option<&str>,
        source_type: Option<ImpressionSourceType>,
    ) {
        if self.impressions.is_mounted(collection_id) {
            log::debug!("collection {} already mounted", collection_id);
            return;
        }
        let source_type = source_type.unwrap_or(self.config.default_source_type);
        self.impressions.mount(collection_id, source_type);
        if let Some(observer) = observer {
            self.collection_observers
                .insert(collection_id.to_string(), observer.to_string());
        }
    }

    pub fn visible_items_changed(&mut self, collection_id: &str, visible: &[VisibleContent]) {
        let scope = self.collection_scope(collection_id);
        self.impressions
            .on_visibility_changed(collection_id, visible, scope.view_id.as_deref());
    }

    pub fn unmount_collection(&mut self, collection_id: &str) {
        self.impressions.unmount(collection_id);
        self.collection_observers.remove(collection_id);
    }

    /// Log an action on an item of a tracked collection.
    ///
    /// The action references the item's live impression when the item is
    /// still visible, and is logged uncorrelated otherwise. Defaults to
    /// [`ActionType::Navigate`].
    pub fn item_tapped(
        &mut self,
        collection_id: &str,
        content: Content,
        action_type: Option<ActionType>,
        action_name: Option<String>,
    ) {
        let action_type = action_type.unwrap_or(ActionType::Navigate);
        let scope = self.collection_scope(collection_id);
        let impression_id = self.impressions.impression_id_for(collection_id, &content);
        if impression_id.is_none() {
            log::debug!(
                "action on {:?} in collection {} has no live impression",
                content.identity(),
                collection_id
            );
        }
        self.emit_action(ActionEvent {
            action_type,
            action_name,
            content: Some(content),
            view_id: scope.view_id,
            impression_id,
            has_superimposed_views: scope.has_superimposed_views,
            destination_screen_name: None,
            cart: None,
        });
    }

    /// Log an action outside a collection tap.
    ///
    /// When the content is visible in some tracked collection, the action
    /// references that impression.
    pub fn log_action(&mut self, request: ActionRequest) {
        let scope = self.observer_scope(request.observer.as_deref());
        let impression_id = request
            .content
            .as_ref()
            .and_then(|content| self.impressions.find_impression_id(content));
        self.emit_action(ActionEvent {
            action_type: request.action_type,
            action_name: request.action_name,
            content: request.content,
            view_id: scope.view_id,
            impression_id,
            has_superimposed_views: scope.has_superimposed_views,
            destination_screen_name: request.destination_screen_name,
            cart: request.cart,
        });
    }

    /// Log a view unconditionally, returning its new view id.
    pub fn log_view(&mut self, route_name: &str, route_key: &str) -> Option<String> {
        self.context.borrow_mut().log_view(route_name, route_key).view_id
    }

    /// Log a single impression that no collection tracks, returning its id.
    ///
    /// No end event follows.
    pub fn log_impression(
        &mut self,
        observer: Option<&str>,
        visible: VisibleContent,
        source_type: Option<ImpressionSourceType>,
    ) -> String {
        let scope = self.observer_scope(observer);
        let impression = BeginImpression {
            impression_id: self.ids.next_id(),
            content: visible.content,
            view_id: scope.view_id,
            source_type: source_type.unwrap_or(self.config.default_source_type),
            position: visible.position,
        };
        self.emitter.emit_begin_impression(&impression);
        impression.impression_id
    }

    /// Forget all view state at a user session boundary. Mounted
    /// collections and attached observers are kept.
    pub fn reset(&mut self) {
        self.context.borrow_mut().reset();
    }

    /// Unmount every collection (ending live impressions) and drop all
    /// observers.
    pub fn shutdown(&mut self) {
        self.impressions.unmount_all();
        self.collection_observers.clear();
        for (_, tracker) in self.observers.drain() {
            tracker.detach();
        }
    }

    fn emit_action(&self, action: ActionEvent) {
        if action.action_type == ActionType::Custom && action.action_name.is_none() {
            log::warn!("custom action logged without a name");
        }
        self.emitter.emit_action(&action);
    }

    fn collection_scope(&self, collection_id: &str) -> ViewScope {
        let observer = self.collection_observers.get(collection_id).map(String::as_str);
        self.observer_scope(observer)
    }

    /// Scope of a known observer, or of the most recently logged view.
    fn observer_scope(&self, observer: Option<&str>) -> ViewScope {
        if let Some(tracker) = observer.and_then(|name| self.observers.get(name)) {
            return ViewScope {
                view_id: tracker.view_id(),
                has_superimposed_views: !tracker.is_topmost(),
            };
        }
        let context = self.context.borrow();
        match context.last_logged() {
            Some(session) => ViewScope {
                view_id: session.view_id.clone(),
                has_superimposed_views: session.has_superimposed_views(),
            },
            None => ViewScope::default(),
        }
    }
}
