//! Event emitter boundary
//!
//! The trackers never transmit anything themselves. They call an
//! [`EventEmitter`], the seam to the native transport. Calls are
//! fire-and-forget: emitters must not fail back into the trackers.

use crate::types::{ActionType, Cart, Content, ImpressionSourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::io::Write;

/// Begin-impression payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginImpression {
    pub impression_id: String,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,
    pub source_type: ImpressionSourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec<u32>>,
}

/// Action payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,
    /// Impression the action happened on, when the content is still visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impression_id: Option<String>,
    #[serde(default)]
    pub has_superimposed_views: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_screen_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart: Option<Cart>,
}

/// Every event the trackers can emit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MetricsEvent {
    View {
        route_name: String,
        route_key: String,
        view_id: String,
    },
    BeginImpression(BeginImpression),
    EndImpression {
        impression_id: String,
    },
    Action(ActionEvent),
}

impl MetricsEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MetricsEvent::View { .. } => "view",
            MetricsEvent::BeginImpression(_) => "begin_impression",
            MetricsEvent::EndImpression { .. } => "end_impression",
            MetricsEvent::Action(_) => "action",
        }
    }
}

/// Boundary to the transport that records events.
///
/// Implementations take `&self`; the trackers share one emitter and never
/// read anything back from it.
pub trait EventEmitter {
    fn emit_view(&self, route_name: &str, route_key: &str, view_id: &str);

    fn emit_begin_impression(&self, impression: &BeginImpression);

    fn emit_end_impression(&self, impression_id: &str);

    fn emit_action(&self, action: &ActionEvent);
}

/// Collects events in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: RefCell<Vec<MetricsEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<MetricsEvent> {
        self.events.borrow().clone()
    }

    /// Take everything recorded so far, leaving the recorder empty
    pub fn drain(&self) -> Vec<MetricsEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Number of recorded events of the given kind (see [`MetricsEvent::kind`])
    pub fn count(&self, kind: &str) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    fn push(&self, event: MetricsEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit_view(&self, route_name: &str, route_key: &str, view_id: &str) {
        self.push(MetricsEvent::View {
            route_name: route_name.to_string(),
            route_key: route_key.to_string(),
            view_id: view_id.to_string(),
        });
    }

    fn emit_begin_impression(&self, impression: &BeginImpression) {
        self.push(MetricsEvent::BeginImpression(impression.clone()));
    }

    fn emit_end_impression(&self, impression_id: &str) {
        self.push(MetricsEvent::EndImpression {
            impression_id: impression_id.to_string(),
        });
    }

    fn emit_action(&self, action: &ActionEvent) {
        self.push(MetricsEvent::Action(action.clone()));
    }
}

/// Writes every event to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmitter;

impl EventEmitter for LogEmitter {
    fn emit_view(&self, route_name: &str, route_key: &str, view_id: &str) {
        log::info!("view {} ({}) view_id={}", route_name, route_key, view_id);
    }

    fn emit_begin_impression(&self, impression: &BeginImpression) {
        log::info!(
            "begin impression {} content={:?} source={} view_id={:?}",
            impression.impression_id,
            impression.content.identity(),
            impression.source_type.as_str(),
            impression.view_id
        );
    }

    fn emit_end_impression(&self, impression_id: &str) {
        log::info!("end impression {}", impression_id);
    }

    fn emit_action(&self, action: &ActionEvent) {
        let cart_total = action.cart.as_ref().and_then(|cart| cart.total_micros());
        log::info!(
            "action {} name={:?} impression_id={:?} view_id={:?} cart_total={:?}",
            action.action_type.as_str(),
            action.action_name,
            action.impression_id,
            action.view_id,
            cart_total
        );
    }
}

/// One line written by [`WriterEmitter`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: MetricsEvent,
}

/// Writes one JSON object per event to any [`Write`] sink.
///
/// Write failures are logged and dropped.
#[derive(Debug)]
pub struct WriterEmitter<W: Write> {
    writer: RefCell<W>,
    flush: bool,
}

impl<W: Write> WriterEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
            flush: false,
        }
    }

    /// Flush the sink after every event
    pub fn flushing(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write(&self, event: MetricsEvent) {
        let record = EventRecord {
            emitted_at: Utc::now(),
            event,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                log::error!("failed to encode {} event: {}", record.event.kind(), e);
                return;
            }
        };
        let mut writer = self.writer.borrow_mut();
        if let Err(e) = writeln!(writer, "{}", line) {
            log::error!("failed to write {} event: {}", record.event.kind(), e);
            return;
        }
        if self.flush {
            if let Err(e) = writer.flush() {
                log::error!("failed to flush event sink: {}", e);
            }
        }
    }
}

impl<W: Write> EventEmitter for WriterEmitter<W> {
    fn emit_view(&self, route_name: &str, route_key: &str, view_id: &str) {
        self.write(MetricsEvent::View {
            route_name: route_name.to_string(),
            route_key: route_key.to_string(),
            view_id: view_id.to_string(),
        });
    }

    fn emit_begin_impression(&self, impression: &BeginImpression) {
        self.write(MetricsEvent::BeginImpression(impression.clone()));
    }

    fn emit_end_impression(&self, impression_id: &str) {
        self.write(MetricsEvent::EndImpression {
            impression_id: impression_id.to_string(),
        });
    }

    fn emit_action(&self, action: &ActionEvent) {
        self.write(MetricsEvent::Action(action.clone()));
    }
}
