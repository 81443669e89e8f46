//! Engagement Metrics - On-device view, impression and action tracking
//!
//! Turns UI lifecycle callbacks (route focus, collection visibility
//! snapshots, taps) into a stream of analytics events whose identifiers let a
//! backend join an action to the impression it came from and the view that
//! impression was shown in.
//!
//! ## Modules
//!
//! - **Views**: [`AutoViewTracker`] instances attached to the same route agree
//!   on one view id through a shared [`ViewContext`]
//! - **Impressions**: [`ImpressionTracker`] diffs visibility snapshots into
//!   begin/end impression events
//! - **Processor**: [`MetricsProcessor`] routes serialized host signals to both

pub mod cache;
pub mod config;
pub mod content;
pub mod emitter;
pub mod error;
pub mod ids;
pub mod impression;
pub mod processor;
pub mod signal;
pub mod types;
pub mod view;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use cache::RecencyCache;
pub use config::TrackerConfig;
pub use content::ContentKeys;
pub use emitter::{
    ActionEvent, BeginImpression, EventEmitter, LogEmitter, MetricsEvent, RecordingEmitter,
    WriterEmitter,
};
pub use error::TrackerError;
pub use ids::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use impression::ImpressionTracker;
pub use processor::{replay, replay_signals, ActionRequest, MetricsProcessor};
pub use types::{ActionType, Cart, Content, ImpressionSourceType, VisibleContent};
pub use view::{AutoViewTracker, SharedViewContext, ViewContext};

// Signal schema exports
pub use signal::{HostSignal, SignalParser, SCHEMA_VERSION};

/// Library version reported by the CLI and the C ABI
pub const METRICS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "engagement-metrics";
