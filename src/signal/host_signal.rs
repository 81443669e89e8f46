//! engage.host_signal.v1 definition
//!
//! Serializable form of the lifecycle callbacks a host UI framework delivers:
//! route focus, collection mount/unmount, visibility snapshots, and taps.
//! Used for replays, the CLI, and the C ABI.

use crate::types::{ActionType, Cart, ImpressionSourceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current host signal format version
pub const SCHEMA_VERSION: &str = "engage.host_signal.v1";

/// One upstream signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum HostSignal {
    /// A piece of instrumentation mounted on a route
    Attach {
        observer: String,
        route_name: String,
        route_key: String,
    },
    FocusGained {
        observer: String,
    },
    FocusLost {
        observer: String,
    },
    Detach {
        observer: String,
    },
    CollectionMount {
        collection_id: String,
        /// Observer whose view id stamps this collection's impressions
        #[serde(default, skip_serializing_if = "Option::is_none")]
        observer: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_type: Option<ImpressionSourceType>,
    },
    VisibleItemsChanged {
        collection_id: String,
        #[serde(default)]
        items: Vec<Value>,
    },
    CollectionUnmount {
        collection_id: String,
    },
    /// Tap on an item of a tracked collection
    ItemTapped {
        collection_id: String,
        item: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_type: Option<ActionType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_name: Option<String>,
    },
    /// Action logged directly, optionally scoped to an observer's view
    Action {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        observer: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        #[serde(default)]
        action_type: ActionType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination_screen_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cart: Option<Cart>,
    },
    /// Unconditional view log
    View {
        route_name: String,
        route_key: String,
    },
    /// One-off impression outside any tracked collection
    Impression {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        observer: Option<String>,
        item: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_type: Option<ImpressionSourceType>,
    },
    /// User session boundary: forget all view state
    Reset,
}

impl HostSignal {
    /// Name of the signal as it appears in the `signal` tag
    pub fn kind(&self) -> &'static str {
        match self {
            HostSignal::Attach { .. } => "attach",
            HostSignal::FocusGained { .. } => "focus_gained",
            HostSignal::FocusLost { .. } => "focus_lost",
            HostSignal::Detach { .. } => "detach",
            HostSignal::CollectionMount { .. } => "collection_mount",
            HostSignal::VisibleItemsChanged { .. } => "visible_items_changed",
            HostSignal::CollectionUnmount { .. } => "collection_unmount",
            HostSignal::ItemTapped { .. } => "item_tapped",
            HostSignal::Action { .. } => "action",
            HostSignal::View { .. } => "view",
            HostSignal::Impression { .. } => "impression",
            HostSignal::Reset => "reset",
        }
    }

    /// Check the structural requirements serde cannot express.
    pub fn validate(&self) -> Result<(), SignalValidationError> {
        match self {
            HostSignal::Attach {
                observer,
                route_key,
                ..
            } => {
                non_empty("observer", observer)?;
                non_empty("route_key", route_key)
            }
            HostSignal::FocusGained { observer }
            | HostSignal::FocusLost { observer }
            | HostSignal::Detach { observer } => non_empty("observer", observer),
            HostSignal::CollectionMount {
                collection_id,
                observer,
                ..
            } => {
                non_empty("collection_id", collection_id)?;
                if let Some(observer) = observer {
                    non_empty("observer", observer)?;
                }
                Ok(())
            }
            // Non-object items are dropped during normalization, not rejected,
            // so one bad entry cannot end every other live impression.
            HostSignal::VisibleItemsChanged { collection_id, .. } => {
                non_empty("collection_id", collection_id)
            }
            HostSignal::CollectionUnmount { collection_id } => {
                non_empty("collection_id", collection_id)
            }
            HostSignal::ItemTapped {
                collection_id,
                item,
                ..
            } => {
                non_empty("collection_id", collection_id)?;
                object("item", item)
            }
            HostSignal::Action { content, .. } => match content {
                Some(content) => object("content", content),
                None => Ok(()),
            },
            HostSignal::View { route_key, .. } => non_empty("route_key", route_key),
            HostSignal::Impression { item, .. } => object("item", item),
            HostSignal::Reset => Ok(()),
        }
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), SignalValidationError> {
    if value.trim().is_empty() {
        Err(SignalValidationError::EmptyField(field.to_string()))
    } else {
        Ok(())
    }
}

fn object(field: &str, value: &Value) -> Result<(), SignalValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(SignalValidationError::NotAnObject {
            field: field.to_string(),
        })
    }
}

/// Validation errors for host signals
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalValidationError {
    #[error("Field must not be empty: {0}")]
    EmptyField(String),

    #[error("Field must be a JSON object: {field}")]
    NotAnObject { field: String },
}
