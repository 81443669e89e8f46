//! View session state

use serde::{Deserialize, Serialize};

/// One continuous period during which a route is active for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSession {
    pub route_name: String,
    /// Stable identity of the route instance
    pub route_key: String,
    /// `None` until the route gains focus or a remembered id is found
    pub view_id: Option<String>,
    /// True while the route holds navigation focus with nothing above it
    pub is_topmost: bool,
}

impl ViewSession {
    /// A session that has not gained focus yet.
    ///
    /// New sessions start obscured: until the host reports focus, there may
    /// be other views on top.
    pub fn new(route_name: impl Into<String>, route_key: impl Into<String>) -> Self {
        Self {
            route_name: route_name.into(),
            route_key: route_key.into(),
            view_id: None,
            is_topmost: false,
        }
    }

    pub fn has_superimposed_views(&self) -> bool {
        !self.is_topmost
    }
}
