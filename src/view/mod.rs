//! View session tracking
//!
//! Assigns one view id per logical focus period of a navigation route, shared
//! by every observer mounted on that route.
//!
//! Flow: observer attaches → host reports focus → tracker reuses the most
//! recently logged session, or a remembered id, or generates (and logs) a new
//! one.

pub mod context;
pub mod session;
pub mod tracker;

pub use context::{SharedViewContext, ViewContext};
pub use session::ViewSession;
pub use tracker::AutoViewTracker;
