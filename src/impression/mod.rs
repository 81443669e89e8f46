//! Impression tracking
//!
//! Turns periodic "currently visible" snapshots of a collection into minimal
//! begin/end impression events, and keeps the content → impression id map
//! that later action events are stamped with.

pub mod record;
pub mod session;
pub mod tracker;

pub use record::ImpressionRecord;
pub use session::{CollectionTrackingSession, VisibilityDelta};
pub use tracker::ImpressionTracker;
