//! Live impression state for one piece of content

use crate::emitter::BeginImpression;
use crate::types::{Content, ImpressionSourceType};

/// One visibility span of one piece of content.
///
/// While alive, the record is the only source of the impression id that
/// action events on this content must reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpressionRecord {
    pub content: Content,
    pub impression_id: String,
    /// Position when the content became visible. Never used for identity.
    pub position: Option<Vec<u32>>,
}

impl ImpressionRecord {
    pub(crate) fn begin_event(
        &self,
        view_id: Option<&str>,
        source_type: ImpressionSourceType,
    ) -> BeginImpression {
        BeginImpression {
            impression_id: self.impression_id.clone(),
            content: self.content.clone(),
            view_id: view_id.map(str::to_string),
            source_type,
            position: self.position.clone(),
        }
    }
}
