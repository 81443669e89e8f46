//! Tracker configuration
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration.

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::content::ContentKeys;
use crate::error::TrackerError;
use crate::ids::{IdGenerator, SequentialIdGenerator, UuidGenerator};
use crate::types::ImpressionSourceType;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Number of route keys whose view ids are remembered
    pub view_cache_capacity: usize,
    /// Resume the remembered view id when a route regains focus
    pub resume_remembered_view_ids: bool,
    /// Key chains used to normalize host content dictionaries
    pub content_keys: ContentKeys,
    /// Source type for collections mounted without one
    pub default_source_type: ImpressionSourceType,
    /// Warn when insertion ids disagree with a collection's source type
    pub warn_on_insertion_mismatch: bool,
    /// Produce deterministic `prefix-N` ids instead of UUIDs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_prefix: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            view_cache_capacity: DEFAULT_CACHE_CAPACITY,
            resume_remembered_view_ids: true,
            content_keys: ContentKeys::default(),
            default_source_type: ImpressionSourceType::Unknown,
            warn_on_insertion_mismatch: true,
            id_prefix: None,
        }
    }
}

impl TrackerConfig {
    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, TrackerError> {
        serde_json::to_string_pretty(self).map_err(|e| TrackerError::EncodingError(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.view_cache_capacity == 0 {
            return Err(TrackerError::InvalidConfig(
                "view_cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.content_keys.content_id_keys.is_empty() && self.content_keys.name_keys.is_empty()
        {
            return Err(TrackerError::InvalidConfig(
                "content_keys needs at least one content id or name key".to_string(),
            ));
        }
        if matches!(self.id_prefix.as_deref(), Some("")) {
            return Err(TrackerError::InvalidConfig(
                "id_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Id generator selected by this configuration
    pub fn id_generator(&self) -> Rc<dyn IdGenerator> {
        match &self.id_prefix {
            Some(prefix) => Rc::new(SequentialIdGenerator::new(prefix.clone())),
            None => Rc::new(UuidGenerator),
        }
    }
}
