//! Opaque id generation
//!
//! View ids and impression ids are opaque tokens. The trackers only require
//! that they are unique; nothing reads structure or ordering out of them.

use std::cell::Cell;
use uuid::Uuid;

/// Source of collision-resistant unique tokens
pub trait IdGenerator {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs. The production generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `prefix-N` tokens, counting from 1.
///
/// Unique within one generator instance. Used for replays whose output must
/// be reproducible.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: Cell<u64>,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Cell::new(0),
        }
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.counter.get()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let next = self.counter.get() + 1;
        self.counter.set(next);
        format!("{}-{}", self.prefix, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = UuidGenerator;
        let generated: HashSet<String> = (0..100).map(|_| ids.next_id()).collect();
        assert_eq!(generated.len(), 100);
        assert!(generated.iter().all(|id| Uuid::parse_str(id).is_ok()));
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIdGenerator::new("view");
        assert_eq!(ids.next_id(), "view-1");
        assert_eq!(ids.next_id(), "view-2");
        assert_eq!(ids.issued(), 2);
    }
}
