//! Bounded memory of record identifiers that were already notified.

use std::collections::{HashSet, VecDeque};

/// Size above which the set is pruned.
pub const SEEN_HARD_CEILING: usize = 1000;
/// Number of most recent identifiers kept after a prune.
pub const SEEN_RETAIN: usize = 500;

/// Insertion-ordered identifier set with recency-based pruning.
///
/// Re-adding a known identifier does not change its position.
#[derive(Debug)]
pub struct SeenSet {
    order: VecDeque<String>,
    members: HashSet<String>,
    ceiling: usize,
    retain: usize,
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SeenSet {
    pub fn new() -> Self {
        Self::with_limits(SEEN_HARD_CEILING, SEEN_RETAIN)
    }

    /// Custom limits; `retain` is capped at `ceiling`.
    pub fn with_limits(ceiling: usize, retain: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
            ceiling,
            retain: retain.min(ceiling),
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Returns `false` if the identifier was already present.
    pub fn add(&mut self, id: &str) -> bool {
        if !self.members.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        true
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drop the oldest entries once the ceiling is exceeded, keeping the
    /// `retain` most recently added. Returns the number removed.
    pub fn prune(&mut self) -> usize {
        if self.order.len() <= self.ceiling {
            return 0;
        }
        let excess = self.order.len() - self.retain;
        for id in self.order.drain(..excess) {
            self.members.remove(&id);
        }
        excess
    }

    /// Identifiers from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}
