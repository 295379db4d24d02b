//! Statements logged without a duration, waiting for their `duration:` record
//!
//! PostgreSQL writes the duration of a statement as the next record of the
//! same backend, so at most one statement per process id is kept, and any
//! other record from that process discards it.

use std::collections::HashMap;

/// Upper bound on remembered statements across all process ids
pub const MAX_PENDING_STATEMENTS: usize = 1024;

#[derive(Debug)]
pub struct PendingStatements {
    by_process: HashMap<String, (u64, String)>,
    next_seq: u64,
    capacity: usize,
}

impl PendingStatements {
    pub fn new() -> Self {
        Self::with_capacity(MAX_PENDING_STATEMENTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_process: HashMap::new(),
            next_seq: 0,
            capacity: capacity.max(1),
        }
    }

    /// Remember `statement` for `process_id`, replacing any earlier one.
    /// When full, the oldest statement is dropped.
    pub fn remember(&mut self, process_id: String, statement: String) {
        if !self.by_process.contains_key(&process_id) && self.by_process.len() >= self.capacity {
            let oldest = self
                .by_process
                .iter()
                .min_by_key(|(_, (seq, _))| *seq)
                .map(|(pid, _)| pid.clone());
            if let Some(pid) = oldest {
                self.by_process.remove(&pid);
            }
        }
        self.by_process.insert(process_id, (self.next_seq, statement));
        self.next_seq += 1;
    }

    pub fn take(&mut self, process_id: &str) -> Option<String> {
        self.by_process.remove(process_id).map(|(_, statement)| statement)
    }

    /// Drop the statement of `process_id`, if any
    pub fn forget(&mut self, process_id: &str) {
        self.by_process.remove(process_id);
    }

    pub fn len(&self) -> usize {
        self.by_process.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_process.is_empty()
    }
}

impl Default for PendingStatements {
    fn default() -> Self {
        Self::new()
    }
}
