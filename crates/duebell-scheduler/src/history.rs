use std::collections::VecDeque;
use std::sync::Mutex;

use crate::types::RunSummary;

/// Bounded buffer of the most recent run summaries.
pub struct RunHistory {
    capacity: usize,
    runs: Mutex<VecDeque<RunSummary>>,
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            runs: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, summary: RunSummary) {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        while runs.len() >= self.capacity {
            runs.pop_front();
        }
        runs.push_back(summary);
    }

    pub fn last(&self) -> Option<RunSummary> {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .back()
            .cloned()
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<RunSummary> {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .cloned()
            .collect()
    }
}
