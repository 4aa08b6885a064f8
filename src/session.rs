use crate::types::{RequestOutcome, Stage};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub timestamp: String,
    pub user_input: String,
    pub success: bool,
    pub stage: Stage,
}

/// In-memory history of recent requests, oldest evicted first. Only used to
/// give the planner some context; never written to disk.
#[derive(Debug, Clone)]
pub struct Session {
    records: VecDeque<SessionRecord>,
    capacity: usize,
    context_window: usize,
}

impl Session {
    pub fn new(capacity: usize, context_window: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            context_window,
        }
    }

    pub fn push(&mut self, outcome: &RequestOutcome) {
        self.records.push_back(SessionRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_input: outcome.user_input.clone(),
            success: outcome.success,
            stage: outcome.stage,
        });
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &SessionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn context(&self) -> String {
        if self.records.is_empty() {
            return "No previous interactions".to_string();
        }
        let skip = self.records.len().saturating_sub(self.context_window);
        let lines: Vec<String> = self
            .records
            .iter()
            .skip(skip)
            .map(|r| {
                let status = if r.success { "completed" } else { "failed" };
                format!("- {}: {}", r.user_input, status)
            })
            .collect();
        format!("Recent actions:\n{}", lines.join("\n"))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(10, 3)
    }
}
