// src/task.rs
use std::fmt;

use serde::{Deserialize, Serialize};

/// One tracked (search-term, location) pair. Identity is the pair itself,
/// case-sensitive and unnormalized; the task set is fixed for a watch run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchTask {
    pub query: String,
    pub location: String,
}

impl SearchTask {
    pub fn new(query: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            location: location.into(),
        }
    }

    /// Suffix shared by every store key belonging to this task.
    pub fn key_suffix(&self) -> String {
        format!("{}_{}", self.query, self.location)
    }
}

impl fmt::Display for SearchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.query, self.location)
    }
}
