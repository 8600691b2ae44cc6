//! Shared execution log

use std::sync::{Arc, Mutex};

/// Ordered record of what ran
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    /// Assert the journal holds exactly `expected`, in order
    pub fn assert_entries(&self, expected: &[&str]) {
        let entries = self.entries();
        assert_eq!(
            entries, expected,
            "Expected journal {:?}, got {:?}",
            expected, entries
        );
    }
}
