use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;

/// Document numbers of the form `{prefix}-{YYYYMMDD}-{NNNN}`, restarting at 1 each day.
#[derive(Debug, Default)]
pub struct DailySequence {
    counters: Mutex<HashMap<(String, NaiveDate), u32>>,
}

impl DailySequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, prefix: &str, date: NaiveDate) -> String {
        // Increments are single writes; a poisoned map is still consistent.
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = counters.entry((prefix.to_string(), date)).or_insert(0);
        *seq += 1;
        format!("{prefix}-{}-{:04}", date.format("%Y%m%d"), *seq)
    }
}
