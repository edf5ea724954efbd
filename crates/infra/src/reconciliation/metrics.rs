use std::sync::atomic::{AtomicU64, Ordering};

/// Counters that make stock drift visible.
#[derive(Debug, Default)]
pub struct ReconciliationMetrics {
    events_applied: AtomicU64,
    items_applied: AtomicU64,
    duplicates: AtomicU64,
    skipped_missing: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconciliationSnapshot {
    pub events_applied: u64,
    pub items_applied: u64,
    pub duplicates: u64,
    pub skipped_missing: u64,
    pub failed: u64,
}

impl ReconciliationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn event_applied(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn item_applied(&self) {
        self.items_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped_missing(&self) {
        self.skipped_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReconciliationSnapshot {
        ReconciliationSnapshot {
            events_applied: self.events_applied.load(Ordering::Relaxed),
            items_applied: self.items_applied.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            skipped_missing: self.skipped_missing.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
