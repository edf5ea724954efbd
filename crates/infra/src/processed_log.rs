//! Processed-event log: the "already applied" marker consumers check before acting.
//!
//! A key is the source aggregate id plus the event type. Each confirming aggregate
//! emits its confirmation event at most once, so the pair identifies one fact no
//! matter how many times the bus delivers it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use larder_core::AggregateId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessedKey {
    pub aggregate_id: AggregateId,
    pub event_type: String,
}

impl ProcessedKey {
    pub fn new(aggregate_id: AggregateId, event_type: impl Into<String>) -> Self {
        Self {
            aggregate_id,
            event_type: event_type.into(),
        }
    }
}

impl core::fmt::Display for ProcessedKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.event_type, self.aggregate_id)
    }
}

#[derive(Debug, Error)]
pub enum ProcessedLogError {
    #[error("processed-event log lock poisoned")]
    Poisoned,
}

/// Durable marker set, scoped per consumer.
///
/// `claim` is atomic: of two concurrent claims for the same consumer and key, exactly
/// one returns `true`.
pub trait ProcessedEventLog: Send + Sync {
    /// Mark `key` as processed by `consumer`. `false` means it was already marked.
    fn claim(&self, consumer: &str, key: &ProcessedKey) -> Result<bool, ProcessedLogError>;

    /// Undo a claim whose processing never started, so a redelivery can retry.
    fn release(&self, consumer: &str, key: &ProcessedKey) -> Result<(), ProcessedLogError>;

    fn contains(&self, consumer: &str, key: &ProcessedKey) -> Result<bool, ProcessedLogError>;
}

impl<L> ProcessedEventLog for Arc<L>
where
    L: ProcessedEventLog + ?Sized,
{
    fn claim(&self, consumer: &str, key: &ProcessedKey) -> Result<bool, ProcessedLogError> {
        (**self).claim(consumer, key)
    }

    fn release(&self, consumer: &str, key: &ProcessedKey) -> Result<(), ProcessedLogError> {
        (**self).release(consumer, key)
    }

    fn contains(&self, consumer: &str, key: &ProcessedKey) -> Result<bool, ProcessedLogError> {
        (**self).contains(consumer, key)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProcessedLog {
    entries: Mutex<HashSet<(String, ProcessedKey)>>,
}

impl InMemoryProcessedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProcessedEventLog for InMemoryProcessedLog {
    fn claim(&self, consumer: &str, key: &ProcessedKey) -> Result<bool, ProcessedLogError> {
        let mut entries = self.entries.lock().map_err(|_| ProcessedLogError::Poisoned)?;
        Ok(entries.insert((consumer.to_string(), key.clone())))
    }

    fn release(&self, consumer: &str, key: &ProcessedKey) -> Result<(), ProcessedLogError> {
        let mut entries = self.entries.lock().map_err(|_| ProcessedLogError::Poisoned)?;
        entries.remove(&(consumer.to_string(), key.clone()));
        Ok(())
    }

    fn contains(&self, consumer: &str, key: &ProcessedKey) -> Result<bool, ProcessedLogError> {
        let entries = self.entries.lock().map_err(|_| ProcessedLogError::Poisoned)?;
        Ok(entries.contains(&(consumer.to_string(), key.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn second_claim_is_refused_until_released() {
        let log = InMemoryProcessedLog::new();
        let key = ProcessedKey::new(AggregateId::new(), "purchasing.purchase.confirmed");

        assert!(log.claim("stock", &key).unwrap());
        assert!(!log.claim("stock", &key).unwrap());
        assert!(log.claim("invoices", &key).unwrap());

        log.release("stock", &key).unwrap();
        assert!(!log.contains("stock", &key).unwrap());
        assert!(log.claim("stock", &key).unwrap());
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let log = Arc::new(InMemoryProcessedLog::new());
        let key = ProcessedKey::new(AggregateId::new(), "inventory.check.confirmed");

        let winners: usize = (0..16)
            .map(|_| {
                let log = Arc::clone(&log);
                let key = key.clone();
                thread::spawn(move || log.claim("stock", &key).unwrap())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
        assert_eq!(log.len(), 1);
    }
}
