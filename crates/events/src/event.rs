use chrono::{DateTime, Utc};

/// A domain event: an immutable record of a committed fact.
///
/// `event_type` is the stable routing name (e.g. "purchasing.purchase.confirmed").
/// Consumers key their idempotency guards on it, so it must never change for an
/// existing event shape; bump `version` instead.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
