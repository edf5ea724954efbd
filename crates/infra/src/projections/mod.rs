//! Projection implementations (read model builders).
//!
//! Projections consume committed envelopes and are:
//! - **Rebuildable**: reconstructed from the event stream
//! - **Idempotent**: safe for at-least-once delivery

pub mod order_sheet;

pub use order_sheet::{OrderSheet, OrderSheetError, OrderSheetProjection};
