//! Stock reconciliation: confirmed purchases and counts flowing into material stock.
//!
//! The listener runs outside the confirming transaction. A confirmation is already
//! committed by the time it gets here, so nothing in this module can undo it;
//! problems are reported as warnings, log lines and metrics instead.

pub mod listener;
pub mod metrics;
pub mod worker;

pub use listener::{
    ApplyReport, ReconciliationError, ReconciliationWarning, STOCK_RECONCILIATION, StockReconciliationListener,
};
pub use metrics::{ReconciliationMetrics, ReconciliationSnapshot};
pub use worker::ReconciliationWorker;
