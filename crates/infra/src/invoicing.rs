//! Paid order → invoice request.
//!
//! Consumes `sales.order.paid` and asks an `InvoiceIssuer` for one invoice per order.
//! Shares the processed-event guard with stock reconciliation under its own consumer
//! name, so a redelivered payment never produces a second invoice.

use std::sync::Mutex;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

use larder_core::Money;
use larder_events::EventEnvelope;
use larder_sales::{ORDER_PAID, OrderEvent, OrderId, OrderPaid};

use crate::processed_log::{ProcessedEventLog, ProcessedKey, ProcessedLogError};

pub const INVOICE_TRIGGER: &str = "invoice-trigger";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub order_id: OrderId,
    pub order_number: String,
    pub amount: Money,
}

#[derive(Debug, Error)]
#[error("invoice issuer failed: {0}")]
pub struct IssuerError(pub String);

/// Invoicing collaborator. Implementations talk to whatever issues invoices.
pub trait InvoiceIssuer: Send + Sync {
    fn issue(&self, request: &InvoiceRequest) -> Result<(), IssuerError>;
}

impl<T> InvoiceIssuer for std::sync::Arc<T>
where
    T: InvoiceIssuer + ?Sized,
{
    fn issue(&self, request: &InvoiceRequest) -> Result<(), IssuerError> {
        (**self).issue(request)
    }
}

/// Keeps every request; for tests and local runs.
#[derive(Debug, Default)]
pub struct RecordingInvoiceIssuer {
    issued: Mutex<Vec<InvoiceRequest>>,
}

impl RecordingInvoiceIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued(&self) -> Vec<InvoiceRequest> {
        self.issued.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl InvoiceIssuer for RecordingInvoiceIssuer {
    fn issue(&self, request: &InvoiceRequest) -> Result<(), IssuerError> {
        self.issued
            .lock()
            .map_err(|_| IssuerError("recording issuer lock poisoned".into()))?
            .push(request.clone());
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum InvoiceTriggerError {
    #[error(transparent)]
    ProcessedLog(#[from] ProcessedLogError),

    #[error("cannot read order paid payload: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Issuer(#[from] IssuerError),
}

#[derive(Debug)]
pub struct InvoiceTrigger<I, P> {
    issuer: I,
    processed: P,
}

impl<I, P> InvoiceTrigger<I, P>
where
    I: InvoiceIssuer,
    P: ProcessedEventLog,
{
    pub fn new(issuer: I, processed: P) -> Self {
        Self { issuer, processed }
    }

    /// `Ok(true)` when an invoice was requested by this delivery.
    pub fn handle_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, InvoiceTriggerError> {
        if envelope.event_type() != ORDER_PAID {
            return Ok(false);
        }
        let event: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| InvoiceTriggerError::Deserialize(e.to_string()))?;
        match event {
            OrderEvent::OrderPaid(paid) => self.on_order_paid(&paid),
            other => Err(InvoiceTriggerError::Deserialize(format!(
                "expected OrderPaid, found {other:?}"
            ))),
        }
    }

    pub fn on_order_paid(&self, paid: &OrderPaid) -> Result<bool, InvoiceTriggerError> {
        let key = ProcessedKey::new(paid.order_id.aggregate_id(), ORDER_PAID);
        if !self.processed.claim(INVOICE_TRIGGER, &key)? {
            debug!(%key, order_number = %paid.order_number, "invoice already requested; skipping");
            return Ok(false);
        }

        let request = InvoiceRequest {
            order_id: paid.order_id,
            order_number: paid.order_number.clone(),
            amount: paid.amount,
        };
        if let Err(err) = self.issuer.issue(&request) {
            // Nothing was issued, so a redelivery may try again.
            self.processed.release(INVOICE_TRIGGER, &key)?;
            warn!(%key, order_number = %paid.order_number, error = %err, "invoice request failed");
            return Err(err.into());
        }

        info!(%key, order_number = %paid.order_number, amount = %paid.amount, "invoice requested");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;
    use larder_sales::PaymentMethod;

    use crate::processed_log::InMemoryProcessedLog;

    fn paid() -> OrderPaid {
        OrderPaid {
            order_id: OrderId::generate(),
            order_number: "SO-20260101-0007".into(),
            amount: Money::from_cents(10500),
            payment_method: PaymentMethod::Card,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn redelivered_payment_requests_one_invoice() {
        let issuer = Arc::new(RecordingInvoiceIssuer::new());
        let trigger = InvoiceTrigger::new(Arc::clone(&issuer), InMemoryProcessedLog::new());
        let event = paid();

        assert!(trigger.on_order_paid(&event).unwrap());
        assert!(!trigger.on_order_paid(&event).unwrap());

        let issued = issuer.issued();
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].amount, Money::from_cents(10500));
    }

    struct FlakyIssuer {
        failed_once: AtomicBool,
    }

    impl InvoiceIssuer for FlakyIssuer {
        fn issue(&self, _request: &InvoiceRequest) -> Result<(), IssuerError> {
            if self.failed_once.swap(true, Ordering::SeqCst) {
                Ok(())
            } else {
                Err(IssuerError("timeout".into()))
            }
        }
    }

    #[test]
    fn failed_issue_can_be_retried() {
        let trigger = InvoiceTrigger::new(
            FlakyIssuer {
                failed_once: AtomicBool::new(false),
            },
            InMemoryProcessedLog::new(),
        );
        let event = paid();

        assert!(matches!(trigger.on_order_paid(&event), Err(InvoiceTriggerError::Issuer(_))));
        assert!(trigger.on_order_paid(&event).unwrap());
    }
}
