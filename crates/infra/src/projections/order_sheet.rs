//! Order sheet: one header per order plus its items flattened to `OrderItemRow`s.
//!
//! Rows keep options as JSON text, the way a relational table would. Reading items
//! back goes through the options decode boundary, so a damaged options column costs
//! the options of that row and nothing else.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;

use larder_core::{AggregateId, DomainError, Money};
use larder_events::EventEnvelope;
use larder_sales::{
    ORDER_AGGREGATE, OrderEvent, OrderId, OrderItem, OrderItemId, OrderItemRow, OrderStatus, OrderType,
    PaymentMethod, TableId,
};

use crate::read_model::ReadStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSheet {
    pub order_id: OrderId,
    pub order_number: String,
    pub order_type: OrderType,
    pub table_id: Option<TableId>,
    pub note: Option<String>,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub paid_amount: Option<Money>,
    pub payment_method: Option<PaymentMethod>,
    pub rows: Vec<OrderItemRow>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSheet {
    fn replace_row(&mut self, item: &OrderItem) {
        let row = OrderItemRow::from_item(item);
        match self.rows.iter_mut().find(|r| r.item_id == row.item_id) {
            Some(existing) => *existing = row,
            None => self.rows.push(row),
        }
    }

    fn remove_rows(&mut self, ids: &[OrderItemId]) {
        self.rows.retain(|r| !ids.iter().any(|id| id.0 == r.item_id));
    }
}

#[derive(Debug, Error)]
pub enum OrderSheetError {
    #[error("failed to deserialize order event: {0}")]
    Deserialize(String),

    #[error("event order_id does not match envelope aggregate_id")]
    StreamMismatch,

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("order {0} has no sheet yet")]
    MissingHeader(OrderId),

    #[error("stored row is unreadable: {0}")]
    CorruptRow(#[from] DomainError),
}

/// Idempotent projection keyed by per-stream cursors: envelopes at or below the
/// cursor are ignored, gaps are rejected.
#[derive(Debug)]
pub struct OrderSheetProjection<S>
where
    S: ReadStore<OrderId, OrderSheet>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> OrderSheetProjection<S>
where
    S: ReadStore<OrderId, OrderSheet>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => cursors.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderSheet> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<OrderSheet> {
        let mut sheets = self.store.list();
        sheets.sort_by(|a, b| a.order_number.cmp(&b.order_number));
        sheets
    }

    /// Read an order's items back from their rows.
    ///
    /// Malformed options come back empty and are logged; an unknown type tag or a
    /// missing required column is an error.
    pub fn items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderSheetError> {
        let sheet = self.store.get(order_id).ok_or(OrderSheetError::MissingHeader(*order_id))?;
        let mut items = Vec::with_capacity(sheet.rows.len());
        for row in sheet.rows {
            let item_id = row.item_id;
            let decoded = row.into_item()?;
            if let Some(warning) = decoded.warning {
                warn!(%order_id, item_id, "{warning}");
            }
            items.push(decoded.item);
        }
        Ok(items)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), OrderSheetError> {
        if envelope.aggregate_type() != ORDER_AGGREGATE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.cursor(aggregate_id);
        if seq == 0 {
            return Err(OrderSheetError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 {
            return Err(OrderSheetError::NonMonotonicSequence { last, found: seq });
        }

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| OrderSheetError::Deserialize(e.to_string()))?;

        let order_id = event_order_id(&ev);
        if order_id.aggregate_id() != aggregate_id {
            return Err(OrderSheetError::StreamMismatch);
        }

        if let OrderEvent::OrderCreated(e) = &ev {
            self.store.upsert(
                order_id,
                OrderSheet {
                    order_id,
                    order_number: e.order_number.clone(),
                    order_type: e.order_type,
                    table_id: e.table_id,
                    note: e.note.clone(),
                    status: OrderStatus::Draft,
                    total_amount: Money::ZERO,
                    paid_amount: None,
                    payment_method: None,
                    rows: vec![],
                    updated_at: e.occurred_at,
                },
            );
            self.advance(aggregate_id, seq);
            return Ok(());
        }

        let mut sheet = self.store.get(&order_id).ok_or(OrderSheetError::MissingHeader(order_id))?;
        match ev {
            OrderEvent::OrderCreated(_) => {}
            OrderEvent::ItemAdded(e) => {
                sheet.replace_row(&e.item);
                sheet.total_amount = e.total_amount;
                sheet.updated_at = e.occurred_at;
            }
            OrderEvent::ComboAdded(e) => {
                sheet.replace_row(&e.header);
                for component in &e.components {
                    sheet.replace_row(component);
                }
                sheet.total_amount = e.total_amount;
                sheet.updated_at = e.occurred_at;
            }
            OrderEvent::ItemUpdated(e) => {
                sheet.replace_row(&e.item);
                sheet.total_amount = e.total_amount;
                sheet.updated_at = e.occurred_at;
            }
            OrderEvent::ItemRemoved(e) => {
                sheet.remove_rows(&e.item_ids);
                sheet.total_amount = e.total_amount;
                sheet.updated_at = e.occurred_at;
            }
            OrderEvent::OrderSubmitted(e) => {
                sheet.status = OrderStatus::PendingPayment;
                sheet.total_amount = e.total_amount;
                sheet.updated_at = e.occurred_at;
            }
            OrderEvent::OrderPaid(e) => {
                sheet.status = OrderStatus::Paid;
                sheet.paid_amount = Some(e.amount);
                sheet.payment_method = Some(e.payment_method);
                sheet.updated_at = e.occurred_at;
            }
            OrderEvent::OrderCompleted(e) => {
                sheet.status = OrderStatus::Completed;
                sheet.updated_at = e.occurred_at;
            }
            OrderEvent::OrderCancelled(e) => {
                sheet.status = OrderStatus::Cancelled;
                sheet.updated_at = e.occurred_at;
            }
        }
        self.store.upsert(order_id, sheet);
        self.advance(aggregate_id, seq);
        Ok(())
    }

    /// Clear everything and replay `envelopes` in stream order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), OrderSheetError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        self.store.clear();
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }

        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

fn event_order_id(ev: &OrderEvent) -> OrderId {
    match ev {
        OrderEvent::OrderCreated(e) => e.order_id,
        OrderEvent::ItemAdded(e) => e.order_id,
        OrderEvent::ComboAdded(e) => e.order_id,
        OrderEvent::ItemUpdated(e) => e.order_id,
        OrderEvent::ItemRemoved(e) => e.order_id,
        OrderEvent::OrderSubmitted(e) => e.order_id,
        OrderEvent::OrderPaid(e) => e.order_id,
        OrderEvent::OrderCompleted(e) => e.order_id,
        OrderEvent::OrderCancelled(e) => e.order_id,
    }
}
