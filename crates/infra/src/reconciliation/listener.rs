use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use larder_core::AggregateId;
use larder_events::EventEnvelope;
use larder_inventory::{
    INVENTORY_CHECK_CONFIRMED, InventoryCheckConfirmed, InventoryCheckEvent, MaterialId, StockChange, StockMovement,
};
use larder_purchasing::{PURCHASE_CONFIRMED, PurchaseConfirmed, PurchaseEvent};

use crate::material_store::{MaterialStore, MaterialStoreError};
use crate::processed_log::{ProcessedEventLog, ProcessedKey, ProcessedLogError};

use super::metrics::ReconciliationMetrics;

/// Consumer name under which reconciliation claims processed-event keys.
pub const STOCK_RECONCILIATION: &str = "stock-reconciliation";

/// Non-fatal problem with one item of a confirmed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationWarning {
    /// The material was deleted after the purchase or count referenced it.
    MissingMaterial { material_id: MaterialId, material_code: String },
    /// The store refused or failed the change; stock for this material may drift.
    StoreFailure {
        material_id: MaterialId,
        material_code: String,
        message: String,
    },
}

impl core::fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReconciliationWarning::MissingMaterial { material_code, .. } => {
                write!(f, "material {material_code} no longer exists; item skipped")
            }
            ReconciliationWarning::StoreFailure {
                material_code, message, ..
            } => write!(f, "updating material {material_code} failed: {message}"),
        }
    }
}

/// What one delivery of a confirmed event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub key: ProcessedKey,
    /// The key was already marked; nothing was changed.
    pub duplicate: bool,
    pub movements: Vec<StockMovement>,
    pub warnings: Vec<ReconciliationWarning>,
}

impl ApplyReport {
    fn duplicate(key: ProcessedKey) -> Self {
        Self {
            key,
            duplicate: true,
            movements: vec![],
            warnings: vec![],
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error(transparent)]
    ProcessedLog(#[from] ProcessedLogError),

    #[error("cannot read {event_type} payload: {message}")]
    Deserialize { event_type: String, message: String },

    #[error("{event_type} envelope does not carry a confirmation")]
    UnexpectedPayload { event_type: String },
}

/// Applies `PurchaseConfirmed` (add quantity, take the latest unit price as cost) and
/// `InventoryCheckConfirmed` (overwrite with the counted quantity) to material stock.
///
/// Each event is applied at most once: the processed-event key is claimed before any
/// material is touched, and a redelivered event finds the claim and does nothing.
/// Inside one event every item is attempted; missing materials and store failures
/// become warnings and the loop continues.
#[derive(Debug)]
pub struct StockReconciliationListener<M, P> {
    materials: M,
    processed: P,
    metrics: Arc<ReconciliationMetrics>,
}

struct ItemChange<'a> {
    material_id: MaterialId,
    material_code: &'a str,
    change: StockChange,
}

impl<M, P> StockReconciliationListener<M, P>
where
    M: MaterialStore,
    P: ProcessedEventLog,
{
    pub fn new(materials: M, processed: P, metrics: Arc<ReconciliationMetrics>) -> Self {
        Self {
            materials,
            processed,
            metrics,
        }
    }

    pub fn metrics(&self) -> &ReconciliationMetrics {
        &self.metrics
    }

    /// Route a bus envelope. Envelopes of other event types yield `Ok(None)`.
    ///
    /// A confirmation that cannot be applied at all counts as a failure: its stock
    /// changes are lost until the next inventory check.
    pub fn handle_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<Option<ApplyReport>, ReconciliationError> {
        let outcome = self.route(envelope);
        if let Err(err) = &outcome {
            self.metrics.failed();
            error!(
                aggregate_id = %envelope.aggregate_id(),
                event_type = envelope.event_type(),
                error = %err,
                "confirmation could not be applied; stock may drift"
            );
        }
        outcome
    }

    fn route(&self, envelope: &EventEnvelope<JsonValue>) -> Result<Option<ApplyReport>, ReconciliationError> {
        match envelope.event_type() {
            PURCHASE_CONFIRMED => {
                let event: PurchaseEvent = decode(envelope)?;
                match event {
                    PurchaseEvent::Confirmed(confirmed) => self.on_purchase_confirmed(&confirmed).map(Some),
                    _ => Err(ReconciliationError::UnexpectedPayload {
                        event_type: envelope.event_type().to_string(),
                    }),
                }
            }
            INVENTORY_CHECK_CONFIRMED => {
                let event: InventoryCheckEvent = decode(envelope)?;
                match event {
                    InventoryCheckEvent::Confirmed(confirmed) => self.on_inventory_check_confirmed(&confirmed).map(Some),
                    _ => Err(ReconciliationError::UnexpectedPayload {
                        event_type: envelope.event_type().to_string(),
                    }),
                }
            }
            _ => Ok(None),
        }
    }

    pub fn on_purchase_confirmed(&self, event: &PurchaseConfirmed) -> Result<ApplyReport, ReconciliationError> {
        let changes = event
            .items
            .iter()
            .map(|item| ItemChange {
                material_id: item.material_id,
                material_code: &item.material_code,
                change: StockChange::Receive {
                    quantity: item.quantity,
                    unit_cost: item.unit_price,
                },
            })
            .collect();

        self.apply(
            event.purchase_id.aggregate_id(),
            PURCHASE_CONFIRMED,
            &event.purchase_number,
            changes,
        )
    }

    pub fn on_inventory_check_confirmed(
        &self,
        event: &InventoryCheckConfirmed,
    ) -> Result<ApplyReport, ReconciliationError> {
        let changes = event
            .items
            .iter()
            .map(|item| ItemChange {
                material_id: item.material_id,
                material_code: &item.material_code,
                change: StockChange::Count {
                    actual_quantity: item.actual_quantity,
                },
            })
            .collect();

        self.apply(
            event.check_id.aggregate_id(),
            INVENTORY_CHECK_CONFIRMED,
            &event.check_number,
            changes,
        )
    }

    fn apply(
        &self,
        source: AggregateId,
        event_type: &str,
        document: &str,
        changes: Vec<ItemChange<'_>>,
    ) -> Result<ApplyReport, ReconciliationError> {
        let key = ProcessedKey::new(source, event_type);

        if !self.processed.claim(STOCK_RECONCILIATION, &key)? {
            self.metrics.duplicate();
            debug!(%key, document, "confirmation already reconciled; skipping");
            return Ok(ApplyReport::duplicate(key));
        }

        let mut movements = Vec::with_capacity(changes.len());
        let mut warnings = Vec::new();

        for item in changes {
            match self.materials.apply_stock_change(item.material_id, &item.change) {
                Ok(movement) => {
                    self.metrics.item_applied();
                    movements.push(movement);
                }
                Err(MaterialStoreError::NotFound(_)) => {
                    self.metrics.skipped_missing();
                    let warning = ReconciliationWarning::MissingMaterial {
                        material_id: item.material_id,
                        material_code: item.material_code.to_string(),
                    };
                    warn!(%key, document, material_id = %item.material_id, "{warning}");
                    warnings.push(warning);
                }
                Err(err) => {
                    self.metrics.failed();
                    error!(
                        %key,
                        document,
                        material_id = %item.material_id,
                        error = %err,
                        "stock change failed; material may need a recount"
                    );
                    warnings.push(ReconciliationWarning::StoreFailure {
                        material_id: item.material_id,
                        material_code: item.material_code.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        self.metrics.event_applied();
        info!(
            %key,
            document,
            applied = movements.len(),
            warnings = warnings.len(),
            "confirmation reconciled into stock"
        );

        Ok(ApplyReport {
            key,
            duplicate: false,
            movements,
            warnings,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(envelope: &EventEnvelope<JsonValue>) -> Result<T, ReconciliationError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ReconciliationError::Deserialize {
        event_type: envelope.event_type().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use larder_core::Money;
    use larder_inventory::{ConfirmedCountItem, InventoryCheckId, Material};
    use larder_purchasing::{ConfirmedPurchaseItem, PurchaseId};

    use crate::material_store::InMemoryMaterialStore;
    use crate::processed_log::InMemoryProcessedLog;

    type Listener = StockReconciliationListener<Arc<InMemoryMaterialStore>, Arc<InMemoryProcessedLog>>;

    fn setup() -> (Listener, Arc<InMemoryMaterialStore>) {
        let materials = Arc::new(InMemoryMaterialStore::new());
        let listener = StockReconciliationListener::new(
            Arc::clone(&materials),
            Arc::new(InMemoryProcessedLog::new()),
            Arc::new(ReconciliationMetrics::new()),
        );
        (listener, materials)
    }

    fn material(store: &InMemoryMaterialStore, code: &str, stock: Option<i64>) -> MaterialId {
        let mut m = Material::new(MaterialId::generate(), code, format!("Material {code}"), "kg");
        m.current_stock_quantity = stock.map(Decimal::from);
        let id = m.id;
        store.insert(m).unwrap();
        id
    }

    fn purchase_item(material_id: MaterialId, code: &str, qty: i64, price_cents: i64) -> ConfirmedPurchaseItem {
        ConfirmedPurchaseItem {
            material_id,
            material_code: code.to_string(),
            material_name: format!("Material {code}"),
            quantity: Decimal::from(qty),
            unit_price: Money::from_cents(price_cents),
        }
    }

    fn purchase(items: Vec<ConfirmedPurchaseItem>) -> PurchaseConfirmed {
        PurchaseConfirmed {
            purchase_id: PurchaseId::generate(),
            purchase_number: "PO-20260101-0001".into(),
            total_amount: Money::ZERO,
            items,
            occurred_at: Utc::now(),
        }
    }

    fn stock(store: &InMemoryMaterialStore, id: MaterialId) -> Decimal {
        store.get(id).unwrap().unwrap().stock()
    }

    #[test]
    fn purchase_adds_stock_and_sets_latest_cost() {
        let (listener, store) = setup();
        let a = material(&store, "A", None);
        let b = material(&store, "B", Some(3));

        let report = listener
            .on_purchase_confirmed(&purchase(vec![purchase_item(a, "A", 10, 10000), purchase_item(b, "B", 5, 5000)]))
            .unwrap();

        assert!(!report.duplicate);
        assert_eq!(report.movements.len(), 2);
        assert_eq!(stock(&store, a), Decimal::from(10));
        assert_eq!(stock(&store, b), Decimal::from(8));
        assert_eq!(store.get(b).unwrap().unwrap().cost_price, Money::from_cents(5000));
    }

    #[test]
    fn redelivered_purchase_is_not_applied_twice() {
        let (listener, store) = setup();
        let a = material(&store, "A", Some(1));
        let event = purchase(vec![purchase_item(a, "A", 4, 100)]);

        listener.on_purchase_confirmed(&event).unwrap();
        let again = listener.on_purchase_confirmed(&event).unwrap();

        assert!(again.duplicate);
        assert_eq!(stock(&store, a), Decimal::from(5));
        assert_eq!(listener.metrics().snapshot().duplicates, 1);
    }

    #[test]
    fn missing_material_is_skipped_and_others_still_apply() {
        let (listener, store) = setup();
        let a = material(&store, "A", Some(0));
        let gone = material(&store, "GONE", Some(0));
        let c = material(&store, "C", Some(0));
        store.remove(gone).unwrap();

        let report = listener
            .on_purchase_confirmed(&purchase(vec![
                purchase_item(a, "A", 1, 100),
                purchase_item(gone, "GONE", 2, 100),
                purchase_item(c, "C", 3, 100),
            ]))
            .unwrap();

        assert_eq!(report.movements.len(), 2);
        assert_eq!(
            report.warnings,
            vec![ReconciliationWarning::MissingMaterial {
                material_id: gone,
                material_code: "GONE".into()
            }]
        );
        assert_eq!(stock(&store, a), Decimal::ONE);
        assert_eq!(stock(&store, c), Decimal::from(3));
        assert_eq!(listener.metrics().snapshot().skipped_missing, 1);
    }

    #[test]
    fn rejected_item_is_reported_as_failure_and_loop_continues() {
        let (listener, store) = setup();
        let a = material(&store, "A", Some(0));
        let b = material(&store, "B", Some(0));

        let report = listener
            .on_purchase_confirmed(&purchase(vec![purchase_item(a, "A", 0, 100), purchase_item(b, "B", 2, 100)]))
            .unwrap();

        assert!(matches!(report.warnings[0], ReconciliationWarning::StoreFailure { .. }));
        assert_eq!(stock(&store, b), Decimal::from(2));
        assert_eq!(listener.metrics().snapshot().failed, 1);
    }

    #[test]
    fn count_overwrites_stock() {
        let (listener, store) = setup();
        let a = material(&store, "A", Some(50));

        let event = InventoryCheckConfirmed {
            check_id: InventoryCheckId::generate(),
            check_number: "IC-20260101-0001".into(),
            total_difference_amount: Money::ZERO,
            items: vec![ConfirmedCountItem {
                material_id: a,
                material_code: "A".into(),
                material_name: "Material A".into(),
                system_quantity: Decimal::from(50),
                actual_quantity: Decimal::from(48),
                difference_quantity: Decimal::from(-2),
            }],
            occurred_at: Utc::now(),
        };

        listener.on_inventory_check_confirmed(&event).unwrap();
        listener.on_inventory_check_confirmed(&event).unwrap();
        assert_eq!(stock(&store, a), Decimal::from(48));
    }

    #[test]
    fn unrelated_envelopes_are_ignored() {
        let (listener, _) = setup();
        let envelope = EventEnvelope::new(
            uuid::Uuid::now_v7(),
            AggregateId::new(),
            "sales.order",
            1,
            "sales.order.created",
            Utc::now(),
            serde_json::json!({}),
        );
        assert!(listener.handle_envelope(&envelope).unwrap().is_none());
    }

    #[test]
    fn malformed_confirmation_payload_is_an_error() {
        let (listener, _) = setup();
        let envelope = EventEnvelope::new(
            uuid::Uuid::now_v7(),
            AggregateId::new(),
            "purchase",
            3,
            PURCHASE_CONFIRMED,
            Utc::now(),
            serde_json::json!({"Confirmed": {"purchase_id": 7}}),
        );
        assert!(matches!(
            listener.handle_envelope(&envelope),
            Err(ReconciliationError::Deserialize { .. })
        ));
        assert_eq!(listener.metrics().snapshot().failed, 1);
        assert_eq!(listener.metrics().snapshot().events_applied, 0);
    }

    proptest::proptest! {
        #[test]
        fn redelivered_receipts_count_once(
            receipts in proptest::collection::vec((1i64..1_000, 1usize..4), 1..10),
        ) {
            let (listener, store) = setup();
            let a = material(&store, "A", Some(0));

            let mut expected = Decimal::ZERO;
            for (qty, deliveries) in &receipts {
                let event = purchase(vec![purchase_item(a, "A", *qty, 100)]);
                for _ in 0..*deliveries {
                    listener.on_purchase_confirmed(&event).unwrap();
                }
                expected += Decimal::from(*qty);
            }

            let redeliveries: usize = receipts.iter().map(|(_, d)| d - 1).sum();
            proptest::prop_assert_eq!(stock(&store, a), expected);
            proptest::prop_assert_eq!(listener.metrics().snapshot().duplicates as usize, redeliveries);
        }
    }
}
