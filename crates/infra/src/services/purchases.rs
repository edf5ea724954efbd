use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use larder_core::{DomainError, Money};
use larder_events::{EventBus, EventEnvelope};
use larder_inventory::MaterialId;
use larder_purchasing::{
    ConfirmPurchase, CreatePurchase, DeletePurchase, PURCHASE_AGGREGATE, Purchase, PurchaseCommand, PurchaseId,
    PurchaseLine, SupplierCatalog, SupplierId, UpdatePurchase,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::material_store::MaterialStore;

use super::numbering::DailySequence;

/// A purchase line as entered: which material, how much, at what price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLineInput {
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseDraft {
    pub supplier_id: SupplierId,
    pub purchase_date: NaiveDate,
    pub note: Option<String>,
    pub lines: Vec<PurchaseLineInput>,
}

/// Purchase operations. Supplier and material references are checked and
/// snapshotted here; the aggregate only sees resolved lines.
pub struct PurchaseService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    suppliers: Arc<dyn SupplierCatalog>,
    materials: Arc<dyn MaterialStore>,
    numbers: Arc<DailySequence>,
    prefix: String,
}

impl<S, B> PurchaseService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        suppliers: Arc<dyn SupplierCatalog>,
        materials: Arc<dyn MaterialStore>,
        numbers: Arc<DailySequence>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            suppliers,
            materials,
            numbers,
            prefix: prefix.into(),
        }
    }

    fn run(&self, purchase_id: PurchaseId, command: PurchaseCommand) -> Result<Purchase, DispatchError> {
        let committed = self.dispatcher.dispatch(purchase_id.aggregate_id(), PURCHASE_AGGREGATE, command, |id| {
            Purchase::empty(PurchaseId(id))
        })?;
        Ok(committed.aggregate)
    }

    fn check_supplier(&self, supplier_id: SupplierId) -> Result<(), DispatchError> {
        let supplier = self
            .suppliers
            .supplier(supplier_id)
            .ok_or_else(|| DomainError::not_found("supplier", supplier_id))?;
        if !supplier.is_active {
            return Err(DomainError::validation("supplier_id", format!("supplier {} is inactive", supplier.name)).into());
        }
        Ok(())
    }

    fn resolve_lines(&self, lines: &[PurchaseLineInput]) -> Result<Vec<PurchaseLine>, DispatchError> {
        lines
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                let material = self
                    .materials
                    .get(line.material_id)?
                    .ok_or_else(|| DomainError::not_found("material", line.material_id))?;
                if !material.is_active {
                    return Err(DomainError::validation(
                        format!("items[{idx}].material_id"),
                        format!("material {} is inactive", material.code),
                    )
                    .into());
                }
                Ok(PurchaseLine {
                    material_id: material.id,
                    material_code: material.code,
                    material_name: material.name,
                    unit: material.unit,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
            })
            .collect()
    }

    pub fn get(&self, purchase_id: PurchaseId) -> Result<Purchase, DispatchError> {
        let purchase = self
            .dispatcher
            .load(purchase_id.aggregate_id(), |id| Purchase::empty(PurchaseId(id)))?;
        if !purchase.exists() {
            return Err(DomainError::not_found("purchase", purchase_id).into());
        }
        Ok(purchase)
    }

    pub fn create(&self, draft: PurchaseDraft) -> Result<Purchase, DispatchError> {
        self.check_supplier(draft.supplier_id)?;
        let lines = self.resolve_lines(&draft.lines)?;

        let now = Utc::now();
        let purchase_id = PurchaseId::generate();
        let purchase = self.run(
            purchase_id,
            PurchaseCommand::Create(CreatePurchase {
                purchase_id,
                purchase_number: self.numbers.next(&self.prefix, now.date_naive()),
                supplier_id: draft.supplier_id,
                purchase_date: draft.purchase_date,
                note: draft.note,
                lines,
                occurred_at: now,
            }),
        )?;
        info!(%purchase_id, purchase_number = purchase.purchase_number(), "purchase created");
        Ok(purchase)
    }

    pub fn update(&self, purchase_id: PurchaseId, draft: PurchaseDraft) -> Result<Purchase, DispatchError> {
        self.check_supplier(draft.supplier_id)?;
        let lines = self.resolve_lines(&draft.lines)?;
        self.run(
            purchase_id,
            PurchaseCommand::Update(UpdatePurchase {
                purchase_id,
                supplier_id: draft.supplier_id,
                purchase_date: draft.purchase_date,
                note: draft.note,
                lines,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// DRAFT → CONFIRMED. Stock changes follow asynchronously through reconciliation.
    pub fn confirm(&self, purchase_id: PurchaseId) -> Result<Purchase, DispatchError> {
        let purchase = self.run(
            purchase_id,
            PurchaseCommand::Confirm(ConfirmPurchase {
                purchase_id,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(
            %purchase_id,
            purchase_number = purchase.purchase_number(),
            total = %purchase.total_amount(),
            "purchase confirmed"
        );
        Ok(purchase)
    }

    pub fn delete(&self, purchase_id: PurchaseId) -> Result<(), DispatchError> {
        self.run(
            purchase_id,
            PurchaseCommand::Delete(DeletePurchase {
                purchase_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }
}
