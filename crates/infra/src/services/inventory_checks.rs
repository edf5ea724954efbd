use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::info;

use larder_core::DomainError;
use larder_events::{EventBus, EventEnvelope};
use larder_inventory::{
    ConfirmInventoryCheck, CountItem, CreateInventoryCheck, DeleteInventoryCheck, INVENTORY_CHECK_AGGREGATE,
    InventoryCheck, InventoryCheckCommand, InventoryCheckId, MaterialId, MaterialSnapshot, StartInventoryCheck,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::material_store::MaterialStore;

use super::numbering::DailySequence;

/// Physical count workflow. A new check snapshots every active material's current
/// stock and cost as its system quantities.
pub struct InventoryCheckService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    materials: Arc<dyn MaterialStore>,
    numbers: Arc<DailySequence>,
    prefix: String,
}

impl<S, B> InventoryCheckService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        materials: Arc<dyn MaterialStore>,
        numbers: Arc<DailySequence>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            materials,
            numbers,
            prefix: prefix.into(),
        }
    }

    fn run(&self, check_id: InventoryCheckId, command: InventoryCheckCommand) -> Result<InventoryCheck, DispatchError> {
        let committed = self
            .dispatcher
            .dispatch(check_id.aggregate_id(), INVENTORY_CHECK_AGGREGATE, command, |id| {
                InventoryCheck::empty(InventoryCheckId(id))
            })?;
        Ok(committed.aggregate)
    }

    pub fn get(&self, check_id: InventoryCheckId) -> Result<InventoryCheck, DispatchError> {
        let check = self
            .dispatcher
            .load(check_id.aggregate_id(), |id| InventoryCheck::empty(InventoryCheckId(id)))?;
        if !check.exists() {
            return Err(DomainError::not_found("inventory check", check_id).into());
        }
        Ok(check)
    }

    pub fn create(&self, check_date: NaiveDate, note: Option<String>) -> Result<InventoryCheck, DispatchError> {
        let materials: Vec<MaterialSnapshot> = self
            .materials
            .list_active()?
            .iter()
            .map(MaterialSnapshot::from)
            .collect();

        let now = Utc::now();
        let check_id = InventoryCheckId::generate();
        let check = self.run(
            check_id,
            InventoryCheckCommand::Create(CreateInventoryCheck {
                check_id,
                check_number: self.numbers.next(&self.prefix, now.date_naive()),
                check_date,
                note,
                materials,
                occurred_at: now,
            }),
        )?;
        info!(%check_id, check_number = check.check_number(), items = check.items().len(), "inventory check created");
        Ok(check)
    }

    pub fn start(&self, check_id: InventoryCheckId) -> Result<InventoryCheck, DispatchError> {
        self.run(
            check_id,
            InventoryCheckCommand::Start(StartInventoryCheck {
                check_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn count_item(
        &self,
        check_id: InventoryCheckId,
        material_id: MaterialId,
        actual_quantity: Decimal,
        note: Option<String>,
    ) -> Result<InventoryCheck, DispatchError> {
        self.run(
            check_id,
            InventoryCheckCommand::CountItem(CountItem {
                check_id,
                material_id,
                actual_quantity,
                note,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// IN_PROGRESS → CONFIRMED. Material stock is overwritten later by reconciliation.
    pub fn confirm(&self, check_id: InventoryCheckId) -> Result<InventoryCheck, DispatchError> {
        let check = self.run(
            check_id,
            InventoryCheckCommand::Confirm(ConfirmInventoryCheck {
                check_id,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(
            %check_id,
            check_number = check.check_number(),
            difference = %check.total_difference_amount(),
            "inventory check confirmed"
        );
        Ok(check)
    }

    pub fn delete(&self, check_id: InventoryCheckId) -> Result<(), DispatchError> {
        self.run(
            check_id,
            InventoryCheckCommand::Delete(DeleteInventoryCheck {
                check_id,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }
}
