use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{Aggregate, AggregateRoot, DomainError, Money, typed_id};
use larder_events::Event;

use crate::material::{Material, MaterialId};

typed_id!(
    /// Inventory check (physical stock count) identifier.
    InventoryCheckId
);

/// Inventory check status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryCheckStatus {
    Planned,
    InProgress,
    Confirmed,
}

impl core::fmt::Display for InventoryCheckStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            InventoryCheckStatus::Planned => "PLANNED",
            InventoryCheckStatus::InProgress => "IN_PROGRESS",
            InventoryCheckStatus::Confirmed => "CONFIRMED",
        })
    }
}

/// Material state captured when the check is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialSnapshot {
    pub material_id: MaterialId,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub system_quantity: Decimal,
    pub unit_cost: Money,
}

impl From<&Material> for MaterialSnapshot {
    fn from(m: &Material) -> Self {
        Self {
            material_id: m.id,
            code: m.code.clone(),
            name: m.name.clone(),
            unit: m.unit.clone(),
            system_quantity: m.stock(),
            unit_cost: m.cost_price,
        }
    }
}

/// One count line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCheckItem {
    pub material_id: MaterialId,
    pub material_code: String,
    pub material_name: String,
    pub unit: String,
    pub system_quantity: Decimal,
    pub unit_cost: Money,
    pub actual_quantity: Option<Decimal>,
    pub is_checked: bool,
    pub note: Option<String>,
}

impl InventoryCheckItem {
    fn planned(snapshot: &MaterialSnapshot) -> Self {
        Self {
            material_id: snapshot.material_id,
            material_code: snapshot.code.clone(),
            material_name: snapshot.name.clone(),
            unit: snapshot.unit.clone(),
            system_quantity: snapshot.system_quantity,
            unit_cost: snapshot.unit_cost,
            actual_quantity: None,
            is_checked: false,
            note: None,
        }
    }

    /// `actual - system`, once counted.
    pub fn difference_quantity(&self) -> Option<Decimal> {
        self.actual_quantity.map(|actual| actual - self.system_quantity)
    }

    pub fn difference_amount(&self) -> Option<Money> {
        self.difference_quantity()
            .map(|diff| self.unit_cost.times(diff).rounded())
    }
}

/// Aggregate root: InventoryCheck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryCheck {
    id: InventoryCheckId,
    check_number: String,
    check_date: Option<NaiveDate>,
    note: Option<String>,
    status: InventoryCheckStatus,
    items: Vec<InventoryCheckItem>,
    confirmed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl InventoryCheck {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InventoryCheckId) -> Self {
        Self {
            id,
            check_number: String::new(),
            check_date: None,
            note: None,
            status: InventoryCheckStatus::Planned,
            items: Vec::new(),
            confirmed_at: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> InventoryCheckId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn check_number(&self) -> &str {
        &self.check_number
    }

    pub fn check_date(&self) -> Option<NaiveDate> {
        self.check_date
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn status(&self) -> InventoryCheckStatus {
        self.status
    }

    pub fn items(&self) -> &[InventoryCheckItem] {
        &self.items
    }

    pub fn item(&self, material_id: MaterialId) -> Option<&InventoryCheckItem> {
        self.items.iter().find(|i| i.material_id == material_id)
    }

    pub fn unchecked_count(&self) -> usize {
        self.items.iter().filter(|i| !i.is_checked).count()
    }

    /// Σ difference amount over counted items.
    pub fn total_difference_amount(&self) -> Money {
        self.items.iter().filter_map(InventoryCheckItem::difference_amount).sum()
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }
}

impl AggregateRoot for InventoryCheck {
    type Id = InventoryCheckId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInventoryCheck. `materials` is the active-material snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInventoryCheck {
    pub check_id: InventoryCheckId,
    pub check_number: String,
    pub check_date: NaiveDate,
    pub note: Option<String>,
    pub materials: Vec<MaterialSnapshot>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartInventoryCheck {
    pub check_id: InventoryCheckId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CountItem (IN_PROGRESS only). Recounting overwrites the previous count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountItem {
    pub check_id: InventoryCheckId,
    pub material_id: MaterialId,
    pub actual_quantity: Decimal,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmInventoryCheck {
    pub check_id: InventoryCheckId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteInventoryCheck {
    pub check_id: InventoryCheckId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCheckCommand {
    Create(CreateInventoryCheck),
    Start(StartInventoryCheck),
    CountItem(CountItem),
    Confirm(ConfirmInventoryCheck),
    Delete(DeleteInventoryCheck),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCheckCreated {
    pub check_id: InventoryCheckId,
    pub check_number: String,
    pub check_date: NaiveDate,
    pub note: Option<String>,
    pub items: Vec<InventoryCheckItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCheckStarted {
    pub check_id: InventoryCheckId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounted {
    pub check_id: InventoryCheckId,
    pub material_id: MaterialId,
    pub actual_quantity: Decimal,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Line of a confirmed count, as consumed by stock reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedCountItem {
    pub material_id: MaterialId,
    pub material_code: String,
    pub material_name: String,
    pub system_quantity: Decimal,
    pub actual_quantity: Decimal,
    pub difference_quantity: Decimal,
}

/// Event: InventoryCheckConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCheckConfirmed {
    pub check_id: InventoryCheckId,
    pub check_number: String,
    pub total_difference_amount: Money,
    pub items: Vec<ConfirmedCountItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCheckDeleted {
    pub check_id: InventoryCheckId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCheckEvent {
    Created(InventoryCheckCreated),
    Started(InventoryCheckStarted),
    ItemCounted(ItemCounted),
    Confirmed(InventoryCheckConfirmed),
    Deleted(InventoryCheckDeleted),
}

pub const INVENTORY_CHECK_AGGREGATE: &str = "inventory.check";
pub const INVENTORY_CHECK_CONFIRMED: &str = "inventory.check.confirmed";

impl Event for InventoryCheckEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryCheckEvent::Created(_) => "inventory.check.created",
            InventoryCheckEvent::Started(_) => "inventory.check.started",
            InventoryCheckEvent::ItemCounted(_) => "inventory.check.item_counted",
            InventoryCheckEvent::Confirmed(_) => INVENTORY_CHECK_CONFIRMED,
            InventoryCheckEvent::Deleted(_) => "inventory.check.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryCheckEvent::Created(e) => e.occurred_at,
            InventoryCheckEvent::Started(e) => e.occurred_at,
            InventoryCheckEvent::ItemCounted(e) => e.occurred_at,
            InventoryCheckEvent::Confirmed(e) => e.occurred_at,
            InventoryCheckEvent::Deleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryCheck {
    type Command = InventoryCheckCommand;
    type Event = InventoryCheckEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryCheckEvent::Created(e) => {
                self.id = e.check_id;
                self.check_number = e.check_number.clone();
                self.check_date = Some(e.check_date);
                self.note = e.note.clone();
                self.status = InventoryCheckStatus::Planned;
                self.items = e.items.clone();
                self.created = true;
            }
            InventoryCheckEvent::Started(_) => {
                self.status = InventoryCheckStatus::InProgress;
            }
            InventoryCheckEvent::ItemCounted(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.material_id == e.material_id) {
                    item.actual_quantity = Some(e.actual_quantity);
                    item.is_checked = true;
                    item.note = e.note.clone();
                }
            }
            InventoryCheckEvent::Confirmed(e) => {
                self.status = InventoryCheckStatus::Confirmed;
                self.confirmed_at = Some(e.occurred_at);
            }
            InventoryCheckEvent::Deleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCheckCommand::Create(cmd) => self.handle_create(cmd),
            InventoryCheckCommand::Start(cmd) => self.handle_start(cmd),
            InventoryCheckCommand::CountItem(cmd) => self.handle_count(cmd),
            InventoryCheckCommand::Confirm(cmd) => self.handle_confirm(cmd),
            InventoryCheckCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

impl InventoryCheck {
    fn ensure_exists(&self, check_id: InventoryCheckId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found("inventory check", check_id));
        }
        if self.id != check_id {
            return Err(DomainError::invariant("check_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInventoryCheck) -> Result<Vec<InventoryCheckEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!("inventory check {} already exists", cmd.check_id)));
        }
        if cmd.check_number.trim().is_empty() {
            return Err(DomainError::validation("check_number", "cannot be empty"));
        }

        let mut items: Vec<InventoryCheckItem> = Vec::with_capacity(cmd.materials.len());
        for snapshot in &cmd.materials {
            if items.iter().any(|i| i.material_id == snapshot.material_id) {
                return Err(DomainError::conflict(format!(
                    "material {} appears twice in the count",
                    snapshot.code
                )));
            }
            items.push(InventoryCheckItem::planned(snapshot));
        }

        Ok(vec![InventoryCheckEvent::Created(InventoryCheckCreated {
            check_id: cmd.check_id,
            check_number: cmd.check_number.clone(),
            check_date: cmd.check_date,
            note: cmd.note.clone(),
            items,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start(&self, cmd: &StartInventoryCheck) -> Result<Vec<InventoryCheckEvent>, DomainError> {
        self.ensure_exists(cmd.check_id)?;
        if self.status != InventoryCheckStatus::Planned {
            return Err(DomainError::invalid_transition(self.status, "start"));
        }

        Ok(vec![InventoryCheckEvent::Started(InventoryCheckStarted {
            check_id: cmd.check_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_count(&self, cmd: &CountItem) -> Result<Vec<InventoryCheckEvent>, DomainError> {
        self.ensure_exists(cmd.check_id)?;
        if self.status != InventoryCheckStatus::InProgress {
            return Err(DomainError::invalid_transition(self.status, "update item"));
        }
        if cmd.actual_quantity.is_sign_negative() && !cmd.actual_quantity.is_zero() {
            return Err(DomainError::validation("actual_quantity", "cannot be negative"));
        }
        if self.item(cmd.material_id).is_none() {
            return Err(DomainError::not_found("inventory check item", cmd.material_id));
        }

        Ok(vec![InventoryCheckEvent::ItemCounted(ItemCounted {
            check_id: cmd.check_id,
            material_id: cmd.material_id,
            actual_quantity: cmd.actual_quantity,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmInventoryCheck) -> Result<Vec<InventoryCheckEvent>, DomainError> {
        self.ensure_exists(cmd.check_id)?;
        if self.status != InventoryCheckStatus::InProgress {
            return Err(DomainError::invalid_transition(self.status, "confirm"));
        }

        let unchecked = self.unchecked_count();
        if unchecked > 0 {
            return Err(DomainError::invalid_transition(
                format!("{} with {unchecked} unchecked items", self.status),
                "confirm",
            ));
        }

        let items = self
            .items
            .iter()
            .filter_map(|i| {
                let actual = i.actual_quantity?;
                Some(ConfirmedCountItem {
                    material_id: i.material_id,
                    material_code: i.material_code.clone(),
                    material_name: i.material_name.clone(),
                    system_quantity: i.system_quantity,
                    actual_quantity: actual,
                    difference_quantity: actual - i.system_quantity,
                })
            })
            .collect();

        Ok(vec![InventoryCheckEvent::Confirmed(InventoryCheckConfirmed {
            check_id: cmd.check_id,
            check_number: self.check_number.clone(),
            total_difference_amount: self.total_difference_amount(),
            items,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteInventoryCheck) -> Result<Vec<InventoryCheckEvent>, DomainError> {
        self.ensure_exists(cmd.check_id)?;
        if self.status == InventoryCheckStatus::Confirmed {
            return Err(DomainError::invalid_transition(self.status, "delete"));
        }

        Ok(vec![InventoryCheckEvent::Deleted(InventoryCheckDeleted {
            check_id: cmd.check_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
