use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{Aggregate, AggregateRoot, DomainError, Money, typed_id};
use larder_events::Event;
use larder_inventory::MaterialId;

use crate::supplier::SupplierId;

typed_id!(
    /// Purchase identifier.
    PurchaseId
);

/// Purchase status lifecycle. CONFIRMED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    Draft,
    Confirmed,
}

impl core::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            PurchaseStatus::Draft => "DRAFT",
            PurchaseStatus::Confirmed => "CONFIRMED",
        })
    }
}

/// Requested purchase line with the material details already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub material_id: MaterialId,
    pub material_code: String,
    pub material_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Money,
}

/// Purchase line item with snapshotted material data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub material_id: MaterialId,
    pub material_code: String,
    pub material_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    /// `quantity * unit_price`, settled to two places.
    pub subtotal: Money,
}

impl PurchaseItem {
    fn from_line(line: &PurchaseLine) -> Self {
        Self {
            material_id: line.material_id,
            material_code: line.material_code.clone(),
            material_name: line.material_name.clone(),
            unit: line.unit.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.unit_price.times(line.quantity).rounded(),
        }
    }
}

fn items_total(items: &[PurchaseItem]) -> Money {
    items.iter().map(|i| i.subtotal).sum()
}

/// Aggregate root: Purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    id: PurchaseId,
    purchase_number: String,
    supplier_id: Option<SupplierId>,
    purchase_date: Option<NaiveDate>,
    note: Option<String>,
    status: PurchaseStatus,
    items: Vec<PurchaseItem>,
    total_amount: Money,
    confirmed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Purchase {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseId) -> Self {
        Self {
            id,
            purchase_number: String::new(),
            supplier_id: None,
            purchase_date: None,
            note: None,
            status: PurchaseStatus::Draft,
            items: Vec::new(),
            total_amount: Money::ZERO,
            confirmed_at: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn purchase_number(&self) -> &str {
        &self.purchase_number
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn purchase_date(&self) -> Option<NaiveDate> {
        self.purchase_date
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn status(&self) -> PurchaseStatus {
        self.status
    }

    pub fn items(&self) -> &[PurchaseItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }
}

impl AggregateRoot for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchase. The supplier has already been checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchase {
    pub purchase_id: PurchaseId,
    pub purchase_number: String,
    pub supplier_id: SupplierId,
    pub purchase_date: NaiveDate,
    pub note: Option<String>,
    pub lines: Vec<PurchaseLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdatePurchase (DRAFT only). Lines replace the current items wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePurchase {
    pub purchase_id: PurchaseId,
    pub supplier_id: SupplierId,
    pub purchase_date: NaiveDate,
    pub note: Option<String>,
    pub lines: Vec<PurchaseLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPurchase {
    pub purchase_id: PurchaseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePurchase {
    pub purchase_id: PurchaseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseCommand {
    Create(CreatePurchase),
    Update(UpdatePurchase),
    Confirm(ConfirmPurchase),
    Delete(DeletePurchase),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseCreated {
    pub purchase_id: PurchaseId,
    pub purchase_number: String,
    pub supplier_id: SupplierId,
    pub purchase_date: NaiveDate,
    pub note: Option<String>,
    pub items: Vec<PurchaseItem>,
    pub total_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseUpdated {
    pub purchase_id: PurchaseId,
    pub supplier_id: SupplierId,
    pub purchase_date: NaiveDate,
    pub note: Option<String>,
    pub items: Vec<PurchaseItem>,
    pub total_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Line of a confirmed purchase, as consumed by stock reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedPurchaseItem {
    pub material_id: MaterialId,
    pub material_code: String,
    pub material_name: String,
    pub quantity: Decimal,
    pub unit_price: Money,
}

/// Event: PurchaseConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseConfirmed {
    pub purchase_id: PurchaseId,
    pub purchase_number: String,
    pub total_amount: Money,
    pub items: Vec<ConfirmedPurchaseItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseDeleted {
    pub purchase_id: PurchaseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseEvent {
    Created(PurchaseCreated),
    Updated(PurchaseUpdated),
    Confirmed(PurchaseConfirmed),
    Deleted(PurchaseDeleted),
}

pub const PURCHASE_AGGREGATE: &str = "purchasing.purchase";
pub const PURCHASE_CONFIRMED: &str = "purchasing.purchase.confirmed";

impl Event for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::Created(_) => "purchasing.purchase.created",
            PurchaseEvent::Updated(_) => "purchasing.purchase.updated",
            PurchaseEvent::Confirmed(_) => PURCHASE_CONFIRMED,
            PurchaseEvent::Deleted(_) => "purchasing.purchase.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseEvent::Created(e) => e.occurred_at,
            PurchaseEvent::Updated(e) => e.occurred_at,
            PurchaseEvent::Confirmed(e) => e.occurred_at,
            PurchaseEvent::Deleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Purchase {
    type Command = PurchaseCommand;
    type Event = PurchaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseEvent::Created(e) => {
                self.id = e.purchase_id;
                self.purchase_number = e.purchase_number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.purchase_date = Some(e.purchase_date);
                self.note = e.note.clone();
                self.status = PurchaseStatus::Draft;
                self.items = e.items.clone();
                self.created = true;
            }
            PurchaseEvent::Updated(e) => {
                self.supplier_id = Some(e.supplier_id);
                self.purchase_date = Some(e.purchase_date);
                self.note = e.note.clone();
                self.items = e.items.clone();
            }
            PurchaseEvent::Confirmed(e) => {
                self.status = PurchaseStatus::Confirmed;
                self.confirmed_at = Some(e.occurred_at);
            }
            PurchaseEvent::Deleted(_) => {
                self.deleted = true;
            }
        }

        self.total_amount = items_total(&self.items);
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseCommand::Create(cmd) => self.handle_create(cmd),
            PurchaseCommand::Update(cmd) => self.handle_update(cmd),
            PurchaseCommand::Confirm(cmd) => self.handle_confirm(cmd),
            PurchaseCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

/// Validate requested lines and turn them into items.
fn build_items(lines: &[PurchaseLine]) -> Result<Vec<PurchaseItem>, DomainError> {
    let mut items: Vec<PurchaseItem> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(
                format!("items[{idx}].quantity"),
                "quantity must be positive",
            ));
        }
        if line.unit_price.is_negative() {
            return Err(DomainError::validation(
                format!("items[{idx}].unit_price"),
                "unit price cannot be negative",
            ));
        }
        if items.iter().any(|i| i.material_id == line.material_id) {
            return Err(DomainError::conflict(format!(
                "material {} appears more than once in the purchase",
                line.material_code
            )));
        }
        items.push(PurchaseItem::from_line(line));
    }
    Ok(items)
}

impl Purchase {
    fn ensure_exists(&self, purchase_id: PurchaseId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found("purchase", purchase_id));
        }
        if self.id != purchase_id {
            return Err(DomainError::invariant("purchase_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self, operation: &'static str) -> Result<(), DomainError> {
        if self.status != PurchaseStatus::Draft {
            return Err(DomainError::invalid_transition(self.status, operation));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!("purchase {} already exists", cmd.purchase_id)));
        }
        if cmd.purchase_number.trim().is_empty() {
            return Err(DomainError::validation("purchase_number", "cannot be empty"));
        }

        let items = build_items(&cmd.lines)?;
        let total_amount = items_total(&items);

        Ok(vec![PurchaseEvent::Created(PurchaseCreated {
            purchase_id: cmd.purchase_id,
            purchase_number: cmd.purchase_number.clone(),
            supplier_id: cmd.supplier_id,
            purchase_date: cmd.purchase_date,
            note: cmd.note.clone(),
            items,
            total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdatePurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_exists(cmd.purchase_id)?;
        self.ensure_draft("update")?;

        let items = build_items(&cmd.lines)?;
        let total_amount = items_total(&items);

        Ok(vec![PurchaseEvent::Updated(PurchaseUpdated {
            purchase_id: cmd.purchase_id,
            supplier_id: cmd.supplier_id,
            purchase_date: cmd.purchase_date,
            note: cmd.note.clone(),
            items,
            total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmPurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_exists(cmd.purchase_id)?;
        self.ensure_draft("confirm")?;

        if self.items.is_empty() {
            return Err(DomainError::invalid_transition("DRAFT with no items", "confirm"));
        }

        Ok(vec![PurchaseEvent::Confirmed(PurchaseConfirmed {
            purchase_id: cmd.purchase_id,
            purchase_number: self.purchase_number.clone(),
            total_amount: self.total_amount,
            items: self
                .items
                .iter()
                .map(|i| ConfirmedPurchaseItem {
                    material_id: i.material_id,
                    material_code: i.material_code.clone(),
                    material_name: i.material_name.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeletePurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_exists(cmd.purchase_id)?;
        self.ensure_draft("delete")?;

        Ok(vec![PurchaseEvent::Deleted(PurchaseDeleted {
            purchase_id: cmd.purchase_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_events::execute;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default()
    }

    fn line(code: &str, quantity: i64, price_cents: i64) -> PurchaseLine {
        PurchaseLine {
            material_id: MaterialId::generate(),
            material_code: code.to_string(),
            material_name: format!("Material {code}"),
            unit: "kg".to_string(),
            quantity: Decimal::from(quantity),
            unit_price: Money::from_cents(price_cents),
        }
    }

    fn create_cmd(id: PurchaseId, lines: Vec<PurchaseLine>) -> PurchaseCommand {
        PurchaseCommand::Create(CreatePurchase {
            purchase_id: id,
            purchase_number: "PO-20260301-0001".to_string(),
            supplier_id: SupplierId::generate(),
            purchase_date: date(),
            note: None,
            lines,
            occurred_at: now(),
        })
    }

    fn draft(lines: Vec<PurchaseLine>) -> Purchase {
        let id = PurchaseId::generate();
        let mut purchase = Purchase::empty(id);
        execute(&mut purchase, &create_cmd(id, lines)).unwrap();
        purchase
    }

    fn confirm(purchase: &mut Purchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        let purchase_id = purchase.id_typed();
        execute(purchase, &PurchaseCommand::Confirm(ConfirmPurchase { purchase_id, occurred_at: now() }))
    }

    #[test]
    fn total_is_sum_of_line_subtotals() {
        let purchase = draft(vec![line("A", 10, 10000), line("B", 5, 5000)]);
        assert_eq!(purchase.total_amount(), Money::from_cents(125000));
        assert_eq!(purchase.items()[1].subtotal, Money::from_cents(25000));
    }

    #[test]
    fn confirm_emits_event_with_items_and_is_one_way() {
        let mut purchase = draft(vec![line("A", 10, 10000), line("B", 5, 5000)]);
        let events = confirm(&mut purchase).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), PURCHASE_CONFIRMED);
        match &events[0] {
            PurchaseEvent::Confirmed(e) => {
                assert_eq!(e.total_amount, Money::from_cents(125000));
                assert_eq!(e.items.len(), 2);
                assert_eq!(e.items[0].quantity, Decimal::from(10));
            }
            other => panic!("expected Confirmed, got {other:?}"),
        }
        assert_eq!(purchase.status(), PurchaseStatus::Confirmed);

        let err = confirm(&mut purchase).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition(PurchaseStatus::Confirmed, "confirm"));
    }

    #[test]
    fn confirm_requires_items() {
        let mut purchase = draft(vec![]);
        let err = confirm(&mut purchase).unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[test]
    fn update_replaces_items_and_is_rejected_after_confirm() {
        let mut purchase = draft(vec![line("A", 1, 100)]);
        let purchase_id = purchase.id_typed();
        let supplier_id = purchase.supplier_id().unwrap();
        let update = |lines| {
            PurchaseCommand::Update(UpdatePurchase {
                purchase_id,
                supplier_id,
                purchase_date: date(),
                note: Some("second delivery".into()),
                lines,
                occurred_at: now(),
            })
        };

        execute(&mut purchase, &update(vec![line("B", 3, 250), line("C", 2, 100)])).unwrap();
        assert_eq!(purchase.items().len(), 2);
        assert_eq!(purchase.total_amount(), Money::from_cents(950));

        confirm(&mut purchase).unwrap();
        let err = execute(&mut purchase, &update(vec![line("D", 1, 1)])).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition(PurchaseStatus::Confirmed, "update"));
    }

    #[test]
    fn line_validation() {
        let id = PurchaseId::generate();
        let purchase = Purchase::empty(id);

        let err = purchase.handle(&create_cmd(id, vec![line("A", 0, 100)])).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "items[0].quantity"));

        let err = purchase.handle(&create_cmd(id, vec![line("A", 1, -1)])).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let dup = line("A", 1, 100);
        let err = purchase.handle(&create_cmd(id, vec![dup.clone(), dup])).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn delete_only_while_draft() {
        let mut purchase = draft(vec![line("A", 1, 100)]);
        let purchase_id = purchase.id_typed();
        execute(&mut purchase, &PurchaseCommand::Delete(DeletePurchase { purchase_id, occurred_at: now() })).unwrap();
        assert!(!purchase.exists());
        assert!(matches!(confirm(&mut purchase), Err(DomainError::NotFound { .. })));

        let mut confirmed = draft(vec![line("A", 1, 100)]);
        confirm(&mut confirmed).unwrap();
        let purchase_id = confirmed.id_typed();
        let err = execute(&mut confirmed, &PurchaseCommand::Delete(DeletePurchase { purchase_id, occurred_at: now() }))
            .unwrap_err();
        assert!(err.is_invalid_transition());
    }

    proptest! {
        #[test]
        fn total_always_matches_items(lines in proptest::collection::vec((1i64..1_000, 0i64..100_000), 0..10)) {
            let purchase = draft(
                lines
                    .iter()
                    .enumerate()
                    .map(|(n, (qty, cents))| line(&format!("M{n}"), *qty, *cents))
                    .collect(),
            );
            let expected: Money = purchase.items().iter().map(|i| i.subtotal).sum();
            prop_assert_eq!(purchase.total_amount(), expected);
            let cents: i64 = lines.iter().map(|(q, c)| q * c).sum();
            prop_assert_eq!(purchase.total_amount(), Money::from_cents(cents));
        }
    }
}
