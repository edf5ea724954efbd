use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{Aggregate, AggregateRoot, DomainError, Money, typed_id};
use larder_events::Event;

use crate::item::{
    ComboId, ComboItemLine, ComboLine, OrderItem, OrderItemId, OrderItemKind, ProductId,
    SelectedOption, SingleLine,
};
use crate::pricing;

typed_id!(
    /// Order identifier.
    OrderId
);

typed_id!(
    /// Dining table identifier (dine-in orders).
    TableId
);

/// Order status lifecycle.
///
/// ```text
/// DRAFT ──submit──▶ PENDING_PAYMENT ──checkout──▶ PAID ──complete──▶ COMPLETED
///   └──────────────────────┴──────────cancel──────────┴──▶ CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    PendingPayment,
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::PendingPayment => "PENDING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    DineIn,
    Takeout,
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileWallet,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    order_number: String,
    order_type: OrderType,
    table_id: Option<TableId>,
    note: Option<String>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    total_amount: Money,
    paid_amount: Option<Money>,
    payment_method: Option<PaymentMethod>,
    cancel_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    next_item_id: u32,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            order_type: OrderType::Takeout,
            table_id: None,
            note: None,
            status: OrderStatus::Draft,
            items: Vec::new(),
            total_amount: Money::ZERO,
            paid_amount: None,
            payment_method: None,
            cancel_reason: None,
            created_at: None,
            updated_at: None,
            paid_at: None,
            completed_at: None,
            cancelled_at: None,
            next_item_id: 1,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn table_id(&self) -> Option<TableId> {
        self.table_id
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, item_id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    /// Derived: always the pricing engine's total of the current items.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn paid_amount(&self) -> Option<Money> {
        self.paid_amount
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, OrderStatus::Draft)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Item to add, already resolved against the catalog (names, prices, option prices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewOrderItem {
    Single {
        product_id: ProductId,
        product_name: String,
        unit_price: Option<Money>,
        /// `None` means 1.
        quantity: Option<i64>,
        options: Vec<SelectedOption>,
    },
    Combo {
        combo_id: ComboId,
        combo_name: String,
        combo_price: Option<Money>,
        options: Vec<SelectedOption>,
        components: Vec<NewComboComponent>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComboComponent {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Option<i64>,
    pub options: Vec<SelectedOption>,
}

/// Command: CreateOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub order_type: OrderType,
    pub table_id: Option<TableId>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem (DRAFT only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub order_id: OrderId,
    pub item: NewOrderItem,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem (DRAFT only). `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub quantity: Option<i64>,
    pub options: Option<Vec<SelectedOption>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem (DRAFT only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitOrder (DRAFT → PENDING_PAYMENT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Checkout (PENDING_PAYMENT → PAID).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub order_id: OrderId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteOrder (PAID → COMPLETED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder (any non-terminal state → CANCELLED).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    AddItem(AddItem),
    UpdateItem(UpdateItem),
    RemoveItem(RemoveItem),
    SubmitOrder(SubmitOrder),
    Checkout(Checkout),
    CompleteOrder(CompleteOrder),
    CancelOrder(CancelOrder),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub order_number: String,
    pub order_type: OrderType,
    pub table_id: Option<TableId>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded. `total_amount` is the order total after the addition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub order_id: OrderId,
    pub item: OrderItem,
    pub total_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ComboAdded (header followed by its sub-items).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboAdded {
    pub order_id: OrderId,
    pub header: OrderItem,
    pub components: Vec<OrderItem>,
    pub total_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemUpdated (carries the item's new state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdated {
    pub order_id: OrderId,
    pub item: OrderItem,
    pub total_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved (a combo header removes its sub-items with it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub order_id: OrderId,
    pub item_ids: Vec<OrderItemId>,
    pub total_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmitted {
    pub order_id: OrderId,
    pub total_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaid {
    pub order_id: OrderId,
    pub order_number: String,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated(OrderCreated),
    ItemAdded(ItemAdded),
    ComboAdded(ComboAdded),
    ItemUpdated(ItemUpdated),
    ItemRemoved(ItemRemoved),
    OrderSubmitted(OrderSubmitted),
    OrderPaid(OrderPaid),
    OrderCompleted(OrderCompleted),
    OrderCancelled(OrderCancelled),
}

/// Stream name under which orders are stored and published.
pub const ORDER_AGGREGATE: &str = "sales.order";
pub const ORDER_PAID: &str = "sales.order.paid";

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "sales.order.created",
            OrderEvent::ItemAdded(_) => "sales.order.item_added",
            OrderEvent::ComboAdded(_) => "sales.order.combo_added",
            OrderEvent::ItemUpdated(_) => "sales.order.item_updated",
            OrderEvent::ItemRemoved(_) => "sales.order.item_removed",
            OrderEvent::OrderSubmitted(_) => "sales.order.submitted",
            OrderEvent::OrderPaid(_) => ORDER_PAID,
            OrderEvent::OrderCompleted(_) => "sales.order.completed",
            OrderEvent::OrderCancelled(_) => "sales.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(e) => e.occurred_at,
            OrderEvent::ItemAdded(e) => e.occurred_at,
            OrderEvent::ComboAdded(e) => e.occurred_at,
            OrderEvent::ItemUpdated(e) => e.occurred_at,
            OrderEvent::ItemRemoved(e) => e.occurred_at,
            OrderEvent::OrderSubmitted(e) => e.occurred_at,
            OrderEvent::OrderPaid(e) => e.occurred_at,
            OrderEvent::OrderCompleted(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.order_type = e.order_type;
                self.table_id = e.table_id;
                self.note = e.note.clone();
                self.status = OrderStatus::Draft;
                self.items.clear();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::ItemAdded(e) => {
                self.next_item_id = self.next_item_id.max(e.item.item_id.0 + 1);
                self.items.push(e.item.clone());
            }
            OrderEvent::ComboAdded(e) => {
                let last = e
                    .components
                    .iter()
                    .map(|c| c.item_id.0)
                    .chain(core::iter::once(e.header.item_id.0))
                    .max()
                    .unwrap_or(0);
                self.next_item_id = self.next_item_id.max(last + 1);
                self.items.push(e.header.clone());
                self.items.extend(e.components.iter().cloned());
            }
            OrderEvent::ItemUpdated(e) => {
                if let Some(slot) = self.items.iter_mut().find(|i| i.item_id == e.item.item_id) {
                    *slot = e.item.clone();
                }
            }
            OrderEvent::ItemRemoved(e) => {
                self.items.retain(|i| !e.item_ids.contains(&i.item_id));
            }
            OrderEvent::OrderSubmitted(_) => {
                self.status = OrderStatus::PendingPayment;
            }
            OrderEvent::OrderPaid(e) => {
                self.status = OrderStatus::Paid;
                self.paid_amount = Some(e.amount);
                self.payment_method = Some(e.payment_method);
                self.paid_at = Some(e.occurred_at);
            }
            OrderEvent::OrderCompleted(e) => {
                self.status = OrderStatus::Completed;
                self.completed_at = Some(e.occurred_at);
            }
            OrderEvent::OrderCancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.cancel_reason = e.reason.clone();
                self.cancelled_at = Some(e.occurred_at);
            }
        }

        // Recalculate-and-store after every event so the total is never stale.
        self.total_amount = pricing::order_total(&self.items);
        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            OrderCommand::AddItem(cmd) => self.handle_add_item(cmd),
            OrderCommand::UpdateItem(cmd) => self.handle_update_item(cmd),
            OrderCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            OrderCommand::SubmitOrder(cmd) => self.handle_submit(cmd),
            OrderCommand::Checkout(cmd) => self.handle_checkout(cmd),
            OrderCommand::CompleteOrder(cmd) => self.handle_complete(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

/// `None` → 1; zero or negative → Validation.
fn effective_quantity(field: &str, quantity: Option<i64>) -> Result<u32, DomainError> {
    match quantity {
        None => Ok(1),
        Some(q) if q <= 0 => Err(DomainError::validation(field, "quantity must be positive")),
        Some(q) => u32::try_from(q).map_err(|_| DomainError::validation(field, "quantity is too large")),
    }
}

impl Order {
    fn ensure_exists(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("order", order_id));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self, operation: &'static str) -> Result<(), DomainError> {
        if !self.is_modifiable() {
            return Err(DomainError::invalid_transition(self.status, operation));
        }
        Ok(())
    }

    /// Total the order would have with `items`; used to stamp item events.
    fn total_with(items: &[OrderItem]) -> Money {
        pricing::order_total(items)
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!("order {} already exists", cmd.order_id)));
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order_number", "cannot be empty"));
        }
        if cmd.order_type == OrderType::DineIn && cmd.table_id.is_none() {
            return Err(DomainError::validation("table_id", "dine-in orders need a table"));
        }

        Ok(vec![OrderEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            order_type: cmd.order_type,
            table_id: cmd.table_id,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_draft("add item")?;

        match &cmd.item {
            NewOrderItem::Single {
                product_id,
                product_name,
                unit_price,
                quantity,
                options,
            } => {
                let quantity = effective_quantity("quantity", *quantity)?;
                if unit_price.is_some_and(|p| p.is_negative()) {
                    return Err(DomainError::validation("unit_price", "cannot be negative"));
                }
                let item = OrderItem {
                    item_id: OrderItemId(self.next_item_id),
                    kind: OrderItemKind::Single(SingleLine {
                        product_id: *product_id,
                        product_name: product_name.clone(),
                        unit_price: *unit_price,
                        quantity,
                        options_amount: pricing::options_amount(options),
                        options: options.clone(),
                    }),
                };

                let mut next = self.items.clone();
                next.push(item.clone());

                Ok(vec![OrderEvent::ItemAdded(ItemAdded {
                    order_id: cmd.order_id,
                    item,
                    total_amount: Self::total_with(&next),
                    occurred_at: cmd.occurred_at,
                })])
            }
            NewOrderItem::Combo {
                combo_id,
                combo_name,
                combo_price,
                options,
                components,
            } => {
                if components.is_empty() {
                    return Err(DomainError::validation("components", "combo has no items"));
                }
                if combo_price.is_some_and(|p| p.is_negative()) {
                    return Err(DomainError::validation("combo_price", "cannot be negative"));
                }

                let group_sequence = self
                    .items
                    .iter()
                    .filter_map(OrderItem::group_sequence)
                    .max()
                    .unwrap_or(0)
                    + 1;

                let header = OrderItem {
                    item_id: OrderItemId(self.next_item_id),
                    kind: OrderItemKind::Combo(ComboLine {
                        combo_id: *combo_id,
                        combo_name: combo_name.clone(),
                        combo_price: *combo_price,
                        group_sequence,
                        options_amount: pricing::options_amount(options),
                        options: options.clone(),
                    }),
                };

                let mut parts = Vec::with_capacity(components.len());
                for (offset, component) in components.iter().enumerate() {
                    let quantity =
                        effective_quantity(&format!("components[{offset}].quantity"), component.quantity)?;
                    parts.push(OrderItem {
                        item_id: OrderItemId(self.next_item_id + 1 + offset as u32),
                        kind: OrderItemKind::ComboItem(ComboItemLine {
                            combo_id: *combo_id,
                            group_sequence,
                            product_id: component.product_id,
                            product_name: component.product_name.clone(),
                            quantity,
                            options_amount: pricing::options_amount(&component.options),
                            options: component.options.clone(),
                        }),
                    });
                }

                let mut next = self.items.clone();
                next.push(header.clone());
                next.extend(parts.iter().cloned());

                Ok(vec![OrderEvent::ComboAdded(ComboAdded {
                    order_id: cmd.order_id,
                    header,
                    components: parts,
                    total_amount: Self::total_with(&next),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }

    fn handle_update_item(&self, cmd: &UpdateItem) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_draft("update item")?;

        let current = self
            .item(cmd.item_id)
            .ok_or_else(|| DomainError::not_found("order item", cmd.item_id))?;

        let mut updated = current.clone();
        match &mut updated.kind {
            OrderItemKind::Single(line) => {
                if cmd.quantity.is_some() {
                    line.quantity = effective_quantity("quantity", cmd.quantity)?;
                }
                if let Some(options) = &cmd.options {
                    line.options_amount = pricing::options_amount(options);
                    line.options = options.clone();
                }
            }
            OrderItemKind::Combo(line) => {
                if cmd.quantity.is_some() {
                    return Err(DomainError::validation(
                        "quantity",
                        "combo quantity is fixed; add another combo instead",
                    ));
                }
                if let Some(options) = &cmd.options {
                    line.options_amount = pricing::options_amount(options);
                    line.options = options.clone();
                }
            }
            OrderItemKind::ComboItem(line) => {
                if cmd.quantity.is_some() {
                    return Err(DomainError::validation(
                        "quantity",
                        "combo item quantities come from the combo definition",
                    ));
                }
                if let Some(options) = &cmd.options {
                    line.options_amount = pricing::options_amount(options);
                    line.options = options.clone();
                }
            }
        }

        let next: Vec<OrderItem> = self
            .items
            .iter()
            .map(|i| if i.item_id == cmd.item_id { updated.clone() } else { i.clone() })
            .collect();

        Ok(vec![OrderEvent::ItemUpdated(ItemUpdated {
            order_id: cmd.order_id,
            item: updated,
            total_amount: Self::total_with(&next),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_draft("remove item")?;

        let target = self
            .item(cmd.item_id)
            .ok_or_else(|| DomainError::not_found("order item", cmd.item_id))?;

        let item_ids: Vec<OrderItemId> = match &target.kind {
            OrderItemKind::Single(_) => vec![target.item_id],
            OrderItemKind::Combo(line) => self
                .items
                .iter()
                .filter(|i| i.group_sequence() == Some(line.group_sequence))
                .map(|i| i.item_id)
                .collect(),
            OrderItemKind::ComboItem(_) => {
                return Err(DomainError::validation(
                    "item_id",
                    "combo items are removed together with their combo",
                ));
            }
        };

        let next: Vec<OrderItem> = self
            .items
            .iter()
            .filter(|i| !item_ids.contains(&i.item_id))
            .cloned()
            .collect();

        Ok(vec![OrderEvent::ItemRemoved(ItemRemoved {
            order_id: cmd.order_id,
            item_ids,
            total_amount: Self::total_with(&next),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.ensure_draft("submit")?;

        if self.items.is_empty() {
            return Err(DomainError::invalid_transition("DRAFT with no items", "submit"));
        }

        Ok(vec![OrderEvent::OrderSubmitted(OrderSubmitted {
            order_id: cmd.order_id,
            total_amount: self.total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_checkout(&self, cmd: &Checkout) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status != OrderStatus::PendingPayment {
            return Err(DomainError::invalid_transition(self.status, "checkout"));
        }

        // Compared at full precision.
        if cmd.amount != self.total_amount {
            return Err(DomainError::validation(
                "amount",
                format!(
                    "payment {} does not match order total {}",
                    cmd.amount, self.total_amount
                ),
            ));
        }

        Ok(vec![OrderEvent::OrderPaid(OrderPaid {
            order_id: cmd.order_id,
            order_number: self.order_number.clone(),
            amount: cmd.amount,
            payment_method: cmd.payment_method,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status != OrderStatus::Paid {
            return Err(DomainError::invalid_transition(self.status, "complete"));
        }

        Ok(vec![OrderEvent::OrderCompleted(OrderCompleted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(self.status, "cancel"));
        }

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            order_id: cmd.order_id,
            previous_status: self.status,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
