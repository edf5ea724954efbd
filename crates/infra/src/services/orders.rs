use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use larder_core::{DomainError, Money};
use larder_events::{EventBus, EventEnvelope};
use larder_sales::draft;
use larder_sales::options::resolve_options;
use larder_sales::pricing::integrity_warnings;
use larder_sales::{
    AddItem, CancelOrder, Checkout, ComboId, CompleteOrder, ComponentChoice, CreateOrder, ORDER_AGGREGATE,
    OptionCatalog, OptionChoice, OptionOwner, Order, OrderCommand, OrderId, OrderItemId, OrderItemKind, OrderType,
    PaymentMethod, ProductCatalog, ProductId, RemoveItem, SubmitOrder, TableId, UpdateItem,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

use super::numbering::DailySequence;

/// Order operations: catalog resolution in front of the `Order` aggregate.
pub struct OrderService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    products: Arc<dyn ProductCatalog>,
    options: Arc<dyn OptionCatalog>,
    numbers: Arc<DailySequence>,
    prefix: String,
}

impl<S, B> OrderService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        products: Arc<dyn ProductCatalog>,
        options: Arc<dyn OptionCatalog>,
        numbers: Arc<DailySequence>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            products,
            options,
            numbers,
            prefix: prefix.into(),
        }
    }

    fn run(&self, order_id: OrderId, command: OrderCommand) -> Result<Order, DispatchError> {
        let committed = self
            .dispatcher
            .dispatch(order_id.aggregate_id(), ORDER_AGGREGATE, command, |id| Order::empty(OrderId(id)))?;
        for warning in integrity_warnings(committed.aggregate.items()) {
            warn!(%order_id, order_number = committed.aggregate.order_number(), "{warning}");
        }
        Ok(committed.aggregate)
    }

    pub fn get(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        let order = self
            .dispatcher
            .load(order_id.aggregate_id(), |id| Order::empty(OrderId(id)))?;
        if !order.exists() {
            return Err(DomainError::not_found("order", order_id).into());
        }
        Ok(order)
    }

    pub fn create(
        &self,
        order_type: OrderType,
        table_id: Option<TableId>,
        note: Option<String>,
    ) -> Result<Order, DispatchError> {
        let now = Utc::now();
        let order_id = OrderId::generate();
        let order = self.run(
            order_id,
            OrderCommand::CreateOrder(CreateOrder {
                order_id,
                order_number: self.numbers.next(&self.prefix, now.date_naive()),
                order_type,
                table_id,
                note,
                occurred_at: now,
            }),
        )?;
        info!(%order_id, order_number = order.order_number(), "order created");
        Ok(order)
    }

    pub fn add_product(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: Option<i64>,
        choices: &[OptionChoice],
    ) -> Result<Order, DispatchError> {
        let item = draft::single_item(self.products.as_ref(), self.options.as_ref(), product_id, quantity, choices)?;
        self.run(
            order_id,
            OrderCommand::AddItem(AddItem {
                order_id,
                item,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn add_combo(
        &self,
        order_id: OrderId,
        combo_id: ComboId,
        header_choices: &[OptionChoice],
        component_choices: &[ComponentChoice],
    ) -> Result<Order, DispatchError> {
        let item = draft::combo_item(
            self.products.as_ref(),
            self.options.as_ref(),
            combo_id,
            header_choices,
            component_choices,
        )?;
        self.run(
            order_id,
            OrderCommand::AddItem(AddItem {
                order_id,
                item,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Change quantity and/or options. New choices are priced against the item's own
    /// option templates (product for SINGLE/COMBO_ITEM, combo for COMBO).
    pub fn update_item(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
        quantity: Option<i64>,
        choices: Option<&[OptionChoice]>,
    ) -> Result<Order, DispatchError> {
        let options = match choices {
            None => None,
            Some(choices) => {
                let order = self.get(order_id)?;
                let item = order
                    .item(item_id)
                    .ok_or_else(|| DomainError::not_found("order item", item_id))?;
                let owner = match &item.kind {
                    OrderItemKind::Single(line) => OptionOwner::Product(line.product_id),
                    OrderItemKind::ComboItem(line) => OptionOwner::Product(line.product_id),
                    OrderItemKind::Combo(line) => OptionOwner::Combo(line.combo_id),
                };
                Some(resolve_options(self.options.as_ref(), owner, choices)?)
            }
        };

        self.run(
            order_id,
            OrderCommand::UpdateItem(UpdateItem {
                order_id,
                item_id,
                quantity,
                options,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn remove_item(&self, order_id: OrderId, item_id: OrderItemId) -> Result<Order, DispatchError> {
        self.run(
            order_id,
            OrderCommand::RemoveItem(RemoveItem {
                order_id,
                item_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn submit(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        self.run(
            order_id,
            OrderCommand::SubmitOrder(SubmitOrder {
                order_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn checkout(
        &self,
        order_id: OrderId,
        amount: Money,
        payment_method: PaymentMethod,
    ) -> Result<Order, DispatchError> {
        let order = self.run(
            order_id,
            OrderCommand::Checkout(Checkout {
                order_id,
                amount,
                payment_method,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(%order_id, order_number = order.order_number(), %amount, "order paid");
        Ok(order)
    }

    pub fn complete(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        self.run(
            order_id,
            OrderCommand::CompleteOrder(CompleteOrder {
                order_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn cancel(&self, order_id: OrderId, reason: Option<String>) -> Result<Order, DispatchError> {
        self.run(
            order_id,
            OrderCommand::CancelOrder(CancelOrder {
                order_id,
                reason,
                occurred_at: Utc::now(),
            }),
        )
    }
}
