//! Sales domain: orders, their polymorphic items and the pricing engine.
//!
//! Business rules only (no IO, no storage). Catalog data reaches the aggregate
//! through `draft`, which resolves client picks into priced items before a command
//! is built.

pub mod catalog;
pub mod draft;
pub mod item;
pub mod options;
pub mod order;
pub mod pricing;
pub mod row;

pub use catalog::{
    ComboInfo, ComboSlot, InMemoryCatalog, OptionCatalog, OptionGroupDef, OptionOwner, OptionValueDef,
    ProductCatalog, ProductInfo,
};
pub use draft::ComponentChoice;
pub use item::{
    ComboId, ComboItemLine, ComboLine, OrderItem, OrderItemId, OrderItemKind, ProductId, SelectedOption,
    SingleLine,
};
pub use options::OptionChoice;
pub use order::{
    AddItem, CancelOrder, Checkout, ComboAdded, CompleteOrder, CreateOrder, ItemAdded, ItemRemoved,
    ItemUpdated, NewComboComponent, NewOrderItem, ORDER_AGGREGATE, ORDER_PAID, Order, OrderCancelled, OrderCommand,
    OrderCompleted, OrderCreated, OrderEvent, OrderId, OrderPaid, OrderStatus, OrderSubmitted, OrderType,
    PaymentMethod, RemoveItem, SubmitOrder, TableId, UpdateItem,
};
pub use pricing::PricingWarning;
pub use row::{DecodedRow, OrderItemRow};
