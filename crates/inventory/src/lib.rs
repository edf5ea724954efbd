//! Inventory domain: raw materials and physical stock counts.
//!
//! `Material` is a plain state-stored entity; `InventoryCheck` is event-sourced and
//! emits `InventoryCheckConfirmed` once every line has been counted.

pub mod check;
pub mod material;

pub use check::{
    ConfirmInventoryCheck, ConfirmedCountItem, CountItem, CreateInventoryCheck, DeleteInventoryCheck,
    INVENTORY_CHECK_AGGREGATE, INVENTORY_CHECK_CONFIRMED, InventoryCheck, InventoryCheckCommand, InventoryCheckConfirmed,
    InventoryCheckCreated, InventoryCheckDeleted, InventoryCheckEvent, InventoryCheckId, InventoryCheckItem,
    InventoryCheckStarted, InventoryCheckStatus, ItemCounted, MaterialSnapshot, StartInventoryCheck,
};
pub use material::{Material, MaterialDetails, MaterialId, StockChange, StockMovement};
