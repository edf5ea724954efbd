//! Purchasing domain module (purchases, event-sourced).
//!
//! Business rules for supplier purchases, implemented as deterministic domain logic
//! (no IO, no storage). Confirming a purchase emits `PurchaseConfirmed`, which drives
//! stock reconciliation downstream.

pub mod purchase;
pub mod supplier;

pub use purchase::{
    ConfirmPurchase, ConfirmedPurchaseItem, CreatePurchase, DeletePurchase, PURCHASE_AGGREGATE, PURCHASE_CONFIRMED, Purchase,
    PurchaseCommand, PurchaseConfirmed, PurchaseCreated, PurchaseDeleted, PurchaseEvent, PurchaseId,
    PurchaseItem, PurchaseLine, PurchaseStatus, PurchaseUpdated, UpdatePurchase,
};
pub use supplier::{InMemorySupplierCatalog, SupplierCatalog, SupplierId, SupplierInfo};
