//! Application services: collaborator lookups in front of the command dispatcher.
//!
//! Aggregates stay pure, so anything that needs a catalog, the material store or a
//! document number is resolved here and passed in through the command.

pub mod inventory_checks;
pub mod numbering;
pub mod orders;
pub mod purchases;

pub use inventory_checks::InventoryCheckService;
pub use numbering::DailySequence;
pub use orders::OrderService;
pub use purchases::{PurchaseDraft, PurchaseLineInput, PurchaseService};
