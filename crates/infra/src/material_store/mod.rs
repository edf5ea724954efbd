//! Material stock store: the one row type written by more than one path.
//!
//! Master-data edits change descriptive fields, stock reconciliation changes
//! quantity and cost. Implementations must serialise every read-modify-write of the
//! same material so two reconciliations can never lose each other's update.

pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use larder_core::DomainError;
use larder_inventory::{Material, MaterialDetails, MaterialId, StockChange, StockMovement};

pub use in_memory::InMemoryMaterialStore;

#[derive(Debug, Error)]
pub enum MaterialStoreError {
    #[error("material {0} not found")]
    NotFound(MaterialId),

    #[error("material {0} already exists")]
    Duplicate(MaterialId),

    #[error("material code `{0}` is already in use")]
    DuplicateCode(String),

    /// The requested change broke a material rule; the row is unchanged.
    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error("material store lock poisoned")]
    Poisoned,
}

pub trait MaterialStore: Send + Sync {
    fn get(&self, id: MaterialId) -> Result<Option<Material>, MaterialStoreError>;

    /// Active materials ordered by code.
    fn list_active(&self) -> Result<Vec<Material>, MaterialStoreError>;

    fn insert(&self, material: Material) -> Result<(), MaterialStoreError>;

    fn update_details(&self, id: MaterialId, details: &MaterialDetails) -> Result<Material, MaterialStoreError>;

    /// Atomic read-modify-write of stock and cost for one material.
    fn apply_stock_change(&self, id: MaterialId, change: &StockChange) -> Result<StockMovement, MaterialStoreError>;

    fn remove(&self, id: MaterialId) -> Result<Option<Material>, MaterialStoreError>;
}

impl<S> MaterialStore for Arc<S>
where
    S: MaterialStore + ?Sized,
{
    fn get(&self, id: MaterialId) -> Result<Option<Material>, MaterialStoreError> {
        (**self).get(id)
    }

    fn list_active(&self) -> Result<Vec<Material>, MaterialStoreError> {
        (**self).list_active()
    }

    fn insert(&self, material: Material) -> Result<(), MaterialStoreError> {
        (**self).insert(material)
    }

    fn update_details(&self, id: MaterialId, details: &MaterialDetails) -> Result<Material, MaterialStoreError> {
        (**self).update_details(id, details)
    }

    fn apply_stock_change(&self, id: MaterialId, change: &StockChange) -> Result<StockMovement, MaterialStoreError> {
        (**self).apply_stock_change(id, change)
    }

    fn remove(&self, id: MaterialId) -> Result<Option<Material>, MaterialStoreError> {
        (**self).remove(id)
    }
}
