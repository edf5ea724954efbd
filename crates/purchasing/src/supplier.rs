//! Supplier master data, consumed read-only when a purchase is created.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use larder_core::typed_id;

typed_id!(
    /// Supplier identifier.
    SupplierId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInfo {
    pub id: SupplierId,
    pub name: String,
    pub is_active: bool,
}

pub trait SupplierCatalog: Send + Sync {
    fn supplier(&self, id: SupplierId) -> Option<SupplierInfo>;
}

#[derive(Debug, Default)]
pub struct InMemorySupplierCatalog {
    suppliers: RwLock<HashMap<SupplierId, SupplierInfo>>,
}

impl InMemorySupplierCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, supplier: SupplierInfo) {
        if let Ok(mut map) = self.suppliers.write() {
            map.insert(supplier.id, supplier);
        }
    }
}

impl SupplierCatalog for InMemorySupplierCatalog {
    fn supplier(&self, id: SupplierId) -> Option<SupplierInfo> {
        self.suppliers.read().ok()?.get(&id).cloned()
    }
}
