//! Read-only catalog collaborators consumed when adding items to an order.
//!
//! Product/combo and option-template master data are maintained elsewhere; the order
//! side only looks them up by id. `InMemoryCatalog` backs tests and local wiring.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use larder_core::Money;

use crate::item::{ComboId, ProductId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub name: String,
    pub price: Option<Money>,
    pub is_active: bool,
}

/// One product slot of a combo, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboSlot {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboInfo {
    pub id: ComboId,
    pub name: String,
    pub price: Option<Money>,
    pub is_active: bool,
    pub items: Vec<ComboSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValueDef {
    pub name: String,
    pub price_adjustment: Money,
}

/// Option template group attached to a product or combo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGroupDef {
    pub name: String,
    pub min_selections: u32,
    pub max_selections: u32,
    pub values: Vec<OptionValueDef>,
}

/// What an option template group is attached to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OptionOwner {
    Product(ProductId),
    Combo(ComboId),
}

pub trait ProductCatalog: Send + Sync {
    fn product(&self, id: ProductId) -> Option<ProductInfo>;

    fn combo(&self, id: ComboId) -> Option<ComboInfo>;
}

pub trait OptionCatalog: Send + Sync {
    /// Option groups offered for `owner` (empty when it has none).
    fn option_groups(&self, owner: OptionOwner) -> Vec<OptionGroupDef>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, ProductInfo>>,
    combos: RwLock<HashMap<ComboId, ComboInfo>>,
    options: RwLock<HashMap<OptionOwner, Vec<OptionGroupDef>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_product(&self, product: ProductInfo) {
        if let Ok(mut map) = self.products.write() {
            map.insert(product.id, product);
        }
    }

    pub fn put_combo(&self, combo: ComboInfo) {
        if let Ok(mut map) = self.combos.write() {
            map.insert(combo.id, combo);
        }
    }

    pub fn put_option_groups(&self, owner: OptionOwner, groups: Vec<OptionGroupDef>) {
        if let Ok(mut map) = self.options.write() {
            map.insert(owner, groups);
        }
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn product(&self, id: ProductId) -> Option<ProductInfo> {
        self.products.read().ok()?.get(&id).cloned()
    }

    fn combo(&self, id: ComboId) -> Option<ComboInfo> {
        self.combos.read().ok()?.get(&id).cloned()
    }
}

impl OptionCatalog for InMemoryCatalog {
    fn option_groups(&self, owner: OptionOwner) -> Vec<OptionGroupDef> {
        self.options
            .read()
            .ok()
            .and_then(|map| map.get(&owner).cloned())
            .unwrap_or_default()
    }
}
