//! Polymorphic order line items.
//!
//! One physical row per item; the `item_type` tag decides how the columns are read
//! and which subtotal formula applies (see `pricing`).

use serde::{Deserialize, Serialize};

use larder_core::{Money, ValueObject, typed_id};

typed_id!(
    /// Catalog product identifier.
    ProductId
);

typed_id!(
    /// Catalog combo identifier.
    ComboId
);

/// Position of an item inside its order. Assigned sequentially, never reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderItemId(pub u32);

impl core::fmt::Display for OrderItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One chosen option value and the price adjustment it carried when chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    pub group: String,
    pub value: String,
    pub price_adjustment: Money,
}

impl ValueObject for SelectedOption {}

/// Stand-alone product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleLine {
    pub product_id: ProductId,
    pub product_name: String,
    /// `None` only for rows with missing catalog data; priced as zero.
    pub unit_price: Option<Money>,
    pub quantity: u32,
    pub options: Vec<SelectedOption>,
    pub options_amount: Money,
}

/// Combo header; carries the combo's single base price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboLine {
    pub combo_id: ComboId,
    pub combo_name: String,
    pub combo_price: Option<Money>,
    /// Ties the combo's sub-items to this header.
    pub group_sequence: u32,
    pub options: Vec<SelectedOption>,
    pub options_amount: Money,
}

/// Product inside a combo. Its base price is covered by the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboItemLine {
    pub combo_id: ComboId,
    pub group_sequence: u32,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub options: Vec<SelectedOption>,
    pub options_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemKind {
    Single(SingleLine),
    Combo(ComboLine),
    ComboItem(ComboItemLine),
}

impl OrderItemKind {
    /// Stable type tag, as stored in the `item_type` column.
    pub fn tag(&self) -> &'static str {
        match self {
            OrderItemKind::Single(_) => "SINGLE",
            OrderItemKind::Combo(_) => "COMBO",
            OrderItemKind::ComboItem(_) => "COMBO_ITEM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: OrderItemId,
    pub kind: OrderItemKind,
}

impl OrderItem {
    pub fn options(&self) -> &[SelectedOption] {
        match &self.kind {
            OrderItemKind::Single(l) => &l.options,
            OrderItemKind::Combo(l) => &l.options,
            OrderItemKind::ComboItem(l) => &l.options,
        }
    }

    /// Group sequence for combo headers and combo sub-items.
    pub fn group_sequence(&self) -> Option<u32> {
        match &self.kind {
            OrderItemKind::Single(_) => None,
            OrderItemKind::Combo(l) => Some(l.group_sequence),
            OrderItemKind::ComboItem(l) => Some(l.group_sequence),
        }
    }

    pub fn is_combo_header(&self) -> bool {
        matches!(self.kind, OrderItemKind::Combo(_))
    }

    pub fn is_combo_component(&self) -> bool {
        matches!(self.kind, OrderItemKind::ComboItem(_))
    }
}
