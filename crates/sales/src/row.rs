//! Flat, table-shaped form of an order item.
//!
//! Every variant is stored in the same row layout with nullable columns; `item_type`
//! decides which columns are meaningful. Reading a row back validates the tag and the
//! columns that variant requires.

use serde::{Deserialize, Serialize};

use larder_core::{AggregateId, DomainError, DomainResult, Money};

use crate::item::{
    ComboId, ComboItemLine, ComboLine, OrderItem, OrderItemId, OrderItemKind, ProductId, SingleLine,
};
use crate::options::{decode_options, encode_options};
use crate::pricing;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRow {
    pub item_id: u32,
    pub item_type: String,
    pub product_id: Option<AggregateId>,
    pub product_name: Option<String>,
    pub combo_id: Option<AggregateId>,
    pub combo_name: Option<String>,
    pub group_sequence: Option<u32>,
    pub unit_price: Option<Money>,
    pub combo_price: Option<Money>,
    pub quantity: u32,
    /// JSON text, NULL when no options were chosen.
    pub options: Option<String>,
    pub options_amount: Money,
    pub subtotal: Money,
}

/// A row read back into the domain shape, plus any warning raised while decoding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRow {
    pub item: OrderItem,
    pub warning: Option<String>,
}

impl OrderItemRow {
    pub fn from_item(item: &OrderItem) -> Self {
        let mut row = OrderItemRow {
            item_id: item.item_id.0,
            item_type: item.kind.tag().to_string(),
            product_id: None,
            product_name: None,
            combo_id: None,
            combo_name: None,
            group_sequence: None,
            unit_price: None,
            combo_price: None,
            quantity: 1,
            options: encode_options(item.options()),
            options_amount: Money::ZERO,
            subtotal: pricing::item_subtotal(item),
        };

        match &item.kind {
            OrderItemKind::Single(line) => {
                row.product_id = Some(line.product_id.aggregate_id());
                row.product_name = Some(line.product_name.clone());
                row.unit_price = line.unit_price;
                row.quantity = line.quantity;
                row.options_amount = line.options_amount;
            }
            OrderItemKind::Combo(line) => {
                row.combo_id = Some(line.combo_id.aggregate_id());
                row.combo_name = Some(line.combo_name.clone());
                row.combo_price = line.combo_price;
                row.group_sequence = Some(line.group_sequence);
                row.options_amount = line.options_amount;
            }
            OrderItemKind::ComboItem(line) => {
                row.combo_id = Some(line.combo_id.aggregate_id());
                row.product_id = Some(line.product_id.aggregate_id());
                row.product_name = Some(line.product_name.clone());
                row.group_sequence = Some(line.group_sequence);
                row.quantity = line.quantity;
                row.options_amount = line.options_amount;
            }
        }
        row
    }

    /// Rebuild the domain item. Unknown tags and missing required columns are
    /// `InvariantViolation`s; a malformed options column only yields a warning.
    pub fn into_item(self) -> DomainResult<DecodedRow> {
        let decoded = decode_options(self.options.as_deref());
        let item_id = OrderItemId(self.item_id);

        let kind = match self.item_type.as_str() {
            "SINGLE" => OrderItemKind::Single(SingleLine {
                product_id: ProductId(required(self.product_id, item_id, "product_id")?),
                product_name: self.product_name.unwrap_or_default(),
                unit_price: self.unit_price,
                quantity: self.quantity,
                options: decoded.options,
                options_amount: self.options_amount,
            }),
            "COMBO" => OrderItemKind::Combo(ComboLine {
                combo_id: ComboId(required(self.combo_id, item_id, "combo_id")?),
                combo_name: self.combo_name.unwrap_or_default(),
                combo_price: self.combo_price,
                group_sequence: required(self.group_sequence, item_id, "group_sequence")?,
                options: decoded.options,
                options_amount: self.options_amount,
            }),
            "COMBO_ITEM" => OrderItemKind::ComboItem(ComboItemLine {
                combo_id: ComboId(required(self.combo_id, item_id, "combo_id")?),
                group_sequence: required(self.group_sequence, item_id, "group_sequence")?,
                product_id: ProductId(required(self.product_id, item_id, "product_id")?),
                product_name: self.product_name.unwrap_or_default(),
                quantity: self.quantity,
                options: decoded.options,
                options_amount: self.options_amount,
            }),
            other => {
                return Err(DomainError::invariant(format!(
                    "order item {item_id} has unknown item_type `{other}`"
                )));
            }
        };

        Ok(DecodedRow {
            item: OrderItem { item_id, kind },
            warning: decoded.warning,
        })
    }
}

fn required<T>(value: Option<T>, item_id: OrderItemId, column: &str) -> DomainResult<T> {
    value.ok_or_else(|| DomainError::invariant(format!("order item {item_id} is missing `{column}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SelectedOption;

    fn combo_item_row() -> OrderItem {
        let options = vec![SelectedOption {
            group: "spice".into(),
            value: "hot".into(),
            price_adjustment: Money::from_cents(500),
        }];
        OrderItem {
            item_id: OrderItemId(3),
            kind: OrderItemKind::ComboItem(ComboItemLine {
                combo_id: ComboId::generate(),
                group_sequence: 1,
                product_id: ProductId::generate(),
                product_name: "Soup".into(),
                quantity: 1,
                options_amount: pricing::options_amount(&options),
                options,
            }),
        }
    }

    #[test]
    fn row_keeps_variant_columns_and_subtotal() {
        let item = combo_item_row();
        let row = OrderItemRow::from_item(&item);

        assert_eq!(row.item_type, "COMBO_ITEM");
        assert!(row.unit_price.is_none());
        assert!(row.combo_price.is_none());
        assert_eq!(row.subtotal, Money::from_cents(500));

        let decoded = row.into_item().unwrap();
        assert_eq!(decoded.item, item);
        assert!(decoded.warning.is_none());
    }

    #[test]
    fn unknown_tag_is_an_invariant_violation() {
        let mut row = OrderItemRow::from_item(&combo_item_row());
        row.item_type = "BUNDLE".into();
        assert!(matches!(row.into_item(), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn malformed_options_column_degrades_to_empty() {
        let mut row = OrderItemRow::from_item(&combo_item_row());
        row.options = Some("[{\"group\":".into());

        let decoded = row.into_item().unwrap();
        assert!(decoded.item.options().is_empty());
        assert!(decoded.warning.is_some());
    }

    #[test]
    fn combo_header_without_group_is_rejected() {
        let mut row = OrderItemRow::from_item(&combo_item_row());
        row.item_type = "COMBO".into();
        row.group_sequence = None;
        assert!(matches!(row.into_item(), Err(DomainError::InvariantViolation(_))));
    }
}
