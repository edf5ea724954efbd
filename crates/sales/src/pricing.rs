//! Order pricing engine.
//!
//! Pure functions: no IO, no mutation. Subtotal formulas per item variant:
//!
//! - `SINGLE`: `(unit_price + options_amount) * quantity`
//! - `COMBO` header: `combo_price + options_amount`
//! - `COMBO_ITEM`: `options_amount` (the base price is counted once, on the header)
//!
//! Option sums are kept at full precision; each subtotal is settled to two decimal
//! places and the order total is the sum of settled subtotals, so
//! `total == Σ subtotal` holds exactly.

use rust_decimal::Decimal;

use larder_core::Money;

use crate::item::{ComboItemLine, ComboLine, OrderItem, OrderItemId, OrderItemKind, SelectedOption, SingleLine};

/// Subtotal contract shared by every item variant.
pub trait Subtotal {
    fn subtotal(&self) -> Money;
}

impl Subtotal for SingleLine {
    fn subtotal(&self) -> Money {
        let unit = self.unit_price.unwrap_or(Money::ZERO);
        (unit + self.options_amount)
            .times(Decimal::from(self.quantity))
            .rounded()
    }
}

impl Subtotal for ComboLine {
    fn subtotal(&self) -> Money {
        (self.combo_price.unwrap_or(Money::ZERO) + self.options_amount).rounded()
    }
}

impl Subtotal for ComboItemLine {
    fn subtotal(&self) -> Money {
        self.options_amount.rounded()
    }
}

impl Subtotal for OrderItem {
    fn subtotal(&self) -> Money {
        item_subtotal(self)
    }
}

/// Sum of chosen option price adjustments (not rounded).
pub fn options_amount(options: &[SelectedOption]) -> Money {
    options.iter().map(|o| o.price_adjustment).sum()
}

pub fn item_subtotal(item: &OrderItem) -> Money {
    match &item.kind {
        OrderItemKind::Single(line) => line.subtotal(),
        OrderItemKind::Combo(line) => line.subtotal(),
        OrderItemKind::ComboItem(line) => line.subtotal(),
    }
}

/// Order total: sum of every item's subtotal.
pub fn order_total(items: &[OrderItem]) -> Money {
    items.iter().map(item_subtotal).sum()
}

/// Contribution of one combo: header subtotal + Σ its sub-items' subtotals.
pub fn combo_contribution(items: &[OrderItem], group_sequence: u32) -> Money {
    items
        .iter()
        .filter(|i| i.group_sequence() == Some(group_sequence))
        .map(item_subtotal)
        .sum()
}

/// Data-integrity findings that do not block pricing but should be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingWarning {
    /// A SINGLE row has no unit price; it was priced as zero.
    MissingUnitPrice { item_id: OrderItemId },
    /// A COMBO header has no combo price; it was priced as zero.
    MissingComboPrice { item_id: OrderItemId },
    /// A COMBO_ITEM row whose group sequence matches no (or more than one) header.
    UnmatchedComboItem {
        item_id: OrderItemId,
        group_sequence: u32,
    },
}

impl core::fmt::Display for PricingWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PricingWarning::MissingUnitPrice { item_id } => {
                write!(f, "item {item_id} has no unit price; priced as 0")
            }
            PricingWarning::MissingComboPrice { item_id } => {
                write!(f, "combo {item_id} has no combo price; priced as 0")
            }
            PricingWarning::UnmatchedComboItem {
                item_id,
                group_sequence,
            } => write!(
                f,
                "combo item {item_id} references group {group_sequence} without exactly one header"
            ),
        }
    }
}

/// Inspect items for missing prices and combo rows that break the header invariant.
pub fn integrity_warnings(items: &[OrderItem]) -> Vec<PricingWarning> {
    let mut warnings = Vec::new();
    for item in items {
        match &item.kind {
            OrderItemKind::Single(line) if line.unit_price.is_none() => {
                warnings.push(PricingWarning::MissingUnitPrice {
                    item_id: item.item_id,
                });
            }
            OrderItemKind::Combo(line) if line.combo_price.is_none() => {
                warnings.push(PricingWarning::MissingComboPrice {
                    item_id: item.item_id,
                });
            }
            OrderItemKind::ComboItem(line) => {
                let headers = items
                    .iter()
                    .filter(|i| i.is_combo_header() && i.group_sequence() == Some(line.group_sequence))
                    .count();
                if headers != 1 {
                    warnings.push(PricingWarning::UnmatchedComboItem {
                        item_id: item.item_id,
                        group_sequence: line.group_sequence,
                    });
                }
            }
            _ => {}
        }
    }
    warnings
}
