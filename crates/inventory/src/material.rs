//! Raw material master row and the stock-change rules applied to it.
//!
//! `Material` is state-stored, not event-sourced: it is the one row that both master
//! data edits and stock reconciliation write to, so the store serialises access per row.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, Entity, Money, typed_id};

typed_id!(
    /// Raw material identifier.
    MaterialId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub category: Option<String>,
    /// `None` until the first receipt or count.
    pub current_stock_quantity: Option<Decimal>,
    pub cost_price: Money,
    pub is_active: bool,
}

impl Entity for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Material {
    pub fn new(id: MaterialId, code: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            unit: unit.into(),
            category: None,
            current_stock_quantity: None,
            cost_price: Money::ZERO,
            is_active: true,
        }
    }

    pub fn with_stock(mut self, quantity: Decimal, cost_price: Money) -> Self {
        self.current_stock_quantity = Some(quantity);
        self.cost_price = cost_price;
        self
    }

    pub fn stock(&self) -> Decimal {
        self.current_stock_quantity.unwrap_or(Decimal::ZERO)
    }

    /// Apply a stock change and report the movement. Rejected changes leave the row untouched.
    pub fn apply_stock_change(&mut self, change: &StockChange) -> DomainResult<StockMovement> {
        change.validate()?;
        let before = self.current_stock_quantity;
        match change {
            StockChange::Receive { quantity, unit_cost } => {
                self.current_stock_quantity = Some(self.stock() + quantity);
                // Latest purchase price wins.
                self.cost_price = *unit_cost;
            }
            StockChange::Count { actual_quantity } => {
                self.current_stock_quantity = Some(*actual_quantity);
            }
        }
        Ok(StockMovement {
            material_id: self.id,
            before,
            after: self.stock(),
            cost_price: self.cost_price,
        })
    }

    /// Descriptive edits. Stock and cost are never touched here.
    pub fn update_details(&mut self, details: &MaterialDetails) -> DomainResult<()> {
        details.validate()?;
        self.code = details.code.clone();
        self.name = details.name.clone();
        self.unit = details.unit.clone();
        self.category = details.category.clone();
        self.is_active = details.is_active;
        Ok(())
    }
}

/// Stock mutation requested by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockChange {
    /// Confirmed purchase: add to stock, take the purchase price as cost.
    Receive { quantity: Decimal, unit_cost: Money },
    /// Confirmed count: the counted quantity replaces the stored one.
    Count { actual_quantity: Decimal },
}

impl StockChange {
    fn validate(&self) -> DomainResult<()> {
        match self {
            StockChange::Receive { quantity, unit_cost } => {
                if *quantity <= Decimal::ZERO {
                    return Err(DomainError::validation("quantity", "received quantity must be positive"));
                }
                if unit_cost.is_negative() {
                    return Err(DomainError::validation("unit_cost", "cannot be negative"));
                }
            }
            StockChange::Count { actual_quantity } => {
                if actual_quantity.is_sign_negative() && !actual_quantity.is_zero() {
                    return Err(DomainError::validation("actual_quantity", "cannot be negative"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub material_id: MaterialId,
    pub before: Option<Decimal>,
    pub after: Decimal,
    pub cost_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialDetails {
    pub code: String,
    pub name: String,
    pub unit: String,
    pub category: Option<String>,
    pub is_active: bool,
}

impl MaterialDetails {
    fn validate(&self) -> DomainResult<()> {
        if self.code.trim().is_empty() {
            return Err(DomainError::validation("code", "cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name", "cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flour() -> Material {
        Material::new(MaterialId::generate(), "M-001", "Flour", "kg")
    }

    #[test]
    fn receive_adds_to_missing_stock_and_takes_latest_price() {
        let mut m = flour();
        m.apply_stock_change(&StockChange::Receive {
            quantity: Decimal::from(10),
            unit_cost: Money::from_cents(10000),
        })
        .unwrap();
        let movement = m
            .apply_stock_change(&StockChange::Receive {
                quantity: Decimal::from(5),
                unit_cost: Money::from_cents(9000),
            })
            .unwrap();

        assert_eq!(movement.before, Some(Decimal::from(10)));
        assert_eq!(m.stock(), Decimal::from(15));
        assert_eq!(m.cost_price, Money::from_cents(9000));
    }

    #[test]
    fn count_overwrites_stock() {
        let mut m = flour().with_stock(Decimal::new(5000, 2), Money::from_cents(300));
        m.apply_stock_change(&StockChange::Count {
            actual_quantity: Decimal::new(4800, 2),
        })
        .unwrap();
        assert_eq!(m.stock(), Decimal::new(4800, 2));
        assert_eq!(m.cost_price, Money::from_cents(300));
    }

    #[test]
    fn invalid_changes_leave_row_untouched() {
        let mut m = flour().with_stock(Decimal::from(3), Money::from_cents(100));
        let before = m.clone();

        assert!(m
            .apply_stock_change(&StockChange::Receive {
                quantity: Decimal::ZERO,
                unit_cost: Money::from_cents(100),
            })
            .is_err());
        assert!(m
            .apply_stock_change(&StockChange::Count {
                actual_quantity: Decimal::from(-1),
            })
            .is_err());
        assert_eq!(m, before);
    }

    #[test]
    fn detail_edits_do_not_touch_stock() {
        let mut m = flour().with_stock(Decimal::from(7), Money::from_cents(250));
        m.update_details(&MaterialDetails {
            code: "M-001".into(),
            name: "Bread flour".into(),
            unit: "kg".into(),
            category: Some("dry".into()),
            is_active: false,
        })
        .unwrap();

        assert_eq!(m.name, "Bread flour");
        assert!(!m.is_active);
        assert_eq!(m.stock(), Decimal::from(7));
        assert_eq!(m.cost_price, Money::from_cents(250));
    }

    proptest::proptest! {
        #[test]
        fn receipts_accumulate_exactly(quantities in proptest::collection::vec(1i64..10_000, 1..20)) {
            let mut m = flour();
            for q in &quantities {
                m.apply_stock_change(&StockChange::Receive {
                    quantity: Decimal::new(*q, 2),
                    unit_cost: Money::from_cents(100),
                })
                .unwrap();
            }
            let expected: i64 = quantities.iter().sum();
            proptest::prop_assert_eq!(m.stock(), Decimal::new(expected, 2));
        }
    }
}
