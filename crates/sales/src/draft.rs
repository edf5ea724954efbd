//! Turning client picks into priced `NewOrderItem`s using the catalog.

use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult};

use crate::catalog::{OptionCatalog, OptionOwner, ProductCatalog};
use crate::item::{ComboId, ProductId};
use crate::options::{OptionChoice, resolve_options};
use crate::order::{NewComboComponent, NewOrderItem};

/// Option picks for one product slot of a combo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentChoice {
    pub product_id: ProductId,
    pub options: Vec<OptionChoice>,
}

/// Snapshot product name and price, and price the chosen options.
pub fn single_item(
    products: &dyn ProductCatalog,
    options: &dyn OptionCatalog,
    product_id: ProductId,
    quantity: Option<i64>,
    choices: &[OptionChoice],
) -> DomainResult<NewOrderItem> {
    let product = products
        .product(product_id)
        .ok_or_else(|| DomainError::not_found("product", product_id))?;
    if !product.is_active {
        return Err(DomainError::validation("product_id", format!("product {} is not on sale", product.name)));
    }

    let selected = resolve_options(options, OptionOwner::Product(product_id), choices)?;

    Ok(NewOrderItem::Single {
        product_id,
        product_name: product.name,
        unit_price: product.price,
        quantity,
        options: selected,
    })
}

/// Expand a combo into its header plus one component per catalog slot.
///
/// Slot quantities come from the combo definition. Picks for a product that is not
/// one of the combo's slots are rejected.
pub fn combo_item(
    products: &dyn ProductCatalog,
    options: &dyn OptionCatalog,
    combo_id: ComboId,
    header_choices: &[OptionChoice],
    component_choices: &[ComponentChoice],
) -> DomainResult<NewOrderItem> {
    let combo = products
        .combo(combo_id)
        .ok_or_else(|| DomainError::not_found("combo", combo_id))?;
    if !combo.is_active {
        return Err(DomainError::validation("combo_id", format!("combo {} is not on sale", combo.name)));
    }
    if combo.items.is_empty() {
        return Err(DomainError::validation("combo_id", format!("combo {} has no items", combo.name)));
    }

    if let Some(stray) = component_choices
        .iter()
        .find(|c| !combo.items.iter().any(|slot| slot.product_id == c.product_id))
    {
        return Err(DomainError::validation(
            "components",
            format!("product {} is not part of combo {}", stray.product_id, combo.name),
        ));
    }

    let header_options = resolve_options(options, OptionOwner::Combo(combo_id), header_choices)?;

    let mut components = Vec::with_capacity(combo.items.len());
    for slot in &combo.items {
        let picks = component_choices
            .iter()
            .find(|c| c.product_id == slot.product_id)
            .map(|c| c.options.as_slice())
            .unwrap_or(&[]);
        components.push(NewComboComponent {
            product_id: slot.product_id,
            product_name: slot.product_name.clone(),
            quantity: Some(i64::from(slot.quantity)),
            options: resolve_options(options, OptionOwner::Product(slot.product_id), picks)?,
        });
    }

    Ok(NewOrderItem::Combo {
        combo_id,
        combo_name: combo.name,
        combo_price: combo.price,
        options: header_options,
        components,
    })
}
