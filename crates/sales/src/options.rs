//! Chosen-option validation and the stored-options boundary.
//!
//! Options are persisted as a JSON text column on the item row. `encode_options` /
//! `decode_options` are the only place that format is read or written; a malformed
//! column decodes to an empty list plus a warning instead of failing the read.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult};

use crate::catalog::{OptionCatalog, OptionGroupDef, OptionOwner};
use crate::item::SelectedOption;

/// A client's pick: group name + value name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub group: String,
    pub value: String,
}

impl OptionChoice {
    pub fn new(group: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            value: value.into(),
        }
    }
}

/// Validate choices against the owner's option templates and price them.
///
/// - every group template must have `min_selections <= max_selections` (Validation)
/// - unknown group or value: NotFound
/// - the same value twice in one group: Conflict
/// - per group, the number of choices must lie within the template bounds (Validation)
///
/// The returned list keeps the client's order.
pub fn resolve_options(
    catalog: &dyn OptionCatalog,
    owner: OptionOwner,
    choices: &[OptionChoice],
) -> DomainResult<Vec<SelectedOption>> {
    let groups = catalog.option_groups(owner);
    for group in &groups {
        check_group_bounds(group)?;
    }

    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(choices.len());
    for choice in choices {
        let group = groups
            .iter()
            .find(|g| g.name == choice.group)
            .ok_or_else(|| DomainError::not_found("option group", &choice.group))?;
        let value = group
            .values
            .iter()
            .find(|v| v.name == choice.value)
            .ok_or_else(|| {
                DomainError::not_found("option value", format!("{}/{}", choice.group, choice.value))
            })?;

        if !seen.insert((choice.group.as_str(), choice.value.as_str())) {
            return Err(DomainError::conflict(format!(
                "option `{}` chosen twice in group `{}`",
                choice.value, choice.group
            )));
        }

        selected.push(SelectedOption {
            group: group.name.clone(),
            value: value.name.clone(),
            price_adjustment: value.price_adjustment,
        });
    }

    for group in &groups {
        let count = selected.iter().filter(|s| s.group == group.name).count() as u32;
        if count < group.min_selections || count > group.max_selections {
            return Err(DomainError::validation(
                format!("options.{}", group.name),
                format!(
                    "expected between {} and {} selections, got {count}",
                    group.min_selections, group.max_selections
                ),
            ));
        }
    }

    Ok(selected)
}

fn check_group_bounds(group: &OptionGroupDef) -> DomainResult<()> {
    if group.min_selections > group.max_selections {
        return Err(DomainError::validation(
            format!("options.{}", group.name),
            format!(
                "min_selections ({}) exceeds max_selections ({})",
                group.min_selections, group.max_selections
            ),
        ));
    }
    Ok(())
}

/// Serialize options for the item row's options column. Empty lists are stored as NULL.
pub fn encode_options(options: &[SelectedOption]) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    // Plain structs of strings and decimals always serialize.
    serde_json::to_string(options).ok()
}

/// Result of reading an options column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedOptions {
    pub options: Vec<SelectedOption>,
    /// Set when the stored text was malformed and had to be dropped.
    pub warning: Option<String>,
}

pub fn decode_options(stored: Option<&str>) -> DecodedOptions {
    let Some(text) = stored.map(str::trim).filter(|t| !t.is_empty()) else {
        return DecodedOptions::default();
    };
    match serde_json::from_str::<Vec<SelectedOption>>(text) {
        Ok(options) => DecodedOptions {
            options,
            warning: None,
        },
        Err(err) => DecodedOptions {
            options: Vec::new(),
            warning: Some(format!("malformed stored options ignored: {err}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, OptionValueDef};
    use crate::item::ProductId;
    use larder_core::Money;

    fn catalog_with(product: ProductId, groups: Vec<OptionGroupDef>) -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.put_option_groups(OptionOwner::Product(product), groups);
        catalog
    }

    fn group(name: &str, min: u32, max: u32, values: &[(&str, i64)]) -> OptionGroupDef {
        OptionGroupDef {
            name: name.to_string(),
            min_selections: min,
            max_selections: max,
            values: values
                .iter()
                .map(|(n, c)| OptionValueDef {
                    name: n.to_string(),
                    price_adjustment: Money::from_cents(*c),
                })
                .collect(),
        }
    }

    #[test]
    fn resolves_prices_from_templates() {
        let product = ProductId::generate();
        let catalog = catalog_with(
            product,
            vec![group("size", 1, 1, &[("regular", 0), ("large", 1000)]), group("extra", 0, 2, &[("shot", 500)])],
        );

        let selected = resolve_options(
            &catalog,
            OptionOwner::Product(product),
            &[OptionChoice::new("size", "large"), OptionChoice::new("extra", "shot")],
        )
        .unwrap();

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].price_adjustment, Money::from_cents(1000));
        assert_eq!(selected[1].price_adjustment, Money::from_cents(500));
    }

    #[test]
    fn required_group_must_be_chosen() {
        let product = ProductId::generate();
        let catalog = catalog_with(product, vec![group("size", 1, 1, &[("regular", 0)])]);

        let err = resolve_options(&catalog, OptionOwner::Product(product), &[]).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "options.size"));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let product = ProductId::generate();
        let catalog = catalog_with(product, vec![group("size", 2, 1, &[("regular", 0)])]);

        let err = resolve_options(&catalog, OptionOwner::Product(product), &[]).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn unknown_value_is_not_found_and_duplicates_conflict() {
        let product = ProductId::generate();
        let catalog = catalog_with(product, vec![group("extra", 0, 3, &[("shot", 500)])]);
        let owner = OptionOwner::Product(product);

        let err = resolve_options(&catalog, owner, &[OptionChoice::new("extra", "cream")]).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "option value", .. }));

        let err = resolve_options(
            &catalog,
            owner,
            &[OptionChoice::new("extra", "shot"), OptionChoice::new("extra", "shot")],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn options_column_survives_encode_decode() {
        let options = vec![SelectedOption {
            group: "size".into(),
            value: "large".into(),
            price_adjustment: Money::from_cents(1000),
        }];
        let stored = encode_options(&options);
        let decoded = decode_options(stored.as_deref());
        assert_eq!(decoded.options, options);
        assert!(decoded.warning.is_none());
        assert_eq!(encode_options(&[]), None);
    }

    #[test]
    fn malformed_column_reads_as_empty_with_warning() {
        let decoded = decode_options(Some("{not json"));
        assert!(decoded.options.is_empty());
        assert!(decoded.warning.is_some());

        assert_eq!(decode_options(Some("   ")), DecodedOptions::default());
    }
}
