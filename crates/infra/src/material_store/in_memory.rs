use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use larder_inventory::{Material, MaterialDetails, MaterialId, StockChange, StockMovement};

use super::{MaterialStore, MaterialStoreError};

type Row = Arc<Mutex<Material>>;

/// In-memory material table with one lock per row.
///
/// The index lock is only held long enough to find a row; the row's own mutex
/// covers the read-modify-write, so changes to different materials run in parallel
/// and changes to the same material queue up.
#[derive(Debug, Default)]
pub struct InMemoryMaterialStore {
    rows: RwLock<HashMap<MaterialId, Row>>,
}

impl InMemoryMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, id: MaterialId) -> Result<Row, MaterialStoreError> {
        let rows = self.rows.read().map_err(|_| MaterialStoreError::Poisoned)?;
        rows.get(&id).cloned().ok_or(MaterialStoreError::NotFound(id))
    }

    fn snapshot(row: &Row) -> Result<Material, MaterialStoreError> {
        row.lock().map(|m| m.clone()).map_err(|_| MaterialStoreError::Poisoned)
    }
}

impl MaterialStore for InMemoryMaterialStore {
    fn get(&self, id: MaterialId) -> Result<Option<Material>, MaterialStoreError> {
        match self.row(id) {
            Ok(row) => Self::snapshot(&row).map(Some),
            Err(MaterialStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list_active(&self) -> Result<Vec<Material>, MaterialStoreError> {
        let rows: Vec<Row> = {
            let map = self.rows.read().map_err(|_| MaterialStoreError::Poisoned)?;
            map.values().cloned().collect()
        };
        let mut active = Vec::with_capacity(rows.len());
        for row in &rows {
            let m = Self::snapshot(row)?;
            if m.is_active {
                active.push(m);
            }
        }
        active.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(active)
    }

    fn insert(&self, material: Material) -> Result<(), MaterialStoreError> {
        let mut rows = self.rows.write().map_err(|_| MaterialStoreError::Poisoned)?;
        if rows.contains_key(&material.id) {
            return Err(MaterialStoreError::Duplicate(material.id));
        }
        for row in rows.values() {
            let existing = row.lock().map_err(|_| MaterialStoreError::Poisoned)?;
            if existing.code == material.code {
                return Err(MaterialStoreError::DuplicateCode(material.code));
            }
        }
        rows.insert(material.id, Arc::new(Mutex::new(material)));
        Ok(())
    }

    /// Holds the index write lock so two renames cannot claim the same code.
    fn update_details(&self, id: MaterialId, details: &MaterialDetails) -> Result<Material, MaterialStoreError> {
        let rows = self.rows.write().map_err(|_| MaterialStoreError::Poisoned)?;
        let row = rows.get(&id).cloned().ok_or(MaterialStoreError::NotFound(id))?;
        for (other_id, other) in rows.iter() {
            if *other_id == id {
                continue;
            }
            let existing = other.lock().map_err(|_| MaterialStoreError::Poisoned)?;
            if existing.code == details.code {
                return Err(MaterialStoreError::DuplicateCode(details.code.clone()));
            }
        }
        let mut material = row.lock().map_err(|_| MaterialStoreError::Poisoned)?;
        material.update_details(details)?;
        Ok(material.clone())
    }

    fn apply_stock_change(&self, id: MaterialId, change: &StockChange) -> Result<StockMovement, MaterialStoreError> {
        let row = self.row(id)?;
        let mut material = row.lock().map_err(|_| MaterialStoreError::Poisoned)?;
        Ok(material.apply_stock_change(change)?)
    }

    fn remove(&self, id: MaterialId) -> Result<Option<Material>, MaterialStoreError> {
        let removed = {
            let mut rows = self.rows.write().map_err(|_| MaterialStoreError::Poisoned)?;
            rows.remove(&id)
        };
        match removed {
            Some(row) => Self::snapshot(&row).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use larder_core::Money;
    use rust_decimal::Decimal;

    fn material(code: &str) -> Material {
        Material::new(MaterialId::generate(), code, format!("Material {code}"), "kg")
    }

    #[test]
    fn concurrent_receipts_on_one_material_are_not_lost() {
        let store = Arc::new(InMemoryMaterialStore::new());
        let m = material("M-1");
        let id = m.id;
        store.insert(m).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..250 {
                        store
                            .apply_stock_change(
                                id,
                                &StockChange::Receive {
                                    quantity: Decimal::ONE,
                                    unit_cost: Money::from_cents(100),
                                },
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.get(id).unwrap().unwrap().stock(), Decimal::from(2000));
    }

    #[test]
    fn rejected_change_leaves_row_and_reports_domain_error() {
        let store = InMemoryMaterialStore::new();
        let m = material("M-1").with_stock(Decimal::from(4), Money::from_cents(100));
        let id = m.id;
        store.insert(m).unwrap();

        let err = store
            .apply_stock_change(id, &StockChange::Count { actual_quantity: Decimal::from(-3) })
            .unwrap_err();
        assert!(matches!(err, MaterialStoreError::Rejected(_)));
        assert_eq!(store.get(id).unwrap().unwrap().stock(), Decimal::from(4));
    }

    #[test]
    fn unknown_and_removed_materials() {
        let store = InMemoryMaterialStore::new();
        let m = material("M-1");
        let id = m.id;
        store.insert(m).unwrap();

        assert!(store.remove(id).unwrap().is_some());
        assert!(store.get(id).unwrap().is_none());
        let err = store
            .apply_stock_change(id, &StockChange::Count { actual_quantity: Decimal::ONE })
            .unwrap_err();
        assert!(matches!(err, MaterialStoreError::NotFound(_)));
    }

    #[test]
    fn list_active_is_sorted_and_skips_inactive() {
        let store = InMemoryMaterialStore::new();
        let mut retired = material("A-0");
        retired.is_active = false;
        store.insert(material("C-2")).unwrap();
        store.insert(material("B-1")).unwrap();
        store.insert(retired).unwrap();

        let codes: Vec<String> = store.list_active().unwrap().into_iter().map(|m| m.code).collect();
        assert_eq!(codes, vec!["B-1", "C-2"]);
    }

    #[test]
    fn duplicate_code_is_rejected() {
        let store = InMemoryMaterialStore::new();
        store.insert(material("M-1")).unwrap();
        assert!(matches!(store.insert(material("M-1")), Err(MaterialStoreError::DuplicateCode(_))));
    }

    #[test]
    fn renaming_to_a_taken_code_is_rejected() {
        let store = InMemoryMaterialStore::new();
        let flour = material("M-1");
        let sugar = material("M-2");
        let sugar_id = sugar.id;
        store.insert(flour).unwrap();
        store.insert(sugar).unwrap();

        let details = |code: &str| MaterialDetails {
            code: code.to_string(),
            name: "Sugar".to_string(),
            unit: "kg".to_string(),
            category: None,
            is_active: true,
        };

        let err = store.update_details(sugar_id, &details("M-1")).unwrap_err();
        assert!(matches!(err, MaterialStoreError::DuplicateCode(ref code) if code == "M-1"));
        assert_eq!(store.get(sugar_id).unwrap().unwrap().code, "M-2");

        let renamed = store.update_details(sugar_id, &details("M-2")).unwrap();
        assert_eq!(renamed.name, "Sugar");
        let renamed = store.update_details(sugar_id, &details("M-3")).unwrap();
        assert_eq!(renamed.code, "M-3");
    }
}
