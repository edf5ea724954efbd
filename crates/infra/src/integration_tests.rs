//! End-to-end pipeline tests.
//!
//! Service → CommandDispatcher → EventStore → EventBus → workers → material stock,
//! invoice requests and the order sheet.
//!
//! `LarderApp::shutdown` drains every worker's queue before joining, so assertions
//! made after it see every event published before it.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use larder_core::{DomainError, Money};
    use larder_inventory::{InventoryCheckStatus, Material, MaterialId};
    use larder_purchasing::{InMemorySupplierCatalog, PurchaseStatus, SupplierId, SupplierInfo};
    use larder_sales::{
        ComboId, ComboInfo, ComboSlot, ComponentChoice, InMemoryCatalog, OptionChoice, OptionGroupDef,
        OptionOwner, OptionValueDef, OrderStatus, OrderType, PaymentMethod, ProductId, ProductInfo,
    };

    use crate::app::{Collaborators, LarderApp};
    use crate::command_dispatcher::DispatchError;
    use crate::config::AppConfig;
    use crate::invoicing::RecordingInvoiceIssuer;
    use crate::material_store::MaterialStore;
    use crate::services::{PurchaseDraft, PurchaseLineInput};

    struct Fixture {
        app: LarderApp,
        supplier: SupplierId,
        invoices: Arc<RecordingInvoiceIssuer>,
        catalog: Arc<InMemoryCatalog>,
    }

    fn start() -> Fixture {
        larder_observability::init_for_tests();

        let catalog = Arc::new(InMemoryCatalog::new());
        let suppliers = Arc::new(InMemorySupplierCatalog::new());
        let invoices = Arc::new(RecordingInvoiceIssuer::new());

        let supplier = SupplierId::generate();
        suppliers.put(SupplierInfo {
            id: supplier,
            name: "Mill & Co".into(),
            is_active: true,
        });

        let config = AppConfig {
            worker_poll: std::time::Duration::from_millis(10),
            ..AppConfig::default()
        };
        let app = LarderApp::start(
            &config,
            Collaborators {
                products: catalog.clone(),
                options: catalog.clone(),
                suppliers,
                invoices: invoices.clone(),
            },
        )
        .unwrap();

        Fixture {
            app,
            supplier,
            invoices,
            catalog,
        }
    }

    fn material(app: &LarderApp, code: &str, stock: Option<Decimal>, cost_cents: i64) -> MaterialId {
        let mut m = Material::new(MaterialId::generate(), code, format!("Material {code}"), "kg");
        m.current_stock_quantity = stock;
        m.cost_price = Money::from_cents(cost_cents);
        let id = m.id;
        app.materials.insert(m).unwrap();
        id
    }

    fn line(material_id: MaterialId, qty: i64, price_cents: i64) -> PurchaseLineInput {
        PurchaseLineInput {
            material_id,
            quantity: Decimal::from(qty),
            unit_price: Money::from_cents(price_cents),
        }
    }

    fn draft(supplier: SupplierId, lines: Vec<PurchaseLineInput>) -> PurchaseDraft {
        PurchaseDraft {
            supplier_id: supplier,
            purchase_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            note: None,
            lines,
        }
    }

    fn stock(app: &LarderApp, id: MaterialId) -> Decimal {
        app.materials.get(id).unwrap().unwrap().stock()
    }

    fn domain(err: DispatchError) -> DomainError {
        match err {
            DispatchError::Domain(e) => e,
            other => panic!("expected a domain error, got {other:?}"),
        }
    }

    #[test]
    fn confirmed_purchase_reaches_material_stock() {
        let mut fx = start();
        let a = material(&fx.app, "FLOUR", None, 0);
        let b = material(&fx.app, "SUGAR", Some(Decimal::from(2)), 4000);

        let purchase = fx
            .app
            .purchases
            .create(draft(fx.supplier, vec![line(a, 10, 10000), line(b, 5, 5000)]))
            .unwrap();
        assert_eq!(purchase.total_amount(), Money::from_cents(125000));
        assert!(purchase.purchase_number().starts_with("PO-"));

        let confirmed = fx.app.purchases.confirm(purchase.id_typed()).unwrap();
        assert_eq!(confirmed.status(), PurchaseStatus::Confirmed);

        let again = domain(fx.app.purchases.confirm(purchase.id_typed()).unwrap_err());
        assert!(again.is_invalid_transition());

        fx.app.shutdown();

        assert_eq!(stock(&fx.app, a), Decimal::from(10));
        assert_eq!(stock(&fx.app, b), Decimal::from(7));
        assert_eq!(fx.app.materials.get(a).unwrap().unwrap().cost_price, Money::from_cents(10000));
        assert_eq!(fx.app.materials.get(b).unwrap().unwrap().cost_price, Money::from_cents(5000));
        assert_eq!(fx.app.reconciliation.metrics().snapshot().events_applied, 1);
    }

    #[test]
    fn redelivered_confirmation_changes_stock_once() {
        let mut fx = start();
        let a = material(&fx.app, "MILK", Some(Decimal::from(1)), 100);

        let purchase = fx.app.purchases.create(draft(fx.supplier, vec![line(a, 4, 150)])).unwrap();
        fx.app.purchases.confirm(purchase.id_typed()).unwrap();
        fx.app.dispatcher.redeliver(purchase.id_typed().aggregate_id()).unwrap();
        fx.app.dispatcher.redeliver(purchase.id_typed().aggregate_id()).unwrap();

        fx.app.shutdown();

        assert_eq!(stock(&fx.app, a), Decimal::from(5));
        let metrics = fx.app.reconciliation.metrics().snapshot();
        assert_eq!(metrics.events_applied, 1);
        assert_eq!(metrics.duplicates, 2);
    }

    #[test]
    fn deleted_material_does_not_block_the_rest_of_the_purchase() {
        let mut fx = start();
        let a = material(&fx.app, "EGGS", None, 0);
        let b = material(&fx.app, "BUTTER", None, 0);
        let c = material(&fx.app, "SALT", None, 0);

        let purchase = fx
            .app
            .purchases
            .create(draft(fx.supplier, vec![line(a, 12, 30), line(b, 2, 900), line(c, 1, 200)]))
            .unwrap();
        fx.app.materials.remove(b).unwrap();
        fx.app.purchases.confirm(purchase.id_typed()).unwrap();

        fx.app.shutdown();

        assert_eq!(stock(&fx.app, a), Decimal::from(12));
        assert_eq!(stock(&fx.app, c), Decimal::ONE);
        assert!(fx.app.materials.get(b).unwrap().is_none());
        assert_eq!(fx.app.reconciliation.metrics().snapshot().skipped_missing, 1);
    }

    #[test]
    fn confirmed_count_overwrites_stock() {
        let mut fx = start();
        let oil = material(&fx.app, "OIL", Some(Decimal::new(5000, 2)), 300);

        let checks = &fx.app.inventory_checks;
        let check = checks.create(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(), None).unwrap();
        let id = check.id_typed();
        assert_eq!(check.status(), InventoryCheckStatus::Planned);
        assert_eq!(check.items().len(), 1);

        let early = domain(checks.count_item(id, oil, Decimal::new(4800, 2), None).unwrap_err());
        assert!(early.is_invalid_transition());

        checks.start(id).unwrap();
        checks.count_item(id, oil, Decimal::new(4800, 2), Some("spill".into())).unwrap();
        let confirmed = checks.confirm(id).unwrap();
        assert_eq!(confirmed.total_difference_amount(), Money::from_cents(-600));

        fx.app.shutdown();

        assert_eq!(stock(&fx.app, oil), Decimal::new(4800, 2));
        assert_eq!(fx.app.materials.get(oil).unwrap().unwrap().cost_price, Money::from_cents(300));
    }

    #[test]
    fn concurrent_purchases_of_one_material_do_not_lose_updates() {
        let mut fx = start();
        let rice = material(&fx.app, "RICE", Some(Decimal::ZERO), 0);

        let ids: Vec<_> = (0..12)
            .map(|_| {
                fx.app
                    .purchases
                    .create(draft(fx.supplier, vec![line(rice, 3, 100)]))
                    .unwrap()
                    .id_typed()
            })
            .collect();

        let purchases = &fx.app.purchases;
        thread::scope(|scope| {
            for chunk in ids.chunks(3) {
                scope.spawn(move || {
                    for id in chunk {
                        purchases.confirm(*id).unwrap();
                    }
                });
            }
        });

        fx.app.shutdown();

        assert_eq!(stock(&fx.app, rice), Decimal::from(36));
    }

    fn seed_menu(catalog: &InMemoryCatalog) -> (ProductId, ComboId, ProductId) {
        let latte = ProductId::generate();
        catalog.put_product(ProductInfo {
            id: latte,
            name: "Latte".into(),
            price: Some(Money::from_cents(4500)),
            is_active: true,
        });
        catalog.put_option_groups(
            OptionOwner::Product(latte),
            vec![OptionGroupDef {
                name: "Size".into(),
                min_selections: 0,
                max_selections: 1,
                values: vec![OptionValueDef {
                    name: "Large".into(),
                    price_adjustment: Money::from_cents(1500),
                }],
            }],
        );

        let toast = ProductId::generate();
        let juice = ProductId::generate();
        for (id, name) in [(toast, "Toast"), (juice, "Juice")] {
            catalog.put_product(ProductInfo {
                id,
                name: name.into(),
                price: Some(Money::from_cents(3000)),
                is_active: true,
            });
        }
        catalog.put_option_groups(
            OptionOwner::Product(toast),
            vec![OptionGroupDef {
                name: "Spread".into(),
                min_selections: 0,
                max_selections: 2,
                values: vec![OptionValueDef {
                    name: "Jam".into(),
                    price_adjustment: Money::from_cents(500),
                }],
            }],
        );

        let breakfast = ComboId::generate();
        catalog.put_combo(ComboInfo {
            id: breakfast,
            name: "Breakfast".into(),
            price: Some(Money::from_cents(9900)),
            is_active: true,
            items: vec![
                ComboSlot {
                    product_id: toast,
                    product_name: "Toast".into(),
                    quantity: 1,
                },
                ComboSlot {
                    product_id: juice,
                    product_name: "Juice".into(),
                    quantity: 1,
                },
            ],
        });

        (latte, breakfast, toast)
    }

    #[test]
    fn paid_order_is_invoiced_once_and_projected() {
        let mut fx = start();
        let (latte, breakfast, toast) = seed_menu(&fx.catalog);
        let orders = &fx.app.orders;

        let order = orders.create(OrderType::Takeout, None, None).unwrap();
        let id = order.id_typed();

        let order = orders
            .add_product(id, latte, Some(2), &[OptionChoice::new("Size", "Large")])
            .unwrap();
        assert_eq!(order.total_amount(), Money::from_cents(12000));

        let order = orders
            .add_combo(
                id,
                breakfast,
                &[],
                &[ComponentChoice {
                    product_id: toast,
                    options: vec![OptionChoice::new("Spread", "Jam")],
                }],
            )
            .unwrap();
        assert_eq!(order.items().len(), 4);
        assert_eq!(order.total_amount(), Money::from_cents(22400));

        orders.submit(id).unwrap();
        let frozen = domain(orders.add_product(id, latte, None, &[]).unwrap_err());
        assert!(frozen.is_invalid_transition());

        let short = domain(orders.checkout(id, Money::from_cents(20000), PaymentMethod::Card).unwrap_err());
        assert!(matches!(short, DomainError::Validation { .. }));

        let paid = orders.checkout(id, Money::from_cents(22400), PaymentMethod::Card).unwrap();
        assert_eq!(paid.status(), OrderStatus::Paid);
        let twice = domain(orders.checkout(id, Money::from_cents(22400), PaymentMethod::Card).unwrap_err());
        assert!(twice.is_invalid_transition());

        fx.app.dispatcher.redeliver(id.aggregate_id()).unwrap();
        fx.app.shutdown();

        let issued = fx.invoices.issued();
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].order_id, id);
        assert_eq!(issued[0].amount, Money::from_cents(22400));

        let sheet = fx.app.order_sheets.get(&id).unwrap();
        assert_eq!(sheet.status, OrderStatus::Paid);
        assert_eq!(sheet.total_amount, Money::from_cents(22400));
        assert_eq!(sheet.rows.len(), 4);
        let subtotal_sum: Money = sheet.rows.iter().map(|r| r.subtotal).sum();
        assert_eq!(subtotal_sum, sheet.total_amount);
    }

    #[test]
    fn unknown_references_are_not_found() {
        let mut fx = start();
        let ghost = MaterialId::generate();

        let err = domain(fx.app.purchases.create(draft(fx.supplier, vec![line(ghost, 1, 100)])).unwrap_err());
        assert!(matches!(err, DomainError::NotFound { entity: "material", .. }));

        let err = domain(
            fx.app
                .purchases
                .create(draft(SupplierId::generate(), vec![]))
                .unwrap_err(),
        );
        assert!(matches!(err, DomainError::NotFound { entity: "supplier", .. }));

        let err = domain(fx.app.orders.submit(larder_sales::OrderId::generate()).unwrap_err());
        assert!(matches!(err, DomainError::NotFound { entity: "order", .. }));

        fx.app.shutdown();
    }
}
