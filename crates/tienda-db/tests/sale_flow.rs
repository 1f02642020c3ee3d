//! End-to-end sale and cancellation scenarios against an in-memory store.

mod common;

use common::{cashier, memory_db, product, sale_request, stock};
use tienda_core::ledger::{find_chain_break, replay};
use tienda_core::pricing::{compute_sale_price, profit_margin_percentage};
use tienda_core::{CoreError, ErrorKind, Money, MovementType, SaleStatus};
use tienda_db::{SaleSettings, ServiceError};

fn core(err: &ServiceError) -> &CoreError {
    err.as_core().unwrap_or_else(|| panic!("expected a business error, got {err}"))
}

#[tokio::test]
async fn basic_sale_decrements_stock_and_writes_ledger() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 10).await;
    assert_eq!(compute_sale_price(&a).cents(), 10000);

    let details = db
        .sale_service(SaleSettings::default())
        .create_sale(&sale_request(&operator.id, &[(&a.id, 2)]))
        .await
        .unwrap();

    assert_eq!(details.sale.total_cents, 20000);
    assert_eq!(details.sale.subtotal_cents, 20000);
    assert_eq!(stock(&db, &a.id).await, 8);

    let entries = db.ledger().for_reference(&details.sale.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.movement_type, MovementType::Out);
    assert_eq!(entry.quantity, 2);
    assert_eq!((entry.previous_stock, entry.new_stock), (10, 8));
    assert_eq!(entry.reason, format!("Sale {}", details.sale.invoice_number));
    assert_eq!(entry.user_id, operator.id);
}

#[tokio::test]
async fn insufficient_stock_rejects_whole_sale() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let b = product(&db, "Producto B", 1000, 1).await;

    let err = db
        .sale_service(SaleSettings::default())
        .create_sale(&sale_request(&operator.id, &[(&b.id, 5)]))
        .await
        .unwrap_err();

    assert!(matches!(
        core(&err),
        CoreError::InsufficientStock { available: 1, requested: 5, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(stock(&db, &b.id).await, 1);
    assert_eq!(db.sales().count().await.unwrap(), 0);
    assert_eq!(db.ledger().count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_product_leaves_no_trace() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 10).await;
    let c = product(&db, "Producto C", 500, 4).await;

    let err = db
        .sale_service(SaleSettings::default())
        .create_sale(&sale_request(
            &operator.id,
            &[(&a.id, 2), ("no-such-product", 1), (&c.id, 1)],
        ))
        .await
        .unwrap_err();

    assert!(matches!(core(&err), CoreError::ProductNotFound(id) if id == "no-such-product"));
    assert_eq!(stock(&db, &a.id).await, 10);
    assert_eq!(stock(&db, &c.id).await, 4);
    assert_eq!(db.sales().count().await.unwrap(), 0);
    assert_eq!(db.sales().count_line_items().await.unwrap(), 0);
    assert_eq!(db.ledger().count().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_customer_rejected() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 10).await;

    let mut request = sale_request(&operator.id, &[(&a.id, 1)]);
    request.customer_id = Some("ghost".to_string());
    let err = db
        .sale_service(SaleSettings::default())
        .create_sale(&request)
        .await
        .unwrap_err();

    assert!(matches!(core(&err), CoreError::CustomerNotFound(_)));
    assert_eq!(stock(&db, &a.id).await, 10);
}

#[tokio::test]
async fn negative_total_rejected() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 10).await;

    let mut request = sale_request(&operator.id, &[(&a.id, 1)]);
    request.discount = Money::from_cents(10001);
    let err = db
        .sale_service(SaleSettings::default())
        .create_sale(&request)
        .await
        .unwrap_err();

    assert!(matches!(core(&err), CoreError::InvalidAmount { .. }));
    assert_eq!(stock(&db, &a.id).await, 10);
}

#[tokio::test]
async fn overflowing_tax_rejected() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 10).await;

    let mut request = sale_request(&operator.id, &[(&a.id, 1)]);
    request.tax = Money::from_cents(i64::MAX);
    let err = db
        .sale_service(SaleSettings::default())
        .create_sale(&request)
        .await
        .unwrap_err();

    assert!(matches!(core(&err), CoreError::InvalidAmount { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(stock(&db, &a.id).await, 10);
    assert_eq!(db.sales().count().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_order_and_bad_quantity_rejected() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 10).await;
    let service = db.sale_service(SaleSettings::default());

    let err = service
        .create_sale(&sale_request(&operator.id, &[]))
        .await
        .unwrap_err();
    assert!(matches!(core(&err), CoreError::EmptyOrder));

    let err = service
        .create_sale(&sale_request(&operator.id, &[(&a.id, 0)]))
        .await
        .unwrap_err();
    assert!(matches!(core(&err), CoreError::InvalidQuantity { quantity: 0, .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn price_is_frozen_at_sale_time() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 10).await;

    let details = db
        .sale_service(SaleSettings::default())
        .create_sale(&sale_request(&operator.id, &[(&a.id, 1)]))
        .await
        .unwrap();

    db.pricing_service(3)
        .set_manual_price(&a.id, Money::from_cents(15000))
        .await
        .unwrap();

    let reloaded = db
        .sale_service(SaleSettings::default())
        .get_sale(&details.sale.id)
        .await
        .unwrap();
    assert_eq!(reloaded.items[0].unit_price_cents, 10000);
    assert_eq!(reloaded.sale.total_cents, 10000);
}

#[tokio::test]
async fn cancellation_restores_stock() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let c = product(&db, "Producto C", 500, 7).await;
    let service = db.sale_service(SaleSettings::default());

    let details = service
        .create_sale(&sale_request(&operator.id, &[(&c.id, 3)]))
        .await
        .unwrap();
    assert_eq!(stock(&db, &c.id).await, 4);

    let cancelled = service
        .cancel_sale(&details.sale.id, "Customer returned goods", &operator.id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, SaleStatus::Cancelled);
    assert_eq!(cancelled.invoice_number, details.sale.invoice_number);
    assert_eq!(stock(&db, &c.id).await, 7);

    let entries = db.ledger().for_reference(&details.sale.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    let reversal = &entries[1];
    assert_eq!(reversal.movement_type, MovementType::In);
    assert_eq!(reversal.quantity, 3);
    assert_eq!((reversal.previous_stock, reversal.new_stock), (4, 7));
    assert!(reversal.reason.contains(&details.sale.invoice_number));
    assert!(reversal.reason.contains("Customer returned goods"));

    let sale = db.sales().get_by_id(&details.sale.id).await.unwrap().unwrap();
    assert_eq!(sale.status, SaleStatus::Cancelled);
}

#[tokio::test]
async fn double_cancel_changes_stock_once() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let c = product(&db, "Producto C", 500, 7).await;
    let service = db.sale_service(SaleSettings::default());

    let details = service
        .create_sale(&sale_request(&operator.id, &[(&c.id, 3)]))
        .await
        .unwrap();

    service
        .cancel_sale(&details.sale.id, "first", &operator.id)
        .await
        .unwrap();
    let err = service
        .cancel_sale(&details.sale.id, "second", &operator.id)
        .await
        .unwrap_err();

    assert!(matches!(core(&err), CoreError::AlreadyCancelled { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(stock(&db, &c.id).await, 7);
    assert_eq!(db.ledger().for_reference(&details.sale.id).await.unwrap().len(), 2);

    let sale = db.sales().get_by_id(&details.sale.id).await.unwrap().unwrap();
    assert_eq!(sale.notes.as_deref(), Some("[CANCELLED: first]"));
}

#[tokio::test]
async fn cancel_unknown_sale() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let err = db
        .sale_service(SaleSettings::default())
        .cancel_sale("missing", "typo", &operator.id)
        .await
        .unwrap_err();
    assert!(matches!(core(&err), CoreError::SaleNotFound(_)));
}

#[tokio::test]
async fn ledger_replays_to_current_stock() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 20).await;
    let b = product(&db, "Producto B", 1000, 9).await;
    let sales = db.sale_service(SaleSettings::default());
    let inventory = db.inventory_service(3);

    let first = sales
        .create_sale(&sale_request(&operator.id, &[(&a.id, 3), (&b.id, 2), (&a.id, 1)]))
        .await
        .unwrap();
    sales
        .create_sale(&sale_request(&operator.id, &[(&a.id, 5)]))
        .await
        .unwrap();
    inventory
        .receive_stock(&a.id, 12, "Delivery", &operator.id)
        .await
        .unwrap();
    sales
        .cancel_sale(&first.sale.id, "Duplicate ticket", &operator.id)
        .await
        .unwrap();
    inventory
        .adjust_stock(&a.id, 25, "Shelf count", &operator.id)
        .await
        .unwrap();

    for (id, initial) in [(&a.id, 20), (&b.id, 9)] {
        let entries = db.ledger().all_for_product(id).await.unwrap();
        for entry in &entries {
            let expected = match entry.movement_type {
                MovementType::In => entry.previous_stock + entry.quantity,
                MovementType::Out => entry.previous_stock - entry.quantity,
                MovementType::Adjustment => entry.new_stock,
            };
            assert_eq!(entry.new_stock, expected);
        }
        assert_eq!(find_chain_break(initial, &entries), None);
        assert_eq!(replay(initial, &entries), stock(&db, id).await);
    }

    // duplicate lines collapse into one ledger entry per product
    let first_entries = db.ledger().for_reference(&first.sale.id).await.unwrap();
    assert_eq!(first_entries.len(), 4);
    assert_eq!(first_entries[0].quantity, 4);

    let summary = inventory.stock_summary(&a.id).await.unwrap();
    assert_eq!(summary.total_out, 9);
    assert_eq!(summary.total_in, 4 + 12);
    assert_eq!(20 + summary.net_change(), 25);
}

#[tokio::test]
async fn loyalty_points_credited_to_customer() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 10).await;
    let customer = db.customers().create("Ana", None, None).await.unwrap();

    let mut request = sale_request(&operator.id, &[(&a.id, 2)]);
    request.customer_id = Some(customer.id.clone());
    request.tax = Money::from_cents(4199);
    let details = db
        .sale_service(SaleSettings::default())
        .create_sale(&request)
        .await
        .unwrap();

    // 1% of $241.99 is 2.4199 points, rounded down
    assert_eq!(details.sale.total_cents, 24199);
    assert_eq!(details.sale.loyalty_points_earned, 2);
    assert_eq!(db.customers().loyalty_points(&customer.id).await.unwrap(), Some(2));
    let summary = details.customer.unwrap();
    assert_eq!(summary.id, customer.id);
    assert_eq!(summary.loyalty_points, 2);

    // points accumulate across sales
    let mut small = sale_request(&operator.id, &[(&a.id, 1)]);
    small.customer_id = Some(customer.id.clone());
    let details = db
        .sale_service(SaleSettings::default())
        .create_sale(&small)
        .await
        .unwrap();
    assert_eq!(details.sale.loyalty_points_earned, 1);
    assert_eq!(db.customers().loyalty_points(&customer.id).await.unwrap(), Some(3));
}

#[tokio::test]
async fn invoice_numbers_are_unique_and_sequential() {
    let db = memory_db().await;
    let operator = cashier(&db).await;
    let a = product(&db, "Producto A", 7000, 10).await;
    let service = db.sale_service(SaleSettings::default());

    let mut invoices = Vec::new();
    for _ in 0..3 {
        let details = service
            .create_sale(&sale_request(&operator.id, &[(&a.id, 1)]))
            .await
            .unwrap();
        invoices.push(details.sale.invoice_number);
    }

    assert!(invoices[0].ends_with("-000001"));
    assert!(invoices[1].ends_with("-000002"));
    assert!(invoices[2].ends_with("-000003"));
}

#[tokio::test]
async fn recalculated_price_round_trips_margin() {
    let db = memory_db().await;
    let a = product(&db, "Producto A", 7000, 10).await;
    let pricing = db.pricing_service(3);

    for margin in [0, 1250, 3000, 5000, 9999] {
        let updated = pricing
            .recalculate_price(&a.id, Some(Money::from_cents(1999)), Some(margin), None, None)
            .await
            .unwrap();
        let back = profit_margin_percentage(&updated);
        assert!((back - margin as f64 / 100.0).abs() < 0.5, "margin {margin}: got {back}");
    }
}
