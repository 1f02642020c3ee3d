//! Concurrent sales against an on-disk database with a real connection pool.

mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::{product, sale_request, stock};
use tienda_core::{CoreError, UserRole};
use tienda_db::{Database, DbConfig, SaleSettings};

/// Temporary database file, removed (with its WAL files) on drop.
struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("tienda-test-{}.db", uuid::Uuid::new_v4()));
        TempDb { path }
    }

    async fn open(&self) -> Database {
        let config = DbConfig::new(&self.path)
            .max_connections(8)
            .busy_timeout(Duration::from_secs(10));
        Database::new(config).await.unwrap()
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(file));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sales_never_oversell() {
    let temp = TempDb::new();
    let db = temp.open().await;
    let operator = db
        .users()
        .create("cajero", "Cajero", UserRole::Cashier)
        .await
        .unwrap();
    let item = product(&db, "Producto Escaso", 7000, 10).await;

    let service = db.sale_service(SaleSettings {
        max_retries: 10,
        ..SaleSettings::default()
    });

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = service.clone();
        let request = sale_request(&operator.id, &[(&item.id, 1)]);
        handles.push(tokio::spawn(async move { service.create_sale(&request).await }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => {
                assert!(
                    matches!(err.as_core(), Some(CoreError::InsufficientStock { .. })),
                    "unexpected failure: {err}"
                );
                rejected += 1;
            }
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(rejected, 10);
    assert_eq!(stock(&db, &item.id).await, 0);
    assert_eq!(db.sales().count().await.unwrap(), 10);
    assert_eq!(db.ledger().count().await.unwrap(), 10);

    let entries = db.ledger().all_for_product(&item.id).await.unwrap();
    assert_eq!(tienda_core::ledger::find_chain_break(10, &entries), None);

    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancellations_restore_once() {
    let temp = TempDb::new();
    let db = temp.open().await;
    let operator = db
        .users()
        .create("cajero", "Cajero", UserRole::Cashier)
        .await
        .unwrap();
    let item = product(&db, "Producto", 7000, 10).await;
    let service = db.sale_service(SaleSettings {
        max_retries: 10,
        ..SaleSettings::default()
    });

    let details = service
        .create_sale(&sale_request(&operator.id, &[(&item.id, 4)]))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..6 {
        let service = service.clone();
        let sale_id = details.sale.id.clone();
        let user_id = operator.id.clone();
        handles.push(tokio::spawn(async move {
            service
                .cancel_sale(&sale_id, &format!("attempt {n}"), &user_id)
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(matches!(
                err.as_core(),
                Some(CoreError::AlreadyCancelled { .. })
            )),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(stock(&db, &item.id).await, 10);
    assert_eq!(db.ledger().for_reference(&details.sale.id).await.unwrap().len(), 2);

    db.close().await;
}
