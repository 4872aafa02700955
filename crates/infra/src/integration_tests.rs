//! Concurrency tests for the ledger pipeline.
//!
//! Many tasks race on the same stock rows through `LedgerService`. Locking has to
//! keep every row equal to the sum of its movements. Stock must never be overdrawn,
//! and opposite-direction transfers must not deadlock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use stockledger_core::{DomainError, ProductId, TenantId, UserId, WarehouseId};
use stockledger_inventory::{AdjustStock, DeductForSale, ReferenceId, TransferStock};

use crate::ledger::{LedgerContext, LedgerError, LedgerService};
use crate::storage::InMemoryLedgerStorage;

fn service() -> LedgerService {
    LedgerService::new(Arc::new(InMemoryLedgerStorage::new()), Duration::from_secs(10))
}

fn ctx() -> LedgerContext {
    LedgerContext::new(TenantId::new(), Some(UserId::new()))
}

async fn seed(svc: &LedgerService, ctx: &LedgerContext, p: ProductId, w: WarehouseId, qty: i64) {
    svc.adjust(
        ctx,
        AdjustStock {
            product_id: p,
            warehouse_id: w,
            delta: qty,
            reason: "Initial Stock".to_string(),
            occurred_at: Utc::now(),
        },
    )
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sales_never_overdraw() {
    let svc = service();
    let ctx = ctx();
    let (p, w) = (ProductId::new(), WarehouseId::new());
    seed(&svc, &ctx, p, w, 5).await;

    let mut tasks = Vec::new();
    for i in 0..10 {
        let svc = svc.clone();
        tasks.push(tokio::spawn(async move {
            svc.deduct_for_sale(
                &ctx,
                DeductForSale {
                    product_id: p,
                    warehouse_id: w,
                    quantity: 1,
                    reference_id: ReferenceId::new(format!("INV-{i}")),
                    reason: None,
                    occurred_at: Utc::now(),
                },
            )
            .await
        }));
    }

    let mut succeeded = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::Domain(DomainError::InsufficientStock { available, .. })) => {
                assert_eq!(available, 0)
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(svc.stock(&ctx, p, w).await.unwrap().unwrap().quantity, 0);
    let report = svc.verify_replay(&ctx, p, w).await.unwrap();
    assert!(report.consistent);
    assert_eq!(report.movement_count, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_transfers_finish_and_conserve_totals() {
    let svc = service();
    let ctx = ctx();
    let (p, a, b) = (ProductId::new(), WarehouseId::new(), WarehouseId::new());
    seed(&svc, &ctx, p, a, 100).await;
    seed(&svc, &ctx, p, b, 100).await;

    let mut tasks = Vec::new();
    for i in 0..40 {
        let svc = svc.clone();
        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
        tasks.push(tokio::spawn(async move {
            svc.transfer(
                &ctx,
                TransferStock {
                    product_id: p,
                    from_warehouse_id: from,
                    to_warehouse_id: to,
                    quantity: 3,
                    reason: None,
                    occurred_at: Utc::now(),
                },
            )
            .await
        }));
    }

    let all = tokio::time::timeout(Duration::from_secs(30), async {
        for t in tasks {
            t.await.unwrap().unwrap();
        }
    })
    .await;
    assert!(all.is_ok(), "transfers did not finish");

    let qa = svc.stock(&ctx, p, a).await.unwrap().unwrap().quantity;
    let qb = svc.stock(&ctx, p, b).await.unwrap().unwrap().quantity;
    assert_eq!(qa + qb, 200);
    // Twenty transfers each way.
    assert_eq!(qa, 100);
    for w in [a, b] {
        assert!(svc.verify_replay(&ctx, p, w).await.unwrap().consistent);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tenants_do_not_contend_on_the_same_pair() {
    let svc = service();
    let (p, w) = (ProductId::new(), WarehouseId::new());
    let tenants: Vec<LedgerContext> = (0..4).map(|_| ctx()).collect();

    let mut tasks = Vec::new();
    for ctx in tenants.clone() {
        let svc = svc.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                seed(&svc, &ctx, p, w, 1).await;
            }
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    for ctx in &tenants {
        assert_eq!(svc.stock(ctx, p, w).await.unwrap().unwrap().quantity, 10);
    }
}
