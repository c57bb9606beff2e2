//! Retry safety: claims, replays, payload conflicts and cleared claims.

mod common;

use common::{ctx, open_shift, seed_item, seed_product, setup, stock_of};
use ledger_core::idempotency::{ClaimOutcome, IdempotencyLedger};
use ledger_core::orders::OrderService;
use ledger_core::LedgerError;
use shared::auth::Role;
use shared::models::{CreateOrderInput, OrderItemInput, OrderType, StockAdjust};

fn order_input(branch_id: i64, product_id: i64, quantity: i32) -> CreateOrderInput {
    CreateOrderInput {
        branch_id,
        order_type: OrderType::Pickup,
        table_id: None,
        items: vec![OrderItemInput {
            product_id,
            quantity,
            unit_price: None,
            modifiers: None,
        }],
        discount: None,
        delivery_fee: None,
        note: None,
        payments: vec![],
    }
}

#[tokio::test]
async fn identical_retry_replays_without_double_deduction() {
    let env = setup().await;
    open_shift(&env).await;
    let beans = seed_item(&env, "Beans", 2.0, env.kitchen_id, 10.0).await;
    let coffee = seed_product(&env, "Coffee", 4.0, &[(beans, 0.02)]).await;

    let service = OrderService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);
    let input = order_input(env.branch_id, coffee, 1);

    let first = service
        .create_order(input.clone(), &staff, Some("key-1"))
        .await
        .unwrap();
    assert!(!first.replayed);
    assert_eq!(first.status, 201);

    let second = service
        .create_order(input, &staff, Some("key-1"))
        .await
        .unwrap();
    assert!(second.replayed);
    assert_eq!(second.status, 201);
    // The exact original order comes back
    assert_eq!(second.detail.order.id, first.detail.order.id);
    assert_eq!(second.detail.order.total, first.detail.order.total);

    // Inventory was deducted exactly once: 10.0 - 0.02
    assert!((stock_of(&env, beans, env.kitchen_id).await - 9.98).abs() < 1e-9);
}

#[tokio::test]
async fn same_key_different_payload_conflicts() {
    let env = setup().await;
    open_shift(&env).await;
    let beans = seed_item(&env, "Beans", 2.0, env.kitchen_id, 10.0).await;
    let coffee = seed_product(&env, "Coffee", 4.0, &[(beans, 0.02)]).await;

    let service = OrderService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    service
        .create_order(order_input(env.branch_id, coffee, 1), &staff, Some("key-2"))
        .await
        .unwrap();

    // Same key, different quantity: the key is not re-honored
    let err = service
        .create_order(order_input(env.branch_id, coffee, 2), &staff, Some("key-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::IdempotencyPayloadConflict));

    // Only the original deduction happened
    assert!((stock_of(&env, beans, env.kitchen_id).await - 9.98).abs() < 1e-9);
}

#[tokio::test]
async fn failed_attempt_clears_the_claim_for_retry() {
    let env = setup().await;
    open_shift(&env).await;
    // Not enough beans for even one coffee
    let beans = seed_item(&env, "Beans", 2.0, env.kitchen_id, 0.01).await;
    let coffee = seed_product(&env, "Coffee", 4.0, &[(beans, 0.02)]).await;

    let service = OrderService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);
    let input = order_input(env.branch_id, coffee, 1);

    let err = service
        .create_order(input.clone(), &staff, Some("key-3"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }));

    // Restock, then retry with the same key: the cleared claim lets the
    // second attempt run cleanly.
    let inventory = ledger_core::inventory::InventoryService::new(env.state.clone());
    inventory
        .adjust(
            StockAdjust {
                item_id: beans,
                warehouse_id: env.kitchen_id,
                new_quantity: 5.0,
                reason: "restock".into(),
                reference_id: None,
            },
            &staff,
        )
        .await
        .unwrap();

    let created = service
        .create_order(input, &staff, Some("key-3"))
        .await
        .unwrap();
    assert!(!created.replayed);
    // Deducted exactly once from the restocked level
    assert!((stock_of(&env, beans, env.kitchen_id).await - 4.98).abs() < 1e-9);
}

#[tokio::test]
async fn in_progress_claim_blocks_concurrent_retry() {
    let env = setup().await;
    let ledger = IdempotencyLedger::new(env.state.pool.clone(), 60_000);
    let payload = serde_json::json!({"amount": 5});

    let outcome = ledger.begin_claim("key-4", "orders:create", &payload).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::New));

    // The first attempt has not completed: a concurrent retry must wait.
    let err = ledger
        .begin_claim("key-4", "orders:create", &payload)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::IdempotencyInProgress));
}

#[tokio::test]
async fn reordered_keys_hash_identically() {
    let env = setup().await;
    let ledger = IdempotencyLedger::new(env.state.pool.clone(), 60_000);

    let a = serde_json::json!({"items": [{"product_id": 1, "quantity": 2}], "branch_id": 7});
    let b = serde_json::json!({"branch_id": 7, "items": [{"quantity": 2, "product_id": 1}]});
    assert_eq!(
        IdempotencyLedger::payload_hash(&a),
        IdempotencyLedger::payload_hash(&b)
    );

    ledger.begin_claim("key-5", "orders:create", &a).await.unwrap();
    ledger
        .complete_claim("key-5", "orders:create", 201, "o-1", &serde_json::json!({"id": "o-1"}))
        .await
        .unwrap();

    // The reordered-but-identical payload replays instead of conflicting.
    match ledger.begin_claim("key-5", "orders:create", &b).await.unwrap() {
        ClaimOutcome::Replay(stored) => {
            assert_eq!(stored.status, 201);
            assert_eq!(stored.resource_id.as_deref(), Some("o-1"));
        }
        other => panic!("expected replay, got {other:?}"),
    }
}

#[tokio::test]
async fn expired_claims_are_superseded() {
    let env = setup().await;
    // TTL of zero: every claim is immediately expired.
    let ledger = IdempotencyLedger::new(env.state.pool.clone(), 0);
    let payload = serde_json::json!({"n": 1});

    let outcome = ledger.begin_claim("key-6", "scope", &payload).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::New));

    // A different payload under the expired key wins a fresh claim
    // instead of conflicting.
    let other = serde_json::json!({"n": 2});
    let outcome = ledger.begin_claim("key-6", "scope", &other).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::New));
}
