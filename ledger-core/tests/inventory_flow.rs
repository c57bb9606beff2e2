//! Inventory ledger: adjustments, transfers, waste, purchase receipts.

mod common;

use common::{ctx, seed_item, setup, stock_of};
use ledger_core::finance::accounts;
use ledger_core::inventory::InventoryService;
use ledger_core::LedgerError;
use shared::auth::Role;
use shared::models::{
    MovementType, PurchaseItemInput, PurchaseOrderCreate, StockAdjust, StockTransfer, WasteInput,
};

async fn movements(env: &common::TestEnv, item_id: i64) -> Vec<shared::models::StockMovement> {
    let mut conn = env.state.pool.acquire().await.unwrap();
    ledger_core::db::repository::stock::movements_for_item(&mut conn, item_id)
        .await
        .unwrap()
}

#[tokio::test]
async fn adjustment_writes_movement_and_loss_entry() {
    let env = setup().await;
    let rice = seed_item(&env, "Rice", 1.5, env.storage_id, 40.0).await;
    let service = InventoryService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    // Stocktake found only 30kg: a 10kg loss at 1.50 = 15.00
    let level = service
        .adjust(
            StockAdjust {
                item_id: rice,
                warehouse_id: env.storage_id,
                new_quantity: 30.0,
                reason: "stocktake".into(),
                reference_id: Some("adj-1".into()),
            },
            &staff,
        )
        .await
        .unwrap();
    assert_eq!(level.quantity, 30.0);

    let moves = movements(&env, rice).await;
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].movement_type, MovementType::Adjustment);
    assert_eq!(moves[0].quantity, 10.0);
    assert_eq!(moves[0].from_warehouse_id, Some(env.storage_id));

    let entries = env
        .state
        .finance()
        .entries_for_reference("adj-1")
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 15.0);
    assert_eq!(entries[0].debit_account, accounts::COGS);
    assert_eq!(entries[0].credit_account, accounts::INVENTORY);
}

#[tokio::test]
async fn adjustment_replay_by_reference_is_a_noop() {
    let env = setup().await;
    let rice = seed_item(&env, "Rice", 1.5, env.storage_id, 40.0).await;
    let service = InventoryService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    let adjust = StockAdjust {
        item_id: rice,
        warehouse_id: env.storage_id,
        new_quantity: 30.0,
        reason: "stocktake".into(),
        reference_id: Some("adj-2".into()),
    };
    service.adjust(adjust.clone(), &staff).await.unwrap();

    // Replay: quantity already 30, still exactly one movement/entry
    service.adjust(adjust, &staff).await.unwrap();
    assert_eq!(stock_of(&env, rice, env.storage_id).await, 30.0);
    assert_eq!(movements(&env, rice).await.len(), 1);
    let entries = env
        .state
        .finance()
        .entries_for_reference("adj-2")
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn adjustment_gain_posts_the_reverse_pair() {
    let env = setup().await;
    let rice = seed_item(&env, "Rice", 1.5, env.storage_id, 10.0).await;
    let service = InventoryService::new(env.state.clone());

    service
        .adjust(
            StockAdjust {
                item_id: rice,
                warehouse_id: env.storage_id,
                new_quantity: 14.0,
                reason: "found in back room".into(),
                reference_id: Some("adj-3".into()),
            },
            &ctx(Role::Staff, env.branch_id),
        )
        .await
        .unwrap();

    let entries = env
        .state
        .finance()
        .entries_for_reference("adj-3")
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 6.0);
    assert_eq!(entries[0].debit_account, accounts::INVENTORY);
    assert_eq!(entries[0].credit_account, accounts::COGS);
}

#[tokio::test]
async fn transfer_conserves_total_quantity() {
    let env = setup().await;
    let rice = seed_item(&env, "Rice", 1.5, env.storage_id, 40.0).await;
    let service = InventoryService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    service
        .transfer(
            StockTransfer {
                item_id: rice,
                from_warehouse_id: env.storage_id,
                to_warehouse_id: env.kitchen_id,
                quantity: 15.0,
                reason: None,
                reference_id: Some("tr-1".into()),
            },
            &staff,
        )
        .await
        .unwrap();

    let source = stock_of(&env, rice, env.storage_id).await;
    let dest = stock_of(&env, rice, env.kitchen_id).await;
    assert_eq!(source, 25.0);
    assert_eq!(dest, 15.0);
    assert_eq!(source + dest, 40.0);

    // One TRANSFER movement carrying both warehouses
    let moves = movements(&env, rice).await;
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].movement_type, MovementType::Transfer);
    assert_eq!(moves[0].from_warehouse_id, Some(env.storage_id));
    assert_eq!(moves[0].to_warehouse_id, Some(env.kitchen_id));

    // Replay is a no-op
    service
        .transfer(
            StockTransfer {
                item_id: rice,
                from_warehouse_id: env.storage_id,
                to_warehouse_id: env.kitchen_id,
                quantity: 15.0,
                reason: None,
                reference_id: Some("tr-1".into()),
            },
            &staff,
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&env, rice, env.storage_id).await, 25.0);
}

#[tokio::test]
async fn transfer_rejects_same_warehouse_and_shortfall() {
    let env = setup().await;
    let rice = seed_item(&env, "Rice", 1.5, env.storage_id, 5.0).await;
    let service = InventoryService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    let err = service
        .transfer(
            StockTransfer {
                item_id: rice,
                from_warehouse_id: env.storage_id,
                to_warehouse_id: env.storage_id,
                quantity: 1.0,
                reason: None,
                reference_id: None,
            },
            &staff,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = service
        .transfer(
            StockTransfer {
                item_id: rice,
                from_warehouse_id: env.storage_id,
                to_warehouse_id: env.kitchen_id,
                quantity: 6.0,
                reason: None,
                reference_id: None,
            },
            &staff,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }));
    // Fail closed: nothing moved
    assert_eq!(stock_of(&env, rice, env.storage_id).await, 5.0);
    assert_eq!(stock_of(&env, rice, env.kitchen_id).await, 0.0);
}

#[tokio::test]
async fn waste_fails_closed_and_posts_at_cost() {
    let env = setup().await;
    let milk = seed_item(&env, "Milk", 1.2, env.kitchen_id, 8.0).await;
    let service = InventoryService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    service
        .record_waste(
            WasteInput {
                item_id: milk,
                warehouse_id: env.kitchen_id,
                quantity: 3.0,
                reason: "spoiled".into(),
                reference_id: Some("waste-1".into()),
            },
            &staff,
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&env, milk, env.kitchen_id).await, 5.0);

    let entries = env
        .state
        .finance()
        .entries_for_reference("waste-1")
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 3.6);

    let err = service
        .record_waste(
            WasteInput {
                item_id: milk,
                warehouse_id: env.kitchen_id,
                quantity: 50.0,
                reason: "spoiled".into(),
                reference_id: None,
            },
            &staff,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }));
}

#[tokio::test]
async fn purchase_receipt_stocks_up_and_posts_payable() {
    let env = setup().await;
    let rice = seed_item(&env, "Rice", 1.5, env.storage_id, 0.0).await;
    let oil = seed_item(&env, "Oil", 4.0, env.storage_id, 0.0).await;
    let service = InventoryService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    let po = {
        let mut conn = env.state.pool.acquire().await.unwrap();
        ledger_core::db::repository::purchase::create(
            &mut conn,
            &PurchaseOrderCreate {
                supplier_name: "Acme Foods".into(),
                warehouse_id: env.storage_id,
                items: vec![
                    PurchaseItemInput {
                        item_id: rice,
                        quantity: 20.0,
                        unit_cost: 1.4,
                    },
                    PurchaseItemInput {
                        item_id: oil,
                        quantity: 5.0,
                        unit_cost: 3.8,
                    },
                ],
            },
        )
        .await
        .unwrap()
    };

    let received = service.receive_purchase_order(po.id, &staff).await.unwrap();
    assert_eq!(received.status, shared::models::PurchaseStatus::Received);
    assert_eq!(stock_of(&env, rice, env.storage_id).await, 20.0);
    assert_eq!(stock_of(&env, oil, env.storage_id).await, 5.0);

    // 20 x 1.40 + 5 x 3.80 = 47.00, inventory against accounts payable
    let entries = env
        .state
        .finance()
        .entries_for_reference(&format!("po:{}", po.id))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 47.0);
    assert_eq!(entries[0].debit_account, accounts::INVENTORY);
    assert_eq!(entries[0].credit_account, accounts::ACCOUNTS_PAYABLE);

    // Receiving again is a no-op replay
    service.receive_purchase_order(po.id, &staff).await.unwrap();
    assert_eq!(stock_of(&env, rice, env.storage_id).await, 20.0);
    let entries = env
        .state
        .finance()
        .entries_for_reference(&format!("po:{}", po.id))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
}
