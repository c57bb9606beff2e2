//! Production engine: reservation, yield settlement, cancellation.

mod common;

use common::{ctx, seed_item, setup, stock_of};
use ledger_core::db::repository::item;
use ledger_core::finance::accounts;
use ledger_core::production::ProductionService;
use ledger_core::LedgerError;
use shared::auth::Role;
use shared::models::{IngredientConsumption, ProductionStatus};

/// Composite item with a 2-component BOM: 1 unit consumes 0.5 dough +
/// 0.2 sauce.
async fn seed_bom(env: &common::TestEnv, dough_qty: f64, sauce_qty: f64) -> (i64, i64, i64) {
    let dough = seed_item(env, "Dough", 2.0, env.kitchen_id, dough_qty).await;
    let sauce = seed_item(env, "Sauce", 5.0, env.kitchen_id, sauce_qty).await;
    let mut conn = env.state.pool.acquire().await.unwrap();
    let base = item::create_item(&mut conn, "Pizza Base", "pcs", 0.0, true)
        .await
        .map(|i| i.id)
        .unwrap();
    item::set_bom_component(&mut conn, base, dough, 0.5).await.unwrap();
    item::set_bom_component(&mut conn, base, sauce, 0.2).await.unwrap();
    (base, dough, sauce)
}

#[tokio::test]
async fn create_touches_no_stock() {
    let env = setup().await;
    let (base, dough, sauce) = seed_bom(&env, 10.0, 10.0).await;
    let service = ProductionService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    let order = service.create(base, env.kitchen_id, 10.0, &staff).await.unwrap();
    assert_eq!(order.status, ProductionStatus::Pending);

    // Planned list expanded from the BOM: 10 x 0.5 and 10 x 0.2
    let ingredients = service.ingredients(order.id).await.unwrap();
    assert_eq!(ingredients.len(), 2);
    let planned: Vec<f64> = ingredients.iter().map(|i| i.quantity_planned).collect();
    assert!(planned.contains(&5.0));
    assert!(planned.contains(&2.0));

    // No stock touched yet
    assert_eq!(stock_of(&env, dough, env.kitchen_id).await, 10.0);
    assert_eq!(stock_of(&env, sauce, env.kitchen_id).await, 10.0);
}

#[tokio::test]
async fn start_with_shortfall_leaves_stock_untouched() {
    let env = setup().await;
    // Enough dough, not enough sauce
    let (base, dough, sauce) = seed_bom(&env, 10.0, 1.0).await;
    let service = ProductionService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    let order = service.create(base, env.kitchen_id, 10.0, &staff).await.unwrap();
    let err = service.start(order.id, &staff).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }));

    // No partial reservation: both components unchanged
    assert_eq!(stock_of(&env, dough, env.kitchen_id).await, 10.0);
    assert_eq!(stock_of(&env, sauce, env.kitchen_id).await, 1.0);
    let reloaded = service.get(order.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, ProductionStatus::Pending);
}

#[tokio::test]
async fn start_reserves_and_snapshots() {
    let env = setup().await;
    let (base, dough, sauce) = seed_bom(&env, 10.0, 10.0).await;
    let service = ProductionService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    let order = service.create(base, env.kitchen_id, 10.0, &staff).await.unwrap();
    let started = service.start(order.id, &staff).await.unwrap();
    assert_eq!(started.status, ProductionStatus::InProgress);

    assert_eq!(stock_of(&env, dough, env.kitchen_id).await, 5.0);
    assert_eq!(stock_of(&env, sauce, env.kitchen_id).await, 8.0);
    for ingredient in service.ingredients(order.id).await.unwrap() {
        assert_eq!(ingredient.quantity_reserved, Some(ingredient.quantity_planned));
    }

    // Double start is rejected
    let err = service.start(order.id, &staff).await.unwrap_err();
    assert!(matches!(err, LedgerError::WrongState(_)));
}

#[tokio::test]
async fn complete_releases_unused_and_tracks_yield() {
    let env = setup().await;
    let (base, dough, sauce) = seed_bom(&env, 10.0, 10.0).await;
    let service = ProductionService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    let order = service.create(base, env.kitchen_id, 10.0, &staff).await.unwrap();
    service.start(order.id, &staff).await.unwrap();

    // Used less dough than reserved (4.0 of 5.0); sauce as planned.
    let completed = service
        .complete(
            order.id,
            9.0,
            &[IngredientConsumption {
                item_id: dough,
                quantity: 4.0,
            }],
            &staff,
        )
        .await
        .unwrap();
    assert_eq!(completed.status, ProductionStatus::Completed);
    assert_eq!(completed.quantity_produced, Some(9.0));
    // Yield variance = produced - requested
    assert_eq!(completed.yield_variance, Some(-1.0));

    // The exact unused difference came back: 5.0 + 1.0
    assert_eq!(stock_of(&env, dough, env.kitchen_id).await, 6.0);
    assert_eq!(stock_of(&env, sauce, env.kitchen_id).await, 8.0);
    // Finished goods in stock
    assert_eq!(stock_of(&env, base, env.kitchen_id).await, 9.0);

    // 4.0 x 2.00 + 2.0 x 5.00 = 18.00 moved from raw to finished goods
    let entries = env
        .state
        .finance()
        .entries_for_reference(&format!("production:{}", order.id))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 18.0);
    assert_eq!(entries[0].debit_account, accounts::FINISHED_GOODS);
    assert_eq!(entries[0].credit_account, accounts::INVENTORY);

    // Completed is terminal: cancel is rejected
    let err = service.cancel(order.id, &staff).await.unwrap_err();
    assert!(matches!(err, LedgerError::WrongState(_)));
}

#[tokio::test]
async fn over_consumption_is_deducted_and_logged_as_waste() {
    let env = setup().await;
    let (base, dough, sauce) = seed_bom(&env, 10.0, 10.0).await;
    let service = ProductionService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    let order = service.create(base, env.kitchen_id, 10.0, &staff).await.unwrap();
    service.start(order.id, &staff).await.unwrap();

    // Burnt a batch: 6.0 dough against 5.0 reserved.
    service
        .complete(
            order.id,
            10.0,
            &[IngredientConsumption {
                item_id: dough,
                quantity: 6.0,
            }],
            &staff,
        )
        .await
        .unwrap();

    // The extra 1.0 came out of stock: 10 - 5 - 1
    assert_eq!(stock_of(&env, dough, env.kitchen_id).await, 4.0);
    assert_eq!(stock_of(&env, sauce, env.kitchen_id).await, 8.0);

    let entries = env
        .state
        .finance()
        .entries_for_reference(&format!("production:{}", order.id))
        .await
        .unwrap();
    // Completion entry + separate waste audit entry
    assert_eq!(entries.len(), 2);
    let waste = entries
        .iter()
        .find(|e| e.source == "production-waste")
        .unwrap();
    // 1.0 extra dough at 2.00
    assert_eq!(waste.amount, 2.0);
    assert_eq!(waste.debit_account, accounts::PRODUCTION_WASTE);
}

#[tokio::test]
async fn cancel_in_progress_releases_reservations() {
    let env = setup().await;
    let (base, dough, sauce) = seed_bom(&env, 10.0, 10.0).await;
    let service = ProductionService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);

    let order = service.create(base, env.kitchen_id, 10.0, &staff).await.unwrap();
    service.start(order.id, &staff).await.unwrap();
    assert_eq!(stock_of(&env, dough, env.kitchen_id).await, 5.0);

    let cancelled = service.cancel(order.id, &staff).await.unwrap();
    assert_eq!(cancelled.status, ProductionStatus::Cancelled);

    // Everything reserved came back; nothing was produced
    assert_eq!(stock_of(&env, dough, env.kitchen_id).await, 10.0);
    assert_eq!(stock_of(&env, sauce, env.kitchen_id).await, 10.0);
    assert_eq!(stock_of(&env, base, env.kitchen_id).await, 0.0);
}

#[tokio::test]
async fn create_rejects_items_without_bom() {
    let env = setup().await;
    let plain = seed_item(&env, "Salt", 0.5, env.kitchen_id, 10.0).await;
    let service = ProductionService::new(env.state.clone());

    let err = service
        .create(plain, env.kitchen_id, 5.0, &ctx(Role::Staff, env.branch_id))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}
