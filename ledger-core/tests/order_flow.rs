//! Order creation and status lifecycle against a real database.

mod common;

use common::{ctx, open_shift, seed_item, seed_product, setup, stock_of};
use ledger_core::finance::accounts;
use ledger_core::orders::OrderService;
use ledger_core::{LedgerError, LedgerState};
use shared::auth::Role;
use shared::models::{CreateOrderInput, OrderItemInput, OrderStatus, OrderType, PaymentInput};

fn dine_in_input(branch_id: i64, product_id: i64, quantity: i32) -> CreateOrderInput {
    CreateOrderInput {
        branch_id,
        order_type: OrderType::DineIn,
        table_id: Some("T1".into()),
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

async fn shift_expected_cash(state: &LedgerState, shift_id: i64) -> f64 {
    let mut conn = state.pool.acquire().await.unwrap();
    ledger_core::db::repository::shift::find_by_id(&mut conn, shift_id)
        .await
        .unwrap()
        .unwrap()
        .expected_cash
}

#[tokio::test]
async fn dine_in_order_recomputes_totals_server_side() {
    let env = setup().await;
    open_shift(&env).await;
    let flour = seed_item(&env, "Flour", 0.8, env.kitchen_id, 50.0).await;
    let pizza = seed_product(&env, "Pizza", 10.0, &[(flour, 0.3)]).await;

    let service = OrderService::new(env.state.clone());
    let created = service
        .create_order(dine_in_input(env.branch_id, pizza, 2), &ctx(Role::Staff, env.branch_id), None)
        .await
        .unwrap();

    // 2 x 10.00: subtotal 20.00, tax 2.80 (14%), service 2.40 (12%), total 25.20
    let order = &created.detail.order;
    assert_eq!(order.subtotal, 20.0);
    assert_eq!(order.tax, 2.8);
    assert_eq!(order.service_charge, 2.4);
    assert_eq!(order.total, 25.2);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(created.status, 201);
    assert!(!created.replayed);

    // Ingredients deducted from the kitchen warehouse: 2 x 0.3
    assert!((stock_of(&env, flour, env.kitchen_id).await - 49.4).abs() < 1e-9);

    // One status-history row for the initial state
    let history = service.status_history(&order.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].to_status, OrderStatus::Pending);
    assert_eq!(history[0].from_status, None);

    // POS sale posted: balanced entry debiting cash, crediting revenue
    let entries = env
        .state
        .finance()
        .entries_for_reference(&order.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 25.2);
    assert_eq!(entries[0].debit_account, accounts::CASH);
    assert_eq!(entries[0].credit_account, accounts::REVENUE);
}

#[tokio::test]
async fn order_without_open_shift_is_rejected() {
    let env = setup().await;
    let flour = seed_item(&env, "Flour", 0.8, env.kitchen_id, 50.0).await;
    let pizza = seed_product(&env, "Pizza", 10.0, &[(flour, 0.3)]).await;

    let service = OrderService::new(env.state.clone());
    let err = service
        .create_order(dine_in_input(env.branch_id, pizza, 1), &ctx(Role::Staff, env.branch_id), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ShiftRequired { .. }));

    // Nothing was deducted
    assert_eq!(stock_of(&env, flour, env.kitchen_id).await, 50.0);
}

#[tokio::test]
async fn insufficient_ingredients_roll_back_the_whole_order() {
    let env = setup().await;
    open_shift(&env).await;
    let flour = seed_item(&env, "Flour", 0.8, env.kitchen_id, 0.1).await;
    let pizza = seed_product(&env, "Pizza", 10.0, &[(flour, 0.3)]).await;

    let service = OrderService::new(env.state.clone());
    let err = service
        .create_order(dine_in_input(env.branch_id, pizza, 1), &ctx(Role::Staff, env.branch_id), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }));

    // Stock untouched, no order rows survive
    assert_eq!(stock_of(&env, flour, env.kitchen_id).await, 0.1);
}

#[tokio::test]
async fn cash_payment_feeds_the_shift_drawer() {
    let env = setup().await;
    let shift = open_shift(&env).await;
    let flour = seed_item(&env, "Flour", 0.8, env.kitchen_id, 50.0).await;
    let pizza = seed_product(&env, "Pizza", 10.0, &[(flour, 0.3)]).await;

    let mut input = dine_in_input(env.branch_id, pizza, 2);
    input.payments = vec![PaymentInput {
        method: "CASH".into(),
        amount: 25.2,
    }];

    let service = OrderService::new(env.state.clone());
    let created = service
        .create_order(input, &ctx(Role::Staff, env.branch_id), None)
        .await
        .unwrap();

    // Deterministic synthetic payment id
    assert_eq!(
        created.detail.payments[0].id,
        format!("{}:p0", created.detail.order.id)
    );
    // starting 100.00 + 25.20 cash
    assert!((shift_expected_cash(&env.state, shift.id).await - 125.2).abs() < 0.005);
}

#[tokio::test]
async fn status_transitions_follow_the_machine() {
    let env = setup().await;
    open_shift(&env).await;
    let flour = seed_item(&env, "Flour", 0.8, env.kitchen_id, 50.0).await;
    let pizza = seed_product(&env, "Pizza", 10.0, &[(flour, 0.3)]).await;

    let service = OrderService::new(env.state.clone());
    let created = service
        .create_order(dine_in_input(env.branch_id, pizza, 1), &ctx(Role::Staff, env.branch_id), None)
        .await
        .unwrap();
    let order_id = created.detail.order.id.clone();
    let staff = ctx(Role::Staff, env.branch_id);

    // PENDING -> DELIVERED is never legal
    let err = service
        .change_status(&order_id, OrderStatus::Delivered, None, None, &staff)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));

    // PENDING -> PREPARING -> READY by same-branch staff
    service
        .change_status(&order_id, OrderStatus::Preparing, None, None, &staff)
        .await
        .unwrap();
    let order = service
        .change_status(&order_id, OrderStatus::Ready, None, None, &staff)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Ready);

    // Staff cannot cancel; manager without reason cannot either
    let err = service
        .change_status(&order_id, OrderStatus::Cancelled, Some("burnt"), None, &staff)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::TransitionForbidden(_)));

    let manager = ctx(Role::Manager, env.branch_id);
    let err = service
        .change_status(&order_id, OrderStatus::Cancelled, None, None, &manager)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CancellationReasonRequired));

    // Manager with a reason succeeds; the reason is recorded
    let cancelled = service
        .change_status(&order_id, OrderStatus::Cancelled, Some("customer left"), None, &manager)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("customer left"));

    // Full audit trail: PENDING, PREPARING, READY, CANCELLED
    let history = service.status_history(&order_id).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].to_status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn stale_version_is_rejected_with_current_timestamp() {
    let env = setup().await;
    open_shift(&env).await;
    let flour = seed_item(&env, "Flour", 0.8, env.kitchen_id, 50.0).await;
    let pizza = seed_product(&env, "Pizza", 10.0, &[(flour, 0.3)]).await;

    let service = OrderService::new(env.state.clone());
    let created = service
        .create_order(dine_in_input(env.branch_id, pizza, 1), &ctx(Role::Staff, env.branch_id), None)
        .await
        .unwrap();
    let order_id = created.detail.order.id.clone();
    let staff = ctx(Role::Staff, env.branch_id);

    let current = service
        .change_status(&order_id, OrderStatus::Preparing, None, None, &staff)
        .await
        .unwrap()
        .updated_at;

    // A stale timestamp loses and learns the true current version
    let err = service
        .change_status(
            &order_id,
            OrderStatus::Ready,
            None,
            Some(current - 1),
            &staff,
        )
        .await
        .unwrap_err();
    match err {
        LedgerError::VersionConflict { current: reported } => assert_eq!(reported, current),
        other => panic!("expected version conflict, got {other:?}"),
    }

    // The matching timestamp wins
    service
        .change_status(&order_id, OrderStatus::Ready, None, Some(current), &staff)
        .await
        .unwrap();
}

#[tokio::test]
async fn cross_branch_staff_cannot_touch_orders() {
    let env = setup().await;
    open_shift(&env).await;
    let flour = seed_item(&env, "Flour", 0.8, env.kitchen_id, 50.0).await;
    let pizza = seed_product(&env, "Pizza", 10.0, &[(flour, 0.3)]).await;

    let service = OrderService::new(env.state.clone());
    let created = service
        .create_order(dine_in_input(env.branch_id, pizza, 1), &ctx(Role::Staff, env.branch_id), None)
        .await
        .unwrap();

    let foreign = ctx(Role::Manager, env.branch_id + 1);
    let err = service
        .change_status(
            &created.detail.order.id,
            OrderStatus::Preparing,
            None,
            None,
            &foreign,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ForbiddenBranchScope { .. }));
}

#[tokio::test]
async fn split_keeps_rates_and_merge_recombines() {
    let env = setup().await;
    open_shift(&env).await;
    let flour = seed_item(&env, "Flour", 0.8, env.kitchen_id, 50.0).await;
    let pizza = seed_product(&env, "Pizza", 10.0, &[(flour, 0.3)]).await;
    let cola = seed_product(&env, "Cola", 5.0, &[]).await;

    let service = OrderService::new(env.state.clone());
    let staff = ctx(Role::Staff, env.branch_id);
    let mut input = dine_in_input(env.branch_id, pizza, 2);
    input.items.push(OrderItemInput {
        product_id: cola,
        quantity: 2,
        unit_price: None,
        modifiers: None,
    });
    let created = service.create_order(input, &staff, None).await.unwrap();
    let source_id = created.detail.order.id.clone();
    let cola_item = created
        .detail
        .items
        .iter()
        .find(|i| i.product_id == cola)
        .unwrap()
        .id;

    // Split the colas off onto their own check
    let split = service.split_order(&source_id, &[cola_item], &staff).await.unwrap();
    assert_eq!(split.items.len(), 1);
    assert_eq!(split.order.subtotal, 10.0);
    // Rates held constant: 14% tax and 12% service on the moved share
    assert_eq!(split.order.tax, 1.4);
    assert_eq!(split.order.service_charge, 1.2);

    let source = service.get_detail(&source_id).await.unwrap();
    assert_eq!(source.order.subtotal, 20.0);
    assert_eq!(source.items.len(), 1);

    // Merge them back; source ends cancelled with a merge note
    let merged = service
        .merge_orders(&split.order.id, &source_id, &staff)
        .await
        .unwrap();
    assert_eq!(merged.order.subtotal, 30.0);
    assert_eq!(merged.items.len(), 2);

    let emptied = service.get_detail(&split.order.id).await.unwrap();
    assert_eq!(emptied.order.status, OrderStatus::Cancelled);
    assert!(emptied.items.is_empty());
}
