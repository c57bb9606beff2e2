//! Shared test harness: tempfile database, seeded branch/warehouses and
//! catalog helpers.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;

use ledger_core::db::DbService;
use ledger_core::db::repository::{branch, item, product, shift};
use ledger_core::fiscal::NullFiscalSink;
use ledger_core::{Config, LedgerState};
use shared::auth::{AuthContext, Role};
use shared::models::{Shift, ShiftCreate, WarehouseKind};

pub struct TestEnv {
    pub state: LedgerState,
    pub branch_id: i64,
    pub kitchen_id: i64,
    pub storage_id: i64,
    // Keeps the database file alive for the test's duration
    _dir: tempfile::TempDir,
}

/// Fresh database with one branch, a kitchen and a storage warehouse.
pub async fn setup() -> TestEnv {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db_path = dir.path().join("ledger-test.db");
    let db = DbService::new(&db_path.to_string_lossy())
        .await
        .expect("open test database");

    let config = Config {
        work_dir: dir.path().to_string_lossy().into_owned(),
        ..Config::default()
    };
    let state = LedgerState::with_pool(config, db.pool, Arc::new(NullFiscalSink))
        .expect("build ledger state");

    let mut conn = state.pool.acquire().await.unwrap();
    let b = branch::create_branch(&mut conn, "Main Branch").await.unwrap();
    let kitchen = branch::create_warehouse(&mut conn, b.id, "Kitchen", WarehouseKind::Kitchen)
        .await
        .unwrap();
    let storage = branch::create_warehouse(&mut conn, b.id, "Dry Storage", WarehouseKind::Storage)
        .await
        .unwrap();

    TestEnv {
        state,
        branch_id: b.id,
        kitchen_id: kitchen.id,
        storage_id: storage.id,
        _dir: dir,
    }
}

pub fn ctx(role: Role, branch_id: i64) -> AuthContext {
    AuthContext {
        user_id: "emp-1".into(),
        name: "Test Operator".into(),
        role,
        branch_id,
    }
}

pub async fn open_shift(env: &TestEnv) -> Shift {
    let mut conn = env.state.pool.acquire().await.unwrap();
    shift::create(
        &mut conn,
        ShiftCreate {
            branch_id: env.branch_id,
            operator_id: "emp-1".into(),
            operator_name: "Test Operator".into(),
            starting_cash: 100.0,
            note: None,
        },
    )
    .await
    .unwrap()
}

/// Seed an inventory item with stock in the given warehouse.
pub async fn seed_item(
    env: &TestEnv,
    name: &str,
    cost_price: f64,
    warehouse_id: i64,
    quantity: f64,
) -> i64 {
    let mut conn = env.state.pool.acquire().await.unwrap();
    let it = item::create_item(&mut conn, name, "kg", cost_price, false)
        .await
        .unwrap();
    if quantity > 0.0 {
        ledger_core::db::repository::stock::set_quantity(&mut conn, it.id, warehouse_id, quantity)
            .await
            .unwrap();
    }
    it.id
}

/// Seed a sellable product with a one-ingredient recipe.
pub async fn seed_product(
    env: &TestEnv,
    name: &str,
    price: f64,
    recipe: &[(i64, f64)],
) -> i64 {
    let mut conn = env.state.pool.acquire().await.unwrap();
    let p = product::create_product(&mut conn, name, price).await.unwrap();
    for (item_id, qty) in recipe {
        product::set_recipe_line(&mut conn, p.id, *item_id, *qty)
            .await
            .unwrap();
    }
    p.id
}

/// Current stock quantity.
pub async fn stock_of(env: &TestEnv, item_id: i64, warehouse_id: i64) -> f64 {
    let mut conn = env.state.pool.acquire().await.unwrap();
    ledger_core::db::repository::stock::quantity(&mut conn, item_id, warehouse_id)
        .await
        .unwrap()
}
