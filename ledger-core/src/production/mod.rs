//! Production Engine (生产引擎)
//!
//! Converts a bill-of-materials into reserved-then-consumed ingredient
//! movements and a finished-goods movement, tracking yield variance.
//!
//! Lifecycle: PENDING (no stock touched) -> IN_PROGRESS (ingredients
//! deducted and snapshotted as reserved) -> COMPLETED (finished good
//! added, reserved/actual variance settled) or CANCELLED (reservations
//! released). COMPLETED and CANCELLED are terminal.

use rust_decimal::prelude::*;

use crate::core::{LedgerError, LedgerResult, LedgerState};
use crate::db::repository::{branch, item, production, stock};
use crate::finance::accounts;
use shared::auth::AuthContext;
use shared::models::{
    IngredientConsumption, MovementType, NewJournalEntry, ProductionIngredient, ProductionOrder,
    ProductionStatus,
};

const QTY_EPSILON: f64 = 1e-9;

/// Production Engine service
#[derive(Clone, Debug)]
pub struct ProductionService {
    state: LedgerState,
}

impl ProductionService {
    pub fn new(state: LedgerState) -> Self {
        Self { state }
    }

    /// Create a PENDING production order: expand the target item's BOM by
    /// the requested quantity into a planned consumption list. No stock
    /// is touched yet.
    pub async fn create(
        &self,
        target_item_id: i64,
        warehouse_id: i64,
        quantity_requested: f64,
        _ctx: &AuthContext,
    ) -> LedgerResult<ProductionOrder> {
        if !quantity_requested.is_finite() || quantity_requested <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "Requested quantity must be positive, got {quantity_requested}"
            )));
        }

        let mut tx = self.state.pool.begin().await?;

        let target = item::find_item(&mut tx, target_item_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Inventory item {target_item_id} not found"))
            })?;
        let warehouse = branch::find_warehouse(&mut tx, warehouse_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Warehouse {warehouse_id} not found")))?;

        let bom = item::bom_for(&mut tx, target_item_id).await?;
        if bom.is_empty() {
            return Err(LedgerError::Validation(format!(
                "Item {} has no bill of materials",
                target.name
            )));
        }

        let batch_number = format!(
            "B{}-{}",
            chrono::Utc::now().format("%Y%m%d"),
            shared::util::snowflake_id() % 100_000
        );
        let order = production::insert(
            &mut tx,
            target_item_id,
            warehouse_id,
            quantity_requested,
            &batch_number,
        )
        .await?;

        for component in &bom {
            production::insert_ingredient(
                &mut tx,
                order.id,
                component.component_item_id,
                component.quantity * quantity_requested,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            production_order_id = order.id,
            target = %target.name,
            quantity = quantity_requested,
            batch = %batch_number,
            "Production order created"
        );
        self.state.notifications.publish(
            warehouse.branch_id,
            "production_order",
            "created",
            &order.id.to_string(),
            Some(&order),
        );
        Ok(order)
    }

    /// Start a PENDING order: verify and deduct every planned ingredient
    /// from the order's warehouse in one transaction (a partial
    /// reservation is never left in place) and snapshot the reserved
    /// quantities.
    pub async fn start(&self, id: i64, ctx: &AuthContext) -> LedgerResult<ProductionOrder> {
        let mut tx = self.state.pool.begin().await?;

        let order = production::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Production order {id} not found")))?;
        if order.status != ProductionStatus::Pending {
            return Err(LedgerError::WrongState(format!(
                "Production order {id} is {:?}, expected PENDING",
                order.status
            )));
        }

        let reference = format!("production:{id}");
        for ingredient in production::ingredients_for(&mut tx, id).await? {
            let required = ingredient.quantity_planned;
            let available = stock::quantity(&mut tx, ingredient.item_id, order.warehouse_id).await?;
            if available + QTY_EPSILON < required {
                // Whole transaction rolls back: nothing stays reserved.
                return Err(LedgerError::InsufficientStock {
                    item_id: ingredient.item_id,
                    warehouse_id: order.warehouse_id,
                    available,
                    requested: required,
                });
            }
            stock::add_quantity(&mut tx, ingredient.item_id, order.warehouse_id, -required).await?;
            stock::insert_movement(
                &mut tx,
                stock::NewMovement {
                    item_id: ingredient.item_id,
                    from_warehouse_id: Some(order.warehouse_id),
                    to_warehouse_id: None,
                    quantity: required,
                    movement_type: MovementType::ProductionOut,
                    reason: Some(&order.batch_number),
                    reference_id: Some(&reference),
                    actor_id: &ctx.user_id,
                },
            )
            .await?;
            production::set_reserved(&mut tx, id, ingredient.item_id, required).await?;
        }

        production::mark_started(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(production_order_id = id, "Production order started");
        self.notify_status(&order, "started").await;
        self.reload(id).await
    }

    /// Complete an IN_PROGRESS order.
    ///
    /// For every ingredient in the reserved or reported-actual set:
    /// over-consumption is deducted from stock (fail closed) and
    /// accumulated as waste cost; under-consumption is released back.
    /// The produced quantity is added to stock, yield variance is
    /// `produced - requested`, and the total actual ingredient cost moves
    /// from raw-material to finished-goods inventory.
    pub async fn complete(
        &self,
        id: i64,
        quantity_produced: f64,
        actual_consumption: &[IngredientConsumption],
        ctx: &AuthContext,
    ) -> LedgerResult<ProductionOrder> {
        if !quantity_produced.is_finite() || quantity_produced < 0.0 {
            return Err(LedgerError::Validation(format!(
                "Produced quantity must be non-negative, got {quantity_produced}"
            )));
        }
        for consumption in actual_consumption {
            if !consumption.quantity.is_finite() || consumption.quantity < 0.0 {
                return Err(LedgerError::Validation(format!(
                    "Actual consumption must be non-negative for item {}",
                    consumption.item_id
                )));
            }
        }

        let mut tx = self.state.pool.begin().await?;

        let order = production::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Production order {id} not found")))?;
        if order.status != ProductionStatus::InProgress {
            return Err(LedgerError::WrongState(format!(
                "Production order {id} is {:?}, expected IN_PROGRESS",
                order.status
            )));
        }

        // Reserved snapshot; ingredients not mentioned in the actual set
        // are taken as consumed exactly as reserved.
        let reserved: Vec<ProductionIngredient> = production::ingredients_for(&mut tx, id).await?;
        let mut actuals: std::collections::BTreeMap<i64, f64> = reserved
            .iter()
            .map(|i| (i.item_id, i.quantity_reserved.unwrap_or(0.0)))
            .collect();
        for consumption in actual_consumption {
            actuals.insert(consumption.item_id, consumption.quantity);
        }
        let reserved_by_item: std::collections::BTreeMap<i64, f64> = reserved
            .iter()
            .map(|i| (i.item_id, i.quantity_reserved.unwrap_or(0.0)))
            .collect();

        let mut total_cost = Decimal::ZERO;
        let mut waste_cost = Decimal::ZERO;

        for (&item_id, &actual) in &actuals {
            let reserved_qty = reserved_by_item.get(&item_id).copied().unwrap_or(0.0);
            let ingredient = item::find_item(&mut tx, item_id).await?.ok_or_else(|| {
                LedgerError::NotFound(format!("Inventory item {item_id} not found"))
            })?;
            let cost = Decimal::from_f64(ingredient.cost_price).unwrap_or(Decimal::ZERO);

            if actual > reserved_qty + QTY_EPSILON {
                // Consumed beyond the reservation: deduct the extra now.
                let extra = actual - reserved_qty;
                let available = stock::quantity(&mut tx, item_id, order.warehouse_id).await?;
                if available + QTY_EPSILON < extra {
                    return Err(LedgerError::InsufficientStock {
                        item_id,
                        warehouse_id: order.warehouse_id,
                        available,
                        requested: extra,
                    });
                }
                stock::add_quantity(&mut tx, item_id, order.warehouse_id, -extra).await?;
                stock::insert_movement(
                    &mut tx,
                    stock::NewMovement {
                        item_id,
                        from_warehouse_id: Some(order.warehouse_id),
                        to_warehouse_id: None,
                        quantity: extra,
                        movement_type: MovementType::ProductionOut,
                        reason: Some("over-consumption"),
                        reference_id: Some(&format!("production:{id}:extra")),
                        actor_id: &ctx.user_id,
                    },
                )
                .await?;
                waste_cost += Decimal::from_f64(extra).unwrap_or(Decimal::ZERO) * cost;
            } else if actual + QTY_EPSILON < reserved_qty {
                // Consumed less than reserved: release the difference.
                let release = reserved_qty - actual;
                stock::add_quantity(&mut tx, item_id, order.warehouse_id, release).await?;
                stock::insert_movement(
                    &mut tx,
                    stock::NewMovement {
                        item_id,
                        from_warehouse_id: None,
                        to_warehouse_id: Some(order.warehouse_id),
                        quantity: release,
                        movement_type: MovementType::ProductionIn,
                        reason: Some("unused reservation released"),
                        reference_id: Some(&format!("production:{id}:release")),
                        actor_id: &ctx.user_id,
                    },
                )
                .await?;
            }

            production::set_actual(&mut tx, id, item_id, actual).await?;
            total_cost += Decimal::from_f64(actual).unwrap_or(Decimal::ZERO) * cost;
        }

        // Finished goods into stock.
        if quantity_produced > QTY_EPSILON {
            stock::add_quantity(&mut tx, order.target_item_id, order.warehouse_id, quantity_produced)
                .await?;
            stock::insert_movement(
                &mut tx,
                stock::NewMovement {
                    item_id: order.target_item_id,
                    from_warehouse_id: None,
                    to_warehouse_id: Some(order.warehouse_id),
                    quantity: quantity_produced,
                    movement_type: MovementType::ProductionIn,
                    reason: Some(&order.batch_number),
                    reference_id: Some(&format!("production:{id}:output")),
                    actor_id: &ctx.user_id,
                },
            )
            .await?;
        }

        let yield_variance = quantity_produced - order.quantity_requested;
        production::mark_completed(&mut tx, id, quantity_produced, yield_variance).await?;
        tx.commit().await?;

        tracing::info!(
            production_order_id = id,
            produced = quantity_produced,
            yield_variance,
            "Production order completed"
        );

        // Post-commit: move actual ingredient cost into finished goods.
        let amount = round_money(total_cost);
        if amount > 0.0 {
            self.state
                .post_journal(NewJournalEntry {
                    description: format!("Production completion (batch {})", order.batch_number),
                    amount,
                    debit_account: accounts::FINISHED_GOODS.to_string(),
                    credit_account: accounts::INVENTORY.to_string(),
                    reference_id: Some(format!("production:{id}")),
                    source: "production-completion".to_string(),
                    metadata: Some(serde_json::json!({
                        "target_item_id": order.target_item_id,
                        "quantity_produced": quantity_produced,
                        "yield_variance": yield_variance,
                    })),
                })
                .await;
        }
        // Over-consumption is an audit fact of its own, never blocking.
        let waste = round_money(waste_cost);
        if waste > 0.0 {
            self.state
                .post_journal(NewJournalEntry {
                    description: format!(
                        "Production over-consumption (batch {})",
                        order.batch_number
                    ),
                    amount: waste,
                    debit_account: accounts::PRODUCTION_WASTE.to_string(),
                    credit_account: accounts::FINISHED_GOODS.to_string(),
                    reference_id: Some(format!("production:{id}")),
                    source: "production-waste".to_string(),
                    metadata: None,
                })
                .await;
        }

        self.notify_status(&order, "completed").await;
        self.reload(id).await
    }

    /// Cancel a PENDING or IN_PROGRESS order; a started order gets its
    /// reserved ingredients released back with reversing movements.
    pub async fn cancel(&self, id: i64, ctx: &AuthContext) -> LedgerResult<ProductionOrder> {
        let mut tx = self.state.pool.begin().await?;

        let order = production::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Production order {id} not found")))?;
        if order.status.is_terminal() {
            return Err(LedgerError::WrongState(format!(
                "Production order {id} is {:?} and cannot be cancelled",
                order.status
            )));
        }

        if order.status == ProductionStatus::InProgress {
            for ingredient in production::ingredients_for(&mut tx, id).await? {
                let reserved_qty = ingredient.quantity_reserved.unwrap_or(0.0);
                if reserved_qty <= QTY_EPSILON {
                    continue;
                }
                stock::add_quantity(&mut tx, ingredient.item_id, order.warehouse_id, reserved_qty)
                    .await?;
                stock::insert_movement(
                    &mut tx,
                    stock::NewMovement {
                        item_id: ingredient.item_id,
                        from_warehouse_id: None,
                        to_warehouse_id: Some(order.warehouse_id),
                        quantity: reserved_qty,
                        movement_type: MovementType::ProductionIn,
                        reason: Some("cancelled, reservation released"),
                        reference_id: Some(&format!("production:{id}:cancel")),
                        actor_id: &ctx.user_id,
                    },
                )
                .await?;
            }
        }

        production::mark_cancelled(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(production_order_id = id, "Production order cancelled");
        self.notify_status(&order, "cancelled").await;
        self.reload(id).await
    }

    pub async fn get(&self, id: i64) -> LedgerResult<Option<ProductionOrder>> {
        let mut conn = self.state.pool.acquire().await?;
        Ok(production::find_by_id(&mut conn, id).await?)
    }

    pub async fn ingredients(&self, id: i64) -> LedgerResult<Vec<ProductionIngredient>> {
        let mut conn = self.state.pool.acquire().await?;
        Ok(production::ingredients_for(&mut conn, id).await?)
    }

    async fn reload(&self, id: i64) -> LedgerResult<ProductionOrder> {
        self.get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Production order {id} not found")))
    }

    async fn notify_status(&self, order: &ProductionOrder, action: &str) {
        let branch_id = {
            let mut conn = match self.state.pool.acquire().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            match branch::find_warehouse(&mut conn, order.warehouse_id).await {
                Ok(Some(warehouse)) => warehouse.branch_id,
                _ => return,
            }
        };
        self.state.notifications.publish(
            branch_id,
            "production_order",
            action,
            &order.id.to_string(),
            None::<&()>,
        );
    }
}

fn round_money(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}
