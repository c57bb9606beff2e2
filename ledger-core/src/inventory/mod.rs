//! Inventory Ledger (库存台账)
//!
//! Per-item-per-warehouse stock with an append-only movement log. Every
//! mutation runs inside one transaction so the stock projection and the
//! log always move together; deductions fail closed rather than driving
//! stock negative. Adjustments and transfers are idempotent by caller
//! reference id, independent of the generic idempotency ledger; this
//! guards offline/retry replays at the stock layer specifically.

use std::collections::BTreeMap;

use rust_decimal::prelude::*;
use sqlx::SqliteConnection;

use crate::core::{LedgerError, LedgerResult, LedgerState};
use crate::db::repository::{branch, item, purchase, stock};
use crate::finance::accounts;
use shared::auth::AuthContext;
use shared::models::{
    MovementType, NewJournalEntry, PurchaseOrder, StockAdjust, StockLevel, StockTransfer,
    WasteInput,
};

/// Comparison tolerance for stock quantities
const QTY_EPSILON: f64 = 1e-9;

/// Inventory Ledger service
#[derive(Clone, Debug)]
pub struct InventoryService {
    state: LedgerState,
}

impl InventoryService {
    pub fn new(state: LedgerState) -> Self {
        Self { state }
    }

    /// Overwrite the absolute quantity of (item, warehouse).
    ///
    /// Computes `delta = new - previous`; only a non-zero delta appends a
    /// movement and triggers a financial entry sized at
    /// `|delta| x cost_price` (loss pairs COGS/inventory, gain the
    /// reverse). Replaying a reference id that already produced a
    /// movement is a no-op.
    pub async fn adjust(&self, input: StockAdjust, ctx: &AuthContext) -> LedgerResult<StockLevel> {
        if !input.new_quantity.is_finite() || input.new_quantity < 0.0 {
            return Err(LedgerError::Validation(format!(
                "Adjusted quantity must be non-negative, got {}",
                input.new_quantity
            )));
        }
        if input.reason.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Adjustment reason is required".into(),
            ));
        }

        let mut tx = self.state.pool.begin().await?;

        let warehouse = branch::find_warehouse(&mut tx, input.warehouse_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Warehouse {} not found", input.warehouse_id))
            })?;
        let stock_item = item::find_item(&mut tx, input.item_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Inventory item {} not found", input.item_id))
            })?;

        // Replay guard: the reference already produced this adjustment.
        if let Some(reference) = input.reference_id.as_deref() {
            if stock::movement_exists(&mut tx, reference, MovementType::Adjustment).await? {
                tracing::debug!(reference, "Adjustment already applied, replay is a no-op");
                let level = stock::level(&mut tx, input.item_id, input.warehouse_id).await?;
                return Ok(level);
            }
        }

        let previous = stock::quantity(&mut tx, input.item_id, input.warehouse_id).await?;
        let delta = input.new_quantity - previous;

        stock::set_quantity(&mut tx, input.item_id, input.warehouse_id, input.new_quantity)
            .await?;

        let mut movement_id = None;
        if delta.abs() > QTY_EPSILON {
            let (from_wh, to_wh) = if delta < 0.0 {
                (Some(input.warehouse_id), None)
            } else {
                (None, Some(input.warehouse_id))
            };
            let id = stock::insert_movement(
                &mut tx,
                stock::NewMovement {
                    item_id: input.item_id,
                    from_warehouse_id: from_wh,
                    to_warehouse_id: to_wh,
                    quantity: delta.abs(),
                    movement_type: MovementType::Adjustment,
                    reason: Some(input.reason.as_str()),
                    reference_id: input.reference_id.as_deref(),
                    actor_id: &ctx.user_id,
                },
            )
            .await?;
            movement_id = Some(id);
        }

        tx.commit().await?;

        if let Some(movement_id) = movement_id {
            let amount = money_amount(delta.abs(), stock_item.cost_price);
            let reference = input
                .reference_id
                .clone()
                .unwrap_or_else(|| format!("movement:{movement_id}"));
            let (debit, credit, source, kind) = if delta < 0.0 {
                (accounts::COGS, accounts::INVENTORY, "inventory-adjustment", "loss")
            } else {
                (
                    accounts::INVENTORY,
                    accounts::COGS,
                    "inventory-adjustment-reversal",
                    "gain",
                )
            };
            if amount > 0.0 {
                self.state
                    .post_journal(NewJournalEntry {
                        description: format!(
                            "Stock adjustment {kind}: {} ({})",
                            stock_item.name, input.reason
                        ),
                        amount,
                        debit_account: debit.to_string(),
                        credit_account: credit.to_string(),
                        reference_id: Some(reference),
                        source: source.to_string(),
                        metadata: Some(serde_json::json!({
                            "item_id": input.item_id,
                            "warehouse_id": input.warehouse_id,
                            "delta": delta,
                        })),
                    })
                    .await;
            }

            self.state.notifications.publish(
                warehouse.branch_id,
                "stock",
                "adjusted",
                &format!("{}:{}", input.item_id, input.warehouse_id),
                Some(&serde_json::json!({
                    "item_id": input.item_id,
                    "warehouse_id": input.warehouse_id,
                    "quantity": input.new_quantity,
                })),
            );
        }

        Ok(StockLevel {
            item_id: input.item_id,
            warehouse_id: input.warehouse_id,
            quantity: input.new_quantity,
        })
    }

    /// Move quantity between two warehouses as one atomic unit.
    ///
    /// Total quantity is conserved; the source must hold enough stock.
    /// Idempotent by reference id.
    pub async fn transfer(&self, input: StockTransfer, ctx: &AuthContext) -> LedgerResult<()> {
        if input.from_warehouse_id == input.to_warehouse_id {
            return Err(LedgerError::Validation(
                "Transfer source and destination must differ".into(),
            ));
        }
        if !input.quantity.is_finite() || input.quantity <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "Transfer quantity must be positive, got {}",
                input.quantity
            )));
        }

        let mut tx = self.state.pool.begin().await?;

        let from = branch::find_warehouse(&mut tx, input.from_warehouse_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Warehouse {} not found", input.from_warehouse_id))
            })?;
        branch::find_warehouse(&mut tx, input.to_warehouse_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Warehouse {} not found", input.to_warehouse_id))
            })?;
        item::find_item(&mut tx, input.item_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Inventory item {} not found", input.item_id))
            })?;

        if let Some(reference) = input.reference_id.as_deref() {
            if stock::movement_exists(&mut tx, reference, MovementType::Transfer).await? {
                tracing::debug!(reference, "Transfer already applied, replay is a no-op");
                return Ok(());
            }
        }

        let available = stock::quantity(&mut tx, input.item_id, input.from_warehouse_id).await?;
        if available + QTY_EPSILON < input.quantity {
            return Err(LedgerError::InsufficientStock {
                item_id: input.item_id,
                warehouse_id: input.from_warehouse_id,
                available,
                requested: input.quantity,
            });
        }

        stock::add_quantity(&mut tx, input.item_id, input.from_warehouse_id, -input.quantity)
            .await?;
        stock::add_quantity(&mut tx, input.item_id, input.to_warehouse_id, input.quantity)
            .await?;
        stock::insert_movement(
            &mut tx,
            stock::NewMovement {
                item_id: input.item_id,
                from_warehouse_id: Some(input.from_warehouse_id),
                to_warehouse_id: Some(input.to_warehouse_id),
                quantity: input.quantity,
                movement_type: MovementType::Transfer,
                reason: input.reason.as_deref(),
                reference_id: input.reference_id.as_deref(),
                actor_id: &ctx.user_id,
            },
        )
        .await?;

        tx.commit().await?;

        self.state.notifications.publish(
            from.branch_id,
            "stock",
            "transferred",
            &format!("{}", input.item_id),
            Some(&serde_json::json!({
                "item_id": input.item_id,
                "from_warehouse_id": input.from_warehouse_id,
                "to_warehouse_id": input.to_warehouse_id,
                "quantity": input.quantity,
            })),
        );
        Ok(())
    }

    /// Write off spoiled/broken stock. Fails closed on insufficient
    /// quantity; posts the loss at cost.
    pub async fn record_waste(&self, input: WasteInput, ctx: &AuthContext) -> LedgerResult<()> {
        if !input.quantity.is_finite() || input.quantity <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "Waste quantity must be positive, got {}",
                input.quantity
            )));
        }
        if input.reason.trim().is_empty() {
            return Err(LedgerError::Validation("Waste reason is required".into()));
        }

        let mut tx = self.state.pool.begin().await?;

        let warehouse = branch::find_warehouse(&mut tx, input.warehouse_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Warehouse {} not found", input.warehouse_id))
            })?;
        let stock_item = item::find_item(&mut tx, input.item_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Inventory item {} not found", input.item_id))
            })?;

        if let Some(reference) = input.reference_id.as_deref() {
            if stock::movement_exists(&mut tx, reference, MovementType::Waste).await? {
                tracing::debug!(reference, "Waste already recorded, replay is a no-op");
                return Ok(());
            }
        }

        let available = stock::quantity(&mut tx, input.item_id, input.warehouse_id).await?;
        if available + QTY_EPSILON < input.quantity {
            return Err(LedgerError::InsufficientStock {
                item_id: input.item_id,
                warehouse_id: input.warehouse_id,
                available,
                requested: input.quantity,
            });
        }

        stock::add_quantity(&mut tx, input.item_id, input.warehouse_id, -input.quantity).await?;
        let movement_id = stock::insert_movement(
            &mut tx,
            stock::NewMovement {
                item_id: input.item_id,
                from_warehouse_id: Some(input.warehouse_id),
                to_warehouse_id: None,
                quantity: input.quantity,
                movement_type: MovementType::Waste,
                reason: Some(input.reason.as_str()),
                reference_id: input.reference_id.as_deref(),
                actor_id: &ctx.user_id,
            },
        )
        .await?;

        tx.commit().await?;

        let amount = money_amount(input.quantity, stock_item.cost_price);
        if amount > 0.0 {
            self.state
                .post_journal(NewJournalEntry {
                    description: format!("Waste write-off: {} ({})", stock_item.name, input.reason),
                    amount,
                    debit_account: accounts::COGS.to_string(),
                    credit_account: accounts::INVENTORY.to_string(),
                    reference_id: Some(
                        input
                            .reference_id
                            .clone()
                            .unwrap_or_else(|| format!("movement:{movement_id}")),
                    ),
                    source: "inventory-waste".to_string(),
                    metadata: None,
                })
                .await;
        }

        self.state.notifications.publish(
            warehouse.branch_id,
            "stock",
            "waste_recorded",
            &format!("{}:{}", input.item_id, input.warehouse_id),
            None::<&()>,
        );
        Ok(())
    }

    /// Receive a PENDING purchase order: add every line to stock with a
    /// PURCHASE movement, then post inventory against accounts payable.
    /// Replaying an already-received PO is a no-op.
    pub async fn receive_purchase_order(
        &self,
        purchase_order_id: i64,
        ctx: &AuthContext,
    ) -> LedgerResult<PurchaseOrder> {
        let mut tx = self.state.pool.begin().await?;

        let po = purchase::find_by_id(&mut tx, purchase_order_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Purchase order {purchase_order_id} not found"))
            })?;

        if !purchase::mark_received(&mut tx, purchase_order_id).await? {
            return match po.status {
                shared::models::PurchaseStatus::Received => {
                    tracing::debug!(purchase_order_id, "Purchase order already received");
                    Ok(po)
                }
                _ => Err(LedgerError::WrongState(format!(
                    "Purchase order {purchase_order_id} is {:?}",
                    po.status
                ))),
            };
        }

        let warehouse = branch::find_warehouse(&mut tx, po.warehouse_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Warehouse {} not found", po.warehouse_id))
            })?;

        let lines = purchase::items_for(&mut tx, purchase_order_id).await?;
        let mut total_cost = Decimal::ZERO;
        for line in &lines {
            stock::add_quantity(&mut tx, line.item_id, po.warehouse_id, line.quantity).await?;
            stock::insert_movement(
                &mut tx,
                stock::NewMovement {
                    item_id: line.item_id,
                    from_warehouse_id: None,
                    to_warehouse_id: Some(po.warehouse_id),
                    quantity: line.quantity,
                    movement_type: MovementType::Purchase,
                    reason: Some(&po.supplier_name),
                    reference_id: Some(&format!("po:{purchase_order_id}")),
                    actor_id: &ctx.user_id,
                },
            )
            .await?;
            total_cost += decimal(line.quantity) * decimal(line.unit_cost);
        }

        tx.commit().await?;

        let amount = round_money(total_cost);
        if amount > 0.0 {
            self.state
                .post_journal(NewJournalEntry {
                    description: format!(
                        "Purchase receipt from {} (PO {purchase_order_id})",
                        po.supplier_name
                    ),
                    amount,
                    debit_account: accounts::INVENTORY.to_string(),
                    credit_account: accounts::ACCOUNTS_PAYABLE.to_string(),
                    reference_id: Some(format!("po:{purchase_order_id}")),
                    source: "purchase-receipt".to_string(),
                    metadata: None,
                })
                .await;
        }

        self.state.notifications.publish(
            warehouse.branch_id,
            "purchase_order",
            "received",
            &purchase_order_id.to_string(),
            None::<&()>,
        );

        let mut conn = self.state.pool.acquire().await?;
        purchase::find_by_id(&mut conn, purchase_order_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Purchase order {purchase_order_id} not found"))
            })
    }
}

/// Deduct aggregated ingredient requirements inside the caller's order
/// transaction. All-or-nothing: the first shortfall fails the whole
/// transaction, leaving stock untouched.
pub(crate) async fn deduct_ingredients(
    conn: &mut SqliteConnection,
    order_id: &str,
    warehouse_id: i64,
    requirements: &BTreeMap<i64, f64>,
    actor_id: &str,
) -> LedgerResult<()> {
    for (&item_id, &required) in requirements {
        if required <= QTY_EPSILON {
            continue;
        }
        let available = stock::quantity(conn, item_id, warehouse_id).await?;
        if available + QTY_EPSILON < required {
            return Err(LedgerError::InsufficientStock {
                item_id,
                warehouse_id,
                available,
                requested: required,
            });
        }
        stock::add_quantity(conn, item_id, warehouse_id, -required).await?;
        stock::insert_movement(
            conn,
            stock::NewMovement {
                item_id,
                from_warehouse_id: Some(warehouse_id),
                to_warehouse_id: None,
                quantity: required,
                movement_type: MovementType::PosSale,
                reason: None,
                reference_id: Some(&format!("order:{order_id}")),
                actor_id,
            },
        )
        .await?;
    }
    Ok(())
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// `quantity x cost` rounded to cents.
fn money_amount(quantity: f64, cost_price: f64) -> f64 {
    round_money(decimal(quantity) * decimal(cost_price))
}

fn round_money(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}
