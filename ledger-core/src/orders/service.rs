//! Order Orchestrator
//!
//! Composes the idempotency ledger, shift binding, totals math, inventory
//! deduction, status machine and payment recording into one atomic
//! transaction per order-affecting request. After commit it triggers the
//! best-effort side effects: branch notification, POS-sale journal
//! posting and (for paid orders) deferred fiscal submission. Those may
//! fail independently without rolling back the committed transaction.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::core::{LedgerError, LedgerResult, LedgerState};
use crate::db::repository::{branch, order as order_repo, product, shift as shift_repo};
use crate::finance::accounts;
use crate::idempotency::{ClaimOutcome, IdempotencyLedger};
use crate::inventory;
use crate::orders::{money, status};
use shared::auth::AuthContext;
use shared::models::{
    CreateOrderInput, NewJournalEntry, Order, OrderDetail, OrderItem, OrderStatus, OrderType,
    PaymentRecord,
};
use shared::util::now_millis;

/// Idempotency scope guarding order creation
const SCOPE_CREATE_ORDER: &str = "orders:create";

/// Result of `create_order`, carrying replay information so the boundary
/// can answer with the original status code.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub detail: OrderDetail,
    pub status: u16,
    pub replayed: bool,
}

/// Order Orchestrator service
#[derive(Clone, Debug)]
pub struct OrderService {
    state: LedgerState,
    idempotency: IdempotencyLedger,
}

impl OrderService {
    pub fn new(state: LedgerState) -> Self {
        let idempotency = state.idempotency();
        Self { state, idempotency }
    }

    // ========== Creation ==========

    /// Create an order in one atomic transaction: bind to the branch's
    /// OPEN shift, recompute totals from line items, insert order rows,
    /// deduct ingredients from the kitchen warehouse, write the first
    /// status-history row and record payments.
    ///
    /// With an idempotency key, identical retries replay the stored
    /// response; a different payload under the same key is rejected.
    pub async fn create_order(
        &self,
        input: CreateOrderInput,
        ctx: &AuthContext,
        idempotency_key: Option<&str>,
    ) -> LedgerResult<CreatedOrder> {
        Self::validate_input(&input, ctx)?;

        if let Some(key) = idempotency_key {
            let payload = serde_json::to_value(&input)
                .map_err(|e| LedgerError::Validation(format!("Unserializable payload: {e}")))?;
            if let ClaimOutcome::Replay(stored) = self
                .idempotency
                .begin_claim(key, SCOPE_CREATE_ORDER, &payload)
                .await?
            {
                let detail: OrderDetail = serde_json::from_value(stored.body).map_err(|e| {
                    LedgerError::Database(format!("Corrupt stored order response: {e}"))
                })?;
                tracing::info!(order_id = %detail.order.id, "Order creation replayed from idempotency claim");
                return Ok(CreatedOrder {
                    detail,
                    status: stored.status,
                    replayed: true,
                });
            }
        }

        match self.create_order_tx(&input, ctx).await {
            Ok(detail) => {
                if let Some(key) = idempotency_key {
                    let body = serde_json::to_value(&detail).unwrap_or_default();
                    if let Err(e) = self
                        .idempotency
                        .complete_claim(key, SCOPE_CREATE_ORDER, 201, &detail.order.id, &body)
                        .await
                    {
                        tracing::warn!(error = %e, "Failed to complete idempotency claim");
                    }
                }
                self.after_create(&detail).await;
                Ok(CreatedOrder {
                    detail,
                    status: 201,
                    replayed: false,
                })
            }
            Err(e) => {
                // Clear the claim so the same key can be retried.
                if let Some(key) = idempotency_key {
                    if let Err(clear_err) =
                        self.idempotency.clear_claim(key, SCOPE_CREATE_ORDER).await
                    {
                        tracing::warn!(error = %clear_err, "Failed to clear idempotency claim");
                    }
                }
                Err(e)
            }
        }
    }

    fn validate_input(input: &CreateOrderInput, ctx: &AuthContext) -> LedgerResult<()> {
        if !ctx.can_access_branch(input.branch_id) {
            return Err(LedgerError::ForbiddenBranchScope {
                actor_branch: ctx.branch_id,
                order_branch: input.branch_id,
            });
        }
        if input.items.is_empty() {
            return Err(LedgerError::Validation(
                "Order requires at least one line item".into(),
            ));
        }
        if input.order_type == OrderType::DineIn && input.table_id.is_none() {
            return Err(LedgerError::Validation(
                "DINE_IN orders require a table".into(),
            ));
        }
        for payment in &input.payments {
            money::validate_payment(payment.amount)?;
            if payment.method.trim().is_empty() {
                return Err(LedgerError::Validation("Payment method is required".into()));
            }
        }
        Ok(())
    }

    async fn create_order_tx(
        &self,
        input: &CreateOrderInput,
        ctx: &AuthContext,
    ) -> LedgerResult<OrderDetail> {
        let mut tx = self.state.pool.begin().await?;

        // (a) Every order binds to exactly one OPEN shift.
        let shift = shift_repo::find_open_for_branch(&mut tx, input.branch_id)
            .await?
            .ok_or(LedgerError::ShiftRequired {
                branch_id: input.branch_id,
            })?;

        let kitchen = branch::find_kitchen_warehouse(&mut tx, input.branch_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "Branch {} has no active kitchen warehouse",
                    input.branch_id
                ))
            })?;

        // (b) Recompute totals from line items; snapshot product data and
        // aggregate ingredient requirements.
        let order_id = Uuid::new_v4().to_string();
        let now = now_millis();
        let mut items = Vec::with_capacity(input.items.len());
        let mut line_totals = Vec::with_capacity(input.items.len());
        let mut requirements: BTreeMap<i64, f64> = BTreeMap::new();

        for line in &input.items {
            let prod = product::find_product(&mut tx, line.product_id)
                .await?
                .ok_or_else(|| {
                    LedgerError::NotFound(format!("Product {} not found", line.product_id))
                })?;
            let unit_price = line.unit_price.unwrap_or(prod.price);
            money::validate_line(unit_price, line.quantity)?;
            let line_total = money::line_total(unit_price, line.quantity)?;
            line_totals.push(line_total);

            for recipe_line in product::recipe_for(&mut tx, prod.id).await? {
                *requirements.entry(recipe_line.item_id).or_insert(0.0) +=
                    recipe_line.quantity * line.quantity as f64;
            }

            items.push(OrderItem {
                id: 0, // assigned on insert
                order_id: order_id.clone(),
                product_id: prod.id,
                name: prod.name,
                unit_price,
                quantity: line.quantity,
                modifiers: line.modifiers.as_ref().map(|m| m.to_string()),
                line_total,
            });
        }

        let totals = money::compute_totals(
            &line_totals,
            input.discount.unwrap_or(0.0),
            input.order_type,
            input.delivery_fee.unwrap_or(0.0),
        )?;

        // (c) Insert order and line items.
        let order = Order {
            id: order_id.clone(),
            branch_id: input.branch_id,
            table_id: input.table_id.clone(),
            order_type: input.order_type,
            status: OrderStatus::Pending,
            shift_id: shift.id,
            subtotal: totals.subtotal,
            discount: totals.discount,
            tax: totals.tax,
            service_charge: totals.service_charge,
            delivery_fee: totals.delivery_fee,
            total: totals.total,
            note: input.note.clone(),
            cancel_reason: None,
            created_by: ctx.user_id.clone(),
            created_at: now,
            updated_at: now,
        };
        order_repo::insert(&mut tx, &order).await?;
        for item in &mut items {
            item.id = order_repo::insert_item(&mut tx, item).await?;
        }

        // (d) Deduct ingredients against the branch kitchen warehouse.
        inventory::deduct_ingredients(&mut tx, &order_id, kitchen.id, &requirements, &ctx.user_id)
            .await?;

        // (e) First status-history row.
        order_repo::insert_status_history(
            &mut tx,
            &order_id,
            None,
            OrderStatus::Pending,
            &ctx.user_id,
            &ctx.name,
            Some("Order created"),
        )
        .await?;

        // (f) Payments with deterministic synthetic ids; cash feeds the
        // shift's expected drawer amount.
        let mut payments = Vec::with_capacity(input.payments.len());
        for (n, payment) in input.payments.iter().enumerate() {
            let record = PaymentRecord {
                id: format!("{order_id}:p{n}"),
                order_id: order_id.clone(),
                method: payment.method.clone(),
                amount: payment.amount,
                created_at: now,
            };
            let inserted = order_repo::insert_payment(&mut tx, &record).await?;
            if inserted && payment.method.eq_ignore_ascii_case("cash") {
                shift_repo::add_cash_payment(&mut tx, shift.id, payment.amount).await?;
            }
            payments.push(record);
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            branch_id = input.branch_id,
            total = totals.total,
            "Order created"
        );

        Ok(OrderDetail {
            order,
            items,
            payments,
        })
    }

    /// Post-commit side effects: notification, POS-sale posting, fiscal
    /// scheduling. Failures are logged/counted, never surfaced.
    async fn after_create(&self, detail: &OrderDetail) {
        let order = &detail.order;
        self.state
            .notifications
            .publish(order.branch_id, "order", "created", &order.id, Some(detail));

        if order.total > 0.0 {
            self.state
                .post_journal(NewJournalEntry {
                    description: format!("POS sale {}", order.id),
                    amount: order.total,
                    debit_account: accounts::CASH.to_string(),
                    credit_account: accounts::REVENUE.to_string(),
                    reference_id: Some(order.id.clone()),
                    source: "pos-sale".to_string(),
                    metadata: Some(serde_json::json!({
                        "branch_id": order.branch_id,
                        "order_type": order.order_type,
                    })),
                })
                .await;
        }

        // Only already-paid orders are scheduled for fiscalization.
        if detail.is_fully_paid() {
            self.state.enqueue_fiscal(&order.id);
        }
    }

    // ========== Status transitions ==========

    /// Apply a status transition under the policy gate, with optimistic
    /// concurrency on `expected_updated_at`.
    pub async fn change_status(
        &self,
        order_id: &str,
        next: OrderStatus,
        note: Option<&str>,
        expected_updated_at: Option<i64>,
        ctx: &AuthContext,
    ) -> LedgerResult<Order> {
        let mut tx = self.state.pool.begin().await?;

        let order = order_repo::find_by_id(&mut tx, order_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Order {order_id} not found")))?;

        if let Some(expected) = expected_updated_at {
            if expected != order.updated_at {
                // Return the true current version so the client can
                // re-fetch and retry.
                return Err(LedgerError::VersionConflict {
                    current: order.updated_at,
                });
            }
        }

        match status::evaluate(order.status, next, ctx, order.branch_id, note)? {
            status::TransitionDecision::NoOp => return Ok(order),
            status::TransitionDecision::Apply => {}
        }

        // Keep updated_at strictly increasing even within one millisecond.
        let now = now_millis().max(order.updated_at + 1);
        let cancel_reason = (next == OrderStatus::Cancelled)
            .then(|| note.map(str::trim))
            .flatten();
        let applied = order_repo::update_status(
            &mut tx,
            order_id,
            next,
            cancel_reason,
            order.updated_at,
            now,
        )
        .await?;
        if !applied {
            return Err(LedgerError::VersionConflict {
                current: order.updated_at,
            });
        }

        order_repo::insert_status_history(
            &mut tx,
            order_id,
            Some(order.status),
            next,
            &ctx.user_id,
            &ctx.name,
            note,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            from = ?order.status,
            to = ?next,
            actor = %ctx.user_id,
            "Order status changed"
        );
        self.state.notifications.publish(
            order.branch_id,
            "order",
            "status_changed",
            order_id,
            Some(&serde_json::json!({ "from": order.status, "to": next })),
        );

        let mut updated = order;
        updated.status = next;
        if let Some(reason) = cancel_reason {
            updated.cancel_reason = Some(reason.to_string());
        }
        updated.updated_at = now;
        Ok(updated)
    }

    // ========== Table operations ==========

    /// Move a dine-in order to another table.
    pub async fn transfer_table(
        &self,
        order_id: &str,
        new_table_id: &str,
        ctx: &AuthContext,
    ) -> LedgerResult<Order> {
        let mut tx = self.state.pool.begin().await?;

        let order = order_repo::find_by_id(&mut tx, order_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Order {order_id} not found")))?;
        Self::check_table_op(&order, ctx)?;

        let now = now_millis().max(order.updated_at + 1);
        order_repo::update_table(&mut tx, order_id, new_table_id, now).await?;
        tx.commit().await?;

        self.state.notifications.publish(
            order.branch_id,
            "order",
            "table_transferred",
            order_id,
            Some(&serde_json::json!({ "table_id": new_table_id })),
        );

        let mut updated = order;
        updated.table_id = Some(new_table_id.to_string());
        updated.updated_at = now;
        Ok(updated)
    }

    /// Split selected items off into a new order on the same table.
    ///
    /// Both orders' totals are re-derived holding the source order's
    /// discount/tax/service rates constant (proportional allocation, not
    /// a policy recomputation). Payments stay on the source order.
    pub async fn split_order(
        &self,
        order_id: &str,
        item_ids: &[i64],
        ctx: &AuthContext,
    ) -> LedgerResult<OrderDetail> {
        if item_ids.is_empty() {
            return Err(LedgerError::Validation(
                "Split requires at least one item".into(),
            ));
        }

        let mut tx = self.state.pool.begin().await?;

        let source = order_repo::find_by_id(&mut tx, order_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Order {order_id} not found")))?;
        Self::check_table_op(&source, ctx)?;

        let items = order_repo::items_for(&mut tx, order_id).await?;
        let moved: Vec<&OrderItem> = items.iter().filter(|i| item_ids.contains(&i.id)).collect();
        if moved.len() != item_ids.len() {
            return Err(LedgerError::NotFound(format!(
                "Some items do not belong to order {order_id}"
            )));
        }
        if moved.len() == items.len() {
            return Err(LedgerError::Validation(
                "Cannot split all items out of an order".into(),
            ));
        }

        let rates = money::rates_of(
            source.subtotal,
            source.discount,
            source.tax,
            source.service_charge,
        );
        let moved_totals: Vec<f64> = moved.iter().map(|i| i.line_total).collect();
        let kept_totals: Vec<f64> = items
            .iter()
            .filter(|i| !item_ids.contains(&i.id))
            .map(|i| i.line_total)
            .collect();
        // The delivery fee, if any, stays with the source order.
        let new_totals = money::totals_with_rates(&moved_totals, rates, 0.0)?;
        let source_totals =
            money::totals_with_rates(&kept_totals, rates, source.delivery_fee)?;

        let now = now_millis().max(source.updated_at + 1);
        let new_order = Order {
            id: Uuid::new_v4().to_string(),
            branch_id: source.branch_id,
            table_id: source.table_id.clone(),
            order_type: source.order_type,
            status: source.status,
            shift_id: source.shift_id,
            subtotal: new_totals.subtotal,
            discount: new_totals.discount,
            tax: new_totals.tax,
            service_charge: new_totals.service_charge,
            delivery_fee: new_totals.delivery_fee,
            total: new_totals.total,
            note: Some(format!("Split from order {order_id}")),
            cancel_reason: None,
            created_by: ctx.user_id.clone(),
            created_at: now,
            updated_at: now,
        };
        order_repo::insert(&mut tx, &new_order).await?;
        order_repo::move_items(&mut tx, order_id, &new_order.id, item_ids).await?;
        order_repo::update_totals(
            &mut tx,
            order_id,
            source_totals.subtotal,
            source_totals.discount,
            source_totals.tax,
            source_totals.service_charge,
            source_totals.delivery_fee,
            source_totals.total,
            now,
        )
        .await?;
        order_repo::insert_status_history(
            &mut tx,
            &new_order.id,
            None,
            new_order.status,
            &ctx.user_id,
            &ctx.name,
            Some(&format!("Split from order {order_id}")),
        )
        .await?;

        let detail_items = order_repo::items_for(&mut tx, &new_order.id).await?;
        tx.commit().await?;

        tracing::info!(
            source_order = %order_id,
            new_order = %new_order.id,
            moved = item_ids.len(),
            "Order split"
        );
        self.state.notifications.publish(
            new_order.branch_id,
            "order",
            "split",
            &new_order.id,
            Some(&serde_json::json!({ "source_order_id": order_id })),
        );

        Ok(OrderDetail {
            order: new_order,
            items: detail_items,
            payments: Vec::new(),
        })
    }

    /// Merge a source order into a target order on the same branch.
    ///
    /// Items and payments move to the target; the target's totals are
    /// re-derived holding its original rates constant; the source is
    /// closed as cancelled with a merge note.
    pub async fn merge_orders(
        &self,
        source_id: &str,
        target_id: &str,
        ctx: &AuthContext,
    ) -> LedgerResult<OrderDetail> {
        if source_id == target_id {
            return Err(LedgerError::Validation(
                "Cannot merge an order into itself".into(),
            ));
        }

        let mut tx = self.state.pool.begin().await?;

        let source = order_repo::find_by_id(&mut tx, source_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Order {source_id} not found")))?;
        let target = order_repo::find_by_id(&mut tx, target_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Order {target_id} not found")))?;
        Self::check_table_op(&source, ctx)?;
        Self::check_table_op(&target, ctx)?;
        if source.branch_id != target.branch_id {
            return Err(LedgerError::Validation(
                "Cannot merge orders across branches".into(),
            ));
        }

        order_repo::move_all_items(&mut tx, source_id, target_id).await?;
        order_repo::move_all_payments(&mut tx, source_id, target_id).await?;

        let rates = money::rates_of(
            target.subtotal,
            target.discount,
            target.tax,
            target.service_charge,
        );
        let merged_items = order_repo::items_for(&mut tx, target_id).await?;
        let merged_line_totals: Vec<f64> = merged_items.iter().map(|i| i.line_total).collect();
        let merged_totals = money::totals_with_rates(
            &merged_line_totals,
            rates,
            target.delivery_fee + source.delivery_fee,
        )?;

        let now = now_millis().max(target.updated_at.max(source.updated_at) + 1);
        order_repo::update_totals(
            &mut tx,
            target_id,
            merged_totals.subtotal,
            merged_totals.discount,
            merged_totals.tax,
            merged_totals.service_charge,
            merged_totals.delivery_fee,
            merged_totals.total,
            now,
        )
        .await?;

        // Close the emptied source order.
        let merge_note = format!("Merged into order {target_id}");
        let applied = order_repo::update_status(
            &mut tx,
            source_id,
            OrderStatus::Cancelled,
            Some(&merge_note),
            source.updated_at,
            now,
        )
        .await?;
        if !applied {
            return Err(LedgerError::VersionConflict {
                current: source.updated_at,
            });
        }
        order_repo::insert_status_history(
            &mut tx,
            source_id,
            Some(source.status),
            OrderStatus::Cancelled,
            &ctx.user_id,
            &ctx.name,
            Some(&merge_note),
        )
        .await?;

        let payments = order_repo::payments_for(&mut tx, target_id).await?;
        tx.commit().await?;

        tracing::info!(
            source_order = %source_id,
            target_order = %target_id,
            "Orders merged"
        );
        self.state.notifications.publish(
            target.branch_id,
            "order",
            "merged",
            target_id,
            Some(&serde_json::json!({ "source_order_id": source_id })),
        );

        let mut merged = target;
        merged.subtotal = merged_totals.subtotal;
        merged.discount = merged_totals.discount;
        merged.tax = merged_totals.tax;
        merged.service_charge = merged_totals.service_charge;
        merged.delivery_fee = merged_totals.delivery_fee;
        merged.total = merged_totals.total;
        merged.updated_at = now;
        Ok(OrderDetail {
            order: merged,
            items: merged_items,
            payments,
        })
    }

    fn check_table_op(order: &Order, ctx: &AuthContext) -> LedgerResult<()> {
        if !ctx.can_access_branch(order.branch_id) {
            return Err(LedgerError::ForbiddenBranchScope {
                actor_branch: ctx.branch_id,
                order_branch: order.branch_id,
            });
        }
        if order.order_type != OrderType::DineIn {
            return Err(LedgerError::Validation(
                "Table operations apply to DINE_IN orders only".into(),
            ));
        }
        if order.status.is_terminal() {
            return Err(LedgerError::WrongState(format!(
                "Order {} is {:?}",
                order.id, order.status
            )));
        }
        Ok(())
    }

    // ========== Queries ==========

    pub async fn get_detail(&self, order_id: &str) -> LedgerResult<OrderDetail> {
        let mut conn = self.state.pool.acquire().await?;
        let order = order_repo::find_by_id(&mut conn, order_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Order {order_id} not found")))?;
        let items = order_repo::items_for(&mut conn, order_id).await?;
        let payments = order_repo::payments_for(&mut conn, order_id).await?;
        Ok(OrderDetail {
            order,
            items,
            payments,
        })
    }

    pub async fn status_history(
        &self,
        order_id: &str,
    ) -> LedgerResult<Vec<shared::models::StatusHistoryRow>> {
        let mut conn = self.state.pool.acquire().await?;
        Ok(order_repo::status_history_for(&mut conn, order_id).await?)
    }
}
