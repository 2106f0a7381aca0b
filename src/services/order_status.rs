use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
        order_item::{self, Entity as OrderItemEntity, OrderItemType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::InventoryService,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub new_status: OrderStatus,
    pub tracking_code: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Fulfillment state machine and cancellation.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    inventory: Arc<InventoryService>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, inventory: Arc<InventoryService>) -> Self {
        Self {
            db,
            event_sender,
            inventory,
        }
    }

    /// Moves an order along the fulfillment chain.
    ///
    /// Tracking code and estimated delivery are free-form fields settable at
    /// any non-terminal state (a same-status update carries no transition
    /// semantics). A `cancelled` target is routed through `cancel_order` so
    /// stock restoration always happens.
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = request.new_status.as_str()))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderModel, ServiceError> {
        if request.new_status == OrderStatus::Cancelled {
            return self.cancel_order(order_id, customer_id).await;
        }

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for status update");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.customer_id != customer_id {
            return Err(ServiceError::Forbidden(
                "Order does not belong to the requesting customer".to_string(),
            ));
        }

        let old_status = order.status;
        if !is_valid_transition(old_status, request.new_status) {
            return Err(ServiceError::BadRequest(format!(
                "Cannot transition order from '{}' to '{}'",
                old_status.as_str(),
                request.new_status.as_str()
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(request.new_status);
        if request.new_status == OrderStatus::Delivered {
            active.delivered_at = Set(Some(Utc::now()));
        }
        if let Some(tracking) = request.tracking_code {
            active.tracking_code = Set(Some(tracking));
        }
        if let Some(eta) = request.estimated_delivery {
            active.estimated_delivery = Set(Some(eta));
        }

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit status update transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            old_status = old_status.as_str(),
            new_status = updated.status.as_str(),
            "Order status updated"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusUpdated {
                order_id,
                new_status: updated.status,
            })
            .await
        {
            warn!(error = %e, order_id = %order_id, "Failed to send order status updated event");
        }

        Ok(updated)
    }

    /// Cancels an order, restoring stock for every product line.
    ///
    /// Refused once the order is delivered or already cancelled. Services are
    /// not restocked.
    #[instrument(skip(self), fields(order_id = %order_id, customer_id = %customer_id))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order cancellation");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.customer_id != customer_id {
            return Err(ServiceError::Forbidden(
                "Order does not belong to the requesting customer".to_string(),
            ));
        }

        match order.status {
            OrderStatus::Delivered => {
                return Err(ServiceError::BadRequest(
                    "Delivered orders cannot be cancelled".to_string(),
                ));
            }
            OrderStatus::Cancelled => {
                return Err(ServiceError::BadRequest(
                    "Order is already cancelled".to_string(),
                ));
            }
            _ => {}
        }

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::ItemType.eq(OrderItemType::Product))
            .all(&txn)
            .await?;

        for item in &items {
            if let Some(product_id) = item.product_id {
                self.inventory
                    .release(&txn, product_id, item.quantity)
                    .await?;
            }
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.cancelled_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit cancellation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, restocked_lines = items.len(), "Order cancelled");

        if let Err(e) = self.event_sender.send(Event::OrderCancelled(order_id)).await {
            warn!(error = %e, order_id = %order_id, "Failed to send order cancelled event");
        }

        Ok(updated)
    }
}

/// Validates a fulfillment transition.
///
/// `in_production` is only ever entered via quote approval, so it does not
/// appear as a target here; it rejoins the chain at `preparing`. Same-status
/// updates are allowed on non-terminal states so tracking fields can be set
/// without progressing the order.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    match (from, to) {
        (OrderStatus::Pending, OrderStatus::Confirmed) => true,
        (OrderStatus::Confirmed, OrderStatus::Preparing) => true,
        (OrderStatus::InProduction, OrderStatus::Preparing) => true,
        (OrderStatus::Preparing, OrderStatus::Shipped) => true,
        (OrderStatus::Shipped, OrderStatus::Delivered) => true,

        // No-op update on a non-terminal state (tracking/eta only)
        _ if from == to && !from.is_terminal() => true,

        _ => false,
    }
}
