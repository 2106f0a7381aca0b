use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus, QuoteStatus},
        order_item::{self, Entity as OrderItemEntity, OrderItemType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Final price for one service item, set by the quoting administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotedItemPrice {
    pub item_id: Uuid,
    pub unit_price: Decimal,
}

/// Quote lifecycle: none -> pending -> quoted -> approved/rejected.
///
/// `pending` is entered automatically by the order assembler when a service
/// line lacks a final price. `submit_quote` is the admin side; `approve` and
/// `reject` are the customer side and require ownership.
#[derive(Clone)]
pub struct QuoteService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl QuoteService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Administrator sets final prices on the order's unpriced service items
    /// and moves the quote to `quoted`.
    ///
    /// Every unpriced item must receive a positive price; order totals are
    /// recomputed from the final item subtotals, keeping the already-applied
    /// discount clamped to the new subtotal.
    #[instrument(skip(self, prices), fields(order_id = %order_id))]
    pub async fn submit_quote(
        &self,
        order_id: Uuid,
        prices: Vec<QuotedItemPrice>,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for quote submission");
            ServiceError::DatabaseError(e)
        })?;

        let order = find_order(&txn, order_id).await?;

        if order.quote_status != Some(QuoteStatus::Pending) {
            return Err(ServiceError::BadRequest(
                "Only orders with a pending quote request can be quoted".to_string(),
            ));
        }

        for price in &prices {
            if price.unit_price <= Decimal::ZERO {
                return Err(ServiceError::BadRequest(
                    "Quoted prices must be greater than zero".to_string(),
                ));
            }

            let item = OrderItemEntity::find_by_id(price.item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Order item {} not found", price.item_id))
                })?;

            if item.order_id != order_id {
                return Err(ServiceError::BadRequest(format!(
                    "Order item {} does not belong to order {}",
                    price.item_id, order_id
                )));
            }
            if item.item_type != OrderItemType::Service || item.price_quoted {
                return Err(ServiceError::BadRequest(format!(
                    "Order item {} is not awaiting a quote",
                    price.item_id
                )));
            }

            let quantity = item.quantity;
            let mut active: order_item::ActiveModel = item.into();
            active.unit_price = Set(price.unit_price);
            active.subtotal = Set(price.unit_price * Decimal::from(quantity));
            active.price_quoted = Set(true);
            active.update(&txn).await?;
        }

        // All service items must now carry final prices.
        let unpriced = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::PriceQuoted.eq(false))
            .all(&txn)
            .await?;
        if !unpriced.is_empty() {
            return Err(ServiceError::BadRequest(format!(
                "{} service item(s) still lack a quoted price",
                unpriced.len()
            )));
        }

        let updated = recompute_totals(&txn, order, |active| {
            active.quote_status = Set(Some(QuoteStatus::Quoted));
            active.quoted_at = Set(Some(Utc::now()));
        })
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit quote submission");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "Quote submitted");
        if let Err(e) = self.event_sender.send(Event::QuoteSubmitted(order_id)).await {
            warn!(error = %e, order_id = %order_id, "Failed to send quote submitted event");
        }

        Ok(updated)
    }

    /// Customer accepts the quoted prices; the order moves into production.
    #[instrument(skip(self), fields(order_id = %order_id, customer_id = %customer_id))]
    pub async fn approve_quote(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for quote approval");
            ServiceError::DatabaseError(e)
        })?;

        let order = find_order(&txn, order_id).await?;
        ensure_owner(&order, customer_id)?;

        if order.quote_status != Some(QuoteStatus::Quoted) {
            return Err(ServiceError::BadRequest(
                "Only quoted orders can be approved".to_string(),
            ));
        }

        let mut active: order::ActiveModel = order.into();
        active.quote_status = Set(Some(QuoteStatus::Approved));
        active.quote_approved_at = Set(Some(Utc::now()));
        active.status = Set(OrderStatus::InProduction);
        let updated = active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit quote approval");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "Quote approved; order moved to production");
        if let Err(e) = self.event_sender.send(Event::QuoteApproved(order_id)).await {
            warn!(error = %e, order_id = %order_id, "Failed to send quote approved event");
        }

        Ok(updated)
    }

    /// Customer declines the quoted prices.
    #[instrument(skip(self), fields(order_id = %order_id, customer_id = %customer_id))]
    pub async fn reject_quote(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for quote rejection");
            ServiceError::DatabaseError(e)
        })?;

        let order = find_order(&txn, order_id).await?;
        ensure_owner(&order, customer_id)?;

        if order.quote_status != Some(QuoteStatus::Quoted) {
            return Err(ServiceError::BadRequest(
                "Only quoted orders can be rejected".to_string(),
            ));
        }

        let mut active: order::ActiveModel = order.into();
        active.quote_status = Set(Some(QuoteStatus::Rejected));
        let updated = active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit quote rejection");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "Quote rejected");
        if let Err(e) = self
            .event_sender
            .send(Event::QuoteRejected {
                order_id,
                customer_id,
            })
            .await
        {
            warn!(error = %e, order_id = %order_id, "Failed to send quote rejected event");
        }

        Ok(updated)
    }
}

async fn find_order(
    txn: &DatabaseTransaction,
    order_id: Uuid,
) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

fn ensure_owner(order: &OrderModel, customer_id: Uuid) -> Result<(), ServiceError> {
    if order.customer_id != customer_id {
        return Err(ServiceError::Forbidden(
            "Order does not belong to the requesting customer".to_string(),
        ));
    }
    Ok(())
}

/// Re-derives subtotal/total from the order's items, applies extra field
/// mutations, and persists the order row.
async fn recompute_totals<F>(
    txn: &DatabaseTransaction,
    order: OrderModel,
    mutate: F,
) -> Result<OrderModel, ServiceError>
where
    F: FnOnce(&mut order::ActiveModel),
{
    let items = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(txn)
        .await?;

    let subtotal: Decimal = items.iter().map(|i| i.subtotal).sum();
    let discount = order.discount_amount.min(subtotal);

    let mut active: order::ActiveModel = order.into();
    active.subtotal = Set(subtotal);
    active.discount_amount = Set(discount);
    active.total = Set(subtotal - discount);
    mutate(&mut active);

    Ok(active.update(txn).await?)
}
