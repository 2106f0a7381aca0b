use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        customer::Entity as CustomerEntity,
        order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus, QuoteStatus},
        order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel, OrderItemType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        catalog::{CatalogService, OrderLineRequest, ValidatedLine},
        coupons::CouponService,
        customers::{AddressInput, CustomerService, GuestCustomerInfo},
        inventory::InventoryService,
    },
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub address_id: Uuid,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderLineRequest>,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateGuestOrderRequest {
    pub customer: GuestCustomerInfo,
    pub address: AddressInput,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderLineRequest>,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
    pub coupon_code: Option<String>,
}

/// A persisted order together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Order assembler: turns a cart of mixed product/service lines into one
/// persisted order, inside a single transaction covering catalog validation,
/// pricing, coupon redemption, stock reservation, and customer aggregates.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    customers: Arc<CustomerService>,
    catalog: Arc<CatalogService>,
    coupons: Arc<CouponService>,
    inventory: Arc<InventoryService>,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        customers: Arc<CustomerService>,
        catalog: Arc<CatalogService>,
        coupons: Arc<CouponService>,
        inventory: Arc<InventoryService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            customers,
            catalog,
            coupons,
            inventory,
        }
    }

    /// Creates an order for a registered customer.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let customer = CustomerEntity::find_by_id(request.customer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", request.customer_id))
            })?;

        let address = self
            .customers
            .get_address_owned(&txn, request.address_id, customer.id)
            .await?;

        let details = self
            .assemble(
                &txn,
                customer.id,
                address.id,
                &request.items,
                &request.payment_method,
                request.coupon_code.as_deref(),
            )
            .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        self.notify_created(&details.order).await;

        Ok(details)
    }

    /// Creates an order for a guest checkout, resolving (or creating) the
    /// customer record and a fresh address within the same transaction.
    #[instrument(skip(self, request), fields(email = %request.customer.email))]
    pub async fn create_guest_order(
        &self,
        request: CreateGuestOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for guest order creation");
            ServiceError::DatabaseError(e)
        })?;

        let resolution = self.customers.resolve_guest(&txn, request.customer).await?;
        let address = self
            .customers
            .create_address_for(&txn, resolution.customer.id, request.address)
            .await?;

        let details = self
            .assemble(
                &txn,
                resolution.customer.id,
                address.id,
                &request.items,
                &request.payment_method,
                request.coupon_code.as_deref(),
            )
            .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit guest order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        if resolution.created {
            if let Err(e) = self
                .event_sender
                .send(Event::CustomerCreated(resolution.customer.id))
                .await
            {
                warn!(error = %e, "Failed to send customer created event");
            }
        }

        self.notify_created(&details.order).await;

        Ok(details)
    }

    /// Retrieves an order with its items.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(OrderDetails { order, items })
    }

    /// Core assembly: validate, price, discount, persist, reserve, aggregate.
    /// Runs entirely on the caller's transaction; any error aborts the lot.
    async fn assemble(
        &self,
        txn: &DatabaseTransaction,
        customer_id: Uuid,
        address_id: Uuid,
        items: &[OrderLineRequest],
        payment_method: &str,
        coupon_code: Option<&str>,
    ) -> Result<OrderDetails, ServiceError> {
        let validated = self.catalog.validate_lines(txn, items).await?;

        // Price each line off the validated snapshot.
        struct LineSnapshot {
            item_type: OrderItemType,
            product_id: Option<Uuid>,
            service_id: Option<Uuid>,
            name: String,
            unit_price: Decimal,
            quantity: i32,
            price_quoted: bool,
        }

        let mut snapshots = Vec::with_capacity(validated.len());
        for line in &validated {
            let snapshot = match line {
                ValidatedLine::Product { product, quantity } => LineSnapshot {
                    item_type: OrderItemType::Product,
                    product_id: Some(product.id),
                    service_id: None,
                    name: product.name.clone(),
                    unit_price: product.effective_price(),
                    quantity: *quantity,
                    price_quoted: true,
                },
                ValidatedLine::Service { service, quantity } => {
                    let (unit_price, price_quoted) = if service.requires_quote() {
                        (Decimal::ZERO, false)
                    } else {
                        // requires_quote() is false only when a non-zero
                        // base price is present.
                        (service.base_price.unwrap_or(Decimal::ZERO), true)
                    };
                    LineSnapshot {
                        item_type: OrderItemType::Service,
                        product_id: None,
                        service_id: Some(service.id),
                        name: service.name.clone(),
                        unit_price,
                        quantity: *quantity,
                        price_quoted,
                    }
                }
            };
            snapshots.push(snapshot);
        }

        let subtotal: Decimal = snapshots
            .iter()
            .map(|s| s.unit_price * Decimal::from(s.quantity))
            .sum();

        let (discount_amount, applied_code) = match coupon_code {
            Some(code) if !code.trim().is_empty() => {
                let applied = self.coupons.apply(txn, code, subtotal).await?;
                (applied.discount, Some(applied.code))
            }
            _ => (Decimal::ZERO, None),
        };

        let total = subtotal - discount_amount;

        let has_products = snapshots
            .iter()
            .any(|s| s.item_type == OrderItemType::Product);
        let has_services = snapshots
            .iter()
            .any(|s| s.item_type == OrderItemType::Service);
        let awaiting_quote = snapshots.iter().any(|s| !s.price_quoted);

        let order_id = Uuid::new_v4();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            customer_id: Set(customer_id),
            address_id: Set(address_id),
            status: Set(OrderStatus::Pending),
            quote_status: Set(awaiting_quote.then_some(QuoteStatus::Pending)),
            has_products: Set(has_products),
            has_services: Set(has_services),
            subtotal: Set(subtotal),
            discount_amount: Set(discount_amount),
            total: Set(total),
            coupon_code: Set(applied_code),
            payment_method: Set(payment_method.to_string()),
            tracking_code: Set(None),
            estimated_delivery: Set(None),
            quoted_at: Set(None),
            quote_approved_at: Set(None),
            delivered_at: Set(None),
            cancelled_at: Set(None),
            ..Default::default()
        };

        let order = order_model.insert(txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        let mut persisted_items = Vec::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_type: Set(snapshot.item_type),
                product_id: Set(snapshot.product_id),
                service_id: Set(snapshot.service_id),
                name: Set(snapshot.name.clone()),
                unit_price: Set(snapshot.unit_price),
                quantity: Set(snapshot.quantity),
                subtotal: Set(snapshot.unit_price * Decimal::from(snapshot.quantity)),
                price_quoted: Set(snapshot.price_quoted),
                created_at: Set(Utc::now()),
            };
            persisted_items.push(item.insert(txn).await?);
        }

        // The authoritative stock check: conditional decrement per product line.
        for snapshot in &snapshots {
            if let Some(product_id) = snapshot.product_id {
                self.inventory
                    .reserve(txn, product_id, snapshot.quantity)
                    .await?;
            }
        }

        self.customers
            .record_order(txn, customer_id, total)
            .await?;

        info!(
            order_id = %order_id,
            customer_id = %customer_id,
            subtotal = %subtotal,
            discount = %discount_amount,
            total = %total,
            awaiting_quote = awaiting_quote,
            "Order assembled"
        );

        Ok(OrderDetails {
            order,
            items: persisted_items,
        })
    }

    /// Post-commit notification trigger: quote request when the order awaits
    /// pricing, plain order-created otherwise.
    async fn notify_created(&self, order: &OrderModel) {
        let event = if order.quote_status == Some(QuoteStatus::Pending) {
            Event::NewQuoteRequested(order.id)
        } else {
            Event::OrderCreated(order.id)
        };

        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, order_id = %order.id, "Failed to send order creation event");
        }
    }
}

/// Human-facing order number: date component plus a random suffix. The column
/// stays unique-constrained in case the suffix ever collides.
fn generate_order_number() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("ORD-{}-{:06}", Utc::now().format("%Y%m%d"), suffix)
}
