use std::sync::Arc;

use crate::{
    db::DbPool,
    events::EventSender,
    services::{
        catalog::CatalogService, coupons::CouponService, customers::CustomerService,
        inventory::InventoryService, order_status::OrderStatusService, orders::OrderService,
        quotes::QuoteService,
    },
};

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl ServiceFactory {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    pub fn customer_service(&self) -> CustomerService {
        CustomerService::new(self.db.clone(), self.event_sender.clone())
    }

    pub fn catalog_service(&self) -> CatalogService {
        CatalogService::new(self.db.clone())
    }

    pub fn coupon_service(&self) -> CouponService {
        CouponService::new(self.db.clone())
    }

    pub fn inventory_service(&self) -> InventoryService {
        InventoryService::new(self.db.clone())
    }

    pub fn quote_service(&self) -> QuoteService {
        QuoteService::new(self.db.clone(), self.event_sender.clone())
    }

    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db
    }

    pub fn event_sender(&self) -> &EventSender {
        &self.event_sender
    }
}

/// Service container holding all wired service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub customers: Arc<CustomerService>,
    pub catalog: Arc<CatalogService>,
    pub coupons: Arc<CouponService>,
    pub inventory: Arc<InventoryService>,
    pub orders: Arc<OrderService>,
    pub quotes: Arc<QuoteService>,
    pub order_status: Arc<OrderStatusService>,
}

impl ServiceContainer {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        let factory = ServiceFactory::new(db.clone(), event_sender.clone());

        let customers = Arc::new(factory.customer_service());
        let catalog = Arc::new(factory.catalog_service());
        let coupons = Arc::new(factory.coupon_service());
        let inventory = Arc::new(factory.inventory_service());

        let orders = Arc::new(OrderService::new(
            db.clone(),
            event_sender.clone(),
            customers.clone(),
            catalog.clone(),
            coupons.clone(),
            inventory.clone(),
        ));
        let quotes = Arc::new(factory.quote_service());
        let order_status = Arc::new(OrderStatusService::new(
            db,
            event_sender,
            inventory.clone(),
        ));

        Self {
            customers,
            catalog,
            coupons,
            inventory,
            orders,
            quotes,
            order_status,
        }
    }
}
