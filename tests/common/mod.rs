use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, Schema};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use partshop_api::{
    config::AppConfig,
    db,
    entities::{self, CouponDiscountType},
    events::{self, Event},
    services::{
        catalog::{CreateProductRequest, CreateServiceRequest},
        coupons::CreateCouponRequest,
        customers::{AddressInput, CreateCustomerRequest},
    },
    AppState,
};

/// Test harness: full application state backed by a throwaway SQLite file,
/// schema generated straight from the entities. Pool size stays at 1 so
/// every service call sees the same database.
pub struct TestApp {
    pub state: AppState,
    _event_task: Option<tokio::task::JoinHandle<()>>,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let (mut app, rx) = Self::with_event_capture().await;
        app._event_task = Some(tokio::spawn(events::process_events(rx)));
        app
    }

    /// Variant that hands the event receiver to the test so emitted events
    /// can be asserted on instead of drained by the logging loop.
    pub async fn with_event_capture() -> (Self, mpsc::Receiver<Event>) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_path = tmp.path().join("partshop_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to open test database");
        create_schema(&pool).await;

        let (event_sender, rx) = events::channel(100);

        let state = AppState::new(Arc::new(pool), cfg, event_sender);

        let app = Self {
            state,
            _event_task: None,
            _tmp: tmp,
        };
        (app, rx)
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Seeds an active product and returns its model.
    pub async fn seed_product(
        &self,
        sku: &str,
        stock: i32,
        sale_price: Decimal,
        promotional_price: Option<Decimal>,
    ) -> entities::ProductModel {
        self.state
            .services
            .catalog
            .create_product(CreateProductRequest {
                sku: sku.to_string(),
                name: format!("Part {}", sku),
                description: None,
                cost_price: sale_price / Decimal::from(2),
                sale_price,
                promotional_price,
                stock,
                min_stock: 1,
            })
            .await
            .expect("seed product")
    }

    /// Seeds an active service; `base_price: None` means it needs a quote.
    pub async fn seed_service(
        &self,
        name: &str,
        base_price: Option<Decimal>,
    ) -> entities::ServiceModel {
        self.state
            .services
            .catalog
            .create_service(CreateServiceRequest {
                name: name.to_string(),
                description: None,
                base_price,
            })
            .await
            .expect("seed service")
    }

    /// Seeds a registered customer with one address.
    pub async fn seed_customer(
        &self,
        name: &str,
        email: &str,
        phone: &str,
    ) -> (entities::CustomerModel, entities::CustomerAddressModel) {
        let customer = self
            .state
            .services
            .customers
            .create_customer(CreateCustomerRequest {
                name: name.to_string(),
                email: email.to_string(),
                phone: phone.to_string(),
                password: "secret123".to_string(),
            })
            .await
            .expect("seed customer");

        let address = self
            .state
            .services
            .customers
            .add_address(customer.id, sample_address())
            .await
            .expect("seed address");

        (customer, address)
    }

    /// Seeds an active coupon expiring 30 days out.
    pub async fn seed_coupon(
        &self,
        code: &str,
        discount_type: CouponDiscountType,
        discount_value: Decimal,
        max_discount: Option<Decimal>,
        usage_limit: Option<i32>,
    ) -> entities::CouponModel {
        self.state
            .services
            .coupons
            .create_coupon(CreateCouponRequest {
                code: code.to_string(),
                discount_type,
                discount_value,
                min_order_value: None,
                max_discount,
                usage_limit,
                expires_at: Utc::now() + Duration::days(30),
            })
            .await
            .expect("seed coupon")
    }

    pub async fn reload_product(&self, id: Uuid) -> entities::ProductModel {
        self.state
            .services
            .catalog
            .get_product(id)
            .await
            .expect("reload product")
    }

    pub async fn reload_customer(&self, id: Uuid) -> entities::CustomerModel {
        self.state
            .services
            .customers
            .get_customer(id)
            .await
            .expect("reload customer")
    }
}

pub fn sample_address() -> AddressInput {
    AddressInput {
        line1: "100 Main St".to_string(),
        line2: None,
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        postal_code: "62701".to_string(),
    }
}

async fn create_schema(db: &DatabaseConnection) {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements = [
        schema.create_table_from_entity(entities::Customer),
        schema.create_table_from_entity(entities::CustomerAddress),
        schema.create_table_from_entity(entities::Product),
        schema.create_table_from_entity(entities::Service),
        schema.create_table_from_entity(entities::Coupon),
        schema.create_table_from_entity(entities::Order),
        schema.create_table_from_entity(entities::OrderItem),
    ];

    for statement in &statements {
        db.execute(backend.build(statement))
            .await
            .expect("create table");
    }
}
