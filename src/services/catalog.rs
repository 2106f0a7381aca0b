use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as ProductEntity, Model as ProductModel, ProductStatus},
        service::{Entity as ServiceEntity, Model as ServiceModel, ServiceStatus},
    },
    errors::ServiceError,
};

/// One requested line of a cart, tagged by item type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderLineRequest {
    Product { product_id: Uuid, quantity: i32 },
    Service { service_id: Uuid, quantity: i32 },
}

impl OrderLineRequest {
    pub fn quantity(&self) -> i32 {
        match self {
            OrderLineRequest::Product { quantity, .. } => *quantity,
            OrderLineRequest::Service { quantity, .. } => *quantity,
        }
    }
}

/// A requested line joined with its validated catalog record, ready for
/// pricing by the order assembler.
#[derive(Debug, Clone)]
pub enum ValidatedLine {
    Product {
        product: ProductModel,
        quantity: i32,
    },
    Service {
        service: ServiceModel,
        quantity: i32,
    },
}

/// Catalog access and availability checking.
///
/// The stock check here is advisory only: the inventory ledger's conditional
/// decrement inside the order transaction is the authoritative one.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Validates every requested line against the catalog.
    ///
    /// Products must exist, be active, and have enough stock; services must
    /// exist and be active. The first failing line aborts the whole request.
    #[instrument(skip(self, conn, lines), fields(line_count = lines.len()))]
    pub async fn validate_lines<C: ConnectionTrait>(
        &self,
        conn: &C,
        lines: &[OrderLineRequest],
    ) -> Result<Vec<ValidatedLine>, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::BadRequest(
                "Order must contain at least one item".to_string(),
            ));
        }

        let mut validated = Vec::with_capacity(lines.len());

        for line in lines {
            if line.quantity() <= 0 {
                return Err(ServiceError::BadRequest(
                    "Item quantity must be greater than zero".to_string(),
                ));
            }

            match line {
                OrderLineRequest::Product {
                    product_id,
                    quantity,
                } => {
                    let product = ProductEntity::find_by_id(*product_id)
                        .one(conn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", product_id))
                        })?;

                    if product.status != ProductStatus::Active {
                        warn!(product_id = %product_id, status = ?product.status, "Product not available for ordering");
                        return Err(ServiceError::BadRequest(format!(
                            "Product '{}' is not available",
                            product.name
                        )));
                    }

                    if product.stock < *quantity {
                        return Err(ServiceError::InsufficientStock(format!(
                            "Insufficient stock for product '{}': requested {}, available {}",
                            product.name, quantity, product.stock
                        )));
                    }

                    validated.push(ValidatedLine::Product {
                        product,
                        quantity: *quantity,
                    });
                }
                OrderLineRequest::Service {
                    service_id,
                    quantity,
                } => {
                    let service = ServiceEntity::find_by_id(*service_id)
                        .one(conn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Service {} not found", service_id))
                        })?;

                    if service.status != ServiceStatus::Active {
                        return Err(ServiceError::BadRequest(format!(
                            "Service '{}' is not available",
                            service.name
                        )));
                    }

                    validated.push(ValidatedLine::Service {
                        service,
                        quantity: *quantity,
                    });
                }
            }
        }

        Ok(validated)
    }

    /// Creates a product
    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductModel, ServiceError> {
        request.validate()?;

        let existing = ProductEntity::find()
            .filter(product::Column::Sku.eq(&request.sku))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Product with SKU '{}' already exists",
                request.sku
            )));
        }

        let status = if request.stock > 0 {
            ProductStatus::Active
        } else {
            ProductStatus::OutOfStock
        };

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(request.sku),
            name: Set(request.name),
            description: Set(request.description),
            cost_price: Set(request.cost_price),
            sale_price: Set(request.sale_price),
            promotional_price: Set(request.promotional_price),
            stock: Set(request.stock),
            min_stock: Set(request.min_stock),
            status: Set(status),
            ..Default::default()
        };

        Ok(model.insert(&*self.db).await?)
    }

    /// Creates a service offering
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_service(
        &self,
        request: CreateServiceRequest,
    ) -> Result<ServiceModel, ServiceError> {
        request.validate()?;

        let model = crate::entities::service::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            base_price: Set(request.base_price),
            status: Set(ServiceStatus::Active),
            created_at: Set(Utc::now()),
            updated_at: Set(Some(Utc::now())),
        };

        Ok(model.insert(&*self.db).await?)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    pub async fn get_service(&self, service_id: Uuid) -> Result<ServiceModel, ServiceError> {
        ServiceEntity::find_by_id(service_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Service {} not found", service_id)))
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 100, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub promotional_price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[validate(range(min = 0, message = "Minimum stock cannot be negative"))]
    pub min_stock: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, max = 255, message = "Service name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub base_price: Option<Decimal>,
}
