use std::sync::Arc;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity, ProductStatus},
    errors::ServiceError,
};

/// Inventory ledger: the only component permitted to mutate product stock.
///
/// `reserve` and `release` are both single conditional updates so that
/// concurrent checkouts can never drive stock negative; the availability
/// checker's earlier read is advisory only.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Decrements stock for a pending order line.
    ///
    /// Executes `UPDATE products SET stock = stock - qty WHERE id = ? AND
    /// stock >= qty`; zero affected rows means the stock guard failed (or the
    /// product vanished) and the surrounding transaction must abort.
    #[instrument(skip(self, conn), fields(product_id = %product_id, quantity = quantity))]
    pub async fn reserve<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::BadRequest(
                "Reservation quantity must be greater than zero".to_string(),
            ));
        }

        let result = ProductEntity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Stock.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "Insufficient stock for product {}",
                product_id
            )));
        }

        self.sync_status(conn, product_id).await?;
        Ok(())
    }

    /// Returns stock from a cancelled order line and re-derives the product
    /// status from the new level.
    #[instrument(skip(self, conn), fields(product_id = %product_id, quantity = quantity))]
    pub async fn release<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::BadRequest(
                "Release quantity must be greater than zero".to_string(),
            ));
        }

        let result = ProductEntity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).add(quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        self.sync_status(conn, product_id).await?;
        Ok(())
    }

    /// Current stock level, read outside any transaction.
    pub async fn get_stock(&self, product_id: Uuid) -> Result<i32, ServiceError> {
        let product = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        Ok(product.stock)
    }

    /// Re-derives and persists the availability status after a stock change.
    async fn sync_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let model = ProductEntity::find_by_id(product_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let next = derive_status(model.stock, model.status);
        if next != model.status {
            info!(product_id = %product_id, stock = model.stock, from = ?model.status, to = ?next, "Product status re-derived from stock level");
            let mut active: product::ActiveModel = model.into();
            active.status = Set(next);
            active.update(conn).await?;
        }

        Ok(())
    }
}

/// Availability status derived from the stock level.
///
/// Discontinued products stay discontinued regardless of stock; stock hitting
/// zero forces `out_of_stock`; stock above zero while `out_of_stock` reverts
/// to `active`.
pub fn derive_status(stock: i32, current: ProductStatus) -> ProductStatus {
    if current == ProductStatus::Discontinued {
        return ProductStatus::Discontinued;
    }
    if stock <= 0 {
        return ProductStatus::OutOfStock;
    }
    if current == ProductStatus::OutOfStock {
        return ProductStatus::Active;
    }
    current
}
