use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Physical part with finite stock.
///
/// `stock` is mutated exclusively by the inventory ledger; `status`
/// auto-derives from the stock level (0 forces `out_of_stock` unless the
/// product is `discontinued`, rising above 0 reverts to `active`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    #[validate(length(min = 1, max = 100, message = "SKU must be between 1 and 100 characters"))]
    pub sku: String,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Product name must be between 1 and 255 characters"
    ))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    #[sea_orm(nullable)]
    pub description: Option<String>,

    /// Cost price (margin calculations only, never charged).
    pub cost_price: Decimal,

    /// Regular sale price.
    pub sale_price: Decimal,

    /// Promotional price; when present it wins over `sale_price` at line
    /// pricing time.
    #[sea_orm(nullable)]
    pub promotional_price: Option<Decimal>,

    /// On-hand stock. Never negative.
    pub stock: i32,

    /// Reorder threshold, informational only.
    pub min_stock: i32,

    pub status: ProductStatus,

    pub created_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}

/// Product availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ProductStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "out_of_stock")]
    OutOfStock,
    #[sea_orm(string_value = "discontinued")]
    Discontinued,
}

impl Model {
    /// Effective unit price for order lines: promotional price wins when set.
    pub fn effective_price(&self) -> Decimal {
        self.promotional_price.unwrap_or(self.sale_price)
    }
}
