use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One product or service line within an order.
///
/// Exactly one of `product_id`/`service_id` is set, matching `item_type`.
/// Price and name are snapshots taken at order creation; `price_quoted` marks
/// whether the price is final. Items are immutable once created, except that
/// the admin quoting workflow sets a service item's final price and flips
/// `price_quoted`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,

    pub item_type: OrderItemType,
    #[sea_orm(nullable)]
    pub product_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub service_id: Option<Uuid>,

    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
    pub price_quoted: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::service::Entity",
        from = "Column::ServiceId",
        to = "super::service::Column::Id"
    )]
    Service,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum OrderItemType {
    #[sea_orm(string_value = "product")]
    Product,
    #[sea_orm(string_value = "service")]
    Service,
}
