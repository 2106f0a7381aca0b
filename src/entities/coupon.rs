use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Coupon code redeemable at checkout.
///
/// `used_count` is monotonically increasing and never exceeds `usage_limit`
/// when a limit is set; the increment is a guarded conditional update inside
/// the order-creation transaction.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Uppercase, unique redemption code.
    #[sea_orm(unique)]
    pub code: String,

    pub discount_type: CouponDiscountType,

    /// Percentage (0-100) or fixed amount, depending on `discount_type`.
    pub discount_value: Decimal,

    /// Minimum order subtotal required to redeem.
    #[sea_orm(nullable)]
    pub min_order_value: Option<Decimal>,

    /// Cap applied to the computed discount.
    #[sea_orm(nullable)]
    pub max_discount: Option<Decimal>,

    #[sea_orm(nullable)]
    pub usage_limit: Option<i32>,
    pub used_count: i32,

    pub expires_at: DateTime<Utc>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum CouponDiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed")]
    Fixed,
}
