use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::coupon::{self, CouponDiscountType, Entity as CouponEntity, Model as CouponModel},
    errors::ServiceError,
};

/// Result of a successful coupon application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, max = 50, message = "Coupon code is required"))]
    pub code: String,
    pub discount_type: CouponDiscountType,
    pub discount_value: Decimal,
    pub min_order_value: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub expires_at: DateTime<Utc>,
}

/// Coupon validation and discount computation.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DbPool>,
}

impl CouponService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Creates a coupon. Codes are stored uppercase and must be unique;
    /// the expiry must lie in the future at creation time.
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_coupon(
        &self,
        request: CreateCouponRequest,
    ) -> Result<CouponModel, ServiceError> {
        request.validate()?;

        let code = request.code.trim().to_uppercase();

        if request.expires_at <= Utc::now() {
            return Err(ServiceError::BadRequest(
                "Coupon expiry must be in the future".to_string(),
            ));
        }

        match request.discount_type {
            CouponDiscountType::Percentage => {
                if request.discount_value <= Decimal::ZERO
                    || request.discount_value > Decimal::from(100)
                {
                    return Err(ServiceError::BadRequest(
                        "Percentage discount must be between 0 and 100".to_string(),
                    ));
                }
            }
            CouponDiscountType::Fixed => {
                if request.discount_value <= Decimal::ZERO {
                    return Err(ServiceError::BadRequest(
                        "Fixed discount must be greater than zero".to_string(),
                    ));
                }
            }
        }

        let existing = CouponEntity::find()
            .filter(coupon::Column::Code.eq(&code))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Coupon code '{}' already exists",
                code
            )));
        }

        let now = Utc::now();
        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            discount_type: Set(request.discount_type),
            discount_value: Set(request.discount_value),
            min_order_value: Set(request.min_order_value),
            max_discount: Set(request.max_discount),
            usage_limit: Set(request.usage_limit),
            used_count: Set(0),
            expires_at: Set(request.expires_at),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let created = model.insert(&*self.db).await?;
        info!(code = %code, "Coupon created");
        Ok(created)
    }

    pub async fn get_coupon_by_code(&self, code: &str) -> Result<CouponModel, ServiceError> {
        let code = code.trim().to_uppercase();
        CouponEntity::find()
            .filter(coupon::Column::Code.eq(&code))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon '{}' not found", code)))
    }

    /// Validates and redeems a coupon against a computed subtotal, as part of
    /// the order-creation unit of work.
    ///
    /// The `used_count` increment is a guarded conditional update so that
    /// concurrent redemptions cannot overrun `usage_limit`.
    #[instrument(skip(self, conn), fields(code = %code))]
    pub async fn apply<C: ConnectionTrait>(
        &self,
        conn: &C,
        code: &str,
        subtotal: Decimal,
    ) -> Result<AppliedCoupon, ServiceError> {
        let code = code.trim().to_uppercase();

        let coupon = CouponEntity::find()
            .filter(coupon::Column::Code.eq(&code))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon '{}' not found", code)))?;

        if !coupon.is_active {
            return Err(ServiceError::BadRequest(format!(
                "Coupon '{}' is not active",
                code
            )));
        }

        if Utc::now() > coupon.expires_at {
            return Err(ServiceError::BadRequest(format!(
                "Coupon '{}' has expired",
                code
            )));
        }

        if let Some(limit) = coupon.usage_limit {
            if coupon.used_count >= limit {
                return Err(ServiceError::BadRequest(format!(
                    "Coupon '{}' has reached its usage limit",
                    code
                )));
            }
        }

        if let Some(min_value) = coupon.min_order_value {
            if subtotal < min_value {
                return Err(ServiceError::BadRequest(format!(
                    "Order subtotal {} is below the coupon minimum of {}",
                    subtotal, min_value
                )));
            }
        }

        let discount = calculate_discount(&coupon, subtotal);

        // Guarded increment: loses the race instead of overrunning the limit.
        let result = CouponEntity::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .filter(coupon::Column::Id.eq(coupon.id))
            .filter(
                Condition::any()
                    .add(coupon::Column::UsageLimit.is_null())
                    .add(
                        Expr::col(coupon::Column::UsedCount)
                            .lt(Expr::col(coupon::Column::UsageLimit)),
                    ),
            )
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            warn!(code = %code, "Coupon usage limit hit during redemption");
            return Err(ServiceError::BadRequest(format!(
                "Coupon '{}' has reached its usage limit",
                code
            )));
        }

        Ok(AppliedCoupon { code, discount })
    }
}

/// Computes the discount for a subtotal.
///
/// The clamp order is load-bearing: percentage-or-fixed first, then the
/// `max_discount` cap, then the subtotal cap. Reordering changes outcomes at
/// the boundaries.
pub fn calculate_discount(coupon: &CouponModel, subtotal: Decimal) -> Decimal {
    let raw = match coupon.discount_type {
        CouponDiscountType::Percentage => {
            subtotal * coupon.discount_value / Decimal::from(100)
        }
        CouponDiscountType::Fixed => coupon.discount_value,
    };

    let capped = match coupon.max_discount {
        Some(max) if raw > max => max,
        _ => raw,
    };

    capped.min(subtotal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn coupon(
        discount_type: CouponDiscountType,
        value: Decimal,
        max_discount: Option<Decimal>,
    ) -> CouponModel {
        CouponModel {
            id: Uuid::new_v4(),
            code: "TEST".to_string(),
            discount_type,
            discount_value: value,
            min_order_value: None,
            max_discount,
            usage_limit: None,
            used_count: 0,
            expires_at: Utc::now() + chrono::Duration::days(30),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn percentage_discount_capped_by_max_discount() {
        // 10% of 200.00 is 20.00, but the cap clamps it to 15.00
        let c = coupon(CouponDiscountType::Percentage, dec!(10), Some(dec!(15.00)));
        assert_eq!(calculate_discount(&c, dec!(200.00)), dec!(15.00));
    }

    #[test]
    fn percentage_discount_without_cap() {
        let c = coupon(CouponDiscountType::Percentage, dec!(10), None);
        assert_eq!(calculate_discount(&c, dec!(200.00)), dec!(20.00));
    }

    #[test]
    fn fixed_discount_clamped_to_subtotal() {
        let c = coupon(CouponDiscountType::Fixed, dec!(50.00), None);
        assert_eq!(calculate_discount(&c, dec!(30.00)), dec!(30.00));
    }

    #[test]
    fn max_discount_applies_before_subtotal_cap() {
        // cap above subtotal: subtotal clamp is the one that bites
        let c = coupon(CouponDiscountType::Fixed, dec!(80.00), Some(dec!(60.00)));
        assert_eq!(calculate_discount(&c, dec!(40.00)), dec!(40.00));
        // cap below subtotal: max_discount bites first
        assert_eq!(calculate_discount(&c, dec!(100.00)), dec!(60.00));
    }

    proptest! {
        #[test]
        fn discount_never_exceeds_subtotal_or_cap(
            subtotal_cents in 0i64..=10_000_000,
            value_pct in 1i64..=100,
            max_cents in proptest::option::of(0i64..=1_000_000),
        ) {
            let subtotal = Decimal::new(subtotal_cents, 2);
            let max = max_cents.map(|m| Decimal::new(m, 2));
            let c = coupon(CouponDiscountType::Percentage, Decimal::from(value_pct), max);

            let discount = calculate_discount(&c, subtotal);

            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= subtotal);
            if let Some(max) = max {
                prop_assert!(discount <= max);
            }
        }
    }
}
