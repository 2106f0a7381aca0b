use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        customer::{self, CustomerStatus, Entity as CustomerEntity, Model as CustomerModel},
        customer_address::{
            self, Entity as CustomerAddressEntity, Model as CustomerAddressModel,
        },
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Identity supplied by a guest checkout.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GuestCustomerInfo {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
}

/// Address fields for a fresh guest-checkout address.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, message = "Address line is required"))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Outcome of guest identity resolution.
#[derive(Debug, Clone)]
pub struct GuestResolution {
    pub customer: CustomerModel,
    /// True when a new customer row was created (rather than updated).
    pub created: bool,
}

/// Customer accounts and guest identity resolution.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl CustomerService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Finds or creates the customer behind a guest checkout.
    ///
    /// Lookup order: exact email match first, then normalized phone. Email is
    /// the trust anchor: an email match refreshes name and phone in place,
    /// and a phone match yields its record's email to the supplied one only
    /// because the email-first lookup already proved that email is free.
    /// At most one row is created or updated per call.
    #[instrument(skip(self, conn, info), fields(email = %info.email))]
    pub async fn resolve_guest<C: ConnectionTrait>(
        &self,
        conn: &C,
        info: GuestCustomerInfo,
    ) -> Result<GuestResolution, ServiceError> {
        info.validate()?;

        let phone = normalize_phone(&info.phone);

        if let Some(existing) = CustomerEntity::find()
            .filter(customer::Column::Email.eq(&info.email))
            .one(conn)
            .await?
        {
            let customer_id = existing.id;
            let mut active: customer::ActiveModel = existing.into();
            active.name = Set(info.name);
            active.phone = Set(phone);
            let updated = active.update(conn).await?;
            info!(customer_id = %customer_id, "Guest checkout matched existing customer by email");
            return Ok(GuestResolution {
                customer: updated,
                created: false,
            });
        }

        if let Some(existing) = CustomerEntity::find()
            .filter(customer::Column::Phone.eq(&phone))
            .one(conn)
            .await?
        {
            // The supplied email is free (the email lookup above came back
            // empty), so the phone match absorbs the new identity fields.
            let customer_id = existing.id;
            let mut active: customer::ActiveModel = existing.into();
            active.name = Set(info.name);
            active.email = Set(info.email);
            active.phone = Set(phone);
            let updated = active.update(conn).await?;
            info!(customer_id = %customer_id, "Guest checkout matched existing customer by phone");
            return Ok(GuestResolution {
                customer: updated,
                created: false,
            });
        }

        let password_hash = hash_password(&temporary_password(&info.name));
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(info.name),
            email: Set(info.email),
            phone: Set(phone),
            password_hash: Set(password_hash),
            status: Set(CustomerStatus::Active),
            total_orders: Set(0),
            total_spent: Set(Decimal::ZERO),
            ..Default::default()
        };

        let created = model.insert(conn).await?;
        info!(customer_id = %created.id, "Guest checkout created new customer");
        Ok(GuestResolution {
            customer: created,
            created: true,
        })
    }

    /// Registers a customer with explicit credentials.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<CustomerModel, ServiceError> {
        request.validate()?;

        let existing = CustomerEntity::find()
            .filter(customer::Column::Email.eq(&request.email))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Email '{}' is already registered",
                request.email
            )));
        }

        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            email: Set(request.email),
            phone: Set(normalize_phone(&request.phone)),
            password_hash: Set(hash_password(&request.password)),
            status: Set(CustomerStatus::Active),
            total_orders: Set(0),
            total_spent: Set(Decimal::ZERO),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await?;

        if let Err(e) = self
            .event_sender
            .send(Event::CustomerCreated(created.id))
            .await
        {
            warn!(error = %e, customer_id = %created.id, "Failed to send customer created event");
        }

        Ok(created)
    }

    pub async fn get_customer(&self, customer_id: Uuid) -> Result<CustomerModel, ServiceError> {
        CustomerEntity::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))
    }

    /// Adds an address to a registered customer.
    #[instrument(skip(self, input))]
    pub async fn add_address(
        &self,
        customer_id: Uuid,
        input: AddressInput,
    ) -> Result<CustomerAddressModel, ServiceError> {
        self.get_customer(customer_id).await?;
        self.insert_address(&*self.db, customer_id, input).await
    }

    /// Creates a fresh address inside a guest-checkout transaction.
    pub async fn create_address_for<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
        input: AddressInput,
    ) -> Result<CustomerAddressModel, ServiceError> {
        self.insert_address(conn, customer_id, input).await
    }

    /// Fetches an address, enforcing that it belongs to the given customer.
    pub async fn get_address_owned<C: ConnectionTrait>(
        &self,
        conn: &C,
        address_id: Uuid,
        customer_id: Uuid,
    ) -> Result<CustomerAddressModel, ServiceError> {
        let address = CustomerAddressEntity::find_by_id(address_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;

        if address.customer_id != customer_id {
            return Err(ServiceError::Forbidden(
                "Address does not belong to the requesting customer".to_string(),
            ));
        }

        Ok(address)
    }

    /// Bumps the customer's lifetime aggregates inside the order-creation
    /// transaction.
    ///
    /// Atomic in-place adds, same discipline as stock and coupon counters:
    /// two concurrent checkouts by one customer must not lose an increment.
    pub async fn record_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
        total: Decimal,
    ) -> Result<(), ServiceError> {
        let result = CustomerEntity::update_many()
            .col_expr(
                customer::Column::TotalOrders,
                Expr::col(customer::Column::TotalOrders).add(1),
            )
            .col_expr(
                customer::Column::TotalSpent,
                Expr::col(customer::Column::TotalSpent).add(total),
            )
            .filter(customer::Column::Id.eq(customer_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Customer {} not found",
                customer_id
            )));
        }

        Ok(())
    }

    async fn insert_address<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
        input: AddressInput,
    ) -> Result<CustomerAddressModel, ServiceError> {
        input.validate()?;

        let model = customer_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            line1: Set(input.line1),
            line2: Set(input.line2),
            city: Set(input.city),
            state: Set(input.state),
            postal_code: Set(input.postal_code),
            created_at: Set(chrono::Utc::now()),
        };

        Ok(model.insert(conn).await?)
    }
}

/// Strips everything but ASCII digits from a raw phone string.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Deterministic temporary password for customers created by guest checkout:
/// the first three characters of the lowercased name plus a fixed suffix.
fn temporary_password(name: &str) -> String {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    format!("{}123", prefix)
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
