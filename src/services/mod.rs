// Core services
pub mod catalog;
pub mod coupons;
pub mod customers;
pub mod inventory;
pub mod order_status;
pub mod orders;
pub mod quotes;

// Service factory for dependency injection
pub mod factory;
