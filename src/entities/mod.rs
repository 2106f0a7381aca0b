pub mod coupon;
pub mod customer;
pub mod customer_address;
pub mod order;
pub mod order_item;
pub mod product;
pub mod service;

// Re-export entities under their conventional names
pub use coupon::{CouponDiscountType, Entity as Coupon, Model as CouponModel};
pub use customer::{CustomerStatus, Entity as Customer, Model as CustomerModel};
pub use customer_address::{Entity as CustomerAddress, Model as CustomerAddressModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, QuoteStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel, OrderItemType};
pub use product::{Entity as Product, Model as ProductModel, ProductStatus};
pub use service::{Entity as Service, Model as ServiceModel, ServiceStatus};
