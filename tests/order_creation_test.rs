mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};

use common::TestApp;
use partshop_api::{
    entities::{
        self, product, service, CouponDiscountType, OrderItemType, OrderStatus, ProductStatus,
        ServiceStatus,
    },
    errors::ServiceError,
    services::{catalog::OrderLineRequest, orders::CreateOrderRequest},
};

#[tokio::test]
async fn creating_an_order_snapshots_prices_and_depletes_stock() {
    let app = TestApp::new().await;
    let (customer, address) = app.seed_customer("Ana", "ana@example.com", "(11) 99999-0001").await;
    let product = app
        .seed_product("BRK-100", 3, dec!(50.00), Some(dec!(40.00)))
        .await;

    let details = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![OrderLineRequest::Product {
                product_id: product.id,
                quantity: 3,
            }],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await
        .expect("order should be created");

    assert_eq!(details.order.status, OrderStatus::Pending);
    assert_eq!(details.order.quote_status, None);
    assert!(details.order.has_products);
    assert!(!details.order.has_services);
    // promotional price wins over the sale price
    assert_eq!(details.order.subtotal, dec!(120.00));
    assert_eq!(details.order.discount_amount, dec!(0));
    assert_eq!(details.order.total, dec!(120.00));

    assert_eq!(details.items.len(), 1);
    let item = &details.items[0];
    assert_eq!(item.item_type, OrderItemType::Product);
    assert_eq!(item.unit_price, dec!(40.00));
    assert_eq!(item.quantity, 3);
    assert_eq!(item.subtotal, dec!(120.00));
    assert!(item.price_quoted);

    let product = app.reload_product(product.id).await;
    assert_eq!(product.stock, 0);
    assert_eq!(product.status, ProductStatus::OutOfStock);

    let customer = app.reload_customer(customer.id).await;
    assert_eq!(customer.total_orders, 1);
    assert_eq!(customer.total_spent, dec!(120.00));
}

#[tokio::test]
async fn lifetime_aggregates_accumulate_across_orders() {
    let app = TestApp::new().await;
    let (customer, address) = app
        .seed_customer("Beto", "beto@example.com", "11999990012")
        .await;
    let product = app.seed_product("BRK-150", 10, dec!(30.00), None).await;

    for qty in [2, 3] {
        app.state
            .services
            .orders
            .create_order(CreateOrderRequest {
                customer_id: customer.id,
                address_id: address.id,
                items: vec![OrderLineRequest::Product {
                    product_id: product.id,
                    quantity: qty,
                }],
                payment_method: "pix".to_string(),
                coupon_code: None,
            })
            .await
            .expect("order");
    }

    // in-place adds: 2*30 + 3*30
    let customer = app.reload_customer(customer.id).await;
    assert_eq!(customer.total_orders, 2);
    assert_eq!(customer.total_spent, dec!(150.00));
}

#[tokio::test]
async fn insufficient_stock_rejects_the_order_without_partial_writes() {
    let app = TestApp::new().await;
    let (customer, address) = app.seed_customer("Bruno", "bruno@example.com", "11999990002").await;
    let product = app.seed_product("BRK-200", 3, dec!(50.00), None).await;

    app.state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![OrderLineRequest::Product {
                product_id: product.id,
                quantity: 3,
            }],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await
        .expect("first order takes the remaining stock");

    let result = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![OrderLineRequest::Product {
                product_id: product.id,
                quantity: 1,
            }],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await;

    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));

    // exactly one order and one item persisted, nothing from the failed attempt
    let orders = entities::Order::find().count(app.db()).await.unwrap();
    let items = entities::OrderItem::find().count(app.db()).await.unwrap();
    assert_eq!(orders, 1);
    assert_eq!(items, 1);

    let product = app.reload_product(product.id).await;
    assert_eq!(product.stock, 0);

    let customer = app.reload_customer(customer.id).await;
    assert_eq!(customer.total_orders, 1);
}

#[tokio::test]
async fn percentage_coupon_is_capped_by_max_discount() {
    let app = TestApp::new().await;
    let (customer, address) = app.seed_customer("Carla", "carla@example.com", "11999990003").await;
    let product = app.seed_product("BRK-300", 10, dec!(100.00), None).await;
    app.seed_coupon(
        "SAVE10",
        CouponDiscountType::Percentage,
        dec!(10),
        Some(dec!(15.00)),
        Some(5),
    )
    .await;

    let details = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![OrderLineRequest::Product {
                product_id: product.id,
                quantity: 2,
            }],
            payment_method: "card".to_string(),
            coupon_code: Some("save10".to_string()),
        })
        .await
        .expect("order with coupon");

    // 10% of 200.00 is 20.00, capped at 15.00
    assert_eq!(details.order.subtotal, dec!(200.00));
    assert_eq!(details.order.discount_amount, dec!(15.00));
    assert_eq!(details.order.total, dec!(185.00));
    assert_eq!(details.order.coupon_code.as_deref(), Some("SAVE10"));

    let coupon = app
        .state
        .services
        .coupons
        .get_coupon_by_code("SAVE10")
        .await
        .expect("coupon still there");
    assert_eq!(coupon.used_count, 1);
}

#[tokio::test]
async fn exhausted_coupon_aborts_the_whole_order() {
    let app = TestApp::new().await;
    let (customer, address) = app.seed_customer("Davi", "davi@example.com", "11999990004").await;
    let product = app.seed_product("BRK-400", 10, dec!(30.00), None).await;
    app.seed_coupon(
        "ONEUSE",
        CouponDiscountType::Fixed,
        dec!(5.00),
        None,
        Some(1),
    )
    .await;

    let make_request = |qty: i32| CreateOrderRequest {
        customer_id: customer.id,
        address_id: address.id,
        items: vec![OrderLineRequest::Product {
            product_id: product.id,
            quantity: qty,
        }],
        payment_method: "pix".to_string(),
        coupon_code: Some("ONEUSE".to_string()),
    };

    app.state
        .services
        .orders
        .create_order(make_request(1))
        .await
        .expect("first redemption");

    let result = app.state.services.orders.create_order(make_request(1)).await;
    assert_matches!(result, Err(ServiceError::BadRequest(_)));

    // the failed attempt must not have reserved stock
    let product = app.reload_product(product.id).await;
    assert_eq!(product.stock, 9);

    let orders = entities::Order::find().count(app.db()).await.unwrap();
    assert_eq!(orders, 1);
}

#[tokio::test]
async fn discontinued_product_line_is_rejected() {
    let app = TestApp::new().await;
    let (customer, address) = app
        .seed_customer("Hugo", "hugo@example.com", "11999990013")
        .await;
    let seeded = app.seed_product("BRK-700", 5, dec!(10.00), None).await;

    let mut active: product::ActiveModel = seeded.clone().into();
    active.status = Set(ProductStatus::Discontinued);
    active.update(app.db()).await.expect("discontinue product");

    let result = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![OrderLineRequest::Product {
                product_id: seeded.id,
                quantity: 1,
            }],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await;

    assert_matches!(result, Err(ServiceError::BadRequest(_)));

    // stock untouched by the rejected line
    let product = app.reload_product(seeded.id).await;
    assert_eq!(product.stock, 5);
}

#[tokio::test]
async fn inactive_service_line_is_rejected() {
    let app = TestApp::new().await;
    let (customer, address) = app
        .seed_customer("Iris", "iris@example.com", "11999990014")
        .await;
    let seeded = app.seed_service("Retired service", Some(dec!(40.00))).await;

    let mut active: service::ActiveModel = seeded.clone().into();
    active.status = Set(ServiceStatus::Inactive);
    active.update(app.db()).await.expect("deactivate service");

    let result = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![OrderLineRequest::Service {
                service_id: seeded.id,
                quantity: 1,
            }],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await;

    assert_matches!(result, Err(ServiceError::BadRequest(_)));

    let orders = entities::Order::find().count(app.db()).await.unwrap();
    assert_eq!(orders, 0);
}

#[tokio::test]
async fn address_must_belong_to_the_ordering_customer() {
    let app = TestApp::new().await;
    let (customer_a, _) = app.seed_customer("Eva", "eva@example.com", "11999990005").await;
    let (_, address_b) = app.seed_customer("Fred", "fred@example.com", "11999990006").await;
    let product = app.seed_product("BRK-500", 5, dec!(10.00), None).await;

    let result = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer_a.id,
            address_id: address_b.id,
            items: vec![OrderLineRequest::Product {
                product_id: product.id,
                quantity: 1,
            }],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await;

    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn empty_or_zero_quantity_carts_are_rejected() {
    let app = TestApp::new().await;
    let (customer, address) = app.seed_customer("Gil", "gil@example.com", "11999990007").await;
    let product = app.seed_product("BRK-600", 5, dec!(10.00), None).await;

    let empty = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await;
    assert_matches!(empty, Err(ServiceError::ValidationError(_)));

    let zero_qty = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![OrderLineRequest::Product {
                product_id: product.id,
                quantity: 0,
            }],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await;
    assert_matches!(zero_qty, Err(ServiceError::BadRequest(_)));
}
