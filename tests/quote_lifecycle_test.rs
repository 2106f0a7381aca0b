mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use common::TestApp;
use partshop_api::{
    entities::{OrderStatus, QuoteStatus},
    errors::ServiceError,
    services::{
        catalog::OrderLineRequest,
        order_status::UpdateOrderStatusRequest,
        orders::{CreateOrderRequest, OrderDetails},
        quotes::QuotedItemPrice,
    },
};

/// Seeds an order with one unpriced service line and returns it.
async fn order_awaiting_quote(app: &TestApp) -> (OrderDetails, uuid::Uuid) {
    let (customer, address) = app
        .seed_customer("Mara", "mara@example.com", "11933336666")
        .await;
    let service = app.seed_service("Engine rebuild", None).await;

    let details = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![OrderLineRequest::Service {
                service_id: service.id,
                quantity: 1,
            }],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await
        .expect("order awaiting quote");

    (details, customer.id)
}

#[tokio::test]
async fn submitting_a_quote_prices_the_items_and_recomputes_totals() {
    let app = TestApp::new().await;
    let (details, _) = order_awaiting_quote(&app).await;
    let item_id = details.items[0].id;

    let order = app
        .state
        .services
        .quotes
        .submit_quote(
            details.order.id,
            vec![QuotedItemPrice {
                item_id,
                unit_price: dec!(350.00),
            }],
        )
        .await
        .expect("quote submitted");

    assert_eq!(order.quote_status, Some(QuoteStatus::Quoted));
    assert!(order.quoted_at.is_some());
    assert_eq!(order.subtotal, dec!(350.00));
    assert_eq!(order.total, dec!(350.00));

    let reloaded = app
        .state
        .services
        .orders
        .get_order(details.order.id)
        .await
        .unwrap();
    assert_eq!(reloaded.items[0].unit_price, dec!(350.00));
    assert!(reloaded.items[0].price_quoted);
}

#[tokio::test]
async fn quote_must_cover_every_unpriced_item() {
    let app = TestApp::new().await;
    let (customer, address) = app
        .seed_customer("Nina", "nina@example.com", "11922227777")
        .await;
    let service_a = app.seed_service("Welding", None).await;
    let service_b = app.seed_service("Painting", None).await;

    let details = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            customer_id: customer.id,
            address_id: address.id,
            items: vec![
                OrderLineRequest::Service {
                    service_id: service_a.id,
                    quantity: 1,
                },
                OrderLineRequest::Service {
                    service_id: service_b.id,
                    quantity: 1,
                },
            ],
            payment_method: "pix".to_string(),
            coupon_code: None,
        })
        .await
        .expect("two-service order");

    let result = app
        .state
        .services
        .quotes
        .submit_quote(
            details.order.id,
            vec![QuotedItemPrice {
                item_id: details.items[0].id,
                unit_price: dec!(100.00),
            }],
        )
        .await;

    assert_matches!(result, Err(ServiceError::BadRequest(_)));

    // nothing committed, the order is still awaiting its quote
    let reloaded = app
        .state
        .services
        .orders
        .get_order(details.order.id)
        .await
        .unwrap();
    assert_eq!(reloaded.order.quote_status, Some(QuoteStatus::Pending));
}

#[tokio::test]
async fn approving_a_quote_moves_the_order_into_production() {
    let app = TestApp::new().await;
    let (details, customer_id) = order_awaiting_quote(&app).await;

    app.state
        .services
        .quotes
        .submit_quote(
            details.order.id,
            vec![QuotedItemPrice {
                item_id: details.items[0].id,
                unit_price: dec!(500.00),
            }],
        )
        .await
        .expect("quote submitted");

    let order = app
        .state
        .services
        .quotes
        .approve_quote(details.order.id, customer_id)
        .await
        .expect("quote approved");

    assert_eq!(order.quote_status, Some(QuoteStatus::Approved));
    assert_eq!(order.status, OrderStatus::InProduction);
    assert!(order.quote_approved_at.is_some());

    // a second approval is a lifecycle violation
    let again = app
        .state
        .services
        .quotes
        .approve_quote(details.order.id, customer_id)
        .await;
    assert_matches!(again, Err(ServiceError::BadRequest(_)));
}

#[tokio::test]
async fn approved_order_rejoins_fulfillment_at_preparing() {
    let app = TestApp::new().await;
    let (details, customer_id) = order_awaiting_quote(&app).await;

    app.state
        .services
        .quotes
        .submit_quote(
            details.order.id,
            vec![QuotedItemPrice {
                item_id: details.items[0].id,
                unit_price: dec!(500.00),
            }],
        )
        .await
        .expect("quote submitted");
    app.state
        .services
        .quotes
        .approve_quote(details.order.id, customer_id)
        .await
        .expect("quote approved");

    let order = app
        .state
        .services
        .order_status
        .update_status(
            details.order.id,
            customer_id,
            UpdateOrderStatusRequest {
                new_status: OrderStatus::Preparing,
                tracking_code: None,
                estimated_delivery: None,
            },
        )
        .await
        .expect("in_production -> preparing");
    assert_eq!(order.status, OrderStatus::Preparing);
}

#[tokio::test]
async fn rejecting_a_quote_is_terminal_for_the_quote() {
    let app = TestApp::new().await;
    let (details, customer_id) = order_awaiting_quote(&app).await;

    app.state
        .services
        .quotes
        .submit_quote(
            details.order.id,
            vec![QuotedItemPrice {
                item_id: details.items[0].id,
                unit_price: dec!(500.00),
            }],
        )
        .await
        .expect("quote submitted");

    let order = app
        .state
        .services
        .quotes
        .reject_quote(details.order.id, customer_id)
        .await
        .expect("quote rejected");

    assert_eq!(order.quote_status, Some(QuoteStatus::Rejected));

    let approve_after = app
        .state
        .services
        .quotes
        .approve_quote(details.order.id, customer_id)
        .await;
    assert_matches!(approve_after, Err(ServiceError::BadRequest(_)));
}

#[tokio::test]
async fn only_the_owning_customer_can_decide_a_quote() {
    let app = TestApp::new().await;
    let (details, _) = order_awaiting_quote(&app).await;
    let (stranger, _) = app
        .seed_customer("Otto", "otto@example.com", "11911118888")
        .await;

    app.state
        .services
        .quotes
        .submit_quote(
            details.order.id,
            vec![QuotedItemPrice {
                item_id: details.items[0].id,
                unit_price: dec!(500.00),
            }],
        )
        .await
        .expect("quote submitted");

    let result = app
        .state
        .services
        .quotes
        .approve_quote(details.order.id, stranger.id)
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn cannot_submit_a_quote_for_an_order_that_does_not_need_one() {
    let app = TestApp::new().await;
    let (customer, address) = app
        .seed_customer("Pia", "pia@example.com", "11900009999")
        .await;
    let product = app.seed_product("QTE-100", 5, dec!(20.00), None).await;

    let details = app
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
        .await
        .expect("plain product order");

    let result = app
        .state
        .services
        .quotes
        .submit_quote(
            details.order.id,
            vec![QuotedItemPrice {
                item_id: details.items[0].id,
                unit_price: dec!(20.00),
            }],
        )
        .await;

    assert_matches!(result, Err(ServiceError::BadRequest(_)));
}
