use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::entities::order::OrderStatus;

/// Events emitted at the core's notification trigger points.
///
/// Delivery (email, push) is owned by the downstream dispatcher; from this
/// crate's perspective sends are fire-and-forget and a failed send never
/// rolls back the transaction that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order lifecycle
    OrderCreated(Uuid),
    OrderStatusUpdated {
        order_id: Uuid,
        new_status: OrderStatus,
    },
    OrderCancelled(Uuid),

    // Quote lifecycle
    NewQuoteRequested(Uuid),
    QuoteSubmitted(Uuid),
    QuoteApproved(Uuid),
    QuoteRejected {
        order_id: Uuid,
        customer_id: Uuid,
    },

    // Customer events
    CustomerCreated(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a connected sender/receiver pair with the given channel capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Default event consumer: logs each trigger point.
///
/// Real deployments replace this loop with the notification dispatcher.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "notify: order created");
            }
            Event::OrderStatusUpdated {
                order_id,
                new_status,
            } => {
                info!(order_id = %order_id, new_status = new_status.as_str(), "notify: order status updated");
            }
            Event::OrderCancelled(order_id) => {
                info!(order_id = %order_id, "notify: order cancelled");
            }
            Event::NewQuoteRequested(order_id) => {
                info!(order_id = %order_id, "notify: new quote request");
            }
            Event::QuoteSubmitted(order_id) => {
                info!(order_id = %order_id, "notify: quote submitted");
            }
            Event::QuoteApproved(order_id) => {
                info!(order_id = %order_id, "notify: quote approved");
            }
            Event::QuoteRejected {
                order_id,
                customer_id,
            } => {
                info!(order_id = %order_id, customer_id = %customer_id, "notify: quote rejected");
            }
            Event::CustomerCreated(customer_id) => {
                info!(customer_id = %customer_id, "notify: customer created");
            }
        }
    }

    info!("Event processing loop stopped");
}
