use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    UserRegistered(Uuid),
    AdminRegistered(Uuid),
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. Failures are reported to the caller but
    /// never abort the originating request.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes domain events off the channel. Currently events only feed the
/// structured log; the loop is the seam where outbound notifications would
/// hang off.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Order status changed"
                );
            }
            other => info!("Received event: {:?}", other),
        }
    }

    warn!("Event channel closed; processing loop exiting");
}
