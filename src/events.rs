//! Checkout lifecycle events, delivered over an in-process channel so the
//! storefront UI (or a test) can observe progress without polling.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagePhase {
    Started,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CheckoutStarted {
        flow_id: Uuid,
    },
    CheckoutCompleted {
        flow_id: Uuid,
        order_id: String,
    },
    CheckoutFailed {
        flow_id: Uuid,
        reason: String,
    },
    /// One payment pipeline stage starting or finishing. `message` is the
    /// user-facing progress line shown during processing.
    PaymentStage {
        stage: String,
        phase: StagePhase,
        message: String,
    },
    OrderCreated {
        order_id: String,
    },
    OrderStatusChanged {
        order_id: String,
        old_status: String,
        new_status: String,
    },
    CartCleared,
}

/// Cloneable handle for emitting events.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Builds a sender together with its receiving end.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Sends an event; a closed or full channel is logged and otherwise
    /// ignored. Event delivery never fails a checkout.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{e}");
        }
    }
}
