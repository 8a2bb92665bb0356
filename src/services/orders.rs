//! Order persistence service: create, list, and status updates over the
//! append-only store.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Order, OrderStatus};
use crate::store::JsonStore;

pub struct OrderService {
    store: Arc<JsonStore>,
    events: EventSender,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(store: Arc<JsonStore>, events: EventSender, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            events,
            clock,
        }
    }

    /// Persists a finalized order, assigning an id and timestamps when the
    /// caller left them blank.
    #[instrument(skip(self, order))]
    pub async fn create(&self, mut order: Order) -> Result<Order, ServiceError> {
        let now = self.clock.now();
        if order.id.is_empty() {
            order.id = format!("ORD-{}", now.timestamp_millis());
            order.created_at = now;
            order.updated_at = now;
        }

        self.store.append_order(order.clone()).await?;
        info!(order_id = %order.id, total = %order.total, "order created");
        self.events
            .send_or_log(Event::OrderCreated {
                order_id: order.id.clone(),
            })
            .await;
        Ok(order)
    }

    pub async fn get(&self, id: &str) -> Result<Order, ServiceError> {
        self.store
            .find_order(id)
            .await
            .ok_or_else(|| ServiceError::NotFound(format!("Order {id}")))
    }

    /// Orders in insertion order, oldest first.
    pub async fn list(&self) -> Vec<Order> {
        self.store.orders().await
    }

    /// Sets the back-office status of an order and touches `updated_at`.
    /// Transitions outside the fulfillment chain are refused.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<Order, ServiceError> {
        let current = self.get(id).await?;
        if !current.order_status.can_transition_to(status) {
            warn!(
                order_id = %id,
                from = current.order_status.as_str(),
                to = status.as_str(),
                "status transition refused"
            );
            return Err(ServiceError::InvalidStatus {
                from: current.order_status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        let now = self.clock.now();
        let updated = self
            .store
            .update_order(id, |order| {
                order.order_status = status;
                order.updated_at = now;
            })
            .await?;

        info!(
            order_id = %id,
            old_status = current.order_status.as_str(),
            new_status = status.as_str(),
            "order status updated"
        );
        self.events
            .send_or_log(Event::OrderStatusChanged {
                order_id: id.to_string(),
                old_status: current.order_status.as_str().to_string(),
                new_status: status.as_str().to_string(),
            })
            .await;
        Ok(updated)
    }
}
