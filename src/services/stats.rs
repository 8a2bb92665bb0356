//! Dashboard aggregation over the stored orders, reservations, and
//! contact messages. Read-only; every call recomputes from the store.

use std::sync::Arc;

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::models::{MessageStatus, OrderStatus, ReservationStatus};
use crate::store::JsonStore;

/// Counters shown on the back-office dashboard. "Today" and "this month"
/// are calendar buckets in UTC, not rolling windows. Orders count as
/// completed once they are READY or DELIVERED.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_orders: usize,
    pub today_orders: usize,
    pub monthly_orders: usize,
    pub total_revenue: Decimal,
    pub today_revenue: Decimal,
    pub pending_orders: usize,
    pub completed_orders: usize,
    pub total_reservations: usize,
    pub pending_reservations: usize,
    pub total_messages: usize,
    pub unread_messages: usize,
}

pub struct StatsService {
    store: Arc<JsonStore>,
    clock: Arc<dyn Clock>,
}

impl StatsService {
    pub fn new(store: Arc<JsonStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ServiceError> {
        let now = self.clock.now();
        let today = now.date_naive();

        let orders = self.store.orders().await;
        let reservations = self.store.reservations().await;
        let messages = self.store.messages().await;

        let mut stats = DashboardStats {
            total_orders: orders.len(),
            total_reservations: reservations.len(),
            total_messages: messages.len(),
            ..DashboardStats::default()
        };

        for order in &orders {
            let created = order.created_at.date_naive();
            if created == today {
                stats.today_orders += 1;
                stats.today_revenue += order.total;
            }
            if created.year() == today.year() && created.month() == today.month() {
                stats.monthly_orders += 1;
            }
            stats.total_revenue += order.total;

            match order.order_status {
                OrderStatus::Pending => stats.pending_orders += 1,
                OrderStatus::Ready | OrderStatus::Delivered => stats.completed_orders += 1,
                _ => {}
            }
        }

        stats.pending_reservations = reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Pending)
            .count();
        stats.unread_messages = messages
            .iter()
            .filter(|m| m.status == MessageStatus::Unread)
            .count();

        Ok(stats)
    }
}
