//! Durable JSON store for finalized orders, the payment-attempt counter,
//! and the dashboard's reservation and message records.
//!
//! The whole state lives in one JSON document guarded by an async RwLock.
//! Every mutation rewrites the file through a temp-file rename so a crash
//! mid-write never leaves a truncated store behind.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::ServiceError;
use crate::models::{MessageRecord, Order, RateLimitCounter, ReservationRecord};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreState {
    #[serde(default)]
    orders: Vec<Order>,
    #[serde(default)]
    payment_attempts: RateLimitCounter,
    #[serde(default)]
    reservations: Vec<ReservationRecord>,
    #[serde(default)]
    messages: Vec<MessageRecord>,
}

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl JsonStore {
    /// Opens the store at `path`, starting empty when the file does not
    /// exist yet. A present-but-corrupt file is an error, not a reset.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), "opened order store");
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    async fn persist(&self, state: &StoreState) -> Result<(), ServiceError> {
        let body = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Appends a finalized order. Orders are never deleted.
    pub async fn append_order(&self, order: Order) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        state.orders.push(order);
        self.persist(&state).await
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.state.read().await.orders.clone()
    }

    pub async fn find_order(&self, id: &str) -> Option<Order> {
        self.state
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
    }

    /// Applies `mutate` to the order with the given id and persists the
    /// result, returning the updated record.
    pub async fn update_order<F>(&self, id: &str, mutate: F) -> Result<Order, ServiceError>
    where
        F: FnOnce(&mut Order),
    {
        let mut state = self.state.write().await;
        let updated = {
            let order = state
                .orders
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| ServiceError::NotFound(format!("Order {id}")))?;
            mutate(order);
            order.clone()
        };
        self.persist(&state).await?;
        Ok(updated)
    }

    pub async fn payment_attempts(&self) -> RateLimitCounter {
        self.state.read().await.payment_attempts.clone()
    }

    pub async fn update_payment_attempts<F>(&self, mutate: F) -> Result<RateLimitCounter, ServiceError>
    where
        F: FnOnce(&mut RateLimitCounter),
    {
        let mut state = self.state.write().await;
        mutate(&mut state.payment_attempts);
        let updated = state.payment_attempts.clone();
        self.persist(&state).await?;
        Ok(updated)
    }

    pub async fn append_reservation(&self, record: ReservationRecord) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        state.reservations.push(record);
        self.persist(&state).await
    }

    pub async fn reservations(&self) -> Vec<ReservationRecord> {
        self.state.read().await.reservations.clone()
    }

    pub async fn append_message(&self, record: MessageRecord) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        state.messages.push(record);
        self.persist(&state).await
    }

    pub async fn messages(&self) -> Vec<MessageRecord> {
        self.state.read().await.messages.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
