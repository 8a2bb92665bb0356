//! Simulated payment pipeline.
//!
//! Processing runs five stages in a fixed order, emitting a started and a
//! completed event per stage. The processor refuses any payload that does
//! not carry a matching [`Clearance`] from the security layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender, StagePhase};
use crate::models::{PaymentData, PaymentMethod};
use crate::security::{Clearance, PaymentSecurity};
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Encrypt,
    ValidateCard,
    Charge,
    Tokenize,
    Finalize,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Encrypt,
        PipelineStage::ValidateCard,
        PipelineStage::Charge,
        PipelineStage::Tokenize,
        PipelineStage::Finalize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Encrypt => "encrypt",
            PipelineStage::ValidateCard => "validate",
            PipelineStage::Charge => "charge",
            PipelineStage::Tokenize => "tokenize",
            PipelineStage::Finalize => "finalize",
        }
    }

    /// Progress line shown to the customer while the stage runs.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Encrypt => "Encrypting payment data",
            PipelineStage::ValidateCard => "Validating card information",
            PipelineStage::Charge => "Processing payment",
            PipelineStage::Tokenize => "Generating secure token",
            PipelineStage::Finalize => "Finalizing transaction",
        }
    }
}

/// Seam for the charge call and per-stage pacing, so tests can drop the
/// delays and force declines.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Stands in for gateway round-trip latency.
    async fn pace(&self, stage: PipelineStage);

    /// Authorizes and captures the amount.
    async fn charge(&self, amount: Decimal) -> Result<(), ServiceError>;
}

/// Always-approving gateway with configurable stage pacing.
pub struct SimulatedGateway {
    stage_delay: Duration,
}

impl SimulatedGateway {
    pub fn new(stage_delay_ms: u64) -> Self {
        Self {
            stage_delay: Duration::from_millis(stage_delay_ms),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn pace(&self, _stage: PipelineStage) {
        if !self.stage_delay.is_zero() {
            tokio::time::sleep(self.stage_delay).await;
        }
    }

    async fn charge(&self, amount: Decimal) -> Result<(), ServiceError> {
        info!(%amount, "simulated charge approved");
        Ok(())
    }
}

/// Successful pipeline result.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorReceipt {
    pub transaction_id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

pub struct PaymentProcessor {
    security: Arc<PaymentSecurity>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSender,
    clock: Arc<dyn Clock>,
}

impl PaymentProcessor {
    pub fn new(
        security: Arc<PaymentSecurity>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            security,
            gateway,
            events,
            clock,
        }
    }

    /// Runs the pipeline for a validated payload. A stage failure aborts
    /// the remaining stages and surfaces as the call's error.
    #[instrument(skip_all, fields(total = %data.total))]
    pub async fn process(
        &self,
        data: &PaymentData,
        clearance: &Clearance,
    ) -> Result<ProcessorReceipt, ServiceError> {
        if !clearance.covers(data)? {
            return Err(ServiceError::PreconditionFailed(
                "payment data does not match its validation clearance".to_string(),
            ));
        }

        for stage in PipelineStage::ALL {
            self.events
                .send_or_log(Event::PaymentStage {
                    stage: stage.name().to_string(),
                    phase: StagePhase::Started,
                    message: format!("{}...", stage.label()),
                })
                .await;

            self.gateway.pace(stage).await;
            self.run_stage(stage, data).await?;

            self.events
                .send_or_log(Event::PaymentStage {
                    stage: stage.name().to_string(),
                    phase: StagePhase::Completed,
                    message: format!("{} complete", stage.label()),
                })
                .await;
        }

        let receipt = ProcessorReceipt {
            transaction_id: format!("TXN-{}", Uuid::new_v4()),
            status: "completed".to_string(),
            timestamp: self.clock.now(),
        };
        info!(transaction_id = %receipt.transaction_id, "payment pipeline completed");
        Ok(receipt)
    }

    async fn run_stage(&self, stage: PipelineStage, data: &PaymentData) -> Result<(), ServiceError> {
        match stage {
            PipelineStage::Encrypt => {
                self.security.obscure(data)?;
                Ok(())
            }
            PipelineStage::ValidateCard => {
                if data.payment_info.method == PaymentMethod::Credit {
                    validation::validate_card_number(&data.payment_info.card_number)
                        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
                }
                Ok(())
            }
            PipelineStage::Charge => self.gateway.charge(data.total).await,
            PipelineStage::Tokenize => {
                self.security.generate_payment_token(data)?;
                Ok(())
            }
            PipelineStage::Finalize => Ok(()),
        }
    }
}
