//! Payment validation, masking, and tokenization.
//!
//! [`PaymentSecurity`] is the single gate in front of the payment
//! processor: it aggregates the field validators, enforces the lockout
//! window and session timeout, and hands back a [`Clearance`] that the
//! processor later demands as proof the exact payload was validated.

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::config::CheckoutConfig;
use crate::errors::ServiceError;
use crate::models::{PaymentData, PaymentMethod};
use crate::rate_limiter::AttemptGuard;
use crate::validation;

const MASK_MIN_CARD_LEN: usize = 8;
const MASK_MIN_LOCAL_LEN: usize = 3;
const TOKEN_NONCE_LEN: usize = 16;

/// Proof that a specific payload passed validation. Carries a SHA-256
/// fingerprint of the payload; the processor refuses anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clearance {
    fingerprint: String,
}

impl Clearance {
    fn for_payload(data: &PaymentData) -> Result<Self, ServiceError> {
        Ok(Self {
            fingerprint: fingerprint(data)?,
        })
    }

    pub fn covers(&self, data: &PaymentData) -> Result<bool, ServiceError> {
        Ok(self.fingerprint == fingerprint(data)?)
    }
}

fn fingerprint(data: &PaymentData) -> Result<String, ServiceError> {
    let bytes = serde_json::to_vec(data)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Result of aggregate payment validation. `errors` carries user-facing
/// messages; `clearance` is present only when everything passed.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Masked copy safe to log or echo back to the UI.
    pub masked_data: Option<PaymentData>,
    pub clearance: Option<Clearance>,
}

impl ValidationOutcome {
    fn rejected(message: String) -> Self {
        Self {
            valid: false,
            errors: vec![message],
            masked_data: None,
            clearance: None,
        }
    }
}

pub struct PaymentSecurity {
    guard: AttemptGuard,
    clock: Arc<dyn Clock>,
    session_start: DateTime<Utc>,
    session_timeout: Duration,
    obscure_key: Vec<u8>,
}

impl PaymentSecurity {
    /// Starts a security session; the session clock begins at construction.
    pub fn new(guard: AttemptGuard, clock: Arc<dyn Clock>, config: &CheckoutConfig) -> Self {
        let session_start = clock.now();
        Self {
            guard,
            clock,
            session_start,
            session_timeout: Duration::minutes(config.session_timeout_minutes),
            obscure_key: config.obscure_key.as_bytes().to_vec(),
        }
    }

    pub fn is_session_valid(&self) -> bool {
        self.clock.now() - self.session_start < self.session_timeout
    }

    /// Validates a full payment payload.
    ///
    /// Order of checks: lockout window, session timeout, then the field
    /// validators with errors accumulated rather than short-circuited.
    /// Lockout and session rejections do not count as attempts; every
    /// call that reaches the field validators records exactly one.
    #[instrument(skip_all)]
    pub async fn validate_payment_data(
        &self,
        data: &PaymentData,
    ) -> Result<ValidationOutcome, ServiceError> {
        let now = self.clock.now();

        let lockout = self.guard.check_lockout(now).await?;
        if lockout.limited {
            return Ok(ValidationOutcome::rejected(
                ServiceError::RateLimited {
                    remaining_minutes: lockout.remaining_minutes,
                }
                .to_string(),
            ));
        }

        if !self.is_session_valid() {
            warn!("checkout session expired before validation");
            return Ok(ValidationOutcome::rejected(
                ServiceError::SessionExpired.to_string(),
            ));
        }

        let mut errors = Vec::new();

        if data.payment_info.method == PaymentMethod::Credit {
            let brand = match validation::validate_card_number(&data.payment_info.card_number) {
                Ok(brand) => Some(brand),
                Err(e) => {
                    errors.push(e.to_string());
                    None
                }
            };
            if let Err(e) = validation::validate_expiry(&data.payment_info.expiry_date, now) {
                errors.push(e.to_string());
            }
            if let Err(e) = validation::validate_cvv(&data.payment_info.cvv, brand) {
                errors.push(e.to_string());
            }
        }

        if let Err(e) = validation::validate_email(&data.customer_info.email) {
            errors.push(e.to_string());
        }
        if let Err(e) = validation::validate_phone(&data.customer_info.phone) {
            errors.push(e.to_string());
        }

        self.guard.record_attempt(now).await?;

        let valid = errors.is_empty();
        let clearance = if valid {
            Some(Clearance::for_payload(data)?)
        } else {
            None
        };
        info!(valid, error_count = errors.len(), "payment data validated");

        Ok(ValidationOutcome {
            valid,
            errors,
            masked_data: Some(mask_sensitive_data(data)),
            clearance,
        })
    }

    /// Reversible at-rest obscuring of a serializable value. This is an
    /// obfuscation transform keyed by local configuration, not a security
    /// boundary; raw card data still must never be persisted or logged.
    pub fn obscure<T: Serialize>(&self, value: &T) -> Result<String, ServiceError> {
        let plain = serde_json::to_vec(value)?;
        let mixed: Vec<u8> = plain
            .iter()
            .zip(self.obscure_key.iter().cycle())
            .map(|(byte, key)| byte ^ key)
            .collect();
        Ok(general_purpose::STANDARD.encode(mixed))
    }

    /// Inverse of [`obscure`](Self::obscure).
    pub fn reveal<T: DeserializeOwned>(&self, obscured: &str) -> Result<T, ServiceError> {
        let mixed = general_purpose::STANDARD
            .decode(obscured)
            .map_err(|e| ServiceError::MalformedPayload(e.to_string()))?;
        let plain: Vec<u8> = mixed
            .iter()
            .zip(self.obscure_key.iter().cycle())
            .map(|(byte, key)| byte ^ key)
            .collect();
        Ok(serde_json::from_slice(&plain)?)
    }

    /// Produces an opaque single-use token for a validated payload. The
    /// payload is masked before tokenization and combined with the current
    /// timestamp and a random nonce, so two calls never collide.
    pub fn generate_payment_token(&self, data: &PaymentData) -> Result<String, ServiceError> {
        #[derive(Serialize)]
        struct TokenPayload {
            data: PaymentData,
            timestamp: i64,
            nonce: String,
        }

        let nonce: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_NONCE_LEN)
            .map(char::from)
            .collect();

        self.obscure(&TokenPayload {
            data: mask_sensitive_data(data),
            timestamp: self.clock.now().timestamp_millis(),
            nonce,
        })
    }
}

/// Masks a card number to its first and last four digits. Inputs shorter
/// than eight digits come back unchanged. Idempotent: masking a masked
/// number keeps the same shape.
pub fn mask_card_number(card: &str) -> String {
    let cleaned: String = card.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.chars().count() < MASK_MIN_CARD_LEN {
        return cleaned;
    }
    let chars: Vec<char> = cleaned.chars().collect();
    let first: String = chars[..4].iter().collect();
    let last: String = chars[chars.len() - 4..].iter().collect();
    format!("{first}{}{last}", "*".repeat(chars.len() - 8))
}

/// Masks the local part of an email past its first two characters.
/// Addresses without `@` or with a local part of two characters or fewer
/// come back unchanged.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };
    if local.chars().count() < MASK_MIN_LOCAL_LEN {
        return email.to_string();
    }
    let visible: String = local.chars().take(2).collect();
    let masked = "*".repeat(local.chars().count() - 2);
    format!("{visible}{masked}@{domain}")
}

/// Copy of a payload with card number, CVV, and email masked.
pub fn mask_sensitive_data(data: &PaymentData) -> PaymentData {
    let mut masked = data.clone();
    masked.payment_info.card_number = mask_card_number(&data.payment_info.card_number);
    if !masked.payment_info.cvv.is_empty() {
        masked.payment_info.cvv = "*".repeat(data.payment_info.cvv.chars().count());
    }
    masked.customer_info.email = mask_email(&data.customer_info.email);
    masked
}
