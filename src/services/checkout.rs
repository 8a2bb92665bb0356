//! Three-step checkout flow: customer info, payment and delivery choices,
//! then review and submit. Submission validates through the security
//! layer, runs the payment pipeline, and finalizes an order record.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::CheckoutConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    Cart, CustomerInfo, DeliveryInfo, DeliveryType, Order, OrderLineItem, OrderStatus,
    PaymentData, PaymentInfo, PaymentMethod, PaymentStatus,
};
use crate::security::PaymentSecurity;
use crate::services::orders::OrderService;
use crate::services::processor::PaymentProcessor;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
    /// Step one: who the order is for.
    CustomerInfo,
    /// Step two: payment method and fulfillment choices.
    PaymentDelivery,
    /// Step three: review totals and submit.
    Review,
    /// Submission in flight; input is frozen.
    Processing,
    /// Order finalized and persisted.
    Complete,
    /// Processing was rejected; `back()` returns to review.
    Failed,
}

pub struct CheckoutFlow {
    flow_id: Uuid,
    step: CheckoutStep,
    cart: Cart,
    customer_info: CustomerInfo,
    payment_info: PaymentInfo,
    delivery_info: DeliveryInfo,
    errors: Vec<String>,
    config: CheckoutConfig,
    security: Arc<PaymentSecurity>,
    processor: Arc<PaymentProcessor>,
    orders: Arc<OrderService>,
    events: EventSender,
    clock: Arc<dyn Clock>,
}

impl CheckoutFlow {
    /// Opens a new flow over the given cart, starting at step one.
    #[allow(clippy::too_many_arguments)]
    pub async fn begin(
        cart: Cart,
        config: CheckoutConfig,
        security: Arc<PaymentSecurity>,
        processor: Arc<PaymentProcessor>,
        orders: Arc<OrderService>,
        events: EventSender,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let flow_id = Uuid::new_v4();
        events.send_or_log(Event::CheckoutStarted { flow_id }).await;
        info!(%flow_id, items = cart.lines().len(), "checkout started");
        Self {
            flow_id,
            step: CheckoutStep::CustomerInfo,
            cart,
            customer_info: CustomerInfo::default(),
            payment_info: PaymentInfo::default(),
            delivery_info: DeliveryInfo::default(),
            errors: Vec::new(),
            config,
            security,
            processor,
            orders,
            events,
            clock,
        }
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    fn input_frozen(&self) -> bool {
        matches!(self.step, CheckoutStep::Processing | CheckoutStep::Complete)
    }

    pub fn set_customer_info(&mut self, info: CustomerInfo) -> Result<(), ServiceError> {
        if self.input_frozen() {
            return Err(ServiceError::InvalidOperation(
                "customer info cannot change after submission".to_string(),
            ));
        }
        self.customer_info = info;
        Ok(())
    }

    pub fn set_payment_info(&mut self, info: PaymentInfo) -> Result<(), ServiceError> {
        if self.input_frozen() {
            return Err(ServiceError::InvalidOperation(
                "payment info cannot change after submission".to_string(),
            ));
        }
        self.payment_info = info;
        Ok(())
    }

    pub fn set_delivery_info(&mut self, info: DeliveryInfo) -> Result<(), ServiceError> {
        if self.input_frozen() {
            return Err(ServiceError::InvalidOperation(
                "delivery info cannot change after submission".to_string(),
            ));
        }
        self.delivery_info = info;
        Ok(())
    }

    /// Advances one step, enforcing the step's entry guard. Guard failures
    /// leave the flow where it is with the messages in `errors()`.
    pub fn advance(&mut self) -> Result<CheckoutStep, ServiceError> {
        match self.step {
            CheckoutStep::CustomerInfo => {
                if !self.customer_info.has_identity_fields() {
                    let message =
                        "Please fill in your name, email, and phone number".to_string();
                    self.errors = vec![message.clone()];
                    return Err(ServiceError::ValidationError(message));
                }
                self.errors.clear();
                self.step = CheckoutStep::PaymentDelivery;
            }
            CheckoutStep::PaymentDelivery => {
                let errors = self.payment_step_errors();
                if !errors.is_empty() {
                    self.errors = errors.clone();
                    return Err(ServiceError::ValidationError(errors.join("; ")));
                }
                self.errors.clear();
                self.step = CheckoutStep::Review;
            }
            _ => {
                return Err(ServiceError::InvalidOperation(format!(
                    "cannot advance from {:?}",
                    self.step
                )));
            }
        }
        Ok(self.step)
    }

    /// Moves one step back. Entered data is kept. From `Failed` this
    /// returns to review so the customer can retry.
    pub fn back(&mut self) {
        self.step = match self.step {
            CheckoutStep::PaymentDelivery => CheckoutStep::CustomerInfo,
            CheckoutStep::Review => CheckoutStep::PaymentDelivery,
            CheckoutStep::Failed => CheckoutStep::Review,
            other => other,
        };
    }

    /// Abandons a pending submission, returning to review with no side
    /// effect. Only meaningful at review or after a failure; once
    /// processing has started the pipeline runs to completion or failure.
    pub fn cancel(&mut self) -> Result<(), ServiceError> {
        match self.step {
            CheckoutStep::Review | CheckoutStep::Failed => {
                self.step = CheckoutStep::Review;
                Ok(())
            }
            _ => Err(ServiceError::InvalidOperation(
                "nothing to cancel at this step".to_string(),
            )),
        }
    }

    fn payment_step_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.payment_info.method == PaymentMethod::Credit {
            let brand = match validation::validate_card_number(&self.payment_info.card_number) {
                Ok(brand) => Some(brand),
                Err(e) => {
                    errors.push(e.to_string());
                    None
                }
            };
            if let Err(e) =
                validation::validate_expiry(&self.payment_info.expiry_date, self.clock.now())
            {
                errors.push(e.to_string());
            }
            if let Err(e) = validation::validate_cvv(&self.payment_info.cvv, brand) {
                errors.push(e.to_string());
            }
            if self.payment_info.name_on_card.trim().is_empty() {
                errors.push("Name on card is required".to_string());
            }
        }
        errors
    }

    fn round2(value: Decimal) -> Decimal {
        value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn subtotal(&self) -> Decimal {
        self.cart.subtotal()
    }

    pub fn tax(&self) -> Decimal {
        self.subtotal() * self.config.tax_rate
    }

    pub fn delivery_fee(&self) -> Decimal {
        match self.delivery_info.method {
            DeliveryType::Delivery => self.config.delivery_fee,
            DeliveryType::Pickup => Decimal::ZERO,
        }
    }

    pub fn total(&self) -> Decimal {
        self.subtotal() + self.tax() + self.delivery_fee()
    }

    fn payment_data(&self) -> PaymentData {
        PaymentData {
            customer_info: self.customer_info.clone(),
            payment_info: self.payment_info.clone(),
            delivery_info: self.delivery_info.clone(),
            cart: self.cart.clone(),
            subtotal: self.subtotal(),
            tax: self.tax(),
            delivery_fee: self.delivery_fee(),
            total: self.total(),
        }
    }

    /// Submits the reviewed order: aggregate validation, the payment
    /// pipeline, then order persistence. On success the cart is cleared
    /// and the flow completes; a pipeline rejection parks the flow in
    /// `Failed` with the reason attached.
    #[instrument(skip(self), fields(flow_id = %self.flow_id))]
    pub async fn submit(&mut self) -> Result<Order, ServiceError> {
        if self.step != CheckoutStep::Review {
            return Err(ServiceError::InvalidOperation(
                "orders are submitted from the review step".to_string(),
            ));
        }
        if self.cart.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let data = self.payment_data();
        let outcome = self.security.validate_payment_data(&data).await?;
        if !outcome.valid {
            self.errors = outcome.errors.clone();
            return Err(ServiceError::ValidationError(outcome.errors.join("; ")));
        }
        let clearance = outcome.clearance.ok_or_else(|| {
            ServiceError::PreconditionFailed("validation passed without clearance".to_string())
        })?;

        self.step = CheckoutStep::Processing;
        self.errors.clear();

        match self.processor.process(&data, &clearance).await {
            Ok(receipt) => {
                let order = self.orders.create(self.build_order(&receipt.transaction_id)).await?;
                self.cart.clear();
                self.events.send_or_log(Event::CartCleared).await;
                self.events
                    .send_or_log(Event::CheckoutCompleted {
                        flow_id: self.flow_id,
                        order_id: order.id.clone(),
                    })
                    .await;
                self.step = CheckoutStep::Complete;
                info!(order_id = %order.id, "checkout completed");
                Ok(order)
            }
            Err(err) => {
                warn!(reason = %err, "checkout failed during processing");
                self.errors = vec![err.user_message()];
                self.events
                    .send_or_log(Event::CheckoutFailed {
                        flow_id: self.flow_id,
                        reason: err.to_string(),
                    })
                    .await;
                self.step = CheckoutStep::Failed;
                Err(err)
            }
        }
    }

    /// Builds the order record from the reviewed inputs. Money fields are
    /// rounded to cents here, and only here, so the stored total always
    /// equals the sum of its stored parts.
    fn build_order(&self, transaction_id: &str) -> Order {
        let subtotal = Self::round2(self.subtotal());
        let tax = Self::round2(subtotal * self.config.tax_rate);
        let delivery_fee = Self::round2(self.delivery_fee());
        let total = subtotal + tax + delivery_fee;

        let line_items = self
            .cart
            .lines()
            .iter()
            .map(|line| OrderLineItem {
                dish_name: line.name.clone(),
                dish_price: line.price,
                quantity: line.quantity,
                special_requests: None,
            })
            .collect();

        let delivery_address = match self.delivery_info.method {
            DeliveryType::Delivery => Some(self.customer_info.address.clone()),
            DeliveryType::Pickup => None,
        };

        let now = self.clock.now();
        Order {
            // Left blank for the order service to assign.
            id: String::new(),
            transaction_id: transaction_id.to_string(),
            customer_name: self.customer_info.full_name(),
            email: self.customer_info.email.clone(),
            phone: self.customer_info.phone.clone(),
            delivery_address,
            delivery_type: self.delivery_info.method,
            payment_method: self.payment_info.method.order_code().to_string(),
            payment_status: PaymentStatus::Completed,
            order_status: OrderStatus::Pending,
            subtotal,
            tax,
            delivery_fee,
            total,
            special_instructions: self.delivery_info.special_instructions.clone(),
            line_items,
            created_at: now,
            updated_at: now,
        }
    }
}
