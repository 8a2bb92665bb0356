//! End-to-end checkout flow tests: a full submission against the durable
//! store, pipeline failure handling, lockout behavior, and reopening the
//! store after a restart.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use kitchen_checkout::clock::ManualClock;
use kitchen_checkout::config::CheckoutConfig;
use kitchen_checkout::errors::ServiceError;
use kitchen_checkout::events::{Event, EventSender, StagePhase};
use kitchen_checkout::models::{
    Cart, CartLine, CustomerInfo, DeliveryInfo, DeliveryType, OrderStatus, PaymentInfo,
    PaymentMethod, PaymentStatus,
};
use kitchen_checkout::rate_limiter::AttemptGuard;
use kitchen_checkout::security::PaymentSecurity;
use kitchen_checkout::services::processor::PipelineStage;
use kitchen_checkout::services::{
    CheckoutFlow, CheckoutStep, OrderService, PaymentGateway, PaymentProcessor, SimulatedGateway,
    StatsService,
};
use kitchen_checkout::store::JsonStore;

// ---------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------

struct Harness {
    store: Arc<JsonStore>,
    clock: ManualClock,
    orders: Arc<OrderService>,
    flow: CheckoutFlow,
    events: mpsc::Receiver<Event>,
}

async fn harness_with_gateway(
    dir: &tempfile::TempDir,
    gateway: Arc<dyn PaymentGateway>,
    cart: Cart,
) -> Harness {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap());
    let clock_handle: Arc<dyn kitchen_checkout::clock::Clock> = Arc::new(clock.clone());
    let store = Arc::new(
        JsonStore::open(dir.path().join("store.json"))
            .await
            .expect("store opens"),
    );
    let config = CheckoutConfig::default();
    let guard = AttemptGuard::new(store.clone(), config.max_attempts, config.lockout_minutes);
    let security = Arc::new(PaymentSecurity::new(guard, clock_handle.clone(), &config));
    let (events, rx) = EventSender::channel(128);
    let processor = Arc::new(PaymentProcessor::new(
        security.clone(),
        gateway,
        events.clone(),
        clock_handle.clone(),
    ));
    let orders = Arc::new(OrderService::new(
        store.clone(),
        events.clone(),
        clock_handle.clone(),
    ));
    let flow = CheckoutFlow::begin(
        cart,
        config,
        security,
        processor,
        orders.clone(),
        events,
        clock_handle,
    )
    .await;

    Harness {
        store,
        clock,
        orders,
        flow,
        events: rx,
    }
}

async fn harness(dir: &tempfile::TempDir, cart: Cart) -> Harness {
    harness_with_gateway(dir, Arc::new(SimulatedGateway::new(0)), cart).await
}

fn spec_cart() -> Cart {
    let mut cart = Cart::default();
    cart.add(CartLine {
        id: 1,
        name: "Jollof Rice".into(),
        price: dec!(10.00),
        quantity: 2,
        image: String::new(),
    });
    cart.add(CartLine {
        id: 2,
        name: "Suya Skewers".into(),
        price: dec!(5.00),
        quantity: 1,
        image: String::new(),
    });
    cart
}

fn good_customer() -> CustomerInfo {
    CustomerInfo {
        first_name: "Ada".into(),
        last_name: "Obi".into(),
        email: "ada@example.com".into(),
        phone: "3105550147".into(),
        address: "12 Palm Street".into(),
        city: "Lagos".into(),
        zip_code: "100001".into(),
    }
}

fn good_card() -> PaymentInfo {
    PaymentInfo {
        method: PaymentMethod::Credit,
        card_number: "4242 4242 4242 4242".into(),
        expiry_date: "12/30".into(),
        cvv: "123".into(),
        name_on_card: "Ada Obi".into(),
    }
}

fn walk_to_review(flow: &mut CheckoutFlow, delivery: DeliveryType) {
    flow.set_customer_info(good_customer()).unwrap();
    flow.advance().unwrap();
    flow.set_payment_info(good_card()).unwrap();
    flow.set_delivery_info(DeliveryInfo {
        method: delivery,
        delivery_time: String::new(),
        special_instructions: "No onions".into(),
    })
    .unwrap();
    flow.advance().unwrap();
    assert_eq!(flow.step(), CheckoutStep::Review);
}

/// Gateway that declines every charge.
struct DecliningGateway;

#[async_trait]
impl PaymentGateway for DecliningGateway {
    async fn pace(&self, _stage: PipelineStage) {}

    async fn charge(&self, _amount: Decimal) -> Result<(), ServiceError> {
        Err(ServiceError::ProcessingError("card declined".into()))
    }
}

// ---------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------

#[tokio::test]
async fn full_delivery_checkout_finalizes_an_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, spec_cart()).await;

    walk_to_review(&mut h.flow, DeliveryType::Delivery);
    let order = h.flow.submit().await.expect("submission succeeds");

    assert_eq!(h.flow.step(), CheckoutStep::Complete);
    assert!(h.flow.cart().is_empty());

    assert!(order.id.starts_with("ORD-"));
    assert!(order.transaction_id.starts_with("TXN-"));
    assert_eq!(order.customer_name, "Ada Obi");
    assert_eq!(order.delivery_type, DeliveryType::Delivery);
    assert_eq!(order.delivery_address.as_deref(), Some("12 Palm Street"));
    assert_eq!(order.payment_method, "CREDIT");
    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(order.special_instructions, "No onions");

    assert_eq!(order.subtotal, dec!(25.00));
    assert_eq!(order.tax, dec!(2.00));
    assert_eq!(order.delivery_fee, dec!(3.99));
    assert_eq!(order.total, dec!(30.99));
    assert_eq!(order.total, order.subtotal + order.tax + order.delivery_fee);

    assert_eq!(order.line_items.len(), 2);
    assert_eq!(order.line_items[0].dish_name, "Jollof Rice");
    assert_eq!(order.line_items[0].quantity, 2);

    let stored = h.orders.list().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], order);
}

#[tokio::test]
async fn pickup_orders_have_no_fee_and_no_address() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, spec_cart()).await;

    walk_to_review(&mut h.flow, DeliveryType::Pickup);
    let order = h.flow.submit().await.unwrap();

    assert_eq!(order.delivery_fee, dec!(0.00));
    assert_eq!(order.total, dec!(27.00));
    assert_eq!(order.delivery_address, None);
    assert_eq!(order.delivery_type, DeliveryType::Pickup);
}

#[tokio::test]
async fn pipeline_stages_are_reported_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, spec_cart()).await;

    walk_to_review(&mut h.flow, DeliveryType::Pickup);
    h.flow.submit().await.unwrap();

    let mut started = Vec::new();
    let mut completed = Vec::new();
    while let Ok(event) = h.events.try_recv() {
        if let Event::PaymentStage { stage, phase, .. } = event {
            match phase {
                StagePhase::Started => started.push(stage),
                StagePhase::Completed => completed.push(stage),
            }
        }
    }
    let expected = ["encrypt", "validate", "charge", "tokenize", "finalize"];
    assert_eq!(started, expected);
    assert_eq!(completed, expected);
}

// ---------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------

#[tokio::test]
async fn declined_charge_parks_the_flow_in_failed() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness_with_gateway(&dir, Arc::new(DecliningGateway), spec_cart()).await;

    walk_to_review(&mut h.flow, DeliveryType::Pickup);
    let err = h.flow.submit().await.unwrap_err();
    assert!(matches!(err, ServiceError::ProcessingError(_)));

    assert_eq!(h.flow.step(), CheckoutStep::Failed);
    assert!(!h.flow.errors().is_empty());
    // Nothing was finalized and the cart is intact.
    assert!(h.orders.list().await.is_empty());
    assert!(!h.flow.cart().is_empty());

    // Back returns to review for a retry.
    h.flow.back();
    assert_eq!(h.flow.step(), CheckoutStep::Review);
}

#[tokio::test]
async fn invalid_payload_keeps_the_flow_in_review_with_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, spec_cart()).await;

    h.flow.set_customer_info(good_customer()).unwrap();
    h.flow.advance().unwrap();
    h.flow.set_payment_info(good_card()).unwrap();
    h.flow.advance().unwrap();

    // The email goes bad between review and submit.
    let mut customer = good_customer();
    customer.email = "not-an-email".into();
    h.flow.set_customer_info(customer).unwrap();

    let err = h.flow.submit().await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
    assert_eq!(h.flow.step(), CheckoutStep::Review);
    assert_eq!(h.flow.errors(), ["Invalid email address"]);
    assert!(h.orders.list().await.is_empty());
}

#[tokio::test]
async fn repeated_failed_submissions_trip_the_lockout() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, spec_cart()).await;

    h.flow.set_customer_info(good_customer()).unwrap();
    h.flow.advance().unwrap();
    h.flow.set_payment_info(good_card()).unwrap();
    h.flow.advance().unwrap();

    let mut customer = good_customer();
    customer.email = "not-an-email".into();
    h.flow.set_customer_info(customer).unwrap();

    for _ in 0..3 {
        let err = h.flow.submit().await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    // Attempt four is refused by the lockout, even with the email fixed.
    h.flow.set_customer_info(good_customer()).unwrap();
    let err = h.flow.submit().await.unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains("Too many attempts"),
        "unexpected error: {message}"
    );

    // After the window the same submission goes through.
    h.clock.advance(Duration::minutes(16));
    let order = h.flow.submit().await.expect("submission after lockout");
    assert_eq!(order.order_status, OrderStatus::Pending);
}

// ---------------------------------------------------------------------
// Durability and stats
// ---------------------------------------------------------------------

#[tokio::test]
async fn orders_survive_a_restart_and_status_updates_persist() {
    let dir = tempfile::tempdir().unwrap();
    let order_id;

    {
        let mut h = harness(&dir, spec_cart()).await;
        walk_to_review(&mut h.flow, DeliveryType::Delivery);
        let order = h.flow.submit().await.unwrap();
        order_id = order.id.clone();
        h.orders
            .update_status(&order_id, OrderStatus::Confirmed)
            .await
            .unwrap();
    }

    let h = harness(&dir, Cart::default()).await;
    let stored = h.orders.get(&order_id).await.unwrap();
    assert_eq!(stored.order_status, OrderStatus::Confirmed);
    assert_eq!(stored.total, dec!(30.99));
}

#[tokio::test]
async fn dashboard_counts_the_finalized_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir, spec_cart()).await;
    walk_to_review(&mut h.flow, DeliveryType::Delivery);
    h.flow.submit().await.unwrap();

    let clock_handle: Arc<dyn kitchen_checkout::clock::Clock> = Arc::new(h.clock.clone());
    let stats = StatsService::new(h.store.clone(), clock_handle)
        .dashboard_stats()
        .await
        .unwrap();

    assert_eq!(stats.total_orders, 1);
    assert_eq!(stats.today_orders, 1);
    assert_eq!(stats.monthly_orders, 1);
    assert_eq!(stats.total_revenue, dec!(30.99));
    assert_eq!(stats.pending_orders, 1);
    assert_eq!(stats.completed_orders, 0);
}
