//! Demo binary: runs one checkout end to end against a local JSON store
//! and prints the resulting order and dashboard counters.

use std::sync::Arc;

use rust_decimal_macros::dec;
use tracing::info;

use kitchen_checkout::clock::{Clock, SystemClock};
use kitchen_checkout::config::{init_tracing, load_config};
use kitchen_checkout::events::EventSender;
use kitchen_checkout::models::{
    Cart, CartLine, CustomerInfo, DeliveryInfo, DeliveryType, PaymentInfo, PaymentMethod,
};
use kitchen_checkout::rate_limiter::AttemptGuard;
use kitchen_checkout::security::PaymentSecurity;
use kitchen_checkout::services::{
    CheckoutFlow, OrderService, PaymentProcessor, SimulatedGateway, StatsService,
};
use kitchen_checkout::store::JsonStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_level, config.log_json);

    let store = Arc::new(JsonStore::open(&config.store_path).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (events, mut rx) = EventSender::channel(64);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!(?event, "checkout event");
        }
    });

    let guard = AttemptGuard::new(store.clone(), config.max_attempts, config.lockout_minutes);
    let security = Arc::new(PaymentSecurity::new(guard, clock.clone(), &config));
    let gateway = Arc::new(SimulatedGateway::new(config.stage_delay_ms));
    let processor = Arc::new(PaymentProcessor::new(
        security.clone(),
        gateway,
        events.clone(),
        clock.clone(),
    ));
    let orders = Arc::new(OrderService::new(store.clone(), events.clone(), clock.clone()));

    let mut cart = Cart::default();
    cart.add(CartLine {
        id: 1,
        name: "Jollof Rice".into(),
        price: dec!(12.99),
        quantity: 2,
        image: "jollof.jpg".into(),
    });
    cart.add(CartLine {
        id: 2,
        name: "Suya Skewers".into(),
        price: dec!(8.50),
        quantity: 1,
        image: "suya.jpg".into(),
    });

    let mut flow = CheckoutFlow::begin(
        cart,
        config.clone(),
        security,
        processor,
        orders,
        events,
        clock.clone(),
    )
    .await;

    flow.set_customer_info(CustomerInfo {
        first_name: "Ada".into(),
        last_name: "Obi".into(),
        email: "ada@example.com".into(),
        phone: "3105550147".into(),
        address: "12 Palm Street".into(),
        city: "Lagos".into(),
        zip_code: "100001".into(),
    })?;
    flow.advance()?;

    flow.set_payment_info(PaymentInfo {
        method: PaymentMethod::Credit,
        card_number: "4242 4242 4242 4242".into(),
        expiry_date: "12/30".into(),
        cvv: "123".into(),
        name_on_card: "Ada Obi".into(),
    })?;
    flow.set_delivery_info(DeliveryInfo {
        method: DeliveryType::Delivery,
        delivery_time: "ASAP".into(),
        special_instructions: "Ring the bell twice".into(),
    })?;
    flow.advance()?;

    let order = flow.submit().await?;
    println!("{}", serde_json::to_string_pretty(&order)?);

    let stats = StatsService::new(store, clock).dashboard_stats().await?;
    info!(
        total_orders = stats.total_orders,
        total_revenue = %stats.total_revenue,
        "dashboard"
    );

    Ok(())
}
