//! Core data types shared across the checkout engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Who the order is for. Step one of the checkout flow collects this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
}

impl CustomerInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// The fields required to leave step one: name, email, and phone.
    pub fn has_identity_fields(&self) -> bool {
        !self.first_name.trim().is_empty()
            && !self.last_name.trim().is_empty()
            && !self.email.trim().is_empty()
            && !self.phone.trim().is_empty()
    }
}

/// How the customer intends to pay. The wire form is lowercase to match
/// the storefront payload; orders persist the uppercase code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Credit,
    Paypal,
    Cash,
}

impl PaymentMethod {
    /// Uppercase code persisted on finalized orders.
    pub fn order_code(&self) -> &'static str {
        match self {
            PaymentMethod::Credit => "CREDIT",
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::Cash => "CASH",
        }
    }
}

/// Card details as entered. Only meaningful when `method` is `Credit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub expiry_date: String,
    #[serde(default)]
    pub cvv: String,
    #[serde(default)]
    pub name_on_card: String,
}

impl Default for PaymentInfo {
    fn default() -> Self {
        Self {
            method: PaymentMethod::Credit,
            card_number: String::new(),
            expiry_date: String::new(),
            cvv: String::new(),
            name_on_card: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryType {
    Pickup,
    Delivery,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Pickup => "PICKUP",
            DeliveryType::Delivery => "DELIVERY",
        }
    }
}

/// Fulfillment choice plus free-text extras collected in step two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    pub method: DeliveryType,
    #[serde(default)]
    pub delivery_time: String,
    #[serde(default)]
    pub special_instructions: String,
}

impl Default for DeliveryInfo {
    fn default() -> Self {
        Self {
            method: DeliveryType::Pickup,
            delivery_time: String::new(),
            special_instructions: String::new(),
        }
    }
}

/// One menu item in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: u32,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub image: String,
}

/// The in-progress cart. At most one line per item id; adding an item
/// already present bumps its quantity instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn add(&mut self, line: CartLine) {
        match self.lines.iter_mut().find(|l| l.id == line.id) {
            Some(existing) => existing.quantity += line.quantity,
            None => self.lines.push(line),
        }
    }

    pub fn remove(&mut self, id: u32) {
        self.lines.retain(|l| l.id != id);
    }

    /// Sets the quantity for an item; zero removes the line.
    pub fn set_quantity(&mut self, id: u32, quantity: u32) {
        if quantity == 0 {
            self.remove(id);
        } else if let Some(line) = self.lines.iter_mut().find(|l| l.id == id) {
            line.quantity = quantity;
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn subtotal(&self) -> Decimal {
        self.lines
            .iter()
            .map(|l| l.price * Decimal::from(l.quantity))
            .sum()
    }
}

/// Everything the security layer validates and the processor charges.
/// One instance flows through validate and process unchanged; the
/// clearance fingerprint ties the two calls together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    pub customer_info: CustomerInfo,
    pub payment_info: PaymentInfo,
    pub delivery_info: DeliveryInfo,
    pub cart: Cart,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether moving to `next` is a legal back-office transition. Orders
    /// march PENDING → CONFIRMED → PREPARING → READY → (OUT_FOR_DELIVERY →)
    /// DELIVERED and may be CANCELLED from any state before DELIVERED.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed)
            | (Confirmed, Preparing)
            | (Preparing, Ready)
            | (Ready, OutForDelivery)
            | (Ready, Delivered)
            | (OutForDelivery, Delivered) => true,
            (Delivered | Cancelled, _) => false,
            (_, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// A line item as persisted on a finalized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub dish_name: String,
    pub dish_price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub special_requests: Option<String>,
}

/// A finalized order. Append-only once stored; only `order_status` and
/// `updated_at` change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub transaction_id: String,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub delivery_address: Option<String>,
    pub delivery_type: DeliveryType,
    /// Uppercase payment method code, e.g. "CREDIT".
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub special_instructions: String,
    pub line_items: Vec<OrderLineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// Table reservation record. Tracked only as far as the dashboard needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRecord {
    pub id: String,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Unread,
    Read,
}

/// Contact-form message record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

/// Persisted payment-attempt counter backing the lockout guard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitCounter {
    pub count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(id: u32, price: Decimal, quantity: u32) -> CartLine {
        CartLine {
            id,
            name: format!("Dish {id}"),
            price,
            quantity,
            image: String::new(),
        }
    }

    #[test]
    fn adding_an_existing_item_bumps_quantity() {
        let mut cart = Cart::default();
        cart.add(line(1, dec!(10.00), 2));
        cart.add(line(1, dec!(10.00), 1));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn subtotal_sums_price_times_quantity() {
        let mut cart = Cart::default();
        cart.add(line(1, dec!(10.00), 2));
        cart.add(line(2, dec!(5.00), 1));
        assert_eq!(cart.subtotal(), dec!(25.00));
    }

    #[test]
    fn zero_quantity_removes_the_line() {
        let mut cart = Cart::default();
        cart.add(line(1, dec!(4.50), 2));
        cart.set_quantity(1, 0);
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Decimal::ZERO);
    }

    #[test]
    fn identity_fields_require_all_four() {
        let mut info = CustomerInfo {
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            email: "ada@example.com".into(),
            phone: "3105550147".into(),
            ..CustomerInfo::default()
        };
        assert!(info.has_identity_fields());
        info.phone = "   ".into();
        assert!(!info.has_identity_fields());
    }

    #[test]
    fn order_serializes_with_storefront_field_names() {
        let order = Order {
            id: "ORD-1718000000000".into(),
            transaction_id: "TXN-abc".into(),
            customer_name: "Ada Obi".into(),
            email: "ada@example.com".into(),
            phone: "3105550147".into(),
            delivery_address: None,
            delivery_type: DeliveryType::Pickup,
            payment_method: "CREDIT".into(),
            payment_status: PaymentStatus::Completed,
            order_status: OrderStatus::Pending,
            subtotal: dec!(25.00),
            tax: dec!(2.00),
            delivery_fee: dec!(0.00),
            total: dec!(27.00),
            special_instructions: String::new(),
            line_items: vec![OrderLineItem {
                dish_name: "Jollof Rice".into(),
                dish_price: dec!(12.50),
                quantity: 2,
                special_requests: None,
            }],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["deliveryType"], "PICKUP");
        assert_eq!(json["paymentStatus"], "COMPLETED");
        assert_eq!(json["orderStatus"], "PENDING");
        assert_eq!(json["lineItems"][0]["dishName"], "Jollof Rice");
        assert!(json["transactionId"].is_string());
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn status_transitions_follow_the_fulfillment_chain() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Delivered));
        assert!(Ready.can_transition_to(OutForDelivery));
        assert!(OutForDelivery.can_transition_to(Delivered));

        assert!(Pending.can_transition_to(Cancelled));
        assert!(OutForDelivery.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Ready));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn payment_method_codes_are_uppercase() {
        assert_eq!(PaymentMethod::Credit.order_code(), "CREDIT");
        assert_eq!(PaymentMethod::Paypal.order_code(), "PAYPAL");
        assert_eq!(PaymentMethod::Cash.order_code(), "CASH");
        assert_eq!(
            serde_json::to_value(PaymentMethod::Credit).unwrap(),
            "credit"
        );
    }
}
