//! Service layer: the checkout flow, the payment pipeline, order
//! persistence, and dashboard aggregation.

pub mod checkout;
pub mod orders;
pub mod processor;
pub mod stats;

pub use checkout::{CheckoutFlow, CheckoutStep};
pub use orders::OrderService;
pub use processor::{PaymentGateway, PaymentProcessor, PipelineStage, ProcessorReceipt, SimulatedGateway};
pub use stats::{DashboardStats, StatsService};
