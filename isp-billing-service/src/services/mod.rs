//! Services module for isp-billing-service.

pub mod database;
pub mod memory;
pub mod metrics;
pub mod push;
pub mod store;

pub use database::Database;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use push::{MockPushSender, PushSender, WebPushSender};
pub use store::BillingStore;
