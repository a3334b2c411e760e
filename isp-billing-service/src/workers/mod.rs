pub mod lifecycle;

pub use lifecycle::{LifecycleJobRunner, LifecycleRunSummary};
