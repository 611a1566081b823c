//! Request lifecycle and background maintenance.

pub mod maintenance;
pub mod manager;

pub use maintenance::spawn_session_sweeper;
pub use manager::{DEFAULT_DISCOVERY_TIMEOUT, FallbackSupplier, LifecycleStage, OrchestrationManager};
