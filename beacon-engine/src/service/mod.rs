//! Service layer
//!
//! Services contain the engine's business logic: driving runs through their
//! steps, tracking in-flight executor tasks and aggregating metrics.

pub mod executor;
pub mod metrics;
pub mod registry;

pub use executor::RunExecutor;
pub use metrics::compute_stats;
pub use registry::RunRegistry;
