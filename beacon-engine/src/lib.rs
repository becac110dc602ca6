//! Beacon Engine
//!
//! The pipeline run engine: drives simulated CI/CD runs step by step,
//! tracks their live state, keeps an append-only history of finished runs
//! and derives dashboard metrics from it.
//!
//! Architecture:
//! - Providers: Injectable clock and randomness
//! - Repositories: Run store, log sink and durable history mirror
//! - Services: Run executor, metrics aggregation, in-flight task registry
//! - Engine: The facade tying everything together, including reset

pub mod config;
pub mod engine;
pub mod error;
pub mod provider;
pub mod repository;
pub mod service;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
