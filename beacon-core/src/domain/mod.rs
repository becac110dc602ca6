//! Core domain types
//!
//! This module contains the core domain structures used across Beacon crates.
//! These types represent the fundamental business entities and are shared between
//! the engine (which mutates and persists them) and the server (which exposes them).

pub mod history;
pub mod log;
pub mod pipeline;
pub mod run;
pub mod stats;
