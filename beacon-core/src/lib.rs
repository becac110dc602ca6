//! Beacon Core
//!
//! Core types and abstractions for the Beacon pipeline simulator.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, Run, History, etc.)
//! - Catalog: The static set of pipeline definitions runs are started from
//! - DTOs: Data transfer objects for the HTTP surface

pub mod catalog;
pub mod domain;
pub mod dto;
