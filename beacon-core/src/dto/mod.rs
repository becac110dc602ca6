//! Data Transfer Objects for the HTTP surface
//!
//! This module contains DTOs exchanged between the engine and its callers.
//! DTOs are lightweight, read-only representations of domain entities.

pub mod run;
