//! jobcast domain crate
//!
//! This crate contains the core pipeline logic following hexagonal
//! architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `filter`: Pure keyword/locale/recency predicates
//! - `usecases`: Content generation, the pipeline, its coordinator, and the
//!   scheduler

pub mod filter;
pub mod model;
pub mod ports;
pub mod usecases;

pub use model::*;
pub use ports::*;
