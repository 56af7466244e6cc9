//! Domain layer: core business logic and data model for the orchestration core.
//!
//! Framework-agnostic types and the trait boundaries (`ports`) that
//! infrastructure and service code is built against.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{CircuitError, ConfigError, QuotaError, RouterError, SwarmError};
