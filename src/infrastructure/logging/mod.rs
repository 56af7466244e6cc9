//! Structured logging infrastructure: tracing/tracing-subscriber JSON
//! formatting plus the secret/PII scrubbing layer shared with the audit
//! logger (C12).

pub mod secret_scrubbing;

pub use secret_scrubbing::SecretScrubbingLayer;
