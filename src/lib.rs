//! Agent Orchestration Core: MoE routing, swarm coordination, and the
//! quota/circuit-breaker/audit substrate every model invocation passes
//! through.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;
