//! Test-only adapter implementations for the core's external trait
//! boundaries. Production implementations of `AgentRegistry` live outside
//! this crate; see the port definition for the contract.

pub mod testing;
