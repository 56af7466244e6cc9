//! Domain ports: trait boundaries to collaborators the core does not
//! implement itself (see `AgentRegistry`).

pub mod agent_registry;

pub use agent_registry::{AgentRegistry, AgentResult};
