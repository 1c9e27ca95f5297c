//! aide-core - command routing for the aide Slack assistant
//!
//! This crate provides:
//! - Shared message types exchanged with channel adapters
//! - The `Agent` contract and an explicit `AgentRegistry`
//! - `CommandRouter`, which maps message text to an agent with help fallback
//! - Built-in help, profile and MEDDIC agents
//! - A minimal Anthropic completion client used by the LLM-backed agents

pub mod agents;
pub mod api;
pub mod types;

// Re-export main types for convenience
pub use agents::{
    Agent, AgentError, AgentRegistry, AgentResponse, AgentSummary, CommandRouter,
    InvocationContext, default_registry,
};
pub use api::{ApiClient, CompletionClient};
pub use types::{ChannelType, IncomingMessage, MessageKind, OutgoingMessage};
