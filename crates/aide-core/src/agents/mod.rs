//! Command agents: the agent contract, registry, command parsing and router
//!
//! Incoming text is parsed into a command token, looked up in an
//! [`AgentRegistry`], and handed to the matching [`Agent`] by the
//! [`CommandRouter`]. Unknown commands fall back to the help agent.

pub mod builtin;
pub mod command;
pub mod help;
pub mod meddic;
pub mod profile;
pub mod registry;
pub mod router;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::types::IncomingMessage;

pub use builtin::default_registry;
pub use command::{ParsedCommand, parse_command};
pub use help::HelpAgent;
pub use meddic::MeddicAgent;
pub use profile::ProfileAgent;
pub use registry::AgentRegistry;
pub use router::{CommandRouter, Route};

/// Longest argument string an agent will accept
pub const MAX_AGENT_INPUT: usize = 8_000;

/// Errors an agent can return from [`Agent::invoke`]
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("language model request failed: {0}")]
    Llm(#[from] anyhow::Error),
    #[error("{0}")]
    Failed(String),
}

/// What an agent hands back to the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    pub text: String,
}

impl AgentResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Per-event context passed by value to the selected agent
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub channel: String,
    pub thread_ts: Option<String>,
    pub user_id: String,
    pub raw_text: String,
    /// Parsed command token, `None` when the text had no usable first word
    pub command: Option<String>,
    /// Text after the command token
    pub args: String,
}

impl InvocationContext {
    pub fn from_message(msg: &IncomingMessage, parsed: ParsedCommand) -> Self {
        Self {
            channel: msg.channel_id.clone(),
            thread_ts: msg.thread_ts.clone(),
            user_id: msg.user_id.clone(),
            raw_text: msg.text.clone(),
            command: parsed.command,
            args: parsed.args,
        }
    }

    /// Arguments checked against [`MAX_AGENT_INPUT`]
    pub fn bounded_args(&self) -> Result<&str, AgentError> {
        let chars = self.args.chars().count();
        if chars > MAX_AGENT_INPUT {
            return Err(AgentError::InvalidInput(format!(
                "input is {} characters, limit is {}",
                chars, MAX_AGENT_INPUT
            )));
        }
        Ok(self.args.as_str())
    }
}

/// Short description of a registered agent, used for help output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
    pub aliases: Vec<String>,
}

/// A handler for one command
#[async_trait]
pub trait Agent: Send + Sync {
    /// Primary command name
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Extra command names that resolve to this agent
    fn aliases(&self) -> &[&'static str] {
        &[]
    }

    async fn invoke(&self, ctx: InvocationContext) -> Result<AgentResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelType;
    use chrono::Utc;

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage {
            id: "m1".to_string(),
            channel: ChannelType::Slack,
            channel_id: "D1".to_string(),
            thread_ts: None,
            user_id: "U1".to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_context_from_message() {
        let msg = message("profile Acme Corp");
        let ctx = InvocationContext::from_message(&msg, parse_command(&msg.text));
        assert_eq!(ctx.channel, "D1");
        assert_eq!(ctx.user_id, "U1");
        assert_eq!(ctx.raw_text, "profile Acme Corp");
        assert_eq!(ctx.command.as_deref(), Some("profile"));
        assert_eq!(ctx.args, "Acme Corp");
    }

    #[test]
    fn test_bounded_args() {
        let long = format!("meddic {}", "x".repeat(MAX_AGENT_INPUT + 1));
        let msg = message(&long);
        let ctx = InvocationContext::from_message(&msg, parse_command(&msg.text));
        assert!(matches!(ctx.bounded_args(), Err(AgentError::InvalidInput(_))));

        let msg = message("meddic short notes");
        let ctx = InvocationContext::from_message(&msg, parse_command(&msg.text));
        assert_eq!(ctx.bounded_args().unwrap(), "short notes");
    }

    #[test]
    fn test_bounded_args_counts_characters() {
        // 3000 three-byte characters: 9000 bytes but under the limit
        let msg = message(&format!("profile {}", "日".repeat(3000)));
        let ctx = InvocationContext::from_message(&msg, parse_command(&msg.text));
        assert_eq!(ctx.bounded_args().unwrap().chars().count(), 3000);

        let msg = message(&format!("profile {}", "日".repeat(MAX_AGENT_INPUT + 1)));
        let ctx = InvocationContext::from_message(&msg, parse_command(&msg.text));
        match ctx.bounded_args() {
            Err(AgentError::InvalidInput(reason)) => {
                assert_eq!(reason, format!("input is {} characters, limit is {}", MAX_AGENT_INPUT + 1, MAX_AGENT_INPUT));
            }
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::Llm(anyhow::anyhow!("timeout"));
        assert_eq!(err.to_string(), "language model request failed: timeout");
        assert_eq!(AgentError::Failed("boom".into()).to_string(), "boom");
    }
}
