//! Command router: dispatches incoming messages to registered agents

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::command::{ParsedCommand, parse_command};
use super::help::HELP_COMMAND;
use super::{Agent, AgentRegistry, InvocationContext};
use crate::types::{IncomingMessage, OutgoingMessage};

pub const DEFAULT_ERROR_MESSAGE: &str =
    "Sorry, something went wrong while handling your request. Please try again.";

/// Outcome of resolving a message to an agent
pub struct Route {
    /// Registry name the agent was found under
    pub agent_name: String,
    pub agent: Arc<dyn Agent>,
    /// True when the command was missing or unknown and the fallback was used
    pub fell_back: bool,
    pub parsed: ParsedCommand,
}

/// Routes messages to agents by their leading command word
pub struct CommandRouter {
    registry: Arc<AgentRegistry>,
    fallback: String,
    error_message: String,
}

impl CommandRouter {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            fallback: HELP_COMMAND.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }

    /// Command used when no registered command matches (default `help`)
    pub fn with_fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback = name.into();
        self
    }

    /// Text sent to the user when an agent fails
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Resolve raw text to an agent, falling back when the command is unknown.
    ///
    /// Returns `None` only if neither the command nor the fallback is registered.
    pub fn resolve(&self, text: &str) -> Option<Route> {
        let parsed = parse_command(text);

        if let Some(cmd) = parsed.command.as_deref()
            && let Some(agent) = self.registry.get(cmd)
        {
            debug!("Resolved command '{}' to agent '{}'", cmd, agent.name());
            return Some(Route {
                agent_name: cmd.to_string(),
                agent,
                fell_back: false,
                parsed,
            });
        }

        debug!(
            "No agent for command {:?}, falling back to '{}'",
            parsed.command, self.fallback
        );
        let agent = self.registry.get(&self.fallback)?;
        Some(Route {
            agent_name: self.fallback.clone(),
            agent,
            fell_back: true,
            parsed,
        })
    }

    /// Handle one incoming message and build the reply.
    ///
    /// Agent errors never escape: they are logged and replaced by the
    /// configured error message.
    pub async fn dispatch(&self, msg: &IncomingMessage) -> OutgoingMessage {
        let Some(route) = self.resolve(&msg.text) else {
            warn!(
                "No agent and no '{}' fallback registered; cannot handle message {}",
                self.fallback, msg.id
            );
            return OutgoingMessage::reply(msg, self.unavailable_message());
        };

        info!(
            "Dispatching message {} from {} to agent '{}'{}",
            msg.id,
            msg.user_id,
            route.agent_name,
            if route.fell_back { " (fallback)" } else { "" }
        );

        let ctx = InvocationContext::from_message(msg, route.parsed);
        match route.agent.invoke(ctx).await {
            Ok(response) if response.text.trim().is_empty() => {
                warn!("Agent '{}' returned an empty response", route.agent_name);
                OutgoingMessage::reply(msg, self.error_message.clone())
            }
            Ok(response) => {
                debug!(
                    "Agent '{}' responded with {} chars",
                    route.agent_name,
                    response.text.len()
                );
                OutgoingMessage::reply(msg, response.text)
            }
            Err(e) => {
                error!(
                    "Agent '{}' failed on message {}: {}",
                    route.agent_name, msg.id, e
                );
                OutgoingMessage::reply(msg, self.error_message.clone())
            }
        }
    }

    fn unavailable_message(&self) -> String {
        let names = self.registry.list_all();
        if names.is_empty() {
            "No commands are available right now.".to_string()
        } else {
            format!("I didn't recognize that. Try one of: {}", names.join(", "))
        }
    }
}
