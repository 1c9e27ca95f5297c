//! Shared types for aide-core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Incoming message from any channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub channel: ChannelType,
    /// Conversation the message arrived in (Slack channel or DM id)
    pub channel_id: String,
    /// Parent thread timestamp when the message was posted inside a thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub user_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// What kind of outgoing message this is
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Normal response message
    #[default]
    Response,
    /// Acknowledgment/typing indicator; the channel decides how to display it
    Acknowledgment,
}

/// Outgoing message to be sent to a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    pub channel: ChannelType,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>, // original message id
    #[serde(default)]
    pub kind: MessageKind,
}

impl OutgoingMessage {
    /// Build a response addressed to the same conversation and thread as `msg`
    pub fn reply(msg: &IncomingMessage, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            channel: msg.channel.clone(),
            channel_id: msg.channel_id.clone(),
            thread_ts: msg.thread_ts.clone(),
            reply_to: Some(msg.id.clone()),
            kind: MessageKind::Response,
        }
    }

    /// Build an acknowledgment placeholder for `msg`
    pub fn acknowledge(msg: &IncomingMessage) -> Self {
        Self {
            kind: MessageKind::Acknowledgment,
            ..Self::reply(msg, String::new())
        }
    }
}

/// Type of communication channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Slack,
    Internal, // for messages that originate locally (cli `ask`)
}

impl ChannelType {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "slack" => Self::Slack,
            _ => Self::Internal,
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slack => write!(f, "slack"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
