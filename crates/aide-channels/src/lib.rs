//! Channel adapters and message bus for aide
//!
//! This crate provides the message routing infrastructure between chat
//! platforms and the command router, plus the Slack Web API adapter.

pub mod bus;
pub mod rate_limit;
pub mod slack;

// Re-export main types
pub use bus::{BusSender, MessageBus, MessageChannel};
pub use rate_limit::RateLimiter;
pub use slack::SlackChannel;
