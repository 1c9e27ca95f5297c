//! Message bus connecting channel adapters to the command router

use aide_core::types::{ChannelType, IncomingMessage, OutgoingMessage};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Trait that all channel adapters implement
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Start listening for messages, sending them to the provided sender.
    /// Implementations spawn their own background task and return once ready.
    async fn start(&self, tx: mpsc::Sender<IncomingMessage>) -> Result<()>;

    /// Send a message through this channel
    async fn send(&self, msg: OutgoingMessage) -> Result<()>;

    /// Which channel type this adapter handles
    fn channel_type(&self) -> ChannelType;
}

type ChannelMap = HashMap<ChannelType, Arc<dyn MessageChannel>>;

/// Owns the inbound queue and the registered channel adapters
pub struct MessageBus {
    channels: ChannelMap,
    incoming_tx: mpsc::Sender<IncomingMessage>,
    incoming_rx: mpsc::Receiver<IncomingMessage>,
}

impl MessageBus {
    /// Create a new message bus with the specified buffer size for incoming messages
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        info!("Created message bus with buffer size {}", buffer_size);
        Self {
            channels: HashMap::new(),
            incoming_tx: tx,
            incoming_rx: rx,
        }
    }

    /// Register a channel adapter; a second adapter of the same type replaces the first
    pub fn register(&mut self, channel: Arc<dyn MessageChannel>) {
        let channel_type = channel.channel_type();
        info!("Registering channel: {}", channel_type);
        if self.channels.insert(channel_type.clone(), channel).is_some() {
            debug!("Replaced existing {} channel", channel_type);
        }
    }

    /// Start every registered adapter, stopping at the first failure
    pub async fn start_all(&self) -> Result<()> {
        info!("Starting all {} registered channels", self.channels.len());

        for (channel_type, channel) in &self.channels {
            debug!("Starting channel: {}", channel_type);
            if let Err(e) = channel.start(self.incoming_tx.clone()).await {
                error!("Failed to start channel {}: {}", channel_type, e);
                return Err(anyhow!("Failed to start channel {}: {}", channel_type, e));
            }
            info!("Successfully started channel: {}", channel_type);
        }

        Ok(())
    }

    /// A sender for injecting messages onto the bus (used by tests and local tools)
    pub fn inbound_sender(&self) -> mpsc::Sender<IncomingMessage> {
        self.incoming_tx.clone()
    }

    /// Receive the next incoming message from any channel
    pub async fn recv(&mut self) -> Option<IncomingMessage> {
        self.incoming_rx.recv().await
    }

    pub async fn send(&self, msg: OutgoingMessage) -> Result<()> {
        route_outgoing(&self.channels, msg).await
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn has_channel(&self, channel_type: &ChannelType) -> bool {
        self.channels.contains_key(channel_type)
    }

    /// Split into the inbound receiver and a cloneable send handle so the
    /// receiver can sit in a `select!` loop while dispatch tasks reply.
    ///
    /// The bus's own inbound sender is dropped here, so the receiver closes
    /// once every adapter has stopped.
    pub fn split(self) -> (mpsc::Receiver<IncomingMessage>, BusSender) {
        let sender = BusSender {
            channels: Arc::new(self.channels),
        };
        (self.incoming_rx, sender)
    }
}

/// Send-only handle for the message bus
#[derive(Clone)]
pub struct BusSender {
    channels: Arc<ChannelMap>,
}

impl BusSender {
    /// Send an outgoing message to the appropriate channel
    pub async fn send(&self, msg: OutgoingMessage) -> Result<()> {
        route_outgoing(&self.channels, msg).await
    }

    pub fn has_channel(&self, channel_type: &ChannelType) -> bool {
        self.channels.contains_key(channel_type)
    }
}

async fn route_outgoing(channels: &ChannelMap, msg: OutgoingMessage) -> Result<()> {
    debug!(
        "Routing outgoing {:?} to {} ({})",
        msg.kind, msg.channel, msg.channel_id
    );
    let channel = channels
        .get(&msg.channel)
        .ok_or_else(|| anyhow!("No channel registered for type: {}", msg.channel))?;
    channel.send(msg).await
}
