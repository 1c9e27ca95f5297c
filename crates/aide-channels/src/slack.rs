//! Slack channel adapter using Web API polling

use crate::bus::MessageChannel;
use crate::rate_limit::RateLimiter;
use aide_core::types::{ChannelType, IncomingMessage, MessageKind, OutgoingMessage};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const MAX_MESSAGE_SIZE: usize = 10_240;
const SLACK_API: &str = "https://slack.com/api";
const ACK_TEXT: &str = "Thinking...";
const RATE_LIMIT_MAX: usize = 10;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// A message pulled out of a `conversations.history` payload
#[derive(Debug, Clone, PartialEq, Eq)]
struct SlackMessage {
    ts: String,
    user: String,
    text: String,
    thread_ts: Option<String>,
    from_bot: bool,
}

impl SlackMessage {
    fn from_json(raw: &Value) -> Option<Self> {
        let ts = raw.get("ts")?.as_str()?.to_string();
        Some(Self {
            ts,
            user: str_field(raw, "user").to_string(),
            text: str_field(raw, "text").to_string(),
            thread_ts: raw
                .get("thread_ts")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            // bot posts and join/leave notices carry a subtype or bot_id
            from_bot: raw.get("bot_id").is_some() || raw.get("subtype").is_some(),
        })
    }
}

fn str_field<'a>(raw: &'a Value, name: &str) -> &'a str {
    raw.get(name).and_then(|v| v.as_str()).unwrap_or("")
}

/// Why a polled message was or wasn't forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Forward,
    OwnOrBot,
    Unauthorized,
    Empty,
    Oversized,
    NotMentioned,
}

/// Per-poll filtering rules; rate limiting is applied separately
struct Filter<'a> {
    bot_user_id: &'a str,
    allowed_users: &'a [String],
}

impl Filter<'_> {
    fn classify(&self, msg: &SlackMessage, require_mention: bool) -> Verdict {
        if msg.from_bot || msg.user.is_empty() || msg.user == self.bot_user_id {
            return Verdict::OwnOrBot;
        }
        if !self.allowed_users.is_empty() && !self.allowed_users.iter().any(|u| *u == msg.user) {
            return Verdict::Unauthorized;
        }
        if msg.text.trim().is_empty() {
            return Verdict::Empty;
        }
        if msg.text.len() > MAX_MESSAGE_SIZE {
            return Verdict::Oversized;
        }
        if require_mention && !mentions(&msg.text, self.bot_user_id) {
            return Verdict::NotMentioned;
        }
        Verdict::Forward
    }
}

/// Whether `text` holds a `<@ID>` or `<@ID|name>` mention of exactly `user_id`
fn mentions(text: &str, user_id: &str) -> bool {
    text.contains(&format!("<@{}>", user_id)) || text.contains(&format!("<@{}|", user_id))
}

/// Which thread a reply to `msg` should land in.
/// Channel mentions get a thread under the message; DMs only stay threaded
/// when the user wrote inside a thread.
fn reply_thread(msg: &SlackMessage, is_watched_channel: bool) -> Option<String> {
    match (&msg.thread_ts, is_watched_channel) {
        (Some(ts), _) => Some(ts.clone()),
        (None, true) => Some(msg.ts.clone()),
        (None, false) => None,
    }
}

fn now_ts() -> String {
    format!("{}.000000", Utc::now().timestamp())
}

/// Authenticated handle on the Slack Web API
#[derive(Clone)]
struct SlackApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl SlackApi {
    /// Call a Slack Web API read method
    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Slack API HTTP error: {}", response.status()));
        }

        let body: Value = response.json().await?;
        check_ok(&body, method)?;
        Ok(body)
    }

    /// POST a JSON body to a Slack Web API write method
    async fn post(&self, method: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        let result: Value = response.json().await?;
        check_ok(&result, method)?;
        Ok(result)
    }

    /// Refresh the user -> DM channel map from `conversations.list`
    async fn discover_dm_channels(&self, dm_channels: &DashMap<String, String>) -> Result<()> {
        let convos = self
            .call("conversations.list", &[("types", "im"), ("limit", "200")])
            .await?;

        if let Some(channels) = convos.get("channels").and_then(|v| v.as_array()) {
            for ch in channels {
                let ch_id = str_field(ch, "id");
                let user = str_field(ch, "user");
                if !ch_id.is_empty() && !user.is_empty() {
                    dm_channels.insert(user.to_string(), ch_id.to_string());
                }
            }
        }
        Ok(())
    }
}

/// Slack channel adapter using Web API polling
pub struct SlackChannel {
    api: SlackApi,
    poll_interval: Duration,
    bot_user_id: Arc<RwLock<Option<String>>>,
    /// Slack user IDs allowed to interact with the assistant.
    /// Empty means all users are allowed (open access).
    allowed_users: Vec<String>,
    /// Public/private channels where the bot answers when mentioned
    watched_channels: Vec<String>,
    /// Maps Slack user_id -> DM channel_id
    dm_channels: Arc<DashMap<String, String>>,
    /// Maps original message id -> (channel_id, message_ts) of a "Thinking..." placeholder
    pending_acks: Arc<DashMap<String, (String, String)>>,
}

impl SlackChannel {
    /// Create a new Slack channel adapter
    ///
    /// # Arguments
    /// * `bot_token` - Slack bot token (starts with xoxb-)
    /// * `poll_interval` - How often to poll for new messages
    /// * `allowed_users` - Slack user IDs allowed to interact (empty = all allowed)
    pub fn new(bot_token: String, poll_interval: Duration, allowed_users: Vec<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            api: SlackApi {
                client,
                base_url: SLACK_API.to_string(),
                token: bot_token,
            },
            poll_interval,
            bot_user_id: Arc::new(RwLock::new(None)),
            allowed_users,
            watched_channels: Vec::new(),
            dm_channels: Arc::new(DashMap::new()),
            pending_acks: Arc::new(DashMap::new()),
        }
    }

    /// Also poll these channel ids, answering only messages that mention the bot
    pub fn with_watched_channels(mut self, channels: Vec<String>) -> Self {
        self.watched_channels = channels;
        self
    }

    /// Point the adapter at a different Web API root (proxies, test servers)
    pub fn with_api_base(mut self, base_url: String) -> Self {
        self.api.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// The bot's Slack user id, known once `start` has authenticated
    pub async fn bot_user_id(&self) -> Option<String> {
        self.bot_user_id.read().await.clone()
    }

    /// Post a message, returning its timestamp
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<String> {
        let mut body = serde_json::json!({
            "channel": channel,
            "text": text,
        });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = Value::String(ts.to_string());
        }

        let result = self.api.post("chat.postMessage", &body).await?;
        Ok(str_field(&result, "ts").to_string())
    }

    /// Replace the text of an existing message (used for "Thinking..." placeholders)
    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "channel": channel,
            "ts": ts,
            "text": text,
        });
        self.api.post("chat.update", &body).await?;
        Ok(())
    }
}

fn check_ok(body: &Value, method: &str) -> Result<()> {
    if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
        let err = body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        return Err(anyhow!("Slack {} error: {}", method, err));
    }
    Ok(())
}

/// State owned by the background polling task
struct Poller {
    api: SlackApi,
    bot_user_id: String,
    allowed_users: Vec<String>,
    watched_channels: Vec<String>,
    dm_channels: Arc<DashMap<String, String>>,
    rate_limiter: RateLimiter,
    latest_ts: HashMap<String, String>,
}

impl Poller {
    async fn run(mut self, poll_interval: Duration, tx: mpsc::Sender<IncomingMessage>) {
        info!("Slack polling task started");

        // Start from "now" so old history isn't replayed
        let start = now_ts();
        for entry in self.dm_channels.iter() {
            self.latest_ts.insert(entry.value().clone(), start.clone());
        }
        for ch in &self.watched_channels {
            self.latest_ts.insert(ch.clone(), start.clone());
        }

        let mut interval = tokio::time::interval(poll_interval);
        loop {
            interval.tick().await;
            if tx.is_closed() {
                info!("Slack receiver dropped, stopping polling task");
                break;
            }
            debug!("Polling Slack for new messages");
            if let Err(e) = self.poll_once(&tx).await {
                error!("Error during Slack polling cycle: {}", e);
            }
        }
    }

    async fn poll_once(&mut self, tx: &mpsc::Sender<IncomingMessage>) -> Result<()> {
        self.rate_limiter.prune();

        if let Err(e) = self.api.discover_dm_channels(&self.dm_channels).await {
            debug!("Failed to refresh Slack DM channels: {}", e);
        }

        let mut targets: Vec<(String, bool)> = self
            .dm_channels
            .iter()
            .map(|entry| (entry.value().clone(), false))
            .collect();
        targets.extend(self.watched_channels.iter().map(|c| (c.clone(), true)));

        for (channel_id, watched) in targets {
            let oldest = self
                .latest_ts
                .entry(channel_id.clone())
                .or_insert_with(now_ts)
                .clone();

            let history = match self
                .api
                .call(
                    "conversations.history",
                    &[
                        ("channel", channel_id.as_str()),
                        ("oldest", oldest.as_str()),
                        ("limit", "20"),
                    ],
                )
                .await
            {
                Ok(h) => h,
                Err(e) => {
                    debug!("Failed to poll channel {}: {}", channel_id, e);
                    continue;
                }
            };

            let mut messages: Vec<SlackMessage> = history
                .get("messages")
                .and_then(|v| v.as_array())
                .map(|msgs| msgs.iter().filter_map(SlackMessage::from_json).collect())
                .unwrap_or_default();
            // history is newest first
            messages.sort_by(|a, b| a.ts.cmp(&b.ts));

            let mut max_ts = oldest.clone();
            for msg in messages {
                if msg.ts.as_str() <= oldest.as_str() {
                    continue;
                }
                if msg.ts > max_ts {
                    max_ts = msg.ts.clone();
                }
                self.forward(&channel_id, watched, msg, tx).await;
            }

            if max_ts > oldest {
                self.latest_ts.insert(channel_id, max_ts);
            }
        }

        Ok(())
    }

    async fn forward(
        &self,
        channel_id: &str,
        watched: bool,
        msg: SlackMessage,
        tx: &mpsc::Sender<IncomingMessage>,
    ) {
        let filter = Filter {
            bot_user_id: &self.bot_user_id,
            allowed_users: &self.allowed_users,
        };
        match filter.classify(&msg, watched) {
            Verdict::Forward => {}
            Verdict::Oversized => {
                warn!(
                    "Dropping oversized Slack message from {} ({} bytes, limit {} bytes)",
                    msg.user,
                    msg.text.len(),
                    MAX_MESSAGE_SIZE,
                );
                return;
            }
            other => {
                debug!("Skipping Slack message {} in {}: {:?}", msg.ts, channel_id, other);
                return;
            }
        }

        if !self.rate_limiter.check_and_record(&msg.user) {
            return;
        }

        let incoming = IncomingMessage {
            id: format!("slack_{}_{}", channel_id, msg.ts),
            channel: ChannelType::Slack,
            channel_id: channel_id.to_string(),
            thread_ts: reply_thread(&msg, watched),
            user_id: msg.user.clone(),
            text: msg.text,
            timestamp: Utc::now(),
        };

        info!(
            "Forwarding Slack message from {} in {} ({} chars)",
            incoming.user_id,
            channel_id,
            incoming.text.len()
        );

        if let Err(e) = tx.send(incoming).await {
            error!("Failed to send Slack message to bus: {}", e);
        }
    }
}

#[async_trait]
impl MessageChannel for SlackChannel {
    async fn start(&self, tx: mpsc::Sender<IncomingMessage>) -> Result<()> {
        info!("Starting Slack channel adapter");

        if self.api.token.is_empty() {
            return Err(anyhow!("Slack bot token is empty"));
        }

        // Verify token and get bot user ID
        let auth_result = self.api.call("auth.test", &[]).await?;
        let bot_user_id = auth_result
            .get("user_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Could not get bot user_id from auth.test"))?
            .to_string();

        info!("Slack bot authenticated as user_id: {}", bot_user_id);
        *self.bot_user_id.write().await = Some(bot_user_id.clone());

        self.api.discover_dm_channels(&self.dm_channels).await?;
        info!(
            "Discovered {} Slack DM channels, watching {} channels for mentions",
            self.dm_channels.len(),
            self.watched_channels.len()
        );

        // Discovery is complete before the poller starts, so bot_user_id is always set
        let poller = Poller {
            api: self.api.clone(),
            bot_user_id,
            allowed_users: self.allowed_users.clone(),
            watched_channels: self.watched_channels.clone(),
            dm_channels: self.dm_channels.clone(),
            rate_limiter: RateLimiter::new(RATE_LIMIT_MAX, RATE_LIMIT_WINDOW),
            latest_ts: HashMap::new(),
        };
        tokio::spawn(poller.run(self.poll_interval, tx));

        info!("Slack channel adapter started");
        Ok(())
    }

    async fn send(&self, msg: OutgoingMessage) -> Result<()> {
        if msg.channel_id.is_empty() {
            return Err(anyhow!("Outgoing Slack message has no channel id"));
        }

        if msg.kind == MessageKind::Acknowledgment {
            debug!("Sending Slack acknowledgment to channel {}", msg.channel_id);
            match self
                .post_message(&msg.channel_id, msg.thread_ts.as_deref(), ACK_TEXT)
                .await
            {
                Ok(ts) if !ts.is_empty() => {
                    if let Some(reply_to) = &msg.reply_to {
                        self.pending_acks
                            .insert(reply_to.clone(), (msg.channel_id.clone(), ts));
                    }
                }
                Ok(_) => debug!("Slack acknowledgment returned no ts"),
                Err(e) => warn!("Failed to send Slack acknowledgment: {}", e),
            }
            return Ok(());
        }

        // Replace a pending "Thinking..." placeholder when there is one
        if let Some(reply_to) = &msg.reply_to
            && let Some((_, (ack_channel, ack_ts))) = self.pending_acks.remove(reply_to)
        {
            match self.update_message(&ack_channel, &ack_ts, &msg.content).await {
                Ok(()) => {
                    info!("Slack placeholder {} updated with response", ack_ts);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to update Slack message, posting new one: {}", e);
                }
            }
        }

        self.post_message(&msg.channel_id, msg.thread_ts.as_deref(), &msg.content)
            .await?;
        info!("Slack message sent to {}", msg.channel_id);
        Ok(())
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Slack
    }
}
