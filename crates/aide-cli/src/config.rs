use aide_core::api::mask_secret;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AideConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub router: RouterConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_model() -> String {
    aide_core::api::DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_slack_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub allowed_users: Vec<String>,
    /// Channel ids where the bot answers @-mentions
    #[serde(default)]
    pub watch_channels: Vec<String>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            poll_interval_secs: default_slack_poll_interval(),
            allowed_users: Vec::new(),
            watch_channels: Vec::new(),
        }
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("enabled", &self.enabled)
            .field("bot_token", &mask_secret(&self.bot_token))
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("allowed_users", &self.allowed_users)
            .field("watch_channels", &self.watch_channels)
            .finish()
    }
}

fn default_slack_poll_interval() -> u64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Command used when nothing matches
    #[serde(default = "default_fallback_command")]
    pub fallback_command: String,
    /// Reply sent when an agent fails
    #[serde(default = "default_error_message")]
    pub error_message: String,
    /// Upper bound on messages dispatched at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_bus_buffer")]
    pub bus_buffer: usize,
    /// Post a "Thinking..." placeholder before slow agents reply
    #[serde(default = "default_acknowledge")]
    pub acknowledge: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            fallback_command: default_fallback_command(),
            error_message: default_error_message(),
            max_concurrent: default_max_concurrent(),
            bus_buffer: default_bus_buffer(),
            acknowledge: default_acknowledge(),
        }
    }
}

fn default_fallback_command() -> String {
    "help".to_string()
}

fn default_error_message() -> String {
    aide_core::agents::router::DEFAULT_ERROR_MESSAGE.to_string()
}

fn default_max_concurrent() -> usize {
    10
}

fn default_bus_buffer() -> usize {
    256
}

fn default_acknowledge() -> bool {
    true
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".aide")
}

impl AideConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        // Config may hold tokens, so refuse group/other readable files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    bail!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    );
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `aide init` first.",
                path.display()
            )
        })?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        config.warn_hardcoded_secrets();
        Ok(config)
    }

    /// Parse config text after expanding allowlisted `${VAR}` references
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML with tokens masked, for display
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        shown.llm.api_key = mask_secret(&self.llm.api_key);
        shown.slack.bot_token = mask_secret(&self.slack.bot_token);
        Ok(toml::to_string_pretty(&shown)?)
    }

    fn validate(&self) -> Result<()> {
        if self.slack.enabled && self.slack.bot_token.trim().is_empty() {
            bail!("slack.enabled is true but slack.bot_token is empty");
        }
        if self.slack.poll_interval_secs == 0 {
            bail!("slack.poll_interval_secs must be at least 1");
        }
        if self.router.max_concurrent == 0 {
            bail!("router.max_concurrent must be at least 1");
        }
        if self.router.fallback_command.trim().is_empty() {
            bail!("router.fallback_command must not be empty");
        }
        Ok(())
    }

    fn warn_hardcoded_secrets(&self) {
        if self.llm.api_key.starts_with("sk-ant-") {
            warn!(
                "API key is hardcoded in config file. For security, use environment variables: api_key = \"${{ANTHROPIC_API_KEY}}\""
            );
        }
        if self.slack.bot_token.starts_with("xoxb-") {
            warn!(
                "Slack bot token is hardcoded in config file. For security, use environment variables: bot_token = \"${{SLACK_BOT_TOKEN}}\""
            );
        }
    }
}

/// Environment variables that may be expanded in config files
const ALLOWED_ENV_VARS: &[&str] = &["ANTHROPIC_API_KEY", "SLACK_BOT_TOKEN", "HOME", "USER"];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}
