//! Profile agent: research brief on a company or person

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Agent, AgentError, AgentResponse, InvocationContext};
use crate::api::CompletionClient;

const SYSTEM_PROMPT: &str = "You are a sales research assistant. \
Write a concise account brief for the company or person the user names. \
Cover: what they do, size and market, recent news or initiatives, likely \
priorities and pain points, and three good discovery questions. \
Use short Slack-friendly sections with bold headings and bullet points. \
If you are unsure about a fact, say so instead of guessing.";

const USAGE: &str = "Tell me who to research, e.g. `profile Acme Corp` or `profile Jane Doe at Acme`.";

pub struct ProfileAgent {
    client: Arc<dyn CompletionClient>,
}

impl ProfileAgent {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Agent for ProfileAgent {
    fn name(&self) -> &str {
        "profile"
    }

    fn description(&self) -> &str {
        "Research brief on a company or person"
    }

    fn aliases(&self) -> &[&'static str] {
        &["research"]
    }

    async fn invoke(&self, ctx: InvocationContext) -> Result<AgentResponse, AgentError> {
        let target = ctx.bounded_args()?.trim();
        if target.is_empty() {
            debug!("Profile requested by {} without a target", ctx.user_id);
            return Ok(AgentResponse::new(USAGE));
        }

        info!(
            "Profile research for {} ({} chars) via {}",
            ctx.user_id,
            target.len(),
            self.client.model()
        );
        let prompt = format!("Research target: {}", target);
        let text = self.client.complete(SYSTEM_PROMPT, &prompt).await?;
        Ok(AgentResponse::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MAX_AGENT_INPUT;
    use anyhow::{Result, anyhow};
    use std::sync::Mutex;

    struct RecordingClient {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingClient {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl CompletionClient for RecordingClient {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                return Err(anyhow!("upstream unavailable"));
            }
            Ok("*Acme Corp*\n• makes anvils".to_string())
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn ctx(args: &str) -> InvocationContext {
        InvocationContext {
            channel: "D1".to_string(),
            thread_ts: None,
            user_id: "U1".to_string(),
            raw_text: format!("profile {}", args),
            command: Some("profile".to_string()),
            args: args.to_string(),
        }
    }

    #[tokio::test]
    async fn test_profile_calls_llm() {
        let client = RecordingClient::new(false);
        let agent = ProfileAgent::new(client.clone());
        let response = agent.invoke(ctx("Acme Corp")).await.unwrap();

        assert!(response.text.contains("anvils"));
        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0], "Research target: Acme Corp");
    }

    #[tokio::test]
    async fn test_profile_without_target_skips_llm() {
        let client = RecordingClient::new(false);
        let agent = ProfileAgent::new(client.clone());
        let response = agent.invoke(ctx("   ")).await.unwrap();

        assert_eq!(response.text, USAGE);
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_llm_error_propagates() {
        let agent = ProfileAgent::new(RecordingClient::new(true));
        let err = agent.invoke(ctx("Acme")).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }

    #[tokio::test]
    async fn test_profile_rejects_oversized_input() {
        let client = RecordingClient::new(false);
        let agent = ProfileAgent::new(client.clone());
        let err = agent
            .invoke(ctx(&"a".repeat(MAX_AGENT_INPUT + 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_accepts_multibyte_target_under_limit() {
        let client = RecordingClient::new(false);
        let agent = ProfileAgent::new(client.clone());
        let target = "株式会社".repeat(1500);
        agent.invoke(ctx(&target)).await.unwrap();

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts[0], format!("Research target: {}", target));
    }
}
