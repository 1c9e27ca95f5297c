//! MEDDIC agent: qualifies a deal from free-form call notes
//!
//! The notes are mapped onto the six MEDDIC dimensions (Metrics, Economic
//! Buyer, Decision Criteria, Decision Process, Identify Pain, Champion),
//! followed by the gaps in the notes and questions to close them.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{Agent, AgentError, AgentResponse, InvocationContext};
use crate::api::CompletionClient;

pub const MEDDIC_SECTIONS: [&str; 6] = [
    "Metrics",
    "Economic Buyer",
    "Decision Criteria",
    "Decision Process",
    "Identify Pain",
    "Champion",
];

const USAGE: &str = "Paste your call notes after the command, e.g.\n\
`meddic Met with Dana (VP Ops). Budget owner is the CFO. They lose ~20 hours a week to manual reconciliation...`";

pub struct MeddicAgent {
    client: Arc<dyn CompletionClient>,
}

impl MeddicAgent {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    fn system_prompt() -> String {
        let sections: Vec<String> = MEDDIC_SECTIONS
            .iter()
            .map(|s| format!("*{}*", s))
            .collect();
        format!(
            "You are a sales coach applying the MEDDIC qualification framework. \
             Read the user's call notes and write one section for each of: {}. \
             Under each heading summarize what the notes establish, or write \
             \"Not yet known\". Finish with a *Gaps* section and a *Next questions* \
             section listing specific questions for the next call. \
             Only use facts present in the notes. Format for Slack.",
            sections.join(", ")
        )
    }
}

#[async_trait]
impl Agent for MeddicAgent {
    fn name(&self) -> &str {
        "meddic"
    }

    fn description(&self) -> &str {
        "Qualify a deal with MEDDIC from your call notes"
    }

    fn aliases(&self) -> &[&'static str] {
        &["medic", "meddpicc"]
    }

    async fn invoke(&self, ctx: InvocationContext) -> Result<AgentResponse, AgentError> {
        let notes = ctx.bounded_args()?.trim();
        if notes.is_empty() {
            return Ok(AgentResponse::new(USAGE));
        }

        info!("MEDDIC analysis for {} ({} chars of notes)", ctx.user_id, notes.len());
        let prompt = format!("Call notes:\n{}", notes);
        let text = self.client.complete(&Self::system_prompt(), &prompt).await?;
        Ok(AgentResponse::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingClient {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CompletionClient for CapturingClient {
        async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            Ok("*Metrics*\nNot yet known".to_string())
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn ctx(args: &str) -> InvocationContext {
        InvocationContext {
            channel: "C1".to_string(),
            thread_ts: Some("1.0".to_string()),
            user_id: "U7".to_string(),
            raw_text: format!("meddic {}", args),
            command: Some("meddic".to_string()),
            args: args.to_string(),
        }
    }

    #[test]
    fn test_system_prompt_names_every_section() {
        let prompt = MeddicAgent::system_prompt();
        for section in MEDDIC_SECTIONS {
            assert!(prompt.contains(section), "missing {}", section);
        }
    }

    #[tokio::test]
    async fn test_meddic_sends_notes() {
        let client = Arc::new(CapturingClient::default());
        let agent = MeddicAgent::new(client.clone());
        let response = agent
            .invoke(ctx("CFO owns budget. Pain: manual reconciliation."))
            .await
            .unwrap();

        assert!(response.text.starts_with("*Metrics*"));
        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("MEDDIC"));
        assert_eq!(
            calls[0].1,
            "Call notes:\nCFO owns budget. Pain: manual reconciliation."
        );
    }

    #[tokio::test]
    async fn test_meddic_without_notes() {
        let client = Arc::new(CapturingClient::default());
        let agent = MeddicAgent::new(client.clone());
        let response = agent.invoke(ctx("")).await.unwrap();

        assert_eq!(response.text, USAGE);
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_meddic_aliases() {
        let agent = MeddicAgent::new(Arc::new(CapturingClient::default()));
        assert_eq!(agent.aliases(), &["medic", "meddpicc"]);
    }
}
