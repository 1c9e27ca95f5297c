//! Construction of the default agent set

use std::sync::Arc;
use tracing::info;

use super::{AgentRegistry, HelpAgent, MeddicAgent, ProfileAgent};
use crate::api::CompletionClient;

/// Build a registry with every built-in agent.
///
/// Help is registered last so its listing covers everything else.
pub fn default_registry(client: Arc<dyn CompletionClient>) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry.register_agent(Arc::new(ProfileAgent::new(client.clone())));
    registry.register_agent(Arc::new(MeddicAgent::new(client)));
    registry.register_agent(Arc::new(HelpAgent::new(registry.summaries())));
    info!(
        "Registered {} built-in commands: {}",
        registry.len(),
        registry.list_all().join(", ")
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct NoopClient;

    #[async_trait]
    impl CompletionClient for NoopClient {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }

        fn model(&self) -> &str {
            "noop"
        }
    }

    #[test]
    fn test_default_registry_commands() {
        let registry = default_registry(Arc::new(NoopClient));
        assert_eq!(
            registry.list_all(),
            vec!["?", "commands", "help", "meddic", "meddpicc", "medic", "profile", "research"]
        );
    }

    #[test]
    fn test_default_registry_summaries() {
        let registry = default_registry(Arc::new(NoopClient));
        let names: Vec<String> = registry.summaries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["help", "meddic", "profile"]);
    }
}
