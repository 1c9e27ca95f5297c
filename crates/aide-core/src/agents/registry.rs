//! Agent registry: maps command names to agent implementations

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::command::normalize_command;
use super::{Agent, AgentSummary};

/// Registry of command agents.
///
/// Built once at startup and then shared read-only (behind an `Arc`) with the
/// [`CommandRouter`](super::CommandRouter). Names are normalized on both
/// insert and lookup, and a later registration under the same name replaces
/// the earlier one.
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
        }
    }

    /// Register `agent` under `name`, returning the agent it replaced
    pub fn register(&mut self, name: &str, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let key = normalize_command(name);
        if key.is_empty() {
            warn!("Ignoring agent '{}' registered under an empty command name", agent.name());
            return None;
        }

        debug!("Registering agent '{}' as command '{}'", agent.name(), key);
        let previous = self.agents.insert(key.clone(), agent);
        if let Some(prev) = &previous {
            warn!(
                "Command '{}' was already registered to agent '{}'; replacing it",
                key,
                prev.name()
            );
        }
        previous
    }

    /// Register an agent under its own name and all of its aliases
    pub fn register_agent(&mut self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        self.register(&name, agent.clone());
        for alias in agent.aliases() {
            self.register(alias, agent.clone());
        }
    }

    /// Look up an agent by command name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(&normalize_command(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(&normalize_command(name))
    }

    /// All registered command names, aliases included, in sorted order
    pub fn list_all(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    /// Number of registered command names
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// One summary per distinct agent, with the other names it answers to
    pub fn summaries(&self) -> Vec<AgentSummary> {
        let mut groups: Vec<(Arc<dyn Agent>, Vec<&str>)> = Vec::new();
        for (key, agent) in &self.agents {
            match groups.iter_mut().find(|(a, _)| Arc::ptr_eq(a, agent)) {
                Some((_, keys)) => keys.push(key.as_str()),
                None => groups.push((agent.clone(), vec![key.as_str()])),
            }
        }

        let mut summaries: Vec<AgentSummary> = groups
            .into_iter()
            .map(|(agent, keys)| {
                let primary = normalize_command(agent.name());
                let name = if keys.contains(&primary.as_str()) {
                    primary
                } else {
                    keys[0].to_string()
                };
                let aliases = keys
                    .into_iter()
                    .filter(|k| *k != name)
                    .map(str::to_string)
                    .collect();
                AgentSummary {
                    name,
                    description: agent.description().to_string(),
                    aliases,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentError, AgentResponse, InvocationContext};
    use async_trait::async_trait;

    struct NamedAgent {
        name: &'static str,
        aliases: &'static [&'static str],
    }

    #[async_trait]
    impl Agent for NamedAgent {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test agent"
        }

        fn aliases(&self) -> &[&'static str] {
            self.aliases
        }

        async fn invoke(&self, _ctx: InvocationContext) -> Result<AgentResponse, AgentError> {
            Ok(AgentResponse::new(self.name))
        }
    }

    fn agent(name: &'static str) -> Arc<dyn Agent> {
        Arc::new(NamedAgent { name, aliases: &[] })
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = AgentRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register("profile", agent("profile")).is_none());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("profile").unwrap().name(), "profile");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_lookup_is_normalized() {
        let mut registry = AgentRegistry::new();
        registry.register("/Profile", agent("profile"));
        assert!(registry.contains("profile"));
        assert!(registry.contains("-PROFILE"));
        assert!(registry.get(" /profile ").is_some());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = AgentRegistry::new();
        registry.register("profile", agent("first"));
        let replaced = registry.register("profile", agent("second"));

        assert_eq!(replaced.unwrap().name(), "first");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("profile").unwrap().name(), "second");
    }

    #[test]
    fn test_empty_name_ignored() {
        let mut registry = AgentRegistry::new();
        assert!(registry.register("  ", agent("blank")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_agent_with_aliases() {
        let mut registry = AgentRegistry::new();
        registry.register_agent(Arc::new(NamedAgent {
            name: "meddic",
            aliases: &["medic", "meddpicc"],
        }));

        assert_eq!(registry.len(), 3);
        let a = registry.get("medic").unwrap();
        let b = registry.get("meddic").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_list_all_sorted_and_stable() {
        let mut registry = AgentRegistry::new();
        registry.register("zeta", agent("zeta"));
        registry.register("alpha", agent("alpha"));
        registry.register("mid", agent("mid"));

        let first = registry.list_all();
        assert_eq!(first, vec!["alpha", "mid", "zeta"]);
        assert_eq!(first, registry.list_all());
    }

    #[test]
    fn test_summaries_group_aliases() {
        let mut registry = AgentRegistry::new();
        registry.register_agent(Arc::new(NamedAgent {
            name: "meddic",
            aliases: &["medic"],
        }));
        registry.register_agent(agent("help"));

        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "help");
        assert!(summaries[0].aliases.is_empty());
        assert_eq!(summaries[1].name, "meddic");
        assert_eq!(summaries[1].aliases, vec!["medic".to_string()]);
    }

    #[test]
    fn test_summaries_after_primary_overwritten() {
        let mut registry = AgentRegistry::new();
        registry.register_agent(Arc::new(NamedAgent {
            name: "profile",
            aliases: &["research"],
        }));
        registry.register("profile", agent("replacement"));

        let summaries = registry.summaries();
        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["profile", "research"]);
    }
}
