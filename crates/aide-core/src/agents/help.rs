//! Help agent: lists the available commands
//!
//! Also serves as the router's fallback, so it mentions the unrecognized
//! command when it is reached that way.

use async_trait::async_trait;

use super::{Agent, AgentError, AgentResponse, AgentSummary, InvocationContext};

pub const HELP_COMMAND: &str = "help";
const HELP_ALIASES: &[&str] = &["commands", "?"];
const HELP_DESCRIPTION: &str = "Show the commands I understand";

pub struct HelpAgent {
    commands: Vec<AgentSummary>,
}

impl HelpAgent {
    /// Build a help agent describing `commands`. The help command itself is
    /// added if it is missing.
    pub fn new(mut commands: Vec<AgentSummary>) -> Self {
        if !commands.iter().any(|c| c.name == HELP_COMMAND) {
            commands.push(Self::summary());
        }
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        Self { commands }
    }

    /// Summary for the help command itself
    pub fn summary() -> AgentSummary {
        AgentSummary {
            name: HELP_COMMAND.to_string(),
            description: HELP_DESCRIPTION.to_string(),
            aliases: HELP_ALIASES.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn commands(&self) -> &[AgentSummary] {
        &self.commands
    }

    fn is_help_name(name: &str) -> bool {
        name == HELP_COMMAND || HELP_ALIASES.iter().any(|a| *a == name)
    }

    fn render(&self, unknown: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(cmd) = unknown {
            out.push_str(&format!("I don't know the command `{}`.\n\n", cmd));
        }
        out.push_str("*Here's what I can do:*\n");
        for summary in &self.commands {
            out.push_str(&format!("• `{}`: {}", summary.name, summary.description));
            if !summary.aliases.is_empty() {
                let aliases: Vec<String> =
                    summary.aliases.iter().map(|a| format!("`{}`", a)).collect();
                out.push_str(&format!(" (also {})", aliases.join(", ")));
            }
            out.push('\n');
        }
        out.push_str("\nStart a message with a command, e.g. `profile Acme Corp`.");
        out
    }
}

#[async_trait]
impl Agent for HelpAgent {
    fn name(&self) -> &str {
        HELP_COMMAND
    }

    fn description(&self) -> &str {
        HELP_DESCRIPTION
    }

    fn aliases(&self) -> &[&'static str] {
        HELP_ALIASES
    }

    async fn invoke(&self, ctx: InvocationContext) -> Result<AgentResponse, AgentError> {
        let unknown = ctx.command.as_deref().filter(|c| !Self::is_help_name(c));
        Ok(AgentResponse::new(self.render(unknown)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(command: Option<&str>) -> InvocationContext {
        InvocationContext {
            channel: "D1".to_string(),
            thread_ts: None,
            user_id: "U1".to_string(),
            raw_text: command.unwrap_or_default().to_string(),
            command: command.map(str::to_string),
            args: String::new(),
        }
    }

    fn profile_summary() -> AgentSummary {
        AgentSummary {
            name: "profile".to_string(),
            description: "Research a company".to_string(),
            aliases: vec!["research".to_string()],
        }
    }

    #[test]
    fn test_new_adds_itself() {
        let help = HelpAgent::new(vec![profile_summary()]);
        let names: Vec<&str> = help.commands().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["help", "profile"]);
    }

    #[test]
    fn test_new_does_not_duplicate_itself() {
        let help = HelpAgent::new(vec![HelpAgent::summary(), profile_summary()]);
        assert_eq!(help.commands().len(), 2);
    }

    #[tokio::test]
    async fn test_lists_commands_and_aliases() {
        let help = HelpAgent::new(vec![profile_summary()]);
        let response = help.invoke(ctx(Some("help"))).await.unwrap();
        assert!(response.text.contains("`profile`: Research a company"));
        assert!(response.text.contains("(also `research`)"));
        assert!(!response.text.contains("I don't know"));
    }

    #[tokio::test]
    async fn test_mentions_unknown_command() {
        let help = HelpAgent::new(vec![profile_summary()]);
        let response = help.invoke(ctx(Some("weather"))).await.unwrap();
        assert!(response.text.starts_with("I don't know the command `weather`."));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let help = HelpAgent::new(Vec::new());
        let response = help.invoke(ctx(None)).await.unwrap();
        assert!(response.text.contains("`help`"));
        assert!(!response.text.contains("I don't know"));
    }
}
