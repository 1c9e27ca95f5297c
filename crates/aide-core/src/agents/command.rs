//! Command token extraction from raw Slack text

/// Result of splitting message text into a command token and its arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: Option<String>,
    pub args: String,
}

/// Normalize a command name: trim, drop one leading `/` or `-`, lowercase.
pub fn normalize_command(name: &str) -> String {
    let trimmed = name.trim();
    let stripped = trimmed
        .strip_prefix('/')
        .or_else(|| trimmed.strip_prefix('-'))
        .unwrap_or(trimmed);
    stripped.to_lowercase()
}

/// Split `text` into a command token and the remaining arguments.
///
/// Leading user mentions (`<@U123>` or `<@U123|name>`) are removed first so
/// that `@aide profile Acme` in a channel parses the same as `profile Acme`
/// in a DM.
pub fn parse_command(text: &str) -> ParsedCommand {
    let mut rest = text.trim();

    while let Some(after) = rest.strip_prefix("<@") {
        let Some(end) = after.find('>') else {
            break;
        };
        rest = after[end + 1..].trim_start();
    }

    let (token, args) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };

    let command = normalize_command(token);
    ParsedCommand {
        command: if command.is_empty() { None } else { Some(command) },
        args: args.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_command() {
        let parsed = parse_command("profile Acme Corp");
        assert_eq!(parsed.command.as_deref(), Some("profile"));
        assert_eq!(parsed.args, "Acme Corp");
    }

    #[test]
    fn test_slash_and_dash_prefixes() {
        assert_eq!(
            parse_command("/meddic notes here").command.as_deref(),
            Some("meddic")
        );
        assert_eq!(
            parse_command("-profile Acme").command.as_deref(),
            Some("profile")
        );
    }

    #[test]
    fn test_case_folding() {
        assert_eq!(parse_command("HELP").command.as_deref(), Some("help"));
    }

    #[test]
    fn test_strips_mentions() {
        let parsed = parse_command("<@UBOT> profile  Acme   Corp ");
        assert_eq!(parsed.command.as_deref(), Some("profile"));
        assert_eq!(parsed.args, "Acme   Corp");

        let parsed = parse_command("<@UBOT|aide> <@UOTHER> help");
        assert_eq!(parsed.command.as_deref(), Some("help"));
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_empty_and_mention_only() {
        assert_eq!(parse_command(""), ParsedCommand::default());
        assert_eq!(parse_command("   "), ParsedCommand::default());
        assert_eq!(parse_command("<@UBOT>"), ParsedCommand::default());
        assert_eq!(parse_command("/").command, None);
    }

    #[test]
    fn test_unterminated_mention_is_kept() {
        let parsed = parse_command("<@UBOT profile");
        assert_eq!(parsed.command.as_deref(), Some("<@ubot"));
        assert_eq!(parsed.args, "profile");
    }

    #[test]
    fn test_multiline_args() {
        let parsed = parse_command("meddic\nMet with CFO.\nBudget approved.");
        assert_eq!(parsed.command.as_deref(), Some("meddic"));
        assert_eq!(parsed.args, "Met with CFO.\nBudget approved.");
    }

    #[test]
    fn test_normalize_command() {
        assert_eq!(normalize_command(" /Profile "), "profile");
        assert_eq!(normalize_command("-MEDDIC"), "meddic");
        assert_eq!(normalize_command("?"), "?");
    }
}
