//! Slash command parsing for the advisor REPL.
//!
//! Input that starts with `/` controls the session instead of being sent to
//! the advisor.

use crate::types::ImageSize;

/// A parsed advisor command.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvisorCommand {
    /// Start a new conversation.
    Clear,

    /// Generate an image.
    Image {
        /// Requested resolution.
        size: ImageSize,
        /// What to draw.
        prompt: String,
    },

    /// Display help information.
    Help,

    /// Exit the advisor.
    Quit,

    /// Display session statistics.
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(AdvisorCommand)` if the input is a command, or `None` if it
/// should be sent to the advisor.
///
/// # Examples
///
/// ```
/// # use nexus::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/image 2K a neon samurai").is_some());
/// assert!(parse_command("Qual o risco deste pool?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<AdvisorCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" | "new" => AdvisorCommand::Clear,
        "image" | "nft" => parse_image_command(argument),
        "help" | "?" => AdvisorCommand::Help,
        "quit" | "exit" | "q" => AdvisorCommand::Quit,
        "stats" | "status" => AdvisorCommand::Stats,
        _ => AdvisorCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn parse_image_command(argument: Option<&str>) -> AdvisorCommand {
    let Some(arg) = argument else {
        return AdvisorCommand::Invalid("/image requires a prompt".to_string());
    };

    let mut parts = arg.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or_default();
    let (size, prompt) = match parse_size_token(first) {
        Some(size) => (size, parts.next().map(str::trim).unwrap_or_default()),
        None => (ImageSize::default(), arg),
    };

    if prompt.is_empty() {
        return AdvisorCommand::Invalid("/image requires a prompt".to_string());
    }
    AdvisorCommand::Image {
        size,
        prompt: prompt.to_string(),
    }
}

// Only the short forms; "large" is a plausible first word of a prompt.
fn parse_size_token(token: &str) -> Option<ImageSize> {
    match token.to_ascii_uppercase().as_str() {
        "1K" | "2K" | "4K" => token.parse().ok(),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear                     Start a new conversation
  /image [1K|2K|4K] <prompt> Generate a square image (default 1K)
  /stats                     Show session statistics
  /help                      Show this help message
  /quit                      Exit the advisor"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(AdvisorCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(AdvisorCommand::Quit));
        assert_eq!(parse_command("/q"), Some(AdvisorCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(AdvisorCommand::Quit));
    }

    #[test]
    fn parse_clear() {
        assert_eq!(parse_command("/clear"), Some(AdvisorCommand::Clear));
        assert_eq!(parse_command("/CLEAR"), Some(AdvisorCommand::Clear));
        assert_eq!(parse_command("/new"), Some(AdvisorCommand::Clear));
    }

    #[test]
    fn parse_image() {
        assert_eq!(
            parse_command("/image a cyberpunk samurai"),
            Some(AdvisorCommand::Image {
                size: ImageSize::Small,
                prompt: "a cyberpunk samurai".to_string(),
            })
        );
        assert_eq!(
            parse_command("/image 4k   neon city skyline "),
            Some(AdvisorCommand::Image {
                size: ImageSize::Large,
                prompt: "neon city skyline".to_string(),
            })
        );
        assert_eq!(
            parse_command("/image large dragon"),
            Some(AdvisorCommand::Image {
                size: ImageSize::Small,
                prompt: "large dragon".to_string(),
            })
        );
    }

    #[test]
    fn image_requires_prompt() {
        let missing = Some(AdvisorCommand::Invalid(
            "/image requires a prompt".to_string(),
        ));
        assert_eq!(parse_command("/image"), missing);
        assert_eq!(parse_command("/image 2K"), missing);
        assert_eq!(parse_command("/image    "), missing);
    }

    #[test]
    fn parse_help_and_stats() {
        assert_eq!(parse_command("/help"), Some(AdvisorCommand::Help));
        assert_eq!(parse_command("/?"), Some(AdvisorCommand::Help));
        assert_eq!(parse_command("/stats"), Some(AdvisorCommand::Stats));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/model gemini-2.5-pro"),
            Some(AdvisorCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("O que é perda impermanente?"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_lists_every_command() {
        for command in ["/clear", "/image", "/stats", "/help", "/quit"] {
            assert!(help_text().contains(command), "{command} missing");
        }
    }
}
