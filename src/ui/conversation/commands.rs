use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Clear the conversation history
    Clear,
    /// Toggle between native and langchain mode
    Mode,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Clear => "clear the conversation history",
            SlashCommand::Mode => "switch between native and LangChain mode",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input. Unknown commands yield `None` and
/// are sent to the backend as ordinary text. Words after the command are
/// ignored, as the backend does for its own commands.
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let head = rest.split_whitespace().next()?.to_lowercase();

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "new" | "reset" => Some(SlashCommand::Clear),
        "q" | "exit" | "bye" => Some(SlashCommand::Quit),
        "h" | "?" => Some(SlashCommand::Help),
        "m" | "switch" => Some(SlashCommand::Mode),
        _ => None,
    })?;

    Some(ParsedCommand { command })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("- `/{}` {}\n", command_str, command.description()));
    }

    help.push_str("- `/status` is answered by the server with the mode, model and message count\n");

    help.push_str("\nAliases: `/new` for `/clear`, `/q` for `/quit`, `/m` for `/mode`.");
    help.push_str("\n`/clear` and `/new` take effect at once, without a confirmation step.");
    help.push_str("\nEnter sends, Shift+Enter inserts a new line.");

    help
}
