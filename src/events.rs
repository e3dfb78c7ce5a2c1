use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::format::{self, Block};

/// Backend behavior selector reported by the chat endpoint
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatMode {
    /// Plain conversation with the model
    Native,
    /// Memory-augmented conversation
    Langchain,
}

impl ChatMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            ChatMode::Native => "Native",
            ChatMode::Langchain => "LangChain",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChatMode::Native => "Direct conversation with the model",
            ChatMode::Langchain => "Conversation with server-side memory",
        }
    }
}

/// Who a transcript entry is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Error,
}

/// Body of a rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Text shown verbatim (user input)
    Plain(String),
    /// Formatter output
    Rich(Vec<Block>),
    /// Typing placeholder shown while a reply is pending
    Pending,
}

impl MessageContent {
    /// Run `text` through the formatter.
    pub fn rich(text: &str) -> Self {
        MessageContent::Rich(format::format(text))
    }

    /// Flatten to plain text, dropping inline styling.
    pub fn plain_text(&self) -> String {
        match self {
            MessageContent::Plain(text) => text.clone(),
            MessageContent::Rich(blocks) => format::to_plain_text(blocks),
            MessageContent::Pending => String::new(),
        }
    }
}

/// A single transcript entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self { role, content }
    }
}

/// Handle to an entry on the render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

/// Whether the submit channel has a request outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingReply,
}
