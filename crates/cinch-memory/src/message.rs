//! Conversation messages as consumed by memory blocks.
//!
//! A [`ChatMessage`] is an ordered list of role-tagged content blocks plus
//! optional tool-call data and free-form metadata. Memory blocks only read
//! the text blocks and the metadata; images and other non-text blocks are
//! carried through but never summarized.

use crate::MessageRole;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One block of message content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { url: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// The text of a text block, `None` for anything else.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Image { .. } => None,
        }
    }
}

/// A tool invocation recorded on an assistant message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A message in the conversation being remembered.
///
/// Deserializes from either `{"role": "user", "content": "plain text"}` or
/// `{"role": "user", "content": [{"type": "text", "text": "..."}]}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    #[serde(
        rename = "content",
        default,
        deserialize_with = "deserialize_content"
    )]
    pub blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ChatMessage {
    fn with_role(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            blocks: vec![ContentBlock::text(text)],
            tool_calls: Vec::new(),
            tool_call_id: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, text)
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, text)
    }

    pub fn tool_result(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::with_role(MessageRole::Tool, text)
        }
    }

    /// A message with no content blocks at all.
    pub fn empty(role: MessageRole) -> Self {
        Self {
            role,
            blocks: Vec::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Append a content block.
    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Record a tool call made by this message.
    pub fn with_tool_call(mut self, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        self.tool_calls.push(ToolCallRecord {
            name: name.into(),
            arguments: arguments.into(),
        });
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Iterate over the text blocks in order.
    pub fn text_blocks(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(ContentBlock::as_text)
    }

    /// All text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.text_blocks().collect::<Vec<_>>().join("\n")
    }
}

fn deserialize_content<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Content {
        Plain(String),
        Blocks(Vec<ContentBlock>),
        Missing(()),
    }

    Ok(match Content::deserialize(deserializer)? {
        Content::Plain(text) => vec![ContentBlock::Text { text }],
        Content::Blocks(blocks) => blocks,
        Content::Missing(()) => Vec::new(),
    })
}
