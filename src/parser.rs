//! Splits a finished answer into prose and fenced code.

use serde::{Deserialize, Serialize};

/// The delimiter that opens and closes a code block.
pub const FENCE: &str = "```";

/// One segment of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    /// Prose outside any fence.
    #[serde(rename = "TextBlock")]
    Text {
        /// The trimmed text.
        value: String,
    },

    /// The contents of a fenced block.
    #[serde(rename = "CodeBlock")]
    Code {
        /// The tag that followed the opening fence, e.g. `rust`.
        programming_language: Option<String>,
        /// The code, trimmed, without the tag line.
        value: String,
    },
}

impl Block {
    /// The block's text.
    pub fn value(&self) -> &str {
        match self {
            Block::Text { value } | Block::Code { value, .. } => value,
        }
    }

    /// Returns true for code blocks.
    pub fn is_code(&self) -> bool {
        matches!(self, Block::Code { .. })
    }
}

/// An answer split into blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAnswer {
    /// All blocks in the order they appear.
    pub blocks: Vec<Block>,
    /// Every code block's value, separated by a blank line.
    pub code: String,
    /// Every text block's value, separated by a blank line.
    pub text: String,
}

impl ParsedAnswer {
    /// The code blocks only.
    pub fn code_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_code())
    }

    /// The text blocks only.
    pub fn text_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| !b.is_code())
    }

    /// Returns true when the answer contained at least one complete fenced block.
    pub fn has_code(&self) -> bool {
        self.code_blocks().next().is_some()
    }
}

/// Split `answer` into text and code blocks.
///
/// Parsing never fails.  An unmatched fence ends block extraction and whatever follows it is
/// kept as trailing text.
pub fn parse(answer: &str) -> ParsedAnswer {
    let mut blocks = Vec::new();
    let mut remaining = answer.trim();

    while remaining.contains(FENCE) {
        let (before, after_open) = remaining.split_once(FENCE).unwrap_or((remaining, ""));
        let before = before.trim();
        if !before.is_empty() {
            blocks.push(Block::Text {
                value: before.to_string(),
            });
        }

        let Some((code, after_close)) = after_open.split_once(FENCE) else {
            // Only one fence left: no complete block.
            remaining = after_open;
            break;
        };
        blocks.push(code_block(code));
        remaining = after_close.trim();
    }

    let remaining = remaining.strip_prefix(FENCE).unwrap_or(remaining).trim();
    if !remaining.is_empty() {
        blocks.push(Block::Text {
            value: remaining.to_string(),
        });
    }

    let code = join(blocks.iter().filter(|b| b.is_code()));
    let text = join(blocks.iter().filter(|b| !b.is_code()));
    ParsedAnswer { blocks, code, text }
}

fn code_block(raw: &str) -> Block {
    let code = raw.trim();
    // A first line made of a single word is the language tag.
    if let Some((first, rest)) = code.split_once('\n') {
        let tag = first.trim_end();
        if !tag.is_empty() && !tag.contains(char::is_whitespace) {
            return Block::Code {
                programming_language: Some(tag.to_string()),
                value: rest.to_string(),
            };
        }
    }
    Block::Code {
        programming_language: None,
        value: code.to_string(),
    }
}

fn join<'a>(blocks: impl Iterator<Item = &'a Block>) -> String {
    blocks.map(Block::value).collect::<Vec<_>>().join("\n\n")
}
