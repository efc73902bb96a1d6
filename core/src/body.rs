//! Structured representation of a document body.
//!
//! The editing surface owns the body while a view is open; the session only reads it at save
//! time and turns it into the two persisted projections:
//!
//! * `text_content`: plain text, blocks separated by a blank line ([`Body::to_text`]).
//! * `structured_content`: JSON ([`Body::to_structured`]), read back with
//!   [`Body::from_structured`].
//!
//! ```json
//! {"blocks":[{"type":"heading","level":1,"text":"Plan"},{"type":"paragraph","text":"Ship it."}]}
//! ```

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Structured content is not valid JSON for a document body")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    Quote { text: String },
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        code: String,
    },
    ListItem { text: String },
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into() }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading { level, text: text.into() }
    }

    /// The block's text without any markup.
    pub fn text(&self) -> &str {
        match self {
            Block::Heading { text, .. }
            | Block::Paragraph { text }
            | Block::Quote { text }
            | Block::ListItem { text } => text,
            Block::Code { code, .. } => code,
        }
    }
}

/// A document body: an ordered list of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    #[serde(default)]
    blocks: Vec<Block>,
}

impl Body {
    pub fn new(blocks: Vec<Block>) -> Self {
        Body { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Plain-text projection: block texts joined by blank lines.
    pub fn to_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn to_structured(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses structured content. Empty input and `{}` both yield an empty body.
    pub fn from_structured(raw: &str) -> Result<Self, ParseError> {
        if raw.trim().is_empty() {
            return Ok(Body::default());
        }
        Ok(serde_json::from_str(raw)?)
    }

    /// One paragraph per run of text separated by blank lines.
    pub fn from_plain_text(text: &str) -> Self {
        let blocks = text
            .replace("\r\n", "\n")
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Block::paragraph)
            .collect();
        Body { blocks }
    }

    /// Imports Markdown. Inline formatting is dropped, block structure is kept.
    pub fn from_markdown(markdown: &str) -> Self {
        let mut builder = MarkdownBuilder::default();
        for event in Parser::new(markdown) {
            trace!(?event, "Markdown event");
            builder.handle(event);
        }
        builder.finish();
        Body { blocks: builder.blocks }
    }
}

enum OpenBlock {
    Heading(u8),
    Paragraph,
    Quote,
    Code(Option<String>),
    ListItem,
}

#[derive(Default)]
struct MarkdownBuilder {
    blocks: Vec<Block>,
    open: Option<OpenBlock>,
    buffer: String,
    quote_depth: usize,
}

impl MarkdownBuilder {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => self.start(OpenBlock::Heading(level as u8)),
            Event::Start(Tag::BlockQuote { .. }) => self.quote_depth += 1,
            Event::Start(Tag::Paragraph) => {
                // Paragraphs inside a loose list item belong to the item.
                if !matches!(self.open, Some(OpenBlock::ListItem)) {
                    let kind = if self.quote_depth > 0 {
                        OpenBlock::Quote
                    } else {
                        OpenBlock::Paragraph
                    };
                    self.start(kind);
                } else if !self.buffer.is_empty() {
                    self.buffer.push(' ');
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.into_string()),
                    _ => None,
                };
                self.start(OpenBlock::Code(language));
            }
            Event::Start(Tag::Item) => self.start(OpenBlock::ListItem),
            Event::End(TagEnd::BlockQuote { .. }) => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            Event::End(TagEnd::Paragraph { .. }) => {
                if matches!(self.open, Some(OpenBlock::Paragraph | OpenBlock::Quote)) {
                    self.finish();
                }
            }
            Event::End(TagEnd::Heading { .. } | TagEnd::CodeBlock { .. } | TagEnd::Item { .. }) => {
                self.finish();
            }
            Event::Text(text) | Event::Code(text) => self.buffer.push_str(&text),
            Event::SoftBreak => self.buffer.push(' '),
            Event::HardBreak => self.buffer.push('\n'),
            _ => {}
        }
    }

    fn start(&mut self, kind: OpenBlock) {
        // Nested items start before their parent ends.
        self.finish();
        self.open = Some(kind);
    }

    fn finish(&mut self) {
        let Some(open) = self.open.take() else {
            self.buffer.clear();
            return;
        };
        let text = std::mem::take(&mut self.buffer);
        let block = match open {
            OpenBlock::Code(language) => Block::Code {
                language,
                code: text.trim_end_matches('\n').to_string(),
            },
            other => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return;
                }
                match other {
                    OpenBlock::Heading(level) => Block::Heading { level, text },
                    OpenBlock::Quote => Block::Quote { text },
                    OpenBlock::ListItem => Block::ListItem { text },
                    _ => Block::Paragraph { text },
                }
            }
        };
        self.blocks.push(block);
    }
}
