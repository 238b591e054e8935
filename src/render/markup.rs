// Markdown-lite document model
//
// Assistant prose uses a small markdown subset. This module turns it into
// blocks and styled spans; how they look is up to the frontend. Lines after
// a heading or bold title naming references/annexes/sources are flagged as
// reference material until the end of the text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static EMPHASIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*\*(.+?)\*\*\*|\*\*(.+?)\*\*|\*([^*\s](?:[^*]*[^*\s])?)\*")
        .expect("emphasis pattern is valid")
});

static NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})[.)]\s+(.*)$").expect("numbered item pattern is valid"));

/// Whole line wrapped in emphasis, optionally followed by a colon
static EMPHASIZED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\*{1,3})([^*]+)(\*{1,3}):?$").expect("emphasized line pattern is valid")
});

/// Heading words that open reference material, matched from the start of a word
static REFERENCE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:referenc|anexo|annex|fuente|source|bibliogra)")
        .expect("reference heading pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStyle {
    Plain,
    Bold,
    Italic,
    BoldItalic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

impl Span {
    fn new(text: impl Into<String>, style: SpanStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Heading { level: u8 },
    /// A line that is bold as a whole, outside a list
    Title,
    /// An emphasized line nested under a list item
    SubHeading,
    Quote,
    Rule,
    Bullet { depth: u8 },
    Numbered { number: u32 },
    Paragraph,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub kind: BlockKind,
    pub spans: Vec<Span>,
    /// De-emphasized reference material
    pub reference: bool,
}

impl Block {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let mut blocks: Vec<Block> = Vec::new();
        let mut in_list = false;
        let mut reference = false;

        for line in text.lines() {
            let (kind, content) = classify_line(line, in_list);
            let spans = match kind {
                BlockKind::Rule | BlockKind::Blank => Vec::new(),
                _ => parse_inline(content),
            };

            match kind {
                BlockKind::Bullet { .. } | BlockKind::Numbered { .. } => in_list = true,
                BlockKind::SubHeading | BlockKind::Blank => {}
                _ => in_list = false,
            }

            let block = Block {
                kind,
                spans,
                reference,
            };

            if matches!(kind, BlockKind::Heading { .. } | BlockKind::Title)
                && names_references(&block.text())
            {
                reference = true;
            }
            blocks.push(block);
        }

        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.kind == BlockKind::Blank)
    }

    /// Whether any block is flagged as reference material
    pub fn has_references(&self) -> bool {
        self.blocks.iter().any(|b| b.reference)
    }
}

fn names_references(text: &str) -> bool {
    REFERENCE_HEADING.is_match(text)
}

fn is_rule(trimmed: &str) -> bool {
    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|marker| compact.chars().all(|c| c == *marker))
}

/// Kind of a line and the part of it that carries text
fn classify_line(line: &str, in_list: bool) -> (BlockKind, &str) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return (BlockKind::Blank, "");
    }
    if is_rule(trimmed) {
        return (BlockKind::Rule, "");
    }

    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
        return (
            BlockKind::Heading {
                level: hashes as u8,
            },
            trimmed[hashes..].trim(),
        );
    }

    if let Some(quoted) = trimmed.strip_prefix('>') {
        return (BlockKind::Quote, quoted.trim());
    }

    let indent = line.len() - line.trim_start().len();
    for marker in ["- ", "* ", "• ", "+ "] {
        if let Some(item) = trimmed.strip_prefix(marker) {
            return (
                BlockKind::Bullet {
                    depth: (indent / 2).min(u8::MAX as usize) as u8,
                },
                item.trim(),
            );
        }
    }

    if let Some(caps) = NUMBERED.captures(trimmed) {
        if let (Some(number), Some(item)) = (caps.get(1), caps.get(2)) {
            if let Ok(number) = number.as_str().parse() {
                return (BlockKind::Numbered { number }, item.as_str().trim());
            }
        }
    }

    if let Some(caps) = EMPHASIZED_LINE.captures(trimmed) {
        let open = caps.get(1).map_or("", |m| m.as_str());
        let close = caps.get(3).map_or("", |m| m.as_str());
        if open == close {
            let inner = caps.get(2).map_or("", |m| m.as_str());
            if in_list || indent > 0 {
                return (BlockKind::SubHeading, inner.trim());
            }
            if open.len() >= 2 {
                return (BlockKind::Title, inner.trim());
            }
        }
    }

    (BlockKind::Paragraph, trimmed)
}

/// Split text into plain and emphasized spans
pub fn parse_inline(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in EMPHASIS.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            spans.push(Span::new(&text[last..whole.start()], SpanStyle::Plain));
        }

        let (inner, style) = if let Some(m) = caps.get(1) {
            (m.as_str(), SpanStyle::BoldItalic)
        } else if let Some(m) = caps.get(2) {
            (m.as_str(), SpanStyle::Bold)
        } else if let Some(m) = caps.get(3) {
            (m.as_str(), SpanStyle::Italic)
        } else {
            (whole.as_str(), SpanStyle::Plain)
        };
        spans.push(Span::new(inner, style));
        last = whole.end();
    }

    if last < text.len() {
        spans.push(Span::new(&text[last..], SpanStyle::Plain));
    }
    spans
}
