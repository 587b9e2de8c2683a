// Plain-text extraction for the supported document formats


use std::sync::LazyLock;

use fancy_regex::Regex;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::database::lancedb::DocumentType;
use crate::{RagError, Result};

/// Three or more line breaks, ignoring whitespace-only lines in between
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("valid regex"));

static TRAILING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+\n").expect("valid regex"));

/// Reduce markdown to the prose a reader would see.
///
/// Code (fenced, indented and inline), raw HTML, images and horizontal rules
/// are dropped. Links keep their text. Block boundaries become blank lines so
/// the segmenter can still split on paragraphs.
#[inline]
pub fn markdown_to_text(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut text = String::with_capacity(markdown.len());
    let mut hidden_depth = 0_usize;

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::CodeBlock(_) | Tag::Image { .. } | Tag::HtmlBlock) => {
                hidden_depth += 1;
            }
            Event::End(TagEnd::CodeBlock | TagEnd::HtmlBlock) => {
                hidden_depth = hidden_depth.saturating_sub(1);
                text.push_str("\n\n");
            }
            Event::End(TagEnd::Image) => hidden_depth = hidden_depth.saturating_sub(1),
            _ if hidden_depth > 0 => {}
            Event::Text(content) => text.push_str(&content),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::BlockQuote(_)) => {
                text.push_str("\n\n");
            }
            Event::End(TagEnd::Item | TagEnd::TableHead | TagEnd::TableRow) => text.push('\n'),
            Event::End(TagEnd::TableCell) => text.push(' '),
            _ => {}
        }
    }

    collapse_blank_runs(&text)
}

/// Normalize plain text: unix line endings, no trailing spaces, at most one
/// blank line in a row, trimmed ends.
#[inline]
pub fn normalize_text(text: &str) -> String {
    collapse_blank_runs(&text.replace("\r\n", "\n").replace('\r', "\n"))
}

fn collapse_blank_runs(text: &str) -> String {
    let without_trailing = TRAILING_SPACE.replace_all(text, "\n");
    BLANK_RUN
        .replace_all(&without_trailing, "\n\n")
        .trim()
        .to_string()
}

/// Turn raw file content into the text that gets chunked.
///
/// Fails with [`RagError::EmptyInput`] when the file, or what is left of it
/// after markup removal, holds no text.
#[inline]
pub fn parse_document(content: &str, document_type: DocumentType) -> Result<String> {
    if content.trim().is_empty() {
        return Err(RagError::EmptyInput("file is empty".to_string()));
    }

    let text = match document_type {
        DocumentType::Markdown => markdown_to_text(&normalize_text(content)),
        DocumentType::Text => normalize_text(content),
    };

    if text.is_empty() {
        return Err(RagError::EmptyInput(format!(
            "no text content left after {} parsing",
            document_type
        )));
    }
    Ok(text)
}
