//! Generator position parsing for request templates
//!
//! A template is the raw head and body of an HTTP request. Every text between
//! two `$` signs is a generator expression; `$$` stands for a literal dollar
//! sign and never opens or closes a generator.

use crate::error::{FuzzyError, FuzzyResult, TemplatePart};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One `$...$` occurrence in a template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratorSpec {
    /// Global index: head specs first, then body specs, in source order
    pub index: usize,
    /// Which text the spec was found in
    pub part: TemplatePart,
    /// Byte offset of the opening `$`
    pub start: usize,
    /// Byte offset just past the closing `$`
    pub end: usize,
    /// Expression source between the delimiters
    pub source: String,
}

/// A piece of a parsed text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Segment {
    /// Literal text with `$$` already collapsed to `$`
    Literal(String),
    /// Placeholder for the spec with this global index
    Generator(usize),
}

/// Literal segments interleaved with generator placeholders
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedText {
    pub segments: Vec<Segment>,
}

impl ParsedText {
    /// Reassemble the text, asking `value_of` for each placeholder
    pub fn render<'a, F>(&self, mut value_of: F) -> String
    where
        F: FnMut(usize) -> &'a str,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Generator(index) => out.push_str(value_of(*index)),
            }
        }
        out
    }

    /// Global indices of the generators in this text
    pub fn generator_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Generator(index) => Some(*index),
            Segment::Literal(_) => None,
        })
    }
}

/// Result of parsing a request template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedTemplate {
    pub head: ParsedText,
    pub body: ParsedText,
    /// All generator specs, head first then body
    pub specs: Vec<GeneratorSpec>,
}

impl ParsedTemplate {
    pub fn has_generators(&self) -> bool {
        !self.specs.is_empty()
    }
}

/// Parser for `$generator$` templates
pub struct TemplateParser;

impl TemplateParser {
    /// Parse the head and body of a request template
    pub fn parse(head: &str, body: &str) -> FuzzyResult<ParsedTemplate> {
        let mut specs = Vec::new();
        let head = Self::parse_text(head, TemplatePart::Head, &mut specs)?;
        let body = Self::parse_text(body, TemplatePart::Body, &mut specs)?;

        debug!(
            head_generators = head.generator_indices().count(),
            body_generators = body.generator_indices().count(),
            "Parsed request template"
        );

        Ok(ParsedTemplate { head, body, specs })
    }

    fn parse_text(
        text: &str,
        part: TemplatePart,
        specs: &mut Vec<GeneratorSpec>,
    ) -> FuzzyResult<ParsedText> {
        let bytes = text.as_bytes();
        let mut segments = Vec::new();
        let mut literal = String::new();
        // Start of the literal run not yet copied into `literal`
        let mut run_start = 0;
        let mut pos = 0;

        // `$` is ASCII, so every offset we stop at is a char boundary
        while pos < bytes.len() {
            if bytes[pos] != b'$' {
                pos += 1;
                continue;
            }

            literal.push_str(&text[run_start..pos]);

            if bytes.get(pos + 1) == Some(&b'$') {
                literal.push('$');
                pos += 2;
                run_start = pos;
                continue;
            }

            let close = text[pos + 1..]
                .find('$')
                .map(|offset| pos + 1 + offset)
                .ok_or_else(|| FuzzyError::unterminated(part, pos))?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let index = specs.len();
            specs.push(GeneratorSpec {
                index,
                part,
                start: pos,
                end: close + 1,
                source: text[pos + 1..close].to_string(),
            });
            segments.push(Segment::Generator(index));

            pos = close + 1;
            run_start = pos;
        }

        literal.push_str(&text[run_start..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(ParsedText { segments })
    }

    /// Escape literal dollar signs so `text` parses back to itself
    pub fn escape(text: &str) -> String {
        text.replace('$', "$$")
    }
}
