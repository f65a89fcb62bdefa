//! Event description extraction.

use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::parse_selector;
use crate::utils::{collapse_whitespace, truncate_graphemes};

/// Pulls plain-text descriptions out of event pages with ordered selectors.
pub struct DescriptionExtractor {
    selectors: Vec<Selector>,
    max_length: usize,
}

impl DescriptionExtractor {
    pub fn new(selectors: &[String], max_length: usize) -> Result<Self> {
        let selectors = selectors
            .iter()
            .map(|s| parse_selector(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            selectors,
            max_length,
        })
    }

    /// Text of the first element matched by the first selector that matches
    /// a non-empty element. Empty when nothing matches.
    pub fn extract(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        self.selectors
            .iter()
            .find_map(|selector| {
                document.select(selector).find_map(|element| {
                    let mut raw = String::new();
                    push_visible_text(element, &mut raw);
                    let text = collapse_whitespace(&raw);
                    (!text.is_empty()).then_some(text)
                })
            })
            .map(|text| truncate_graphemes(&text, self.max_length))
            .unwrap_or_default()
    }
}

/// Elements whose text is never shown.
const HIDDEN: &[&str] = &["script", "style", "noscript", "template"];

/// Phrasing elements that do not break a run of text.
const INLINE: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "dfn", "em", "i", "kbd", "mark",
    "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

/// Text under `element`, with a space wherever a block element starts or ends.
fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if HIDDEN.contains(&name) {
                continue;
            }
            let block = !INLINE.contains(&name);
            if block {
                out.push(' ');
            }
            push_visible_text(child, out);
            if block {
                out.push(' ');
            }
        }
    }
}
