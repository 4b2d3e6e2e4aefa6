//! Wikilink resolution: `[[target]]` / `[[target|display]]` -> display text.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Namespaces whose links are not lexical content.
pub const NON_CONTENT_PREFIXES: [&str; 3] = ["file:", "image:", "category:"];

lazy_static! {
    static ref WIKILINK: Regex = Regex::new(r"\[\[([^|\]]+)(?:\|([^\]]*))?\]\]").unwrap();
}

/// Parsed wikilink: [[target#anchor|display]]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wikilink<'a> {
    pub target: &'a str,
    pub anchor: Option<&'a str>,
    pub display: Option<&'a str>,
}

impl<'a> Wikilink<'a> {
    fn from_captures(caps: &Captures<'a>) -> Self {
        let raw_target = caps.get(1).map_or("", |m| m.as_str()).trim();
        let (target, anchor) = match raw_target.split_once('#') {
            Some((t, a)) => (t.trim(), Some(a.trim())),
            None => (raw_target, None),
        };
        let display = caps
            .get(2)
            .map(|m| m.as_str().trim())
            .filter(|d| !d.is_empty());
        Wikilink { target, anchor, display }
    }

    /// Return display text if present, otherwise target
    pub fn text(&self) -> &'a str {
        self.display.unwrap_or(self.target)
    }

    /// File, image and category links carry no lexical content.
    pub fn is_non_content(&self) -> bool {
        has_non_content_prefix(self.target) || has_non_content_prefix(self.text())
    }
}

fn has_non_content_prefix(s: &str) -> bool {
    // A leading colon links to the namespace page instead of embedding it.
    let s = s.trim_start_matches(':').trim_start();
    NON_CONTENT_PREFIXES.iter().any(|p| {
        s.len() >= p.len() && s.is_char_boundary(p.len()) && s[..p.len()].eq_ignore_ascii_case(p)
    })
}

/// Replace every well-formed link span with its display text. Unmatched
/// brackets are left as they are.
pub fn resolve(text: &str) -> String {
    if !text.contains("[[") {
        return text.to_string();
    }
    WIKILINK
        .replace_all(text, |caps: &Captures| {
            let link = Wikilink::from_captures(caps);
            if link.is_non_content() {
                String::new()
            } else {
                link.text().to_string()
            }
        })
        .into_owned()
}
