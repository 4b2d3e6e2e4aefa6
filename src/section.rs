//! Target-language section isolation and sense segmentation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use tracing::trace;

use crate::cleaner::{is_meaningful, Cleaner};
use crate::config::ExtractConfig;
use crate::error::Result;

/// A part-of-speech tagged group of short definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sense {
    pub pos: String,
    pub definitions: Vec<String>,
}

/// `==Name==` -> (2, "Name"). Levels 1 through 6; the closing run must match.
pub fn heading(line: &str) -> Option<(usize, &str)> {
    let line = line.trim();
    let open = line.bytes().take_while(|&b| b == b'=').count();
    let close = line.bytes().rev().take_while(|&b| b == b'=').count();
    if open == 0 || open != close || open > 6 || line.len() <= open * 2 {
        return None;
    }
    let inner = line[open..line.len() - close].trim();
    if inner.is_empty() || inner.contains('=') {
        return None;
    }
    Some((open, inner))
}

/// The text between the first `==language==` heading and the next
/// level-2 heading (or end of text). `None` when the page has no such section.
pub fn isolate_section<'a>(raw: &'a str, language: &str) -> Option<&'a str> {
    let mut offset = 0;
    let mut start = None;

    for line in raw.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        match (start, heading(line)) {
            (None, Some((2, name))) if name == language => start = Some(offset),
            (Some(s), Some((level, _))) if level <= 2 => return Some(&raw[s..line_start]),
            _ => {}
        }
    }
    start.map(|s| &raw[s..])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Blank,
    Heading { level: usize, text: &'a str },
    /// Definition text with its `#` markers stripped.
    Definition(&'a str),
    /// `#:` / `#*` / `##:` ... quotations and usage examples.
    Example,
    Other,
}

fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Blank;
    }
    if let Some((level, text)) = heading(line) {
        return LineKind::Heading { level, text };
    }
    if line.starts_with('#') {
        let body = line.trim_start_matches('#');
        if body.starts_with(':') || body.starts_with('*') {
            return LineKind::Example;
        }
        return LineKind::Definition(body.trim_start());
    }
    LineKind::Other
}

#[derive(Debug)]
enum ScanState {
    NoActivePos,
    InPos { pos: String, definitions: Vec<String> },
}

/// One-pass state machine over the lines of a language section.
/// Every heading flushes the sense in progress before the next one starts.
struct SenseScanner<'c> {
    cleaner: &'c Cleaner,
    allowed_pos: &'c BTreeSet<String>,
    max_defs: usize,
    state: ScanState,
    senses: Vec<Sense>,
}

impl<'c> SenseScanner<'c> {
    fn new(cleaner: &'c Cleaner, allowed_pos: &'c BTreeSet<String>, max_defs: usize) -> Self {
        SenseScanner {
            cleaner,
            allowed_pos,
            max_defs,
            state: ScanState::NoActivePos,
            senses: Vec::new(),
        }
    }

    fn flush(&mut self) {
        if let ScanState::InPos { pos, definitions } =
            std::mem::replace(&mut self.state, ScanState::NoActivePos)
        {
            if !definitions.is_empty() {
                self.senses.push(Sense { pos, definitions });
            }
        }
    }

    fn feed(&mut self, line: &str) -> ControlFlow<()> {
        match classify(line) {
            LineKind::Heading { level, .. } if level <= 2 => return ControlFlow::Break(()),
            LineKind::Heading { text, .. } => {
                self.flush();
                if self.allowed_pos.contains(text) {
                    self.state = ScanState::InPos { pos: text.to_string(), definitions: Vec::new() };
                }
            }
            LineKind::Definition(body) => {
                if let ScanState::InPos { definitions, .. } = &mut self.state {
                    if definitions.len() < self.max_defs {
                        let cleaned = self.cleaner.clean(body);
                        if !cleaned.is_empty() && is_meaningful(&cleaned) {
                            definitions.push(cleaned);
                        } else {
                            trace!(line = body, "definition empty after cleanup");
                        }
                    }
                }
            }
            LineKind::Blank | LineKind::Example | LineKind::Other => {}
        }
        ControlFlow::Continue(())
    }

    fn finish(mut self) -> Vec<Sense> {
        self.flush();
        self.senses
    }
}

/// Segment an isolated section into senses.
pub fn extract_senses(
    section: &str,
    cleaner: &Cleaner,
    allowed_pos: &BTreeSet<String>,
    max_defs: usize,
) -> Vec<Sense> {
    let mut scanner = SenseScanner::new(cleaner, allowed_pos, max_defs);
    for line in section.lines() {
        if scanner.feed(line).is_break() {
            break;
        }
    }
    scanner.finish()
}

/// Why a page's markup yielded nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoSenses {
    NoTargetSection,
    Empty,
}

/// Section isolation plus sense segmentation with one configuration.
#[derive(Debug, Clone)]
pub struct SenseExtractor {
    cleaner: Cleaner,
    language: String,
    allowed_pos: BTreeSet<String>,
    max_defs: usize,
}

impl Default for SenseExtractor {
    fn default() -> Self {
        let config = ExtractConfig::default();
        SenseExtractor {
            cleaner: Cleaner::default(),
            language: config.language,
            allowed_pos: config.allowed_pos,
            max_defs: config.max_defs_per_pos,
        }
    }
}

impl SenseExtractor {
    pub fn from_config(config: &ExtractConfig) -> Result<Self> {
        config.validate()?;
        Ok(SenseExtractor {
            cleaner: Cleaner::from_config(config)?,
            language: config.language.clone(),
            allowed_pos: config.allowed_pos.clone(),
            max_defs: config.max_defs_per_pos,
        })
    }

    pub fn extract(&self, raw_markup: &str) -> std::result::Result<Vec<Sense>, NoSenses> {
        let section = isolate_section(raw_markup, &self.language).ok_or(NoSenses::NoTargetSection)?;
        let senses = extract_senses(section, &self.cleaner, &self.allowed_pos, self.max_defs);
        if senses.is_empty() {
            Err(NoSenses::Empty)
        } else {
            Ok(senses)
        }
    }
}

/// Senses of the English section with the default cleaner.
pub fn extract(raw_markup: &str, allowed_pos: &BTreeSet<String>, max_defs: usize) -> Vec<Sense> {
    let config = ExtractConfig::default();
    match isolate_section(raw_markup, &config.language) {
        Some(section) => extract_senses(section, &Cleaner::default(), allowed_pos, max_defs),
        None => Vec::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod section_tests {
    use super::*;
    use crate::config::DEFAULT_POS;

    fn default_pos() -> BTreeSet<String> {
        DEFAULT_POS.iter().map(|p| p.to_string()).collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Headings and isolation
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn heading_levels() {
        assert_eq!(heading("==English=="), Some((2, "English")));
        assert_eq!(heading("=== Proper noun === "), Some((3, "Proper noun")));
        assert_eq!(heading("====Verb===="), Some((4, "Verb")));
        assert_eq!(heading("===Noun=="), None);
        assert_eq!(heading("===="), None);
        assert_eq!(heading("# not a heading"), None);
    }

    #[test]
    fn isolates_between_level_two_headings() {
        let raw = "==English==\n===Noun===\n# a cat\n==French==\n===Nom===\n# un chat\n";
        assert_eq!(isolate_section(raw, "English"), Some("===Noun===\n# a cat\n"));
    }

    #[test]
    fn isolates_to_end_of_text() {
        let raw = "==French==\n# chat\n==English==\n===Noun===\n# cat";
        assert_eq!(isolate_section(raw, "English"), Some("===Noun===\n# cat"));
    }

    #[test]
    fn missing_section() {
        assert_eq!(isolate_section("==French==\n# chat\n", "English"), None);
        assert_eq!(isolate_section("", "English"), None);
    }

    #[test]
    fn heading_must_match_exactly() {
        assert_eq!(isolate_section("==Middle English==\n# x\n", "English"), None);
        assert_eq!(isolate_section("=== English ===\n# x\n", "English"), None);
    }

    #[test]
    fn first_matching_heading_wins() {
        let raw = "==English==\n# one\n==Latin==\n==English==\n# two\n";
        assert_eq!(isolate_section(raw, "English"), Some("# one\n"));
    }

    // ─────────────────────────────────────────────────────────────
    // Sense state machine
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn only_lines_inside_target_section() {
        let raw = "==English==\n===Noun===\n# A cat.\n==French==\n===Noun===\n# Un chat.\n";
        let senses = extract(raw, &default_pos(), 3);
        assert_eq!(senses, vec![Sense { pos: "Noun".into(), definitions: vec!["A cat.".into()] }]);
    }

    #[test]
    fn headings_flush_and_switch() {
        let raw = "===Etymology 1===\n====Noun====\n# A cat.\n====Verb====\n# To cat.\n===Pronunciation===\n# stray\n===Adjective===\n# Catty.";
        let senses = extract_senses(raw, &Cleaner::default(), &default_pos(), 3);
        let tags: Vec<&str> = senses.iter().map(|s| s.pos.as_str()).collect();
        assert_eq!(tags, vec!["Noun", "Verb", "Adjective"]);
        assert_eq!(senses[1].definitions, vec!["To cat."]);
    }

    #[test]
    fn subsection_headings_end_a_sense() {
        let raw = "====Noun====\n# A cat.\n=====Synonyms=====\n# feline\n====Verb====\n# To cat.";
        let senses = extract_senses(raw, &Cleaner::default(), &default_pos(), 3);
        assert_eq!(senses.len(), 2);
        assert_eq!(senses[0].definitions, vec!["A cat."]);
    }

    #[test]
    fn skips_examples_and_quotations() {
        let raw = "===Noun===\n# A cat.\n#: ''The cat sat.''\n#* 1900, Someone\n##: nested\n##* nested quote\n## A kitten.";
        let senses = extract_senses(raw, &Cleaner::default(), &default_pos(), 5);
        assert_eq!(senses[0].definitions, vec!["A cat.", "A kitten."]);
    }

    #[test]
    fn bounded_definitions_keep_source_order() {
        let raw = "===Noun===\n# one\n# two\n# three\n# four\n# five";
        let senses = extract_senses(raw, &Cleaner::default(), &default_pos(), 3);
        assert_eq!(senses[0].definitions, vec!["one", "two", "three"]);
    }

    #[test]
    fn junk_definitions_dropped_and_empty_groups_omitted() {
        let raw = "===Noun===\n# {{rfdef|en}}.\n# [[Category:English nouns]]\n===Verb===\n# To purr.";
        let senses = extract_senses(raw, &Cleaner::default(), &default_pos(), 3);
        assert_eq!(senses, vec![Sense { pos: "Verb".into(), definitions: vec!["To purr.".into()] }]);
    }

    #[test]
    fn disallowed_pos_is_ignored() {
        let raw = "===Pronoun===\n# It.\n===Noun===\n# Thing.";
        let senses = extract_senses(raw, &Cleaner::default(), &default_pos(), 3);
        assert_eq!(senses.len(), 1);
        assert_eq!(senses[0].pos, "Noun");
    }

    #[test]
    fn definitions_before_any_pos_are_ignored() {
        let raw = "# orphan\n===Noun===\n# kept";
        let senses = extract_senses(raw, &Cleaner::default(), &default_pos(), 3);
        assert_eq!(senses[0].definitions, vec!["kept"]);
    }

    #[test]
    fn level_two_heading_stops_scan() {
        let raw = "===Noun===\n# kept\n==Translingual==\n===Verb===\n# dropped";
        let senses = extract_senses(raw, &Cleaner::default(), &default_pos(), 3);
        assert_eq!(senses.len(), 1);
    }

    #[test]
    fn extractor_reports_why_nothing_came_out() {
        let extractor = SenseExtractor::default();
        assert_eq!(extractor.extract("==French==\n# chat"), Err(NoSenses::NoTargetSection));
        assert_eq!(extractor.extract("==English==\n===Noun===\n# ."), Err(NoSenses::Empty));
    }

    #[test]
    fn plural_of_end_to_end() {
        let extractor = SenseExtractor::default();
        let senses = extractor.extract("==English==\n===Noun===\n# {{plural of|cat}}").unwrap();
        assert_eq!(senses, vec![Sense { pos: "Noun".into(), definitions: vec!["Plural of cat".into()] }]);
    }

    #[test]
    fn configured_language() {
        let config = ExtractConfig {
            language: "French".into(),
            allowed_pos: ["Nom".to_string()].into_iter().collect(),
            ..ExtractConfig::default()
        };
        let extractor = SenseExtractor::from_config(&config).unwrap();
        let senses = extractor.extract("==English==\n===Noun===\n# cat\n==French==\n===Nom===\n# chat").unwrap();
        assert_eq!(senses[0].definitions, vec!["chat"]);
    }
}
