//! Markup cleanup for definition lines.
//!
//! `clean` is total: it never fails and maps empty input to empty output.
//! Text that reduces to bare punctuation is reported as empty, which is what
//! keeps template-only senses from publishing a lone ".".

use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::trace;
use unicode_normalization::UnicodeNormalization;

use crate::config::ExtractConfig;
use crate::error::Result;
use crate::render::TemplateRenderer;
use crate::template;
use crate::wikilink;

lazy_static! {
    static ref HTML_COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    // <ref>...</ref> and self-closing <ref .../>
    static ref REF_BLOCK: Regex = Regex::new(r"(?is)<ref\b[^>/]*?>.*?</ref\s*>").unwrap();
    static ref REF_SELF: Regex = Regex::new(r"(?i)<ref\b[^>]*/\s*>").unwrap();
    static ref NOWIKI: Regex = Regex::new(r"(?is)<nowiki\b[^>/]*?>.*?</nowiki\s*>").unwrap();
    static ref MATH: Regex = Regex::new(r"(?is)<math\b[^>/]*?>.*?</math\s*>").unwrap();
    static ref WIKITABLE: Regex = Regex::new(r"(?s)\{\|.*?\|\}").unwrap();
    // Longest quote runs first so ''''' is not read as '' + '''.
    static ref EMPHASIS: [Regex; 3] = [
        Regex::new(r"'''''(.*?)'''''").unwrap(),
        Regex::new(r"'''(.*?)'''").unwrap(),
        Regex::new(r"''(.*?)''").unwrap(),
    ];
    static ref TAG: Regex = Regex::new(r"</?[^>]+>").unwrap();
    static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r"\s+([,;:.!?])").unwrap();
    // The optional tail lets `&amp;` followed by an entity name stay escaped.
    static ref ENTITY: Regex =
        Regex::new(r"&(nbsp|ndash|mdash|quot|#39|apos|amp);([A-Za-z#0-9]+;)?").unwrap();
}

/// Re-running the pipeline on its own output converges within a few rounds;
/// tag removal can glue `[<b>[` into a fresh link, for example.
const MAX_CLEAN_ROUNDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Templates {
    Render,
    Drop,
}

static DEFAULT_CLEANER: Lazy<Cleaner> = Lazy::new(Cleaner::default);

/// Clean with the default rendering table and pass bound.
pub fn clean(text: &str) -> String {
    DEFAULT_CLEANER.clean(text)
}

/// Text with at least one alphanumeric character.
pub fn is_meaningful(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let tail = caps.get(2).map_or("", |m| m.as_str());
            let decoded = match &caps[1] {
                // Decoding `&amp;nbsp;` would mint a new entity.
                "amp" if !tail.is_empty() => return caps[0].to_string(),
                "amp" => "&",
                "nbsp" => " ",
                "ndash" => "\u{2013}",
                "mdash" => "\u{2014}",
                "quot" => "\"",
                _ => "'",
            };
            format!("{}{}", decoded, tail)
        })
        .into_owned()
}

fn strip_emphasis(text: &str) -> String {
    if !text.contains("''") {
        return text.to_string();
    }
    EMPHASIS.iter().fold(text.to_string(), |acc, re| re.replace_all(&acc, "$1").into_owned())
}

fn normalize_spacing(text: &str) -> String {
    let collapsed = template::collapse_whitespace(text);
    let fixed = collapsed.replace(" )", ")").replace("( ", "(");
    SPACE_BEFORE_PUNCT.replace_all(&fixed, "$1").into_owned()
}

/// Markup cleaner bound to one rendering table and pass bound.
#[derive(Debug, Clone)]
pub struct Cleaner {
    renderer: TemplateRenderer,
    max_passes: usize,
}

impl Default for Cleaner {
    fn default() -> Self {
        Cleaner {
            renderer: TemplateRenderer::default(),
            max_passes: ExtractConfig::default().max_passes,
        }
    }
}

impl Cleaner {
    pub fn new(renderer: TemplateRenderer, max_passes: usize) -> Self {
        Cleaner { renderer, max_passes: max_passes.max(1) }
    }

    pub fn from_config(config: &ExtractConfig) -> Result<Self> {
        Ok(Cleaner::new(TemplateRenderer::from_config(config)?, config.max_passes))
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Clean one line of markup to readable plain text, or "" when nothing
    /// meaningful is left. The result is a fixed point: cleaning it again
    /// returns it unchanged.
    pub fn clean(&self, text: &str) -> String {
        let mut templates = Templates::Render;
        let mut current = self.clean_once(text, templates);

        for round in 1.. {
            if current.is_empty() {
                break;
            }
            let next = self.clean_once(&current, templates);
            if next == current {
                break;
            }
            // Past the round budget every round must shorten the text.
            if round >= MAX_CLEAN_ROUNDS && next.len() >= current.len() {
                if templates == Templates::Drop {
                    trace!(round, "cleanup stopped shrinking");
                    current = next;
                    break;
                }
                trace!(round, "template rendering not converging, dropping templates");
                templates = Templates::Drop;
            }
            current = next;
        }
        current
    }

    fn clean_once(&self, text: &str, templates: Templates) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let s = HTML_COMMENT.replace_all(text, "");
        let s = REF_BLOCK.replace_all(&s, "");
        let s = REF_SELF.replace_all(&s, "");
        let s = NOWIKI.replace_all(&s, "");
        let s = MATH.replace_all(&s, "");
        let s = WIKITABLE.replace_all(&s, "");

        let s = match templates {
            Templates::Render => template::expand(&s, self.max_passes, &self.renderer),
            Templates::Drop => template::strip(&s),
        };
        let s = wikilink::resolve(&s);
        let s = strip_emphasis(&s);
        let s = TAG.replace_all(&s, "");
        let s = decode_entities(&s);
        let s = normalize_spacing(&s);

        if !is_meaningful(&s) {
            if !s.is_empty() {
                trace!(residue = %s, "definition reduced to punctuation");
            }
            return String::new();
        }
        s.nfc().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod cleaner_tests {
    use super::*;
    use proptest::prelude::*;

    // ─────────────────────────────────────────────────────────────
    // Removal stages
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn empty_input() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("   \n "), "");
    }

    #[test]
    fn removes_comments_across_lines() {
        assert_eq!(clean("A cat<!-- note\nmore note --> that purrs."), "A cat that purrs.");
    }

    #[test]
    fn removes_references() {
        assert_eq!(clean("A dog.<ref name=\"x\">Some book, p. 3</ref>"), "A dog.");
        assert_eq!(clean("A dog.<REF>upper</REF>"), "A dog.");
        assert_eq!(clean("A dog.<ref name=\"y\" />"), "A dog.");
    }

    #[test]
    fn removes_verbatim_and_math() {
        assert_eq!(clean("Area <math>\\pi r^2</math> of a circle"), "Area of a circle");
        assert_eq!(clean("Literal <nowiki>{{lb}}</nowiki> text"), "Literal text");
    }

    #[test]
    fn removes_tables() {
        assert_eq!(clean("Before {| class=\"x\"\n| cell\n|} after"), "Before after");
    }

    // ─────────────────────────────────────────────────────────────
    // Rendering stages
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn renders_templates_and_links() {
        assert_eq!(
            clean("{{lb|en|informal}} A [[domestic]] [[cat|feline]]."),
            "(informal) A domestic feline."
        );
    }

    #[test]
    fn strips_emphasis() {
        assert_eq!(clean("''italic'' and '''bold''' and '''''both'''''"), "italic and bold and both");
    }

    #[test]
    fn strips_remaining_tags() {
        assert_eq!(clean("H<sub>2</sub>O is <span class=\"x\">water</span>"), "H2O is water");
    }

    #[test]
    fn punctuation_spacing() {
        assert_eq!(clean("a thing ( rare ) , mostly ."), "a thing (rare), mostly.");
    }

    #[test]
    fn entities() {
        assert_eq!(clean("fish&nbsp;&amp;&nbsp;chips"), "fish & chips");
    }

    // ─────────────────────────────────────────────────────────────
    // Meaningfulness
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn empty_gloss_is_empty() {
        assert_eq!(clean("{{gloss|}}"), "");
    }

    #[test]
    fn punctuation_only_is_empty() {
        assert_eq!(clean("{{rfdef|en}}."), "");
        assert_eq!(clean(" ; , ."), "");
        assert!(!is_meaningful("(.)"));
        assert!(is_meaningful("é"));
    }

    #[test]
    fn category_only_line_is_empty() {
        assert_eq!(clean("[[Category:English nouns]]"), "");
    }

    // ─────────────────────────────────────────────────────────────
    // Idempotence
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn idempotent_on_examples() {
        for input in [
            "{{lb|en|{{q|rare}}}} A ''[[cat]]''.",
            "[<b>[cat]] sat",
            "'<i>'x'' y",
            "{{plural of|{}}{",
            "a {{broken [[link",
        ] {
            let once = clean(input);
            assert_eq!(clean(&once), once, "input: {input}");
        }
    }

    #[test]
    fn deep_nesting_resolves_past_round_budget() {
        let input = format!("{}cat{}", "{{l|en|".repeat(20), "}}".repeat(20));
        assert_eq!(clean(&input), "cat");
    }

    #[test]
    fn escaped_entity_chains_settle() {
        let once = clean("a &amp;amp;amp;amp;amp;amp;nbsp;b");
        assert_eq!(clean(&once), once);
        assert_eq!(clean("a &amp;nbsp;b"), "a &amp;nbsp;b");
        assert_eq!(clean("x &amp;&amp; y"), "x && y");
    }

    #[test]
    fn stacked_openers_settle() {
        let input = "{{abbr of|{{{{abbr of|{{x}}}}}}}} tail";
        let once = clean(input);
        assert_eq!(clean(&once), once);
    }

    fn markup_fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("{{".to_string()),
            Just("}}".to_string()),
            Just("[[".to_string()),
            Just("]]".to_string()),
            Just("|".to_string()),
            Just("''".to_string()),
            Just("'''".to_string()),
            Just("<ref>".to_string()),
            Just("</ref>".to_string()),
            Just("<sup>".to_string()),
            Just("<!--".to_string()),
            Just("-->".to_string()),
            Just(" ".to_string()),
            Just(".".to_string()),
            Just("(".to_string()),
            Just(")".to_string()),
            Just("en".to_string()),
            Just("lb".to_string()),
            Just("plural of".to_string()),
            Just("Category:".to_string()),
            "[a-z]{1,6}",
        ]
    }

    proptest! {
        #[test]
        fn clean_is_idempotent(parts in prop::collection::vec(markup_fragment(), 0..24)) {
            let input = parts.concat();
            let once = clean(&input);
            prop_assert_eq!(clean(&once), once);
        }

        #[test]
        fn clean_output_has_no_template_markers_when_balanced(word in "[a-z]{1,8}", depth in 1usize..32) {
            let input = format!("{}{}{}", "{{l|en|".repeat(depth), word, "}}".repeat(depth));
            let once = clean(&input);
            prop_assert_eq!(once, word);
        }
    }
}
