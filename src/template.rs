//! Template expansion: `{{name|arg|...}}` spans rendered to plain text.
//!
//! Expansion is an iterative fixed point rather than recursion. Each pass
//! balances the outermost `{{ }}` spans left to right and renders them with
//! their raw (still unexpanded) arguments, so inner templates surface into
//! the text and get rendered on the next pass. The pass bound caps the work
//! for pathological or self-referential input.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::render::TemplateRenderer;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const LINK_OPEN: &str = "[[";
const LINK_CLOSE: &str = "]]";

/// Parsed template: {{name|arg1|arg2|...}}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInvocation {
    pub name: String,
    pub args: Vec<String>,
}

impl TemplateInvocation {
    /// Parse the body between the outer `{{` and `}}`.
    pub fn parse(body: &str) -> Self {
        let mut parts = split_template_parts(body.trim()).into_iter();
        let name = parts.next().unwrap_or_default();
        TemplateInvocation { name, args: parts.collect() }
    }
}

/// Split a template body on `|` separators that are not inside a nested
/// template or wikilink. Template and link depth are tracked independently.
/// Parts are trimmed; nested spans are kept verbatim.
pub fn split_template_parts(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth_tpl = 0usize;
    let mut depth_link = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < body.len() {
        let rest = &body[i..];
        if rest.starts_with(OPEN) {
            depth_tpl += 1;
            i += 2;
        } else if rest.starts_with(CLOSE) && depth_tpl > 0 {
            depth_tpl -= 1;
            i += 2;
        } else if rest.starts_with(LINK_OPEN) {
            depth_link += 1;
            i += 2;
        } else if rest.starts_with(LINK_CLOSE) && depth_link > 0 {
            depth_link -= 1;
            i += 2;
        } else if rest.starts_with('|') && depth_tpl == 0 && depth_link == 0 {
            parts.push(body[start..i].trim().to_string());
            i += 1;
            start = i;
        } else {
            // Advance one whole character so slicing stays on char boundaries.
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }

    parts.push(body[start..].trim().to_string());
    parts
}

/// Byte offset just past the `}}` matching the `{{` at `start`, or `None`
/// when the span never closes.
pub fn find_template_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut j = start;

    while j < bytes.len() {
        if bytes[j..].starts_with(b"{{") {
            depth += 1;
            j += 2;
        } else if bytes[j..].starts_with(b"}}") {
            depth = depth.saturating_sub(1);
            j += 2;
            if depth == 0 {
                return Some(j);
            }
        } else {
            j += 1;
        }
    }
    None
}

/// One left-to-right pass over the outermost balanced spans. Returns the new
/// text and the number of spans replaced.
fn rewrite_pass(text: &str, mut replace: impl FnMut(&str) -> String) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut substitutions = 0;
    let mut cursor = 0;
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find(OPEN) {
        let start = search_from + offset;
        match find_template_end(text, start) {
            Some(end) => {
                out.push_str(&text[cursor..start]);
                out.push_str(&replace(&text[start + 2..end - 2]));
                substitutions += 1;
                cursor = end;
                search_from = end;
            }
            None => {
                // Unbalanced: keep the opening marker as literal text.
                trace!(offset = start, "unbalanced template opener kept literally");
                search_from = start + 1;
            }
        }
    }
    out.push_str(&text[cursor..]);
    (out, substitutions)
}

fn expand_pass(text: &str, renderer: &TemplateRenderer) -> (String, usize) {
    rewrite_pass(text, |body| {
        let invocation = TemplateInvocation::parse(body);
        renderer.render(&invocation.name, &invocation.args)
    })
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Expand every template in `text`, running at most `max_passes` passes.
/// Stops early once a pass renders nothing. Never fails.
pub fn expand(text: &str, max_passes: usize, renderer: &TemplateRenderer) -> String {
    if !text.contains(OPEN) {
        return text.to_string();
    }

    let mut current = text.to_string();
    for pass in 0..max_passes {
        let (next, substitutions) = expand_pass(&current, renderer);
        current = collapse_whitespace(&next);
        if substitutions == 0 || !current.contains(OPEN) {
            trace!(passes = pass + 1, "template expansion settled");
            break;
        }
    }
    current
}

/// Delete every balanced span without rendering it. Each pass shortens the
/// text, so this always terminates.
pub fn strip(text: &str) -> String {
    if !text.contains(OPEN) {
        return text.to_string();
    }

    let mut current = text.to_string();
    loop {
        let (next, removed) = rewrite_pass(&current, |_| String::new());
        current = collapse_whitespace(&next);
        if removed == 0 || !current.contains(OPEN) {
            return current;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod template_tests {
    use super::*;

    fn expand_default(text: &str) -> String {
        expand(text, 4, &TemplateRenderer::default())
    }

    // ─────────────────────────────────────────────────────────────
    // Argument splitting
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn split_simple() {
        assert_eq!(
            split_template_parts("abbreviation of|en|International Business Machines"),
            vec!["abbreviation of", "en", "International Business Machines"]
        );
    }

    #[test]
    fn split_respects_nested_templates() {
        assert_eq!(split_template_parts("a|{{b|c}}|d"), vec!["a", "{{b|c}}", "d"]);
    }

    #[test]
    fn split_respects_nested_links() {
        assert_eq!(
            split_template_parts("l|en|[[isle|Isle]]|of"),
            vec!["l", "en", "[[isle|Isle]]", "of"]
        );
    }

    #[test]
    fn split_deep_nesting() {
        assert_eq!(
            split_template_parts("foo|{{a|{{b|{{c|d}}}}}}|bar"),
            vec!["foo", "{{a|{{b|{{c|d}}}}}}", "bar"]
        );
    }

    #[test]
    fn split_keeps_empty_parts() {
        assert_eq!(split_template_parts("a||b"), vec!["a", "", "b"]);
        assert_eq!(split_template_parts(""), vec![""]);
    }

    #[test]
    fn split_multibyte() {
        assert_eq!(split_template_parts("en|λόγος|nāsus"), vec!["en", "λόγος", "nāsus"]);
    }

    #[test]
    fn split_stray_closers_are_text() {
        assert_eq!(split_template_parts("a}}|b]]"), vec!["a}}", "b]]"]);
    }

    // ─────────────────────────────────────────────────────────────
    // Invocation parsing and span matching
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn invocation_parse() {
        let inv = TemplateInvocation::parse(" m|en|word ");
        assert_eq!(inv.name, "m");
        assert_eq!(inv.args, vec!["en", "word"]);
    }

    #[test]
    fn invocation_without_args() {
        let inv = TemplateInvocation::parse("surname");
        assert_eq!(inv.name, "surname");
        assert!(inv.args.is_empty());
    }

    #[test]
    fn find_end_nested() {
        let text = "x {{outer|{{inner|a}}}} y";
        assert_eq!(find_template_end(text, 2), Some(23));
        assert_eq!(&text[2..23], "{{outer|{{inner|a}}}}");
    }

    #[test]
    fn find_end_unclosed() {
        assert_eq!(find_template_end("{{a|{{b}}", 0), None);
    }

    // ─────────────────────────────────────────────────────────────
    // Expansion
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn no_templates_is_identity() {
        assert_eq!(expand_default("a  plain   line"), "a  plain   line");
    }

    #[test]
    fn expands_in_place() {
        assert_eq!(expand_default("{{lb|en|slang}} a cat"), "(slang) a cat");
    }

    #[test]
    fn nested_templates_resolve_over_passes() {
        assert_eq!(expand_default("{{plural of|en|{{l|en|cat}}}}"), "Plural of cat");
        assert_eq!(expand_default("{{lb|en|{{q|rare}}}} thing"), "((rare)) thing");
    }

    #[test]
    fn unbalanced_opener_is_literal() {
        assert_eq!(expand_default("a {{broken and {{l|en|b}}"), "a {{broken and b");
    }

    #[test]
    fn pass_bound_limits_depth() {
        // Five levels need five passes; one pass only peels the outermost.
        let text = "{{a|{{b|{{c|{{d|{{e|x}}}}}}}}}}";
        let r = TemplateRenderer::default();
        assert_eq!(expand(text, 1, &r), "{{b|{{c|{{d|{{e|x}}}}}}}}");
        assert_eq!(expand(text, 5, &r), "x");
    }

    #[test]
    fn self_referential_text_terminates() {
        let text = "{{a|{{a|{{a|{{a|{{a|{{a|{{a|{{a|z}}}}}}}}}}}}}}}}".repeat(50);
        let out = expand_default(&text);
        assert!(out.len() <= text.len());
    }

    #[test]
    fn unknown_template_keeps_payload() {
        assert_eq!(expand_default("{{foo|bar|baz}}"), "bar");
    }

    #[test]
    fn strip_drops_balanced_spans_only() {
        assert_eq!(strip("a {{x|{{y}}}} b {{z}}"), "a b");
        assert_eq!(strip("a {{broken {{x}} b"), "a {{broken b");
        assert_eq!(strip("{{{{x}}"), "{");
        assert_eq!(strip("plain"), "plain");
    }
}
