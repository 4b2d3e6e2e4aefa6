//! Rendering rules: normalized template name -> plain text.
//!
//! Dispatch is a lookup table from the normalized template name to a
//! [`RenderPolicy`]. The built-in table covers the templates that carry most
//! of the meaning in English definition lines; anything else goes through the
//! fallback policy. Extra names can be registered from configuration without
//! touching the dispatch code.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

use crate::config::ExtractConfig;
use crate::error::{LexiconError, Result};

/// How one family of templates is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPolicy {
    /// `{{lb|en|obsolete|slang}}` -> `(obsolete, slang)`
    Label,
    /// `{{abbreviation of|en|IBM}}` -> `Abbreviation of IBM`
    RelationOf(Cow<'static, str>),
    /// `{{plural of|en|cat}}` -> `Plural of cat`
    InflectionOf(Cow<'static, str>),
    /// `{{surname|en}}` -> `Surname`
    ProperNounCategory,
    /// `{{taxlink|Felis catus|species}}` -> `Felis catus`
    Taxon,
    /// `{{l|en|word}}` -> `word`
    Link,
    /// `{{gloss|a small cat}}` -> `(a small cat)`
    Gloss,
    /// Anything unknown: keep the first positional payload.
    Fallback,
}

/// Policy names as they appear in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyTag {
    Label,
    RelationOf,
    InflectionOf,
    ProperNounCategory,
    Taxon,
    Link,
    Gloss,
    Fallback,
}

/// A configured template name -> policy mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateAlias {
    pub policy: PolicyTag,
    /// Leading phrase for `relation_of` / `inflection_of`, e.g. "Synonym".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase: Option<String>,
}

impl TemplateAlias {
    pub fn to_policy(&self, name: &str) -> Result<RenderPolicy> {
        let phrase = || {
            self.phrase
                .clone()
                .filter(|p| !p.trim().is_empty())
                .map(Cow::Owned)
                .ok_or_else(|| {
                    LexiconError::InvalidConfig(format!(
                        "template alias '{}' needs a phrase for policy {:?}",
                        name, self.policy
                    ))
                })
        };
        Ok(match self.policy {
            PolicyTag::Label => RenderPolicy::Label,
            PolicyTag::RelationOf => RenderPolicy::RelationOf(phrase()?),
            PolicyTag::InflectionOf => RenderPolicy::InflectionOf(phrase()?),
            PolicyTag::ProperNounCategory => RenderPolicy::ProperNounCategory,
            PolicyTag::Taxon => RenderPolicy::Taxon,
            PolicyTag::Link => RenderPolicy::Link,
            PolicyTag::Gloss => RenderPolicy::Gloss,
            PolicyTag::Fallback => RenderPolicy::Fallback,
        })
    }
}

const fn relation(phrase: &'static str) -> RenderPolicy {
    RenderPolicy::RelationOf(Cow::Borrowed(phrase))
}

const fn inflection(phrase: &'static str) -> RenderPolicy {
    RenderPolicy::InflectionOf(Cow::Borrowed(phrase))
}

/// Built-in dispatch table, keyed by normalized template name.
const BUILTIN_POLICIES: &[(&str, RenderPolicy)] = &[
    // Labels and qualifiers
    ("lb", RenderPolicy::Label),
    ("lbl", RenderPolicy::Label),
    ("label", RenderPolicy::Label),
    ("labels", RenderPolicy::Label),
    ("tlb", RenderPolicy::Label),
    ("q", RenderPolicy::Label),
    ("qual", RenderPolicy::Label),
    ("qualifier", RenderPolicy::Label),
    ("i", RenderPolicy::Label),
    // Relations
    ("abbreviation of", relation("Abbreviation")),
    ("abbrev of", relation("Abbreviation")),
    ("abbr of", relation("Abbreviation")),
    ("initialism of", relation("Initialism")),
    ("init of", relation("Initialism")),
    ("acronym of", relation("Acronym")),
    ("alternative form of", relation("Alternative form")),
    ("alternative spelling of", relation("Alternative form")),
    ("alt form", relation("Alternative form")),
    ("alt spelling", relation("Alternative form")),
    ("alt sp", relation("Alternative form")),
    ("misspelling of", relation("Misspelling")),
    // Inflections
    ("plural of", inflection("Plural")),
    ("pl of", inflection("Plural")),
    ("past of", inflection("Past tense")),
    ("past tense of", inflection("Past tense")),
    ("past participle of", inflection("Past participle")),
    ("present participle of", inflection("Present participle")),
    ("pres part of", inflection("Present participle")),
    ("third-person singular of", inflection("Third-person singular")),
    ("comparative of", inflection("Comparative")),
    ("superlative of", inflection("Superlative")),
    // Proper-noun categories
    ("surname", RenderPolicy::ProperNounCategory),
    ("given name", RenderPolicy::ProperNounCategory),
    // Taxonomy
    ("taxlink", RenderPolicy::Taxon),
    ("taxfmt", RenderPolicy::Taxon),
    ("taxon", RenderPolicy::Taxon),
    ("taxlite", RenderPolicy::Taxon),
    // Links and mentions
    ("l", RenderPolicy::Link),
    ("link", RenderPolicy::Link),
    ("l-self", RenderPolicy::Link),
    ("ll", RenderPolicy::Link),
    ("m", RenderPolicy::Link),
    ("mention", RenderPolicy::Link),
    // Glosses
    ("gloss", RenderPolicy::Gloss),
    ("gl", RenderPolicy::Gloss),
];

static FALLBACK: RenderPolicy = RenderPolicy::Fallback;

/// Lowercase, trim, treat `_` as a space and collapse inner whitespace.
pub fn normalize_template_name(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `key=value` arguments are named parameters, not positional payload.
fn is_named_param(arg: &str) -> bool {
    match arg.split_once('=') {
        Some((key, _)) => {
            let key = key.trim();
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ')
        }
        None => false,
    }
}

/// Renders template invocations according to the dispatch table.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    policies: HashMap<String, RenderPolicy>,
    language_codes: Vec<String>,
    max_labels: usize,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        let config = ExtractConfig::default();
        TemplateRenderer {
            policies: Self::builtin_policies(),
            language_codes: config.language_codes,
            max_labels: config.max_labels,
        }
    }
}

impl TemplateRenderer {
    fn builtin_policies() -> HashMap<String, RenderPolicy> {
        BUILTIN_POLICIES
            .iter()
            .map(|(name, policy)| (name.to_string(), policy.clone()))
            .collect()
    }

    /// Build a renderer from the built-in table plus configured aliases.
    /// Configured names override built-in ones.
    pub fn from_config(config: &ExtractConfig) -> Result<Self> {
        let mut policies = Self::builtin_policies();
        for (name, alias) in &config.template_aliases {
            let key = normalize_template_name(name);
            policies.insert(key, alias.to_policy(name)?);
        }
        Ok(TemplateRenderer {
            policies,
            language_codes: config
                .language_codes
                .iter()
                .map(|c| c.trim().to_lowercase())
                .collect(),
            max_labels: config.max_labels,
        })
    }

    pub fn policy_for(&self, name: &str) -> &RenderPolicy {
        self.policies
            .get(&normalize_template_name(name))
            .unwrap_or(&FALLBACK)
    }

    fn is_language_code(&self, arg: &str) -> bool {
        let arg = arg.trim();
        self.language_codes.iter().any(|c| c.eq_ignore_ascii_case(arg))
    }

    /// Positional arguments, with a leading language code removed.
    fn content_args<'a>(&self, args: &'a [String]) -> Vec<&'a str> {
        let mut positional = args
            .iter()
            .map(|a| a.trim())
            .filter(|a| !is_named_param(a))
            .peekable();
        if positional.peek().is_some_and(|a| self.is_language_code(a)) {
            positional.next();
        }
        positional.collect()
    }

    fn first_content_arg<'a>(&self, args: &'a [String]) -> &'a str {
        self.content_args(args)
            .into_iter()
            .find(|a| !a.is_empty())
            .unwrap_or("")
    }

    fn first_raw_arg(args: &[String]) -> &str {
        args.iter()
            .map(|a| a.trim())
            .find(|a| !a.is_empty() && !is_named_param(a))
            .unwrap_or("")
    }

    /// Render `{{name|args...}}` to plain text. Never fails.
    pub fn render(&self, name: &str, args: &[String]) -> String {
        match self.policy_for(name) {
            RenderPolicy::Label => {
                let labels: Vec<&str> = self
                    .content_args(args)
                    .into_iter()
                    .filter(|a| !a.is_empty())
                    .take(self.max_labels)
                    .collect();
                if labels.is_empty() {
                    String::new()
                } else {
                    format!("({})", labels.join(", "))
                }
            }
            RenderPolicy::RelationOf(phrase) | RenderPolicy::InflectionOf(phrase) => {
                let mut target = self.first_content_arg(args);
                if target.is_empty() {
                    target = Self::first_raw_arg(args);
                }
                format!("{} of {}", phrase, target).trim().to_string()
            }
            RenderPolicy::ProperNounCategory => capitalize(&normalize_template_name(name)),
            RenderPolicy::Taxon => Self::first_raw_arg(args).to_string(),
            RenderPolicy::Link => self.first_content_arg(args).to_string(),
            RenderPolicy::Gloss => {
                let gloss = Self::first_raw_arg(args);
                if gloss.is_empty() {
                    String::new()
                } else {
                    format!("({})", gloss)
                }
            }
            RenderPolicy::Fallback => self.first_content_arg(args).to_string(),
        }
    }
}

/// First character uppercased, the rest lowercased ("given name" -> "Given name").
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
