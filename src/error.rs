//! Error types for the lexicon builder.

use std::fmt;
use thiserror::Error;

/// The primary error type for every fallible operation in this crate.
///
/// Only failures of the input stream itself (or of the output files) are
/// fatal. Everything that goes wrong inside a single page degrades locally,
/// see [`PageSkip`].
#[derive(Debug, Error)]
pub enum LexiconError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The XML stream is syntactically broken and cannot be read further.
    #[error("XML stream error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// A single `<page>` entry could not be turned into a (title, text) pair.
    #[error("Unparseable stream entry #{index}: {reason}")]
    UnparseableStreamEntry { index: u64, reason: String },

    /// A YAML configuration file could not be parsed.
    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON record could not be serialized or parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An input directory held nothing to process.
    #[error("No input files found: {0}")]
    NoInput(String),
}

/// A convenience `Result` type alias using the crate's [`LexiconError`].
pub type Result<T> = std::result::Result<T, LexiconError>;

/// Why a page produced no Word Record. These are statistics, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageSkip {
    UnparseableStreamEntry,
    /// Talk, template, category and other non-article pages.
    NonContentNamespace,
    Redirect,
    NonAlphabeticTitle,
    LengthOutOfRange,
    NoTargetSection,
    NoSenses,
    Duplicate,
}

impl PageSkip {
    pub const ALL: [PageSkip; 8] = [
        PageSkip::UnparseableStreamEntry,
        PageSkip::NonContentNamespace,
        PageSkip::Redirect,
        PageSkip::NonAlphabeticTitle,
        PageSkip::LengthOutOfRange,
        PageSkip::NoTargetSection,
        PageSkip::NoSenses,
        PageSkip::Duplicate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PageSkip::UnparseableStreamEntry => "unparseable_entry",
            PageSkip::NonContentNamespace => "non_content_namespace",
            PageSkip::Redirect => "redirect",
            PageSkip::NonAlphabeticTitle => "non_alphabetic_title",
            PageSkip::LengthOutOfRange => "length_out_of_range",
            PageSkip::NoTargetSection => "no_target_section",
            PageSkip::NoSenses => "no_senses",
            PageSkip::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for PageSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
