//! Streaming Wiktionary dump reader that builds a crossword lexicon: uppercase
//! words sharded by length, each with a few short cleaned definitions grouped
//! by part of speech.
//!
//! The pipeline is [`dump::PageReader`] -> [`lexicon::LexiconBuilder`] ->
//! [`output::ShardedWriter`]. Definition text goes through
//! [`cleaner::Cleaner`], which renders templates ([`template`], [`render`])
//! and wikilinks ([`wikilink`]) into plain text.

pub mod cleaner;
pub mod config;
pub mod convert;
pub mod dump;
pub mod error;
pub mod lexicon;
pub mod output;
pub mod progress;
pub mod redirects;
pub mod render;
pub mod section;
pub mod template;
pub mod wikilink;
pub mod wordlist;

pub use cleaner::{clean, Cleaner};
pub use config::ExtractConfig;
pub use dump::{Page, PageReader};
pub use error::{LexiconError, PageSkip, Result};
pub use lexicon::{run_build, BuildOptions, BuildStats, LexiconBuilder, WordRecord};
pub use section::{extract, Sense, SenseExtractor};
