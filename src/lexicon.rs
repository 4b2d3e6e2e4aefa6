//! Page acceptance and the build loop: dump pages in, Word Records out.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;
use tracing::{debug, info};

use crate::config::ExtractConfig;
use crate::dump::{Page, PageReader};
use crate::error::{LexiconError, PageSkip, Result};
use crate::output::ShardedWriter;
use crate::progress::BuildProgress;
use crate::redirects::RedirectTable;
use crate::section::{NoSenses, Sense, SenseExtractor};

lazy_static! {
    static ref ALPHA_TITLE: Regex = Regex::new(r"^[A-Za-z]+$").unwrap();
}

/// One accepted word with its sense groups, as written to `defs-{L}.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    pub word: String,
    pub senses: Vec<Sense>,
}

/// Uppercased word for a crossword-friendly title.
pub fn accept_title(title: &str, min_len: usize, max_len: usize) -> std::result::Result<String, PageSkip> {
    if !ALPHA_TITLE.is_match(title) {
        return Err(PageSkip::NonAlphabeticTitle);
    }
    if title.len() < min_len || title.len() > max_len {
        return Err(PageSkip::LengthOutOfRange);
    }
    Ok(title.to_ascii_uppercase())
}

/// Turns pages into Word Records under one configuration.
#[derive(Debug, Clone)]
pub struct LexiconBuilder {
    extractor: SenseExtractor,
    min_len: usize,
    max_len: usize,
    redirects: Option<RedirectTable>,
}

impl Default for LexiconBuilder {
    fn default() -> Self {
        let config = ExtractConfig::default();
        LexiconBuilder {
            extractor: SenseExtractor::default(),
            min_len: config.min_len,
            max_len: config.max_len,
            redirects: None,
        }
    }
}

impl LexiconBuilder {
    pub fn from_config(config: &ExtractConfig) -> Result<Self> {
        Ok(LexiconBuilder {
            extractor: SenseExtractor::from_config(config)?,
            min_len: config.min_len,
            max_len: config.max_len,
            redirects: None,
        })
    }

    pub fn with_redirects(mut self, redirects: RedirectTable) -> Self {
        self.redirects = Some(redirects);
        self
    }

    pub fn redirects_loaded(&self) -> usize {
        self.redirects.as_ref().map_or(0, RedirectTable::len)
    }

    pub fn build_record(&self, page: &Page) -> std::result::Result<WordRecord, PageSkip> {
        if page.namespace != 0 {
            return Err(PageSkip::NonContentNamespace);
        }
        if page.redirect.is_some() {
            return Err(PageSkip::Redirect);
        }
        let word = accept_title(&page.title, self.min_len, self.max_len)?;
        let senses = self.extractor.extract(&page.raw_markup).map_err(|reason| match reason {
            NoSenses::NoTargetSection => PageSkip::NoTargetSection,
            NoSenses::Empty => PageSkip::NoSenses,
        })?;
        Ok(WordRecord { word, senses })
    }

    /// Extra records for titles that redirect to `title`, carrying `senses`.
    /// Aliases are held to the same title filters as pages.
    pub fn alias_records(&self, title: &str, senses: &[Sense]) -> Vec<WordRecord> {
        let Some(redirects) = self.redirects.as_ref() else {
            return Vec::new();
        };
        redirects
            .aliases_of(title)
            .iter()
            .filter_map(|source| match accept_title(source, self.min_len, self.max_len) {
                Ok(word) => Some(WordRecord { word, senses: senses.to_vec() }),
                Err(reason) => {
                    debug!(alias = %source, target = %title, %reason, "alias rejected");
                    None
                }
            })
            .collect()
    }
}

/// Limits of one build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Stop after this many pages.
    pub page_limit: Option<u64>,
    /// Progress refresh interval in pages.
    pub progress_every: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions { page_limit: None, progress_every: 200_000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub pages_seen: u64,
    /// Words written, aliases included.
    pub entries_kept: u64,
    pub definition_records: u64,
    pub alias_entries: u64,
    pub skipped: BTreeMap<PageSkip, u64>,
}

impl BuildStats {
    pub fn skip(&mut self, reason: PageSkip) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn skipped(&self, reason: PageSkip) -> u64 {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    /// Every skip reason by name, zero counts included.
    pub fn skipped_by_name(&self) -> BTreeMap<String, u64> {
        PageSkip::ALL.iter().map(|&r| (r.as_str().to_string(), self.skipped(r))).collect()
    }

    fn record_written(&mut self) {
        self.entries_kept += 1;
        self.definition_records += 1;
    }
}

/// Drive `pages` through `builder` into `writer`.
///
/// Unparseable entries are counted and skipped; any other reader error ends
/// the run.
pub fn run_build<R: BufRead>(
    pages: &mut PageReader<R>,
    builder: &LexiconBuilder,
    writer: &mut ShardedWriter,
    progress: &BuildProgress,
    options: BuildOptions,
) -> Result<BuildStats> {
    let mut stats = BuildStats::default();
    let every = options.progress_every.max(1);

    loop {
        if options.page_limit.is_some_and(|limit| stats.pages_seen >= limit) {
            info!(pages = stats.pages_seen, "page limit reached");
            break;
        }
        let Some(next) = pages.next() else {
            break;
        };
        stats.pages_seen += 1;
        if stats.pages_seen % every == 0 {
            progress.update(pages.bytes_consumed(), stats.pages_seen, stats.entries_kept);
        }

        let page = match next {
            Ok(page) => page,
            Err(LexiconError::UnparseableStreamEntry { index, reason }) => {
                debug!(index, %reason, "skipping unparseable entry");
                stats.skip(PageSkip::UnparseableStreamEntry);
                continue;
            }
            Err(e) => return Err(e),
        };

        match builder.build_record(&page) {
            Ok(record) => {
                if writer.write(&record)? {
                    stats.record_written();
                } else {
                    stats.skip(PageSkip::Duplicate);
                }
                for alias in builder.alias_records(&page.title, &record.senses) {
                    if writer.write(&alias)? {
                        stats.record_written();
                        stats.alias_entries += 1;
                    }
                }
            }
            Err(reason) => stats.skip(reason),
        }
    }

    writer.flush()?;
    progress.update(pages.bytes_consumed(), stats.pages_seen, stats.entries_kept);
    Ok(stats)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
