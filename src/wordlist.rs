//! Split a plain word list into `words-{L}.txt` files plus `lengths.json`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

lazy_static! {
    static ref ALPHA: Regex = Regex::new(r"^[A-Za-z]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    pub min_len: usize,
    /// No upper bound when `None`.
    pub max_len: Option<usize>,
    pub uppercase: bool,
    pub alpha_only: bool,
    pub dedupe: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        SplitOptions { min_len: 2, max_len: None, uppercase: true, alpha_only: true, dedupe: false }
    }
}

/// Contents of `lengths.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LengthsManifest {
    pub input: String,
    pub total_words_written: u64,
    pub min_len: usize,
    pub max_len: Option<usize>,
    pub alpha_only: bool,
    pub uppercased: bool,
    pub counts_by_length: BTreeMap<usize, u64>,
}

fn normalize(line: &str, options: &SplitOptions) -> Option<String> {
    let word = line.trim();
    if word.is_empty() {
        return None;
    }
    let word = if options.uppercase { word.to_uppercase() } else { word.to_string() };
    if options.alpha_only && !ALPHA.is_match(&word) {
        return None;
    }
    let len = word.chars().count();
    if len < options.min_len || options.max_len.is_some_and(|max| len > max) {
        return None;
    }
    Some(word)
}

/// Group the words of `reader` by length. Each group comes back sorted.
pub fn group_by_length(mut reader: impl BufRead, options: &SplitOptions) -> Result<BTreeMap<usize, Vec<String>>> {
    let mut by_len: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    let mut seen: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    let mut raw = Vec::new();

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let Some(word) = normalize(&String::from_utf8_lossy(&raw), options) else {
            continue;
        };
        let len = word.chars().count();
        if options.dedupe && !seen.entry(len).or_default().insert(word.clone()) {
            continue;
        }
        by_len.entry(len).or_default().push(word);
    }

    for words in by_len.values_mut() {
        words.sort();
    }
    Ok(by_len)
}

/// Write one `words-{L}.txt` per length and a `lengths.json` summary.
pub fn split_words(input: &Path, out_dir: &Path, options: &SplitOptions) -> Result<LengthsManifest> {
    let reader = BufReader::with_capacity(256 * 1024, File::open(input)?);
    let by_len = group_by_length(reader, options)?;
    fs::create_dir_all(out_dir)?;

    let mut counts_by_length = BTreeMap::new();
    for (len, words) in &by_len {
        let path = out_dir.join(format!("words-{}.txt", len));
        let mut out = BufWriter::new(File::create(&path)?);
        for word in words {
            writeln!(out, "{}", word)?;
        }
        out.flush()?;
        counts_by_length.insert(*len, words.len() as u64);
    }

    let manifest = LengthsManifest {
        input: absolute(input).display().to_string(),
        total_words_written: counts_by_length.values().sum(),
        min_len: options.min_len,
        max_len: options.max_len,
        alpha_only: options.alpha_only,
        uppercased: options.uppercase,
        counts_by_length,
    };
    let manifest_path = out_dir.join("lengths.json");
    let mut out = BufWriter::new(File::create(&manifest_path)?);
    serde_json::to_writer_pretty(&mut out, &manifest)?;
    out.flush()?;

    info!(files = by_len.len(), total = manifest.total_words_written, "word list split");
    Ok(manifest)
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
