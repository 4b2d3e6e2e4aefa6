//! Length-sharded output: `words/words-{L}.txt`, `defs/defs-{L}.jsonl`
//! and `manifest.json`.

use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::lexicon::WordRecord;

const WRITE_BUFFER: usize = 1024 * 1024;

/// One open handle per word length, created on first use.
struct ShardSet {
    dir: PathBuf,
    prefix: &'static str,
    extension: &'static str,
    append: bool,
    files: HashMap<usize, BufWriter<File>>,
}

impl ShardSet {
    fn new(dir: PathBuf, prefix: &'static str, extension: &'static str, append: bool) -> Self {
        ShardSet { dir, prefix, extension, append, files: HashMap::new() }
    }

    fn get(&mut self, len: usize) -> Result<&mut BufWriter<File>> {
        match self.files.entry(len) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let path = self.dir.join(format!("{}-{}.{}", self.prefix, len, self.extension));
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(self.append)
                    .truncate(!self.append)
                    .open(&path)?;
                debug!(path = %path.display(), "opened shard");
                Ok(entry.insert(BufWriter::with_capacity(WRITE_BUFFER, file)))
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        for file in self.files.values_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Writes accepted Word Records grouped by word length, with an optional
/// per-length dedupe set.
pub struct ShardedWriter {
    words: ShardSet,
    defs: ShardSet,
    seen: Option<HashMap<usize, HashSet<String>>>,
    counts_by_len: BTreeMap<usize, u64>,
    defs_by_len: BTreeMap<usize, u64>,
}

impl ShardedWriter {
    /// `overwrite` truncates existing shards; otherwise records are appended.
    pub fn create(out_dir: &Path, overwrite: bool, dedupe: bool) -> Result<Self> {
        let words_dir = out_dir.join("words");
        let defs_dir = out_dir.join("defs");
        fs::create_dir_all(&words_dir)?;
        fs::create_dir_all(&defs_dir)?;
        Ok(ShardedWriter {
            words: ShardSet::new(words_dir, "words", "txt", !overwrite),
            defs: ShardSet::new(defs_dir, "defs", "jsonl", !overwrite),
            seen: dedupe.then(HashMap::new),
            counts_by_len: BTreeMap::new(),
            defs_by_len: BTreeMap::new(),
        })
    }

    /// Write one record. Returns `false` when dedupe dropped it.
    pub fn write(&mut self, record: &WordRecord) -> Result<bool> {
        let len = record.word.len();
        if let Some(seen) = self.seen.as_mut() {
            if !seen.entry(len).or_default().insert(record.word.clone()) {
                return Ok(false);
            }
        }

        writeln!(self.words.get(len)?, "{}", record.word)?;
        *self.counts_by_len.entry(len).or_insert(0) += 1;

        let json = serde_json::to_string(record)?;
        writeln!(self.defs.get(len)?, "{}", json)?;
        *self.defs_by_len.entry(len).or_insert(0) += 1;
        Ok(true)
    }

    pub fn counts_by_len(&self) -> &BTreeMap<usize, u64> {
        &self.counts_by_len
    }

    pub fn defs_by_len(&self) -> &BTreeMap<usize, u64> {
        &self.defs_by_len
    }

    pub fn flush(&mut self) -> Result<()> {
        self.words.flush()?;
        self.defs.flush()
    }
}

/// Summary of one build run, written as `manifest.json`.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub xml: String,
    pub out: String,
    pub language: String,
    pub min_len: usize,
    pub max_len: usize,
    pub allowed_pos: Vec<String>,
    pub max_defs_per_pos: usize,
    pub max_passes: usize,
    pub total_pages_seen: u64,
    pub total_entries_kept: u64,
    pub total_definition_records: u64,
    pub alias_entries: u64,
    pub counts_by_length: BTreeMap<usize, u64>,
    pub defs_by_length: BTreeMap<usize, u64>,
    pub skipped: BTreeMap<String, u64>,
    pub redirects_loaded: usize,
    pub notes: Vec<String>,
}

impl Manifest {
    pub fn default_notes() -> Vec<String> {
        [
            "Definitions extracted from the target language section under POS headings.",
            "Templates are rendered for common patterns rather than deleted; nested templates handled.",
            "Junk definitions (e.g. '.') are filtered out after cleanup.",
            "Progress percent/ETA are best-effort based on compressed bytes consumed.",
        ]
        .iter()
        .map(|n| n.to_string())
        .collect()
    }

    pub fn write(&self, out_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(out_dir)?;
        let path = out_dir.join("manifest.json");
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(path)
    }
}

#[cfg(test)]
mod output_tests {
    use super::*;
    use crate::section::Sense;

    fn record(word: &str) -> WordRecord {
        WordRecord {
            word: word.to_string(),
            senses: vec![Sense { pos: "Noun".into(), definitions: vec!["A thing.".into()] }],
        }
    }

    #[test]
    fn shards_by_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ShardedWriter::create(dir.path(), true, false).unwrap();
        writer.write(&record("CAT")).unwrap();
        writer.write(&record("DOG")).unwrap();
        writer.write(&record("HORSE")).unwrap();
        writer.flush().unwrap();

        let words3 = fs::read_to_string(dir.path().join("words/words-3.txt")).unwrap();
        assert_eq!(words3, "CAT\nDOG\n");
        let defs5 = fs::read_to_string(dir.path().join("defs/defs-5.jsonl")).unwrap();
        assert_eq!(
            defs5,
            "{\"word\":\"HORSE\",\"senses\":[{\"pos\":\"Noun\",\"definitions\":[\"A thing.\"]}]}\n"
        );
        assert_eq!(writer.counts_by_len()[&3], 2);
        assert_eq!(writer.defs_by_len()[&5], 1);
    }

    #[test]
    fn dedupe_per_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ShardedWriter::create(dir.path(), true, true).unwrap();
        assert!(writer.write(&record("CAT")).unwrap());
        assert!(!writer.write(&record("CAT")).unwrap());
        writer.flush().unwrap();
        let words3 = fs::read_to_string(dir.path().join("words/words-3.txt")).unwrap();
        assert_eq!(words3, "CAT\n");
    }

    #[test]
    fn appends_unless_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            let mut writer = ShardedWriter::create(dir.path(), false, false).unwrap();
            writer.write(&record("CAT")).unwrap();
            writer.flush().unwrap();
        }
        let words3 = fs::read_to_string(dir.path().join("words/words-3.txt")).unwrap();
        assert_eq!(words3, "CAT\nCAT\n");

        let mut writer = ShardedWriter::create(dir.path(), true, false).unwrap();
        writer.write(&record("CAT")).unwrap();
        writer.flush().unwrap();
        let words3 = fs::read_to_string(dir.path().join("words/words-3.txt")).unwrap();
        assert_eq!(words3, "CAT\n");
    }
}
