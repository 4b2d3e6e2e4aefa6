//! Turn `defs-{L}.jsonl` shards into `defs-{L}.json` word -> senses maps.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{LexiconError, Result};
use crate::section::Sense;

#[derive(Debug, Deserialize)]
struct DefsLine {
    word: String,
    #[serde(default)]
    senses: Vec<Sense>,
}

/// `defs-*.jsonl` files in `dir`, sorted by name.
pub fn find_defs_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("defs-") && n.ends_with(".jsonl"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Read one shard into a word -> senses map. A repeated word keeps its last senses.
pub fn read_defs(reader: impl BufRead) -> Result<BTreeMap<String, Vec<Sense>>> {
    let mut mapping = BTreeMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: DefsLine = serde_json::from_str(line)?;
        mapping.insert(record.word, record.senses);
    }
    Ok(mapping)
}

/// Convert every shard in `in_dir`, returning each written path with its word count.
pub fn convert_defs(in_dir: &Path, out_dir: &Path) -> Result<Vec<(PathBuf, usize)>> {
    let files = find_defs_files(in_dir)?;
    if files.is_empty() {
        return Err(LexiconError::NoInput(format!("no defs-*.jsonl files in {}", in_dir.display())));
    }
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::with_capacity(files.len());
    for path in files {
        let mapping = read_defs(BufReader::new(File::open(&path)?))?;
        let out_path = out_dir.join(path.with_extension("json").file_name().unwrap_or_default());
        let mut out = BufWriter::new(File::create(&out_path)?);
        serde_json::to_writer(&mut out, &mapping)?;
        out.flush()?;
        info!(path = %out_path.display(), words = mapping.len(), "wrote definitions map");
        written.push((out_path, mapping.len()));
    }
    Ok(written)
}

#[cfg(test)]
mod convert_tests {
    use super::*;

    #[test]
    fn converts_shards() {
        let dir = tempfile::tempdir().unwrap();
        let defs = dir.path().join("defs");
        fs::create_dir_all(&defs).unwrap();
        fs::write(
            defs.join("defs-3.jsonl"),
            "{\"word\":\"CAT\",\"senses\":[{\"pos\":\"Noun\",\"definitions\":[\"A feline.\"]}]}\n\n{\"word\":\"DOG\"}\n",
        )
        .unwrap();
        fs::write(defs.join("notes.txt"), "ignored").unwrap();

        let out = dir.path().join("json");
        let written = convert_defs(&defs, &out).unwrap();
        assert_eq!(written, vec![(out.join("defs-3.json"), 2)]);

        let json = fs::read_to_string(out.join("defs-3.json")).unwrap();
        assert_eq!(
            json,
            "{\"CAT\":[{\"pos\":\"Noun\",\"definitions\":[\"A feline.\"]}],\"DOG\":[]}"
        );
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert_defs(dir.path(), &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, LexiconError::NoInput(_)));
    }

    #[test]
    fn bad_line_is_an_error() {
        assert!(matches!(read_defs("{not json}\n".as_bytes()), Err(LexiconError::Json(_))));
    }
}
