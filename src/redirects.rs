//! Title-rename lookup from the `page` and `redirect` SQL dumps.
//!
//! The SQL files are read line by line; each `INSERT INTO ... VALUES` line
//! holds many quoted tuples, split here without a SQL parser.

use flate2::read::MultiGzDecoder;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;

lazy_static! {
    static ref INSERT: Regex = Regex::new(r"(?i)^INSERT INTO `(\w+)` VALUES ").unwrap();
}

fn open_sql(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let is_gz = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("gz"));
    Ok(if is_gz {
        Box::new(BufReader::with_capacity(256 * 1024, MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    })
}

/// Call `f` with the VALUES blob of every `INSERT INTO \`table\`` line.
pub fn for_each_insert(
    mut reader: impl BufRead,
    table: &str,
    mut f: impl FnMut(&str),
) -> Result<()> {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim();
        let Some(caps) = INSERT.captures(line) else {
            continue;
        };
        if !caps[1].eq_ignore_ascii_case(table) {
            continue;
        }
        let values = line[caps[0].len()..].trim().trim_end_matches(';');
        f(values);
    }
    Ok(())
}

/// Split `(1,'a'),(2,'b')` into `["(1,'a')", "(2,'b')"]`, honoring quotes and escapes.
pub fn split_sql_tuples(values: &str) -> Vec<&str> {
    let mut tuples = Vec::new();
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, ch) in values.char_indices() {
        if in_str {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '\'' {
                in_str = false;
            }
            continue;
        }
        match ch {
            '\'' => in_str = true,
            '(' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    tuples.push(&values[start..=i]);
                }
            }
            _ => {}
        }
    }
    tuples
}

/// Split one `(...)` tuple into unquoted, unescaped fields.
pub fn parse_sql_tuple(tuple: &str) -> Vec<String> {
    let s = tuple.trim();
    let s = s.strip_prefix('(').and_then(|s| s.strip_suffix(')')).unwrap_or(s);

    let mut fields = Vec::new();
    let mut buf = String::new();
    let mut in_str = false;
    let mut escaped = false;

    for ch in s.chars() {
        if in_str {
            if escaped {
                buf.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '\'' {
                in_str = false;
            } else {
                buf.push(ch);
            }
        } else if ch == '\'' {
            in_str = true;
        } else if ch == ',' {
            fields.push(buf.trim().to_string());
            buf.clear();
        } else {
            buf.push(ch);
        }
    }
    fields.push(buf.trim().to_string());
    fields
}

/// Parse `(id, namespace, title, ...)` tuples, keeping main-namespace rows.
fn main_namespace_rows(values: &str, mut f: impl FnMut(u64, String)) {
    for tuple in split_sql_tuples(values) {
        let fields = parse_sql_tuple(tuple);
        if fields.len() < 3 {
            continue;
        }
        let (Ok(id), Ok(ns)) = (fields[0].parse::<u64>(), fields[1].parse::<i64>()) else {
            continue;
        };
        if ns == 0 {
            f(id, fields[2].replace('_', " "));
        }
    }
}

/// page_id -> title for every main-namespace page.
pub fn load_page_titles(reader: impl BufRead) -> Result<HashMap<u64, String>> {
    let mut titles = HashMap::new();
    for_each_insert(reader, "page", |values| {
        main_namespace_rows(values, |id, title| {
            titles.insert(id, title);
        });
    })?;
    Ok(titles)
}

/// source title -> target title for every main-namespace redirect.
pub fn load_redirects(
    reader: impl BufRead,
    page_titles: &HashMap<u64, String>,
) -> Result<HashMap<String, String>> {
    let mut redirects = HashMap::new();
    for_each_insert(reader, "redirect", |values| {
        main_namespace_rows(values, |from, target| {
            if let Some(source) = page_titles.get(&from) {
                redirects.insert(source.clone(), target);
            }
        });
    })?;
    Ok(redirects)
}

/// Reverse index of the rename lookup: target title -> titles redirecting to it.
#[derive(Debug, Clone, Default)]
pub struct RedirectTable {
    by_target: HashMap<String, Vec<String>>,
    len: usize,
}

impl RedirectTable {
    pub fn from_redirects(redirects: HashMap<String, String>) -> Self {
        let len = redirects.len();
        let mut by_target: HashMap<String, Vec<String>> = HashMap::new();
        for (source, target) in redirects {
            by_target.entry(target).or_default().push(source);
        }
        for sources in by_target.values_mut() {
            sources.sort();
        }
        RedirectTable { by_target, len }
    }

    /// Load from `page.sql[.gz]` and `redirect.sql[.gz]`.
    pub fn load(redirect_sql: &Path, page_sql: &Path) -> Result<Self> {
        info!(path = %page_sql.display(), "loading page map (page_id -> title)");
        let titles = load_page_titles(open_sql(page_sql)?)?;
        debug!(pages = titles.len(), "page map loaded");

        info!(path = %redirect_sql.display(), "loading redirects (title -> title)");
        let redirects = load_redirects(open_sql(redirect_sql)?, &titles)?;
        info!(redirects = redirects.len(), "redirects loaded");
        Ok(Self::from_redirects(redirects))
    }

    /// Titles that redirect to `target`.
    pub fn aliases_of(&self, target: &str) -> &[String] {
        self.by_target.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
