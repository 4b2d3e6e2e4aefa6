//! Streaming reader for MediaWiki XML dumps.
//!
//! Pages are yielded one at a time; only the `<page>` being assembled is held
//! in memory, so the working set does not grow with the size of the dump.

use bzip2::read::MultiBzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::cell::Cell;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

use crate::error::{LexiconError, Result};

const READ_BUFFER: usize = 256 * 1024;

/// One dump entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub namespace: i64,
    /// Target of `<redirect title="..."/>`, when the page is a redirect.
    pub redirect: Option<String>,
    pub raw_markup: String,
}

/// Counts bytes pulled from the underlying (compressed) file.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Rc<Cell<u64>>);

impl ByteCounter {
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    fn add(&self, n: usize) {
        self.0.set(self.0.get() + n as u64);
    }
}

struct CountingRead<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R: Read> Read for CountingRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.add(n);
        Ok(n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Namespace,
    Text,
}

#[derive(Debug, Default)]
struct PartialPage {
    title: Option<String>,
    namespace: Option<String>,
    redirect: Option<String>,
    text: Option<String>,
    /// First unescape failure inside this page, if any.
    broken: Option<String>,
}

impl PartialPage {
    fn field_mut(&mut self, field: Field) -> &mut String {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Namespace => &mut self.namespace,
            Field::Text => &mut self.text,
        };
        slot.get_or_insert_with(String::new)
    }

    fn finish(self, index: u64) -> Result<Page> {
        let unparseable = |reason: String| LexiconError::UnparseableStreamEntry { index, reason };
        if let Some(reason) = self.broken {
            return Err(unparseable(reason));
        }
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| unparseable("missing <title>".to_string()))?;
        let raw_markup = self
            .text
            .ok_or_else(|| unparseable(format!("'{}' has no <text>", title)))?;
        let namespace = match self.namespace {
            Some(ns) => ns
                .trim()
                .parse()
                .map_err(|_| unparseable(format!("'{}' has a bad <ns> value '{}'", title, ns)))?,
            None => 0,
        };
        Ok(Page { title, namespace, redirect: self.redirect, raw_markup })
    }
}

/// Iterator over the pages of a dump.
///
/// A page that cannot be assembled yields
/// [`LexiconError::UnparseableStreamEntry`] and the stream goes on. An XML
/// syntax error is yielded once and ends the stream.
pub struct PageReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    consumed: ByteCounter,
    index: u64,
    done: bool,
}

impl PageReader<Box<dyn BufRead>> {
    /// Open a `.xml.bz2` or plain `.xml` dump.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let consumed = ByteCounter::default();
        let counted = CountingRead { inner: file, counter: consumed.clone() };
        let is_bz2 = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("bz2"));
        let source: Box<dyn BufRead> = if is_bz2 {
            Box::new(BufReader::with_capacity(READ_BUFFER, MultiBzDecoder::new(counted)))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER, counted))
        };
        debug!(path = %path.display(), bz2 = is_bz2, "opened dump");
        Ok(Self::with_counter(source, consumed))
    }
}

impl<R: BufRead> PageReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_counter(source, ByteCounter::default())
    }

    fn with_counter(source: R, consumed: ByteCounter) -> Self {
        PageReader {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            consumed,
            index: 0,
            done: false,
        }
    }

    /// Compressed bytes consumed so far (zero for readers built with [`PageReader::new`]).
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed.get()
    }

    /// Pages seen so far, including unparseable ones.
    pub fn pages_seen(&self) -> u64 {
        self.index
    }

    fn redirect_target(start: &BytesStart<'_>) -> Option<String> {
        start
            .try_get_attribute("title")
            .ok()
            .flatten()
            .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
    }

    fn next_page(&mut self) -> Option<Result<Page>> {
        let mut page: Option<PartialPage> = None;
        let mut field: Option<Field> = None;

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    self.done = true;
                    let position = self.reader.buffer_position() as u64;
                    return Some(Err(LexiconError::Xml { position, source: e }));
                }
            };

            match event {
                Event::Start(start) => match start.local_name().as_ref() {
                    b"page" => page = Some(PartialPage::default()),
                    b"title" if page.is_some() => field = Some(Field::Title),
                    b"ns" if page.is_some() => field = Some(Field::Namespace),
                    // Only the first revision's text is kept.
                    b"text" => {
                        if let Some(p) = page.as_mut().filter(|p| p.text.is_none()) {
                            p.field_mut(Field::Text);
                            field = Some(Field::Text);
                        }
                    }
                    _ => {}
                },
                Event::Empty(start) => {
                    if let Some(p) = page.as_mut() {
                        match start.local_name().as_ref() {
                            b"redirect" => p.redirect = Self::redirect_target(&start),
                            b"text" => {
                                p.field_mut(Field::Text);
                            }
                            _ => {}
                        }
                    }
                }
                Event::Text(text) => {
                    if let (Some(p), Some(f)) = (page.as_mut(), field) {
                        match text.unescape() {
                            Ok(s) => p.field_mut(f).push_str(&s),
                            Err(e) => {
                                p.broken.get_or_insert_with(|| format!("bad text: {}", e));
                            }
                        }
                    }
                }
                Event::CData(data) => {
                    if let (Some(p), Some(f)) = (page.as_mut(), field) {
                        p.field_mut(f).push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::End(end) => match end.local_name().as_ref() {
                    b"title" | b"ns" | b"text" => field = None,
                    b"page" => {
                        if let Some(p) = page.take() {
                            let index = self.index;
                            self.index += 1;
                            return Some(p.finish(index));
                        }
                    }
                    _ => {}
                },
                Event::Eof => {
                    self.done = true;
                    if page.is_some() {
                        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "dump ended inside <page>");
                        return Some(Err(err.into()));
                    }
                    return None;
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for PageReader<R> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.next_page()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
