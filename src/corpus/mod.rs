//! Sequential streaming over a directory of compressed corpus blocks.
//!
//! Blocks are visited in lexicographic file-name order. Each block is a newline-delimited
//! sequence of JSON envelopes; when one block runs dry the stream moves on to the next,
//! so callers only ever see one continuous sequence. Empty blocks are passed over and a
//! malformed envelope costs one warning, never the run.

mod block;

use std::path::{Path, PathBuf};

pub use block::BlockCodec;
pub(crate) use block::open_decoded;
use block::{BlockLine, BlockReader};

use crate::context::Closeable;
use crate::error::{CorpusError, Result};
use crate::normalize::{Normalized, normalize};
use crate::types::{CorpusFilter, StreamEvent};

/// Counters accumulated while streaming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub blocks_opened: u64,
    pub envelopes: u64,
    pub decode_failures: u64,
}

/// Result of a full scan over a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusSummary {
    pub records: u64,
    pub deletes: u64,
    pub decode_failures: u64,
    pub min_id: Option<u64>,
    pub max_id: Option<u64>,
}

/// Cursor over every envelope of every matching block under one root directory.
pub struct CorpusStream {
    root: PathBuf,
    files: Vec<PathBuf>,
    next_file: usize,
    current: Option<BlockReader>,
    stats: StreamStats,
    closed: bool,
    label: String,
}

impl std::fmt::Debug for CorpusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusStream")
            .field("root", &self.root)
            .field("files", &self.files)
            .field("next_file", &self.next_file)
            .field("current", &self.current.as_ref().map(BlockReader::path))
            .field("stats", &self.stats)
            .field("closed", &self.closed)
            .field("label", &self.label)
            .finish()
    }
}

impl CorpusStream {
    /// Lists and sorts the blocks under `root` accepted by `filter`.
    ///
    /// Fails before opening anything when `root` is not a directory or holds no block.
    pub fn open(root: impl AsRef<Path>, filter: &CorpusFilter) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(CorpusError::config(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name.to_str().is_some_and(|name| filter.accepts(name)) {
                files.push(entry.path());
            }
        }
        if files.is_empty() {
            return Err(CorpusError::config(format!(
                "{} contains no .{} blocks{}",
                root.display(),
                filter.extension,
                filter
                    .pattern
                    .as_deref()
                    .map(|p| format!(" matching '{p}'"))
                    .unwrap_or_default()
            )));
        }
        files.sort();
        tracing::info!(
            target = "geocorpus::corpus",
            root = %root.display(),
            blocks = files.len(),
            "corpus opened"
        );
        Ok(Self {
            root: root.to_path_buf(),
            label: format!("corpus {}", root.display()),
            files,
            next_file: 0,
            current: None,
            stats: StreamStats::default(),
            closed: false,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Blocks in visiting order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[must_use]
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Next undecoded envelope, or `None` once every block is exhausted or the stream is closed.
    pub fn next_raw(&mut self) -> Result<Option<String>> {
        if self.closed {
            return Ok(None);
        }
        loop {
            if let Some(reader) = self.current.as_mut() {
                match reader.next_line()? {
                    Some(BlockLine::Text(text)) => {
                        self.stats.envelopes += 1;
                        return Ok(Some(text));
                    }
                    Some(BlockLine::Malformed { line_no }) => {
                        self.stats.decode_failures += 1;
                        tracing::warn!(
                            target = "geocorpus::corpus",
                            block = %reader.path().display(),
                            line_no,
                            "skipping envelope that is not valid UTF-8"
                        );
                        continue;
                    }
                    None => {
                        tracing::debug!(
                            target = "geocorpus::corpus",
                            block = %reader.path().display(),
                            "block exhausted"
                        );
                        self.current = None;
                    }
                }
            }
            let Some(path) = self.files.get(self.next_file) else {
                return Ok(None);
            };
            self.next_file += 1;
            tracing::info!(
                target = "geocorpus::corpus",
                block = %path.display(),
                position = self.next_file,
                total = self.files.len(),
                "opening block"
            );
            self.current = Some(BlockReader::open(path)?);
            self.stats.blocks_opened += 1;
        }
    }

    /// Next record or delete notice. Undecodable envelopes are logged and skipped.
    pub fn next(&mut self) -> Result<Option<StreamEvent>> {
        while let Some(raw) = self.next_raw()? {
            match normalize(&raw) {
                Normalized::Record(record) => return Ok(Some(StreamEvent::Record(record))),
                Normalized::Delete(directive) => return Ok(Some(StreamEvent::Delete(directive))),
                Normalized::Invalid(reason) => {
                    self.stats.decode_failures += 1;
                    tracing::warn!(
                        target = "geocorpus::corpus",
                        block = ?self.current.as_ref().map(|r| r.path().display().to_string()),
                        reason = %reason,
                        "skipping undecodable envelope"
                    );
                }
            }
        }
        Ok(None)
    }

    /// Streams the rest of the corpus and reports record count and id range.
    pub fn summarize(mut self) -> Result<CorpusSummary> {
        let mut summary = CorpusSummary::default();
        while let Some(event) = self.next()? {
            match event {
                StreamEvent::Record(record) => {
                    summary.records += 1;
                    summary.min_id = Some(summary.min_id.map_or(record.id, |m| m.min(record.id)));
                    summary.max_id = Some(summary.max_id.map_or(record.id, |m| m.max(record.id)));
                }
                StreamEvent::Delete(_) => summary.deletes += 1,
            }
        }
        summary.decode_failures = self.stats.decode_failures;
        Closeable::close(&mut self)?;
        Ok(summary)
    }
}

impl Closeable for CorpusStream {
    fn resource_name(&self) -> &str {
        &self.label
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.current = None;
            self.closed = true;
            tracing::debug!(
                target = "geocorpus::corpus",
                root = %self.root.display(),
                envelopes = self.stats.envelopes,
                decode_failures = self.stats.decode_failures,
                "corpus stream closed"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn write_block(dir: &Path, name: &str, lines: &[&str]) {
        let file = std::fs::File::create(dir.join(name)).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        for line in lines {
            writeln!(encoder, "{line}").unwrap();
        }
        encoder.finish().unwrap();
    }

    fn ids(stream: &mut CorpusStream) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(event) = stream.next().unwrap() {
            if let StreamEvent::Record(record) = event {
                out.push(record.id);
            }
        }
        out
    }

    #[test]
    fn blocks_are_visited_in_sorted_order_across_empty_ones() {
        let dir = tempfile::TempDir::new().unwrap();
        write_block(dir.path(), "c.gz", &[r#"{"id":5,"text":"e"}"#]);
        write_block(dir.path(), "a.gz", &[r#"{"id":1,"text":"a"}"#, r#"{"id":2,"text":"b"}"#]);
        write_block(dir.path(), "b.gz", &[]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut stream = CorpusStream::open(dir.path(), &CorpusFilter::default()).unwrap();
        let names: Vec<_> = stream
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.gz", "b.gz", "c.gz"]);
        assert_eq!(ids(&mut stream), vec![1, 2, 5]);
        assert_eq!(stream.stats().blocks_opened, 3);
        assert!(stream.next().unwrap().is_none());
    }

    #[test]
    fn malformed_envelope_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        write_block(
            dir.path(),
            "a.gz",
            &[r#"{"id":1,"text":"a"}"#, "{broken", r#"{"id":3,"text":"c"}"#],
        );
        let mut stream = CorpusStream::open(dir.path(), &CorpusFilter::default()).unwrap();
        assert_eq!(ids(&mut stream), vec![1, 3]);
        assert_eq!(stream.stats().decode_failures, 1);
    }

    #[test]
    fn open_rejects_missing_or_empty_roots() {
        let dir = tempfile::TempDir::new().unwrap();
        let filter = CorpusFilter::default();
        assert!(matches!(
            CorpusStream::open(dir.path(), &filter),
            Err(CorpusError::Configuration { .. })
        ));
        assert!(matches!(
            CorpusStream::open(dir.path().join("nope"), &filter),
            Err(CorpusError::Configuration { .. })
        ));
    }

    #[test]
    fn pattern_narrows_the_block_set() {
        let dir = tempfile::TempDir::new().unwrap();
        write_block(dir.path(), "statuses.2015-11-30.gz", &[r#"{"id":1,"text":"a"}"#]);
        write_block(dir.path(), "statuses.2015-12-01.gz", &[r#"{"id":2,"text":"b"}"#]);
        let filter = CorpusFilter::default().with_pattern(Some("2015-12".into()));
        let mut stream = CorpusStream::open(dir.path(), &filter).unwrap();
        assert_eq!(ids(&mut stream), vec![2]);
    }

    #[test]
    fn raw_envelopes_and_close_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        write_block(dir.path(), "a.gz", &[r#"{"id":1}"#, r#"{"id":2}"#]);
        let mut stream = CorpusStream::open(dir.path(), &CorpusFilter::default()).unwrap();
        assert_eq!(stream.next_raw().unwrap().as_deref(), Some(r#"{"id":1}"#));
        Closeable::close(&mut stream).unwrap();
        Closeable::close(&mut stream).unwrap();
        assert!(stream.next_raw().unwrap().is_none());
    }

    #[test]
    fn summary_reports_count_and_id_range() {
        let dir = tempfile::TempDir::new().unwrap();
        write_block(
            dir.path(),
            "a.gz",
            &[
                r#"{"id":30,"text":"a"}"#,
                r#"{"delete":{"status":{"id":5,"user_id":1}}}"#,
                r#"{"id":10,"text":"b"}"#,
            ],
        );
        write_block(dir.path(), "b.gz", &[r#"{"id":20}"#]);
        let summary = CorpusStream::open(dir.path(), &CorpusFilter::default())
            .unwrap()
            .summarize()
            .unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.deletes, 1);
        assert_eq!(summary.min_id, Some(10));
        assert_eq!(summary.max_id, Some(30));
    }
}
