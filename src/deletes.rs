//! Externally deleted message ids, loaded once before ingestion.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use crate::corpus::open_decoded;
use crate::error::{CorpusError, Result};

/// Immutable set of ids that must never be indexed during a run.
#[derive(Debug, Clone, Default)]
pub struct DeleteSet {
    ids: HashSet<u64>,
}

impl DeleteSet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads one id per line; lines may carry further tab-separated columns after the id.
    ///
    /// The file may be gzip, bzip2 or zstd compressed (chosen by extension). A line whose first
    /// column is not an id is a configuration error, since the whole file is read before
    /// any indexing starts.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CorpusError::config(format!(
                "delete file {} does not exist",
                path.display()
            )));
        }
        let mut reader = open_decoded(path)?;
        let mut ids = HashSet::new();
        let mut line = String::new();
        let mut line_no = 0u64;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            let first = line.split('\t').next().unwrap_or_default().trim();
            if first.is_empty() {
                continue;
            }
            let id = first.parse::<u64>().map_err(|_| {
                CorpusError::config(format!(
                    "delete file {} line {line_no}: '{first}' is not a message id",
                    path.display()
                ))
            })?;
            ids.insert(id);
        }
        tracing::info!(
            target = "geocorpus::ingest",
            path = %path.display(),
            ids = ids.len(),
            "delete set loaded"
        );
        Ok(Self { ids })
    }

    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<u64> for DeleteSet {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn gzip_file_with_tab_columns() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deletes.txt.gz");
        let mut encoder =
            GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(b"42\t7\n\n1001\n  99  \t2015-12-01\n")
            .unwrap();
        encoder.finish().unwrap();

        let set = DeleteSet::load(&path).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(42));
        assert!(set.contains(99));
        assert!(!set.contains(7));
    }

    #[test]
    fn bzip2_file_with_tab_columns() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deletes.txt.bz2");
        let mut encoder = bzip2::write::BzEncoder::new(
            std::fs::File::create(&path).unwrap(),
            bzip2::Compression::default(),
        );
        encoder
            .write_all(b"680000000000000001	12345
680000000000000002	678
")
            .unwrap();
        encoder.finish().unwrap();

        let set = DeleteSet::load(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(680_000_000_000_000_001));
        assert!(set.contains(680_000_000_000_000_002));
        assert!(!set.contains(12345));
    }

    #[test]
    fn non_numeric_id_is_a_configuration_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deletes.txt");
        std::fs::write(&path, "12\nabc\n").unwrap();
        assert!(matches!(
            DeleteSet::load(&path),
            Err(CorpusError::Configuration { .. })
        ));
        assert!(matches!(
            DeleteSet::load(&dir.path().join("missing.gz")),
            Err(CorpusError::Configuration { .. })
        ));
    }
}
