use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, LineWriter, Write};
use std::path::{Path, PathBuf};

use super::TermDictionary;
use crate::constants::{
    BINARY_VECTORS_FILE, DICTIONARY_FILE, DOC_FREQ_FILE, GOLD_STANDARD_FILE, RAW_TEXT_FILE,
    SMOOTHED_VECTORS_PREFIX, TF_VECTORS_FILE, USER_ID_FILE,
};
use crate::context::Closeable;
use crate::error::{CorpusError, Result};

/// Everything written for one exported document.
#[derive(Debug, Clone)]
pub struct ExportRow<'a> {
    pub label: &'a str,
    pub raw_text: &'a str,
    pub user_id: u64,
    pub tf: String,
    pub binary: String,
    /// One line per smoothing discount, in discount order.
    pub smoothed: Vec<String>,
}

/// Line-aligned output files of one export run.
///
/// Per-document files are line buffered, so each row is on disk as soon as it is written.
pub struct ExportSink {
    dir: PathBuf,
    gold: LineWriter<File>,
    tf: LineWriter<File>,
    binary: LineWriter<File>,
    smoothed: Vec<LineWriter<File>>,
    raw_text: LineWriter<File>,
    user_ids: LineWriter<File>,
    rows: u64,
    closed: bool,
    label: String,
}

fn create(dir: &Path, name: &str) -> Result<LineWriter<File>> {
    let path = dir.join(name);
    let file = File::create(&path).map_err(|err| {
        CorpusError::config(format!("cannot create {}: {err}", path.display()))
    })?;
    Ok(LineWriter::new(file))
}

impl ExportSink {
    /// Creates (truncating) every per-document file under `dir`.
    pub fn create(dir: &Path, smoothing_discounts: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|err| {
            CorpusError::config(format!("cannot create output dir {}: {err}", dir.display()))
        })?;
        let smoothed = (0..smoothing_discounts)
            .map(|idx| create(dir, &format!("{SMOOTHED_VECTORS_PREFIX}{idx}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            dir: dir.to_path_buf(),
            gold: create(dir, GOLD_STANDARD_FILE)?,
            tf: create(dir, TF_VECTORS_FILE)?,
            binary: create(dir, BINARY_VECTORS_FILE)?,
            smoothed,
            raw_text: create(dir, RAW_TEXT_FILE)?,
            user_ids: create(dir, USER_ID_FILE)?,
            rows: 0,
            closed: false,
            label: format!("export sink {}", dir.display()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn write_row(&mut self, row: &ExportRow<'_>) -> Result<()> {
        if self.closed {
            return Err(CorpusError::config("export sink already closed"));
        }
        writeln!(self.raw_text, "{}", row.raw_text)?;
        writeln!(self.tf, "{}", row.tf)?;
        writeln!(self.binary, "{}", row.binary)?;
        for (writer, line) in self.smoothed.iter_mut().zip(&row.smoothed) {
            writeln!(writer, "{line}")?;
        }
        writeln!(self.user_ids, "{}", row.user_id)?;
        writeln!(self.gold, "{}", row.label)?;
        self.rows += 1;
        Ok(())
    }

    /// Writes the sorted dictionary and the `id:count` document-frequency file.
    pub fn write_tables(
        &self,
        dictionary: &TermDictionary,
        doc_freq: &BTreeMap<usize, u64>,
    ) -> Result<()> {
        let dict_file = File::create(self.dir.join(DICTIONARY_FILE))?;
        dictionary.write_sorted(BufWriter::new(dict_file))?;

        let mut df = BufWriter::new(File::create(self.dir.join(DOC_FREQ_FILE))?);
        for (id, count) in doc_freq {
            writeln!(df, "{id}:{count}")?;
        }
        df.flush()?;
        Ok(())
    }
}

impl Closeable for ExportSink {
    fn resource_name(&self) -> &str {
        &self.label
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut first_err = None;
        let writers = [
            &mut self.raw_text,
            &mut self.tf,
            &mut self.binary,
            &mut self.user_ids,
            &mut self.gold,
        ];
        for writer in writers.into_iter().chain(self.smoothed.iter_mut()) {
            if let Err(err) = writer.flush() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
