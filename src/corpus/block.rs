//! Line-oriented block decoding with the codec picked from the file extension.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;

use crate::error::Result;

/// Compression wrapping a block or side file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCodec {
    Gzip,
    Bzip2,
    Zstd,
    Plain,
}

impl BlockCodec {
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") => Self::Gzip,
            Some("bz2") => Self::Bzip2,
            Some("zst" | "zstd") => Self::Zstd,
            _ => Self::Plain,
        }
    }
}

/// Opens `path` as a buffered reader of decompressed bytes.
pub(crate) fn open_decoded(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = match BlockCodec::for_path(path) {
        BlockCodec::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        BlockCodec::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(file))),
        BlockCodec::Zstd => Box::new(BufReader::new(zstd::stream::read::Decoder::new(file)?)),
        BlockCodec::Plain => Box::new(BufReader::new(file)),
    };
    Ok(reader)
}

/// One line of a block: decoded text, or bytes that were not valid UTF-8.
#[derive(Debug)]
pub(crate) enum BlockLine {
    Text(String),
    Malformed { line_no: u64 },
}

/// Sequential reader over the newline-delimited envelopes of a single block.
pub(crate) struct BlockReader {
    path: PathBuf,
    reader: Box<dyn BufRead>,
    buf: Vec<u8>,
    line_no: u64,
}

impl BlockReader {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            reader: open_decoded(path)?,
            buf: Vec::with_capacity(4096),
            line_no: 0,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Next non-blank line, or `None` once the block is exhausted.
    pub(crate) fn next_line(&mut self) -> Result<Option<BlockLine>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let trimmed = self.buf.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(match std::str::from_utf8(trimmed) {
                Ok(text) => BlockLine::Text(text.to_string()),
                Err(_) => BlockLine::Malformed {
                    line_no: self.line_no,
                },
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn drain(reader: &mut BlockReader) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = reader.next_line().unwrap() {
            match line {
                BlockLine::Text(text) => out.push(text),
                BlockLine::Malformed { line_no } => out.push(format!("<malformed {line_no}>")),
            }
        }
        out
    }

    #[test]
    fn codec_follows_extension() {
        assert_eq!(BlockCodec::for_path(Path::new("a.gz")), BlockCodec::Gzip);
        assert_eq!(BlockCodec::for_path(Path::new("a.bz2")), BlockCodec::Bzip2);
        assert_eq!(BlockCodec::for_path(Path::new("a.zst")), BlockCodec::Zstd);
        assert_eq!(BlockCodec::for_path(Path::new("a.json")), BlockCodec::Plain);
    }

    #[test]
    fn gzip_block_skips_blank_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("block.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"{\"id\":1}\n\n   \n{\"id\":2}").unwrap();
        encoder.finish().unwrap();

        let mut reader = BlockReader::open(&path).unwrap();
        assert_eq!(drain(&mut reader), vec!["{\"id\":1}", "{\"id\":2}"]);
    }

    #[test]
    fn zstd_and_plain_blocks_decode() {
        let dir = tempfile::TempDir::new().unwrap();
        let zst = dir.path().join("block.zst");
        let compressed = zstd::encode_all(&b"a\nb\n"[..], 3).unwrap();
        std::fs::write(&zst, compressed).unwrap();
        assert_eq!(drain(&mut BlockReader::open(&zst).unwrap()), vec!["a", "b"]);

        let plain = dir.path().join("block.txt");
        std::fs::write(&plain, b"x\r\ny\xff\n").unwrap();
        assert_eq!(
            drain(&mut BlockReader::open(&plain).unwrap()),
            vec!["x", "<malformed 2>"]
        );
    }
}
