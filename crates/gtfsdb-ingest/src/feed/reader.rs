//! Streaming access to feed files
//!
//! A [`Feed`] is a directory listing; a [`FeedFile`] is one delimited file
//! whose header has been read. Records are produced one at a time from a
//! `csv` reader, so memory use does not grow with file size. Headers and
//! values are trimmed; bytes that are not valid UTF-8 are replaced with
//! U+FFFD rather than failing the file.

use crate::error::FeedError;
use csv::{ByteRecord, ByteRecordsIntoIter, ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const BOM: char = '\u{feff}';

/// A feed directory and the `.txt` files found in it.
#[derive(Debug, Clone)]
pub struct Feed {
    dir: PathBuf,
    stems: BTreeSet<String>,
}

impl Feed {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, FeedError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir).map_err(|e| FeedError::io(&dir, e))?;

        let mut stems = BTreeSet::new();
        for entry in entries {
            let path = entry.map_err(|e| FeedError::io(&dir, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.insert(stem.to_string());
            }
        }

        debug!(dir = %dir.display(), files = stems.len(), "Opened feed directory");
        Ok(Self { dir, stems })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `<stem>.txt` exists in the feed.
    pub fn has(&self, stem: &str) -> bool {
        self.stems.contains(stem)
    }

    /// Stems of every `.txt` file, sorted.
    pub fn stems(&self) -> impl Iterator<Item = &str> {
        self.stems.iter().map(String::as_str)
    }

    pub fn path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.txt"))
    }

    pub fn file(&self, stem: &str) -> Result<FeedFile, FeedError> {
        FeedFile::open(self.path(stem))
    }
}

/// One delimited file with its header already parsed.
#[derive(Debug, Clone)]
pub struct FeedFile {
    path: PathBuf,
    delimiter: u8,
    headers: Arc<[String]>,
}

impl FeedFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FeedError> {
        let path = path.into();

        let mut first_line = String::new();
        {
            let file = File::open(&path).map_err(|e| FeedError::io(&path, e))?;
            BufReader::new(file)
                .read_line(&mut first_line)
                .map_err(|e| FeedError::io(&path, e))?;
        }
        let delimiter = sniff_delimiter(&first_line);

        let mut reader = Self::reader(&path, delimiter)?;
        let mut headers: Vec<String> = reader
            .byte_headers()
            .map_err(|e| FeedError::csv(&path, e))?
            .iter()
            .map(|raw| clean_header(&String::from_utf8_lossy(raw)))
            .collect();
        // trailing delimiter
        while headers.last().is_some_and(|h| h.is_empty()) {
            headers.pop();
        }

        Ok(Self {
            path,
            delimiter,
            headers: headers.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Header field names, cleaned of BOM and surrounding whitespace.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.headers.iter().any(|h| h == field)
    }

    /// Fresh iterator over the data records, in file order.
    pub fn records(&self) -> Result<Records, FeedError> {
        let reader = Self::reader(&self.path, self.delimiter)?;
        Ok(Records {
            inner: reader.into_byte_records(),
            headers: Arc::clone(&self.headers),
            path: self.path.clone(),
        })
    }

    /// Number of data records; a full streaming pass over the file.
    pub fn count_records(&self) -> Result<u64, FeedError> {
        let mut reader = Self::reader(&self.path, self.delimiter)?;
        let mut record = ByteRecord::new();
        let mut count = 0u64;
        while reader
            .read_byte_record(&mut record)
            .map_err(|e| FeedError::csv(&self.path, e))?
        {
            count += 1;
        }
        Ok(count)
    }

    fn reader(path: &Path, delimiter: u8) -> Result<csv::Reader<BufReader<File>>, FeedError> {
        let file = File::open(path).map_err(|e| FeedError::io(path, e))?;
        Ok(ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(BufReader::new(file)))
    }
}

/// Streaming record iterator returned by [`FeedFile::records`].
pub struct Records {
    inner: ByteRecordsIntoIter<BufReader<File>>,
    headers: Arc<[String]>,
    path: PathBuf,
}

impl Iterator for Records {
    type Item = Result<Record, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.inner.next()?;
        Some(
            next.map(|raw| Record {
                fields: Arc::clone(&self.headers),
                values: StringRecord::from_byte_record_lossy(raw),
            })
            .map_err(|e| FeedError::csv(&self.path, e)),
        )
    }
}

/// One data row, keyed by the header's field names.
#[derive(Debug, Clone)]
pub struct Record {
    fields: Arc<[String]>,
    values: StringRecord,
}

impl Record {
    /// Raw value of `field`; `None` when the header lacks it or the row is short.
    pub fn get(&self, field: &str) -> Option<&str> {
        let index = self.fields.iter().position(|f| f == field)?;
        self.values.get(index)
    }

    /// `(field, value)` pairs in header order. Short rows yield fewer pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Pick `|` or `,` from a header line, whichever occurs more often.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let pipes = header_line.matches('|').count();
    let commas = header_line.matches(',').count();
    if pipes > commas {
        b'|'
    } else {
        b','
    }
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches(BOM).trim().to_string()
}
