//! I/O utilities for dataset loading, CSV writing, encoding, and delimiter resolution.
//!
//! All file I/O in csv-studio flows through this module:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Loading**: `load_records` turns a CSV/TSV or JSON file into records.
//!   Delimited files yield text cells; JSON keeps numbers and booleans typed.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//! - **Quoting**: CSV output uses `QuoteStyle::Always` with doubled quotes.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use indexmap::IndexMap;
use log::debug;

use crate::data::{Cell, Record};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Json,
}

impl SourceFormat {
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SourceFormat::Json,
            _ => SourceFormat::Delimited,
        }
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    if let Some(path) = path {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => return DEFAULT_TSV_DELIMITER,
            Some(ext) if ext.eq_ignore_ascii_case("csv") => return DEFAULT_CSV_DELIMITER,
            _ => {}
        }
    }
    fallback
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        Ok(Box::new(std::io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        )))
    }
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
) -> Result<csv::Reader<Box<dyn Read>>> {
    Ok(open_csv_reader(open_input(path)?, delimiter, has_headers))
}

pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };

    let writer: Box<dyn Write> = if encoding == UTF_8 {
        base
    } else {
        Box::new(TranscodingWriter::new(base, encoding))
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

/// Loads a whole dataset into memory, choosing the parser from the extension.
pub fn load_records(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Vec<Record>> {
    match SourceFormat::detect(path) {
        SourceFormat::Json => load_json_records(path, encoding),
        SourceFormat::Delimited => {
            let delimiter = resolve_input_delimiter(path, delimiter);
            let reader = open_csv_reader_from_path(path, delimiter, true)?;
            read_delimited_records(reader, encoding)
                .with_context(|| format!("Reading records from {path:?}"))
        }
    }
}

/// Reads every data row as text cells. Short rows are padded with empty text,
/// extra trailing fields are ignored.
pub fn read_delimited_records<R>(
    mut reader: csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<Record>>
where
    R: Read,
{
    let headers = reader_headers(&mut reader, encoding)?;
    let mut records = Vec::new();
    let mut row = csv::ByteRecord::new();
    while reader.read_byte_record(&mut row)? {
        let fields = decode_record(&row, encoding)
            .with_context(|| format!("Decoding row {}", records.len() + 2))?;
        let mut record = Record::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            let value = fields.get(idx).cloned().unwrap_or_default();
            record.insert(header.clone(), Cell::Text(value));
        }
        records.push(record);
    }
    debug!(
        "Read {} delimited row(s) across {} column(s)",
        records.len(),
        headers.len()
    );
    Ok(records)
}

fn load_json_records(path: &Path, encoding: &'static Encoding) -> Result<Vec<Record>> {
    let mut bytes = Vec::new();
    open_input(path)?
        .read_to_end(&mut bytes)
        .with_context(|| format!("Reading {path:?}"))?;
    let text = decode_bytes(&bytes, encoding)?;
    parse_json_records(&text).with_context(|| format!("Parsing JSON records from {path:?}"))
}

/// Parses a JSON array of flat objects. Nested values are kept as JSON text.
pub fn parse_json_records(text: &str) -> Result<Vec<Record>> {
    let rows: Vec<IndexMap<String, serde_json::Value>> = serde_json::from_str(text)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(key, value)| (key, Cell::from(value)))
                .collect()
        })
        .collect())
}

struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            buffer: Vec::new(),
        }
    }

    fn flush_buffer(&mut self, force: bool) -> io::Result<()> {
        loop {
            match std::str::from_utf8(&self.buffer) {
                Ok(valid) => {
                    let text = valid.to_owned();
                    self.encode_and_write(&text)?;
                    self.buffer.clear();
                    return Ok(());
                }
                Err(err) if err.error_len().is_some() => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "Invalid UTF-8 sequence in output stream",
                    ));
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    if valid_up_to == 0 {
                        if force {
                            return Err(io::Error::new(
                                io::ErrorKind::InvalidData,
                                "Incomplete UTF-8 sequence at end of output stream",
                            ));
                        }
                        return Ok(());
                    }
                    let text = String::from_utf8_lossy(&self.buffer[..valid_up_to]).into_owned();
                    self.encode_and_write(&text)?;
                    self.buffer.drain(..valid_up_to);
                }
            }
        }
    }

    fn encode_and_write(&mut self, text: &str) -> io::Result<()> {
        let (encoded, _output_encoding, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to encode text using {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(encoded.as_ref())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.flush_buffer(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer(true)?;
        self.inner.flush()
    }
}
