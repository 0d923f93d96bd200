//! I/O utilities for CSV reading, writing, and encoding resolution.
//!
//! Every CSV the pipeline touches flows through this module:
//!
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Byte-order marks**: a leading UTF-8 signature is stripped on read and
//!   written on request, since the curated output is consumed by tools that
//!   expect `utf-8-sig`.
//! - **Quoting**: output uses `QuoteStyle::Necessary` to stay byte-compatible
//!   with the staging files produced upstream.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_csv_reader<R>(reader: R) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(b',')
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = Box::new(BufReader::new(
        File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
    ));
    Ok(open_csv_reader(reader))
}

pub fn open_csv_writer(path: &Path, with_bom: bool) -> Result<csv::Writer<Box<dyn Write>>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating output directory {parent:?}"))?;
    }
    let mut base: Box<dyn Write> = Box::new(BufWriter::new(
        File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
    ));
    if with_bom {
        base.write_all(UTF8_BOM)
            .with_context(|| format!("Writing byte-order mark to {path:?}"))?;
    }

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(b',')
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(base))
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
    let mut decoded = decode_record(&headers, encoding)?;
    if let Some(first) = decoded.first_mut() {
        *first = first.trim_start_matches('\u{feff}').to_string();
    }
    Ok(decoded)
}

/// Reads a whole CSV file as decoded strings, returning headers and rows.
pub fn read_all(path: &Path, encoding: &'static Encoding) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = open_csv_reader_from_path(path)?;
    let headers = reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} in {path:?}", row_idx + 2))?;
        rows.push(decode_record(&record, encoding)?);
    }
    Ok((headers, rows))
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating output directory {parent:?}"))?;
    }
    fs::write(path, contents).with_context(|| format!("Writing {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_all_strips_utf8_signature_from_first_header() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bom.csv");
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("Departamento,Pobreza_2024\nANTIOQUIA,25.3\n".as_bytes());
        fs::write(&path, bytes).expect("write csv");

        let (headers, rows) = read_all(&path, UTF_8).expect("read csv");
        assert_eq!(headers, vec!["Departamento", "Pobreza_2024"]);
        assert_eq!(rows, vec![vec!["ANTIOQUIA".to_string(), "25.3".to_string()]]);
    }

    #[test]
    fn writer_emits_signature_when_requested() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("out.csv");
        {
            let mut writer = open_csv_writer(&path, true).expect("writer");
            writer.write_record(["a", "b, c"]).expect("row");
            writer.flush().expect("flush");
        }
        let bytes = fs::read(&path).expect("read back");
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(&bytes[3..], b"a,\"b, c\"\n");
    }

    #[test]
    fn resolve_encoding_rejects_unknown_labels() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(
            resolve_encoding(Some("latin1")).unwrap().name(),
            "windows-1252"
        );
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
