//! CSV row sourcing and output plumbing.
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Row streams**: [`read_rows`] yields the header row first and then each
//!   record, decoded to strings, lazily, for schema inference.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

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

/// Headers are returned as an ordinary record so callers see them first.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
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

/// Lazily decoded rows of `path`: header first, then data records. Reading
/// stops as soon as the consumer stops pulling.
pub fn read_rows(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<impl Iterator<Item = Result<Vec<String>>>> {
    let reader = open_csv_reader_from_path(path, delimiter)?;
    let display = path.display().to_string();
    Ok(reader
        .into_byte_records()
        .enumerate()
        .map(move |(idx, record)| {
            let record = record.with_context(|| format!("Reading {display} line {}", idx + 1))?;
            let mut decoded = decode_record(&record, encoding)?;
            if idx == 0
                && let Some(first) = decoded.first_mut()
            {
                // Drop a UTF-8 byte order mark from the first header.
                *first = first.trim_start_matches('\u{feff}').to_string();
            }
            Ok(decoded)
        }))
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn delimiter_defaults_follow_extension() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
    }

    #[test]
    fn read_rows_yields_header_then_ragged_records() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "\u{feff}id,name").unwrap();
        writeln!(file, "1,alpha").unwrap();
        writeln!(file, "2").unwrap();
        let rows: Vec<_> = read_rows(file.path(), b',', UTF_8)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows[0], vec!["id", "name"]);
        assert_eq!(rows[1], vec!["1", "alpha"]);
        assert_eq!(rows[2], vec!["2"]);
    }

    #[test]
    fn read_rows_decodes_configured_encoding() {
        let mut file = NamedTempFile::new().expect("temp file");
        let (encoded, _, _) = WINDOWS_1252.encode("name\nCaf\u{e9}\n");
        file.write_all(&encoded).unwrap();
        let rows: Vec<_> = read_rows(file.path(), b',', WINDOWS_1252)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows[1], vec!["Caf\u{e9}"]);
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(resolve_encoding(Some("klingon")).is_err());
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
    }
}
