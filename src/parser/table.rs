use std::borrow::Cow;
use std::path::Path;

use tracing::debug;

use crate::error::ParseError;
use crate::model::{Origin, RawRecord};
use crate::parser::columns::ColumnMap;

/// How to decode the bytes of a delimited table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputEncoding {
    /// UTF-8, falling back to Windows-1252 when the bytes are not valid UTF-8.
    #[default]
    Auto,
    /// Strict UTF-8.
    Utf8,
    /// Windows-1252 (Excel's default "CSV" export on Spanish Windows).
    Windows1252,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub line: u64,
    pub cells: Vec<String>,
}

/// A decoded delimited table: header row plus data rows in source order.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
    pub delimiter: u8,
    pub encoding: &'static str,
}

impl RawTable {
    /// Raw records for every data row, through the resolved columns.
    pub fn records<'a>(&'a self, columns: &'a ColumnMap) -> impl Iterator<Item = RawRecord> + 'a {
        self.rows
            .iter()
            .map(move |row| columns.extract(Origin::Line(row.line), &row.cells))
    }
}

/// Reads and decodes a delimited table from disk.
pub fn read_table<P: AsRef<Path>>(path: P, encoding: InputEncoding) -> Result<RawTable, ParseError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ParseError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let (text, encoding_name) =
        decode_text(&bytes, encoding).map_err(|message| ParseError::Decode {
            path: path.to_path_buf(),
            message,
        })?;
    debug!("Decoded {} as {}", path.display(), encoding_name);

    let mut table = parse_table(&text)?;
    table.encoding = encoding_name;
    Ok(table)
}

/// Decodes table bytes, returning the text and the name of the encoding used.
pub fn decode_text(bytes: &[u8], encoding: InputEncoding) -> Result<(Cow<'_, str>, &'static str), String> {
    if bytes.starts_with(&[0xFF, 0xFE]) || bytes.starts_with(&[0xFE, 0xFF]) {
        return Err("UTF-16 text is not supported".to_string());
    }
    if bytes.contains(&0) {
        return Err("file contains NUL bytes and is not a text table".to_string());
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    let utf8 = || {
        encoding_rs::UTF_8
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| (text, "UTF-8"))
    };
    let windows_1252 = || {
        let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
        (text, "windows-1252")
    };

    match encoding {
        InputEncoding::Utf8 => utf8().ok_or_else(|| {
            let valid = std::str::from_utf8(bytes).map_or_else(|e| e.valid_up_to(), str::len);
            format!("invalid UTF-8 at byte {valid}")
        }),
        InputEncoding::Windows1252 => Ok(windows_1252()),
        InputEncoding::Auto => Ok(utf8().unwrap_or_else(windows_1252)),
    }
}

/// Tokenizes decoded text. The delimiter is sniffed from the header line.
pub fn parse_table(text: &str) -> Result<RawTable, ParseError> {
    let delimiter = sniff_delimiter(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let line = record.position().map_or(0, csv::Position::line);
        rows.push(TableRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(RawTable {
        headers,
        rows,
        delimiter,
        encoding: "UTF-8",
    })
}

fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();

    let mut counts = [(b',', 0usize), (b';', 0), (b'\t', 0)];
    let mut in_quotes = false;
    for byte in header.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(entry) = counts.iter_mut().find(|(d, _)| *d == byte) {
            entry.1 += 1;
        }
    }

    // max_by_key keeps the last maximum, so scan in reverse to prefer ','
    counts
        .iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .filter(|(_, n)| *n > 0)
        .map_or(b',', |(d, _)| *d)
}
