//! Error types for the BIM QR generator.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading an input table or model file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read the input file from disk.
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input bytes are not in a supported text encoding.
    #[error("cannot decode '{path}': {message}; save the file as UTF-8 and retry")]
    Decode { path: PathBuf, message: String },

    /// The file extension is not one of the accepted input formats.
    #[error("unsupported input format '{extension}' (accepted: .csv, .tsv, .txt, .ifc)")]
    UnsupportedFormat { extension: String },

    /// One or more required logical fields have no matching column.
    #[error(
        "required columns not found: {}\n  accepted names: {}\n  columns in file: {}",
        .missing.join(", "),
        .accepted.join("; "),
        .found.join(", ")
    )]
    MissingColumns {
        missing: Vec<String>,
        accepted: Vec<String>,
        found: Vec<String>,
    },

    /// The delimited text could not be tokenized.
    #[error("CSV read failed: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    /// The STEP format is invalid or malformed.
    #[error("invalid STEP format: {message}")]
    InvalidStep { message: String },
}

/// Fatal conditions found after normalization.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Every row was rejected.
    #[error(
        "no valid elements found ({invalid} invalid, {duplicates} duplicate); \
         check that the file has data in the columns IfcGUID, Name, Marca, Disciplina"
    )]
    NoValidRecords { invalid: usize, duplicates: usize },

    /// The discipline filter selected nothing.
    #[error("no element matches discipline '{discipline}' (disciplines in file: {})", .available.join(", "))]
    NoDisciplineMatch {
        discipline: String,
        available: Vec<String>,
    },
}

/// Errors in user-supplied settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base URL is unparseable or not http(s).
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The label grid does not fit on the page.
    #[error("invalid label layout: {message}")]
    InvalidLayout { message: String },
}

/// Errors that can occur when writing output files.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed to create an output directory.
    #[error("failed to create directory '{path}': {source}")]
    DirCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write an output file.
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a template override.
    #[error("failed to read template '{path}': {source}")]
    TemplateRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A page template does not compile.
    #[error("invalid template: {source}")]
    Template {
        #[from]
        source: Box<handlebars::TemplateError>,
    },

    /// A page template failed to render.
    #[error("template rendering failed: {source}")]
    Render {
        #[from]
        source: Box<handlebars::RenderError>,
    },

    /// A lookup URL could not be encoded as a QR symbol.
    #[error("QR encoding failed for '{payload}': {source}")]
    Qr {
        payload: String,
        source: qrcode::types::QrError,
    },

    /// A lookup URL could not be built for a mark.
    #[error("cannot build lookup URL for mark '{mark}'")]
    LookupUrl { mark: String },

    /// The PDF backend failed.
    #[error("PDF generation failed: {message}")]
    Pdf { message: String },

    /// Failed to serialize data to JSON.
    #[error("JSON serialization failed: {source}")]
    JsonSerialize {
        #[from]
        source: serde_json::Error,
    },
}

impl From<handlebars::TemplateError> for ExportError {
    fn from(source: handlebars::TemplateError) -> Self {
        Self::Template {
            source: Box::new(source),
        }
    }
}

impl From<handlebars::RenderError> for ExportError {
    fn from(source: handlebars::RenderError) -> Self {
        Self::Render {
            source: Box::new(source),
        }
    }
}
