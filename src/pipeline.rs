//! The generation run: load → normalize → select → write.
//!
//! Loading and selection never touch the output directory, so a fatal
//! input error leaves no partial output behind.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::GenerateConfig;
use crate::error::{ExportError, ParseError, RecordError};
use crate::export::{write_hosting_config, write_label_sheet, write_site};
use crate::filter::{discipline_counts, filter_by_discipline};
use crate::model::ElementRecord;
use crate::parser::{normalize, parse_ifc_file, read_table, ColumnMap, InputEncoding, Normalized};

/// Input formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Delimited text exported from the model schedule.
    Table,
    /// IFC STEP model.
    Model,
}

impl InputKind {
    pub fn detect(path: &Path) -> Result<Self, ParseError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" | "tsv" | "txt" => Ok(Self::Table),
            "ifc" => Ok(Self::Model),
            _ => Err(ParseError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{extension}")
                },
            }),
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Table => f.write_str("table"),
            InputKind::Model => f.write_str("IFC model"),
        }
    }
}

/// Normalized records from one input file.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    pub kind: InputKind,
    pub normalized: Normalized,
    /// Model elements skipped for lacking a mark; always 0 for tables.
    pub unmarked: usize,
    /// Project name from the model header, when present.
    pub model_project_name: Option<String>,
}

/// Reads, resolves and normalizes an input file.
///
/// # Errors
///
/// Any [`ParseError`]: unreadable file, unsupported extension, undecodable
/// text, missing required columns or malformed STEP.
pub fn load_records(path: &Path, encoding: InputEncoding) -> Result<LoadedInput, ParseError> {
    let kind = InputKind::detect(path)?;
    info!("Reading {}", path.display());

    match kind {
        InputKind::Table => {
            let table = read_table(path, encoding)?;
            let columns = ColumnMap::resolve(&table.headers)?;
            debug!(
                "{} data row(s), delimiter {:?}, encoding {}",
                table.rows.len(),
                char::from(table.delimiter),
                table.encoding
            );
            Ok(LoadedInput {
                kind,
                normalized: normalize(table.records(&columns)),
                unmarked: 0,
                model_project_name: None,
            })
        }
        InputKind::Model => {
            let extraction = parse_ifc_file(path)?;
            debug!("Schema {}", extraction.schema);
            let project_name =
                Some(extraction.project_name).filter(|name| !name.trim().is_empty());
            Ok(LoadedInput {
                kind,
                normalized: normalize(extraction.records),
                unmarked: extraction.unmarked,
                model_project_name: project_name,
            })
        }
    }
}

/// Applies the optional discipline filter, failing when nothing is left to
/// generate.
///
/// # Errors
///
/// [`RecordError::NoValidRecords`] when normalization kept nothing;
/// [`RecordError::NoDisciplineMatch`] when the filter selects nothing.
pub fn select_records(
    normalized: &Normalized,
    discipline: Option<&str>,
) -> Result<Vec<ElementRecord>, RecordError> {
    if normalized.records.is_empty() {
        return Err(RecordError::NoValidRecords {
            invalid: normalized.invalid,
            duplicates: normalized.duplicates,
        });
    }

    let Some(discipline) = discipline else {
        return Ok(normalized.records.clone());
    };

    let selected = filter_by_discipline(&normalized.records, discipline);
    if selected.is_empty() {
        return Err(RecordError::NoDisciplineMatch {
            discipline: discipline.trim().to_string(),
            available: discipline_counts(&normalized.records).into_keys().collect(),
        });
    }
    info!(
        "Discipline '{}': {} of {} element(s)",
        discipline.trim(),
        selected.len(),
        normalized.records.len()
    );
    Ok(selected)
}

/// Paths and counts of what a run wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedOutput {
    pub site_dir: Option<PathBuf>,
    pub site_pages: usize,
    pub hosting_config: Option<PathBuf>,
    pub label_sheet: Option<PathBuf>,
}

/// Writes the site, its hosting config and the label sheet, each as enabled
/// in `config`.
pub fn generate(
    records: &[ElementRecord],
    config: &GenerateConfig,
) -> Result<GeneratedOutput, ExportError> {
    let mut output = GeneratedOutput::default();

    if config.generate_site {
        output.site_pages = write_site(records, config)?;
        output.site_dir = Some(config.site_dir());
        output.hosting_config = Some(write_hosting_config(&config.output_root)?);
    }

    if config.generate_labels {
        output.label_sheet = Some(write_label_sheet(records, config)?);
    }

    Ok(output)
}
