//! Raw rows → validated, de-duplicated element records.
//!
//! Rows are processed in source order. A row is rejected as invalid when a
//! required field is empty after trimming or its mark cannot be used as a
//! URL path segment. A row whose mark was already accepted is rejected as a
//! duplicate; the first occurrence stays authoritative.

use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use crate::model::{ElementRecord, Field, Origin, RawRecord};

/// Characters that cannot appear in a mark, since marks become directory
/// names and URL path segments.
const FORBIDDEN_MARK_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// How many duplicate marks to name in the log before summarizing.
const DUPLICATES_LOGGED: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// A required field is absent or blank.
    MissingField(Field),
    /// The mark contains path separators, reserved characters or `..`.
    UnsafeMark(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::MissingField(field) => write!(f, "empty required field '{field}'"),
            InvalidReason::UnsafeMark(mark) => write!(f, "mark '{mark}' is not usable in a URL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Invalid(InvalidReason),
    DuplicateMark { mark: String, first: Origin },
}

/// A non-fatal rejection, kept for the run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIssue {
    pub origin: Origin,
    pub kind: IssueKind,
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::Invalid(reason) => write!(f, "{}: {reason}", self.origin),
            IssueKind::DuplicateMark { mark, first } => {
                write!(f, "{}: duplicate mark '{mark}' (kept {first})", self.origin)
            }
        }
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<ElementRecord>,
    pub invalid: usize,
    pub duplicates: usize,
    pub issues: Vec<RecordIssue>,
}

impl Normalized {
    /// Marks that were seen more than once, sorted and de-duplicated.
    #[must_use]
    pub fn duplicate_marks(&self) -> Vec<&str> {
        let mut marks: Vec<&str> = self
            .issues
            .iter()
            .filter_map(|issue| match &issue.kind {
                IssueKind::DuplicateMark { mark, .. } => Some(mark.as_str()),
                IssueKind::Invalid(_) => None,
            })
            .collect();
        marks.sort_unstable();
        marks.dedup();
        marks
    }
}

/// Validates raw records and enforces mark uniqueness.
pub fn normalize<I>(raw: I) -> Normalized
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut out = Normalized::default();
    let mut seen: HashMap<String, Origin> = HashMap::new();

    for record in raw {
        let origin = record.origin;
        let element = match build_record(&record) {
            Ok(element) => element,
            Err(reason) => {
                out.invalid += 1;
                out.issues.push(RecordIssue {
                    origin,
                    kind: IssueKind::Invalid(reason),
                });
                continue;
            }
        };

        if let Some(first) = seen.get(&element.mark) {
            out.duplicates += 1;
            out.issues.push(RecordIssue {
                origin,
                kind: IssueKind::DuplicateMark {
                    mark: element.mark,
                    first: *first,
                },
            });
            continue;
        }

        seen.insert(element.mark.clone(), origin);
        out.records.push(element);
    }

    log_duplicates(&out);
    out
}

fn build_record(raw: &RawRecord) -> Result<ElementRecord, InvalidReason> {
    let required = |field: Field| -> Result<String, InvalidReason> {
        match raw.get(field).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(InvalidReason::MissingField(field)),
        }
    };
    let optional = |field: Field| -> Option<String> {
        raw.get(field)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let ifc_guid = required(Field::IfcGuid)?;
    let name = required(Field::Name)?;
    let mark = required(Field::Mark)?;
    let discipline = required(Field::Discipline)?;

    if !is_safe_mark(&mark) {
        return Err(InvalidReason::UnsafeMark(mark));
    }

    Ok(ElementRecord {
        ifc_guid,
        name,
        mark,
        discipline,
        type_name: optional(Field::TypeName),
        type_guid: optional(Field::TypeGuid),
        ifc_class: optional(Field::IfcClass),
        category: optional(Field::Category),
        operation: optional(Field::Operation),
        properties: raw
            .properties
            .iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect(),
    })
}

/// Whether a trimmed mark can be used as a single path segment.
#[must_use]
pub fn is_safe_mark(mark: &str) -> bool {
    !mark.is_empty()
        && !mark.contains("..")
        && !mark
            .chars()
            .any(|c| c.is_control() || FORBIDDEN_MARK_CHARS.contains(&c))
}

fn log_duplicates(out: &Normalized) {
    if out.duplicates == 0 {
        return;
    }
    let marks = out.duplicate_marks();
    warn!(
        "{} duplicate mark(s) found, keeping the first occurrence",
        out.duplicates
    );
    for mark in marks.iter().take(DUPLICATES_LOGGED) {
        warn!("  duplicate mark: {mark}");
    }
    if marks.len() > DUPLICATES_LOGGED {
        warn!("  ... and {} more", marks.len() - DUPLICATES_LOGGED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(line: u64, guid: &str, name: &str, mark: &str, discipline: &str) -> RawRecord {
        RawRecord::new(Origin::Line(line))
            .with(Field::IfcGuid, guid)
            .with(Field::Name, name)
            .with(Field::Mark, mark)
            .with(Field::Discipline, discipline)
    }

    fn marks(normalized: &Normalized) -> Vec<&str> {
        normalized.records.iter().map(|r| r.mark.as_str()).collect()
    }

    #[test]
    fn test_valid_rows_keep_source_order() {
        let out = normalize(vec![
            row(2, "G1", "Puerta", "PA2", "Arquitectura"),
            row(3, "G2", "Ventana", "VE1", "Arquitectura"),
            row(4, "G3", "Pilar", "PI1", "Estructura"),
        ]);
        assert_eq!(marks(&out), vec!["PA2", "VE1", "PI1"]);
        assert_eq!(out.invalid, 0);
        assert_eq!(out.duplicates, 0);
    }

    #[test]
    fn test_twelve_rows_one_missing_mark_one_duplicate() {
        let mut rows: Vec<RawRecord> = (0..12u64)
            .map(|i| {
                row(
                    i + 2,
                    &format!("G{i}"),
                    &format!("Elemento {i}"),
                    &format!("PA{}", 100 + i),
                    "Arquitectura",
                )
            })
            .collect();
        // PA107 appears twice
        rows[8] = row(10, "G8", "Elemento 8", "PA107", "Arquitectura");
        // one row has no Marca at all
        rows[3] = RawRecord::new(Origin::Line(5))
            .with(Field::IfcGuid, "G3")
            .with(Field::Name, "Sin marca")
            .with(Field::Discipline, "Arquitectura");

        let out = normalize(rows);
        assert_eq!(out.records.len(), 10);
        assert_eq!(out.invalid, 1);
        assert_eq!(out.duplicates, 1);
        assert_eq!(out.duplicate_marks(), vec!["PA107"]);
        let first = out.records.iter().find(|r| r.mark == "PA107").unwrap();
        assert_eq!(first.name, "Elemento 7");
    }

    #[test]
    fn test_first_duplicate_wins() {
        let out = normalize(vec![
            row(2, "G1", "Puerta A", "PA001", "Arquitectura"),
            row(3, "G2", "Puerta B", "PA001", "Arquitectura"),
            row(4, "G3", "Ventana A", "VE001", "Arquitectura"),
            row(5, "G4", "Puerta C", "PA001", "Arquitectura"),
        ]);
        assert_eq!(marks(&out), vec!["PA001", "VE001"]);
        assert_eq!(out.records[0].name, "Puerta A");
        assert_eq!(out.duplicates, 2);
        assert_eq!(
            out.issues[0].kind,
            IssueKind::DuplicateMark {
                mark: "PA001".to_string(),
                first: Origin::Line(2)
            }
        );
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let out = normalize(vec![
            row(2, "G1", "   ", "PA1", "Arquitectura"),
            row(3, "G2", "Puerta", "\t", "Arquitectura"),
            row(4, "  ", "Puerta", "PA3", "Arquitectura"),
            row(5, "G4", "Puerta", "PA4", " "),
        ]);
        assert!(out.records.is_empty());
        assert_eq!(out.invalid, 4);
        assert_eq!(
            out.issues[1].kind,
            IssueKind::Invalid(InvalidReason::MissingField(Field::Mark))
        );
    }

    #[test]
    fn test_fields_are_trimmed() {
        let out = normalize(vec![row(2, " G1 ", " Puerta ", "  PA107  ", " Arquitectura ")
            .with(Field::Category, "  ")
            .with(Field::TypeName, " 210x120 ")]);
        let record = &out.records[0];
        assert_eq!(record.mark, "PA107");
        assert_eq!(record.name, "Puerta");
        assert_eq!(record.type_name.as_deref(), Some("210x120"));
        assert_eq!(record.category, None);
    }

    #[test]
    fn test_duplicate_detected_after_trimming() {
        let out = normalize(vec![
            row(2, "G1", "A", "PA1", "Arquitectura"),
            row(3, "G2", "B", " PA1 ", "Arquitectura"),
        ]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.duplicates, 1);
    }

    #[test]
    fn test_unsafe_marks_rejected() {
        for mark in ["../etc/passwd", "PA/107", "PA\\107", "PA<107>", "PA\"107", "PA:107", "PA|107", "PA?107", "PA*107"] {
            let out = normalize(vec![row(2, "G1", "A", mark, "Arquitectura")]);
            assert_eq!(out.invalid, 1, "mark {mark} should be rejected");
        }
    }

    #[test]
    fn test_safe_marks_accepted() {
        assert!(is_safe_mark("PA107"));
        assert!(is_safe_mark("PA-107"));
        assert!(is_safe_mark("Tubería-1"));
        assert!(!is_safe_mark(""));
    }

    #[test]
    fn test_empty_input() {
        let out = normalize(Vec::new());
        assert!(out.records.is_empty());
        assert_eq!(out.invalid + out.duplicates, 0);
    }
}
