use crate::error::ParseError;
use crate::model::{Field, Origin, RawRecord};

/// Accepted header names per logical field, checked case-insensitively in
/// list order.
pub const COLUMN_SYNONYMS: &[(Field, &[&str])] = &[
    (Field::IfcGuid, &["IfcGUID", "ifc_guid", "GlobalId", "GUID"]),
    (Field::Name, &["Name", "Nombre"]),
    (Field::Mark, &["Marca", "Mark"]),
    (Field::Discipline, &["Discipline", "Disciplina"]),
    (
        Field::TypeName,
        &["Nombre de tipo", "nombre_tipo", "Type Name", "NombreTipo"],
    ),
    (
        Field::TypeGuid,
        &["Tipo IfcGUID", "tipo_ifc_guid", "Type IfcGUID"],
    ),
    (Field::Operation, &["Operacion", "Operación", "Operation"]),
    (
        Field::IfcClass,
        &["IFC Class", "ifc_class", "IfcClass", "Clase IFC"],
    ),
    (Field::Category, &["Category", "Categoría", "categoria"]),
];

#[must_use]
pub fn synonyms(field: Field) -> &'static [&'static str] {
    COLUMN_SYNONYMS
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, names)| *names)
        .unwrap_or_default()
}

/// Resolved position of each logical field in a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    columns: Vec<(Field, usize)>,
}

impl ColumnMap {
    /// Matches `headers` against [`COLUMN_SYNONYMS`].
    ///
    /// Fails with [`ParseError::MissingColumns`] listing every required field
    /// without a match; unmatched optional fields are simply absent.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<Self, ParseError> {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| normalize_header(h.as_ref()))
            .collect();

        let mut columns = Vec::new();
        let mut missing = Vec::new();

        for (field, names) in COLUMN_SYNONYMS {
            let index = names.iter().find_map(|name| {
                let wanted = name.to_lowercase();
                normalized.iter().position(|h| *h == wanted)
            });
            match index {
                Some(i) => columns.push((*field, i)),
                None if field.is_required() => missing.push(*field),
                None => {}
            }
        }

        if !missing.is_empty() {
            return Err(ParseError::MissingColumns {
                accepted: missing
                    .iter()
                    .map(|f| format!("{f}: {}", synonyms(*f).join(", ")))
                    .collect(),
                missing: missing.iter().map(ToString::to_string).collect(),
                found: headers.iter().map(|h| h.as_ref().trim().to_string()).collect(),
            });
        }

        Ok(Self { columns })
    }

    #[must_use]
    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, i)| *i)
    }

    /// Picks the mapped cells out of one table row. Short rows leave the
    /// trailing fields absent.
    #[must_use]
    pub fn extract<S: AsRef<str>>(&self, origin: Origin, row: &[S]) -> RawRecord {
        let mut record = RawRecord::new(origin);
        for (field, index) in &self.columns {
            if let Some(cell) = row.get(*index) {
                record.set(*field, cell.as_ref());
            }
        }
        record
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}
