use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One building element, normalized and ready for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementRecord {
    pub ifc_guid: String,
    pub name: String,
    pub mark: String,
    pub discipline: String,
    pub type_name: Option<String>,
    pub type_guid: Option<String>,
    pub ifc_class: Option<String>,
    pub category: Option<String>,
    pub operation: Option<String>,
    pub properties: BTreeMap<String, String>,
}

impl ElementRecord {
    /// Builds a record with only the required fields set.
    #[must_use]
    pub fn new(ifc_guid: &str, name: &str, mark: &str, discipline: &str) -> Self {
        Self {
            ifc_guid: ifc_guid.to_string(),
            name: name.to_string(),
            mark: mark.to_string(),
            discipline: discipline.to_string(),
            type_name: None,
            type_guid: None,
            ifc_class: None,
            category: None,
            operation: None,
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn category_or_empty(&self) -> &str {
        self.category.as_deref().unwrap_or_default()
    }
}

const FIELD_COUNT: usize = 9;

/// Logical columns of an element schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    IfcGuid,
    Name,
    Mark,
    Discipline,
    TypeName,
    TypeGuid,
    IfcClass,
    Category,
    Operation,
}

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::IfcGuid,
        Field::Name,
        Field::Mark,
        Field::Discipline,
        Field::TypeName,
        Field::TypeGuid,
        Field::IfcClass,
        Field::Category,
        Field::Operation,
    ];

    pub const REQUIRED: [Field; 4] = [Field::IfcGuid, Field::Name, Field::Mark, Field::Discipline];

    #[must_use]
    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Field::IfcGuid => "ifc_guid",
            Field::Name => "name",
            Field::Mark => "mark",
            Field::Discipline => "discipline",
            Field::TypeName => "type_name",
            Field::TypeGuid => "type_guid",
            Field::IfcClass => "ifc_class",
            Field::Category => "category",
            Field::Operation => "operation",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a raw record came from, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// 1-based line in a delimited table.
    Line(u64),
    /// STEP entity id in a model file.
    Entity(u64),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Line(line) => write!(f, "line {line}"),
            Origin::Entity(id) => write!(f, "entity #{id}"),
        }
    }
}

/// An un-normalized row: whatever the source had for each field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub origin: Origin,
    values: [Option<String>; FIELD_COUNT],
    pub properties: BTreeMap<String, String>,
}

impl RawRecord {
    #[must_use]
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            values: Default::default(),
            properties: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values[field.index()] = Some(value.into());
    }

    #[must_use]
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    #[must_use]
    pub fn get(&self, field: Field) -> Option<&str> {
        self.values[field.index()].as_deref()
    }
}
