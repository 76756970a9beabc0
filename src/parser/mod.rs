pub mod columns;
pub mod ifc;
pub mod normalize;
pub mod step;
pub mod table;

pub use crate::error::ParseError;
pub use columns::{ColumnMap, COLUMN_SYNONYMS};
pub use ifc::{extract_marked_elements, parse_ifc_file, IfcExtraction};
pub use normalize::{is_safe_mark, normalize, InvalidReason, IssueKind, Normalized, RecordIssue};
pub use step::{StepEntity, StepFile, StepValue};
pub use table::{read_table, InputEncoding, RawTable};
