use crate::error::ParseError;
use crate::model::discipline::{
    canonical_class_name, category_for_class, discipline_for_class, UNCLASSIFIED,
};
use crate::model::{Field, Origin, RawRecord};
use crate::parser::step::{StepEntity, StepFile};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Property names that hold an element's mark, in lookup order.
const MARK_PROPERTIES: &[&str] = &["Marca", "Mark", "marca"];

/// Property names that hold an element's operation.
const OPERATION_PROPERTIES: &[&str] = &["Operacion", "Operación", "Operation Type"];

/// Spatial structure entities never get labels.
const SKIPPED_ENTITIES: &[&str] = &[
    "IFCPROJECT",
    "IFCSITE",
    "IFCBUILDING",
    "IFCBUILDINGSTOREY",
    "IFCSPACE",
];

/// Markable elements extracted from a model file.
#[derive(Debug, Clone)]
pub struct IfcExtraction {
    pub project_name: String,
    pub schema: String,
    pub records: Vec<RawRecord>,
    /// Candidate elements that carry no mark property at all.
    pub unmarked: usize,
}

/// One property set attached to an element, properties in file order.
#[derive(Debug, Clone, Default)]
struct PropertySet {
    properties: Vec<(String, String)>,
}

impl PropertySet {
    fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| {
            self.properties
                .iter()
                .find(|(k, v)| k == name && !v.trim().is_empty())
                .map(|(_, v)| v.as_str())
        })
    }
}

/// Parses an IFC file and extracts every element that carries a mark.
///
/// Elements are candidates when a property set is attached to them and they
/// are neither type objects nor spatial structure. Candidates without a
/// `Marca`/`Mark` property are excluded and counted, not reported as errors.
/// Discipline and category come from the IFC class.
///
/// # Errors
///
/// Returns [`ParseError::FileRead`] if the file cannot be read.
/// Returns [`ParseError::InvalidStep`] if the STEP format is malformed.
///
/// # Example
///
/// ```no_run
/// use bim_qr::parser::parse_ifc_file;
///
/// let extraction = parse_ifc_file("model.ifc")?;
/// println!("{} marked elements", extraction.records.len());
/// # Ok::<(), bim_qr::error::ParseError>(())
/// ```
pub fn parse_ifc_file<P: AsRef<Path>>(path: P) -> Result<IfcExtraction, ParseError> {
    let bytes = std::fs::read(&path).map_err(|source| ParseError::FileRead {
        path: path.as_ref().to_path_buf(),
        source,
    })?;
    // STEP text should be 7-bit; some exporters still write raw UTF-8 or Latin-1.
    let content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => encoding_rs::WINDOWS_1252
            .decode_without_bom_handling(err.as_bytes())
            .0
            .into_owned(),
    };

    let extraction = extract_marked_elements(&StepFile::parse(&content)?);
    info!(
        "IFC: {} marked element(s) extracted ({} without mark)",
        extraction.records.len(),
        extraction.unmarked
    );
    Ok(extraction)
}

/// Extracts marked elements from an already parsed STEP file.
#[must_use]
pub fn extract_marked_elements(step_file: &StepFile) -> IfcExtraction {
    let property_sets = extract_property_sets(step_file);
    let element_types = extract_type_relationships(step_file);

    let mut records = Vec::new();
    let mut unmarked = 0;

    for (element_id, psets) in &property_sets {
        let Some(entity) = step_file.get_entity(*element_id) else {
            continue;
        };
        if !is_candidate(entity) {
            continue;
        }

        let Some(mark) = psets.iter().find_map(|p| p.first_of(MARK_PROPERTIES)) else {
            unmarked += 1;
            continue;
        };

        let class = canonical_class_name(&entity.entity_type);
        let discipline = discipline_for_class(&class).unwrap_or(UNCLASSIFIED);

        let mut record = RawRecord::new(Origin::Entity(entity.id))
            .with(Field::IfcGuid, entity.str_at(0).unwrap_or_default())
            .with(Field::Name, entity.str_at(2).unwrap_or_default())
            .with(Field::Mark, mark)
            .with(Field::Discipline, discipline)
            .with(Field::Category, category_for_class(&class))
            .with(Field::IfcClass, class);

        if let Some(type_entity) = element_types
            .get(&entity.id)
            .and_then(|id| step_file.get_entity(*id))
        {
            record.set(Field::TypeName, type_entity.str_at(2).unwrap_or_default());
            record.set(Field::TypeGuid, type_entity.str_at(0).unwrap_or_default());
        }

        if let Some(operation) = psets.iter().find_map(|p| p.first_of(OPERATION_PROPERTIES)) {
            record.set(Field::Operation, operation);
        }

        for pset in psets {
            for (name, value) in &pset.properties {
                let reserved = MARK_PROPERTIES.contains(&name.as_str())
                    || OPERATION_PROPERTIES.contains(&name.as_str())
                    || name == "id";
                if !reserved && !value.trim().is_empty() {
                    record.properties.insert(name.clone(), value.clone());
                }
            }
        }

        records.push(record);
    }

    debug!(
        "{} element(s) with property sets, {} marked",
        property_sets.len(),
        records.len()
    );

    IfcExtraction {
        project_name: extract_project_name(step_file),
        schema: step_file.schema.clone(),
        records,
        unmarked,
    }
}

fn is_candidate(entity: &StepEntity) -> bool {
    let kind = entity.entity_type.as_str();
    if SKIPPED_ENTITIES.contains(&kind) {
        return false;
    }
    // Type objects (IFCDOORTYPE, IFCWINDOWSTYLE, ...) carry psets too.
    if kind.ends_with("TYPE") || kind.ends_with("STYLE") {
        return false;
    }
    entity.str_at(0).is_some_and(|guid| !guid.trim().is_empty())
}

fn extract_project_name(step_file: &StepFile) -> String {
    step_file
        .get_entities_by_type("IFCPROJECT")
        .first()
        .and_then(|e| e.str_at(2).or_else(|| e.str_at(5)))
        .unwrap_or("Unknown Project")
        .to_string()
}

/// element id → type object id, from IFCRELDEFINESBYTYPE.
fn extract_type_relationships(step_file: &StepFile) -> HashMap<u64, u64> {
    let mut element_types = HashMap::new();

    for rel in step_file.get_entities_by_type("IFCRELDEFINESBYTYPE") {
        // Index 4 = RelatedObjects, index 5 = RelatingType
        if let Some(type_id) = rel.ref_at(5) {
            for element_id in rel.refs_at(4) {
                element_types.entry(element_id).or_insert(type_id);
            }
        }
    }

    element_types
}

/// element id → property sets, from IFCRELDEFINESBYPROPERTIES. Ordered by
/// element id so extraction is deterministic.
fn extract_property_sets(step_file: &StepFile) -> BTreeMap<u64, Vec<PropertySet>> {
    let mut pset_props: HashMap<u64, PropertySet> = HashMap::new();

    for pset in step_file.get_entities_by_type("IFCPROPERTYSET") {
        let mut set = PropertySet::default();

        for prop_id in pset.refs_at(4) {
            let Some(prop) = step_file.get_entity(prop_id) else {
                continue;
            };
            if prop.entity_type != "IFCPROPERTYSINGLEVALUE" {
                continue;
            }
            let name = prop.str_at(0).unwrap_or_default().trim();
            if name.is_empty() {
                continue;
            }
            let value = prop
                .values
                .get(2)
                .map(|v| v.display_text().trim().to_string())
                .unwrap_or_default();
            set.properties.push((name.to_string(), value));
        }

        pset_props.insert(pset.id, set);
    }

    let mut element_psets: BTreeMap<u64, Vec<PropertySet>> = BTreeMap::new();

    for rel in step_file.get_entities_by_type("IFCRELDEFINESBYPROPERTIES") {
        // Index 4 = RelatedObjects, index 5 = RelatingPropertyDefinition
        let Some(set) = rel.ref_at(5).and_then(|id| pset_props.get(&id)) else {
            continue;
        };
        for element_id in rel.refs_at(4) {
            element_psets.entry(element_id).or_default().push(set.clone());
        }
    }

    element_psets
}
