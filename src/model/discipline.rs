//! Built-in IFC class catalogue: which discipline and category each
//! markable class belongs to.

/// Discipline assigned to model elements whose class is not catalogued.
pub const UNCLASSIFIED: &str = "Sin clasificar";

/// Discipline → IFC classes, in display order.
pub const DISCIPLINE_CLASSES: &[(&str, &[&str])] = &[
    (
        "Arquitectura",
        &[
            "IfcWall",
            "IfcWallStandardCase",
            "IfcDoor",
            "IfcWindow",
            "IfcSlab",
            "IfcRoof",
            "IfcStair",
            "IfcStairFlight",
            "IfcRailing",
            "IfcCovering",
            "IfcCurtainWall",
        ],
    ),
    (
        "Estructura",
        &["IfcBeam", "IfcColumn", "IfcFooting", "IfcPile", "IfcReinforcingBar"],
    ),
    (
        "Saneamiento-Fontaneria-Geotermia",
        &[
            "IfcPipeSegment",
            "IfcPipeFitting",
            "IfcSanitaryTerminal",
            "IfcValve",
            "IfcPump",
        ],
    ),
    (
        "Climatizacion-Ventilacion",
        &[
            "IfcDuctSegment",
            "IfcDuctFitting",
            "IfcAirTerminal",
            "IfcFan",
            "IfcCoil",
        ],
    ),
    (
        "PCI-Gases Medicinales",
        &["IfcFireSuppressionTerminal", "IfcAlarm", "IfcDetector"],
    ),
    (
        "Electricidad",
        &[
            "IfcCableSegment",
            "IfcCableFitting",
            "IfcElectricDistributionBoard",
            "IfcLightFixture",
            "IfcOutlet",
            "IfcSwitchingDevice",
        ],
    ),
];

const CLASS_CATEGORIES: &[(&str, &str)] = &[
    ("IfcWall", "Muros"),
    ("IfcWallStandardCase", "Muros"),
    ("IfcDoor", "Puertas"),
    ("IfcWindow", "Ventanas"),
    ("IfcSlab", "Forjados"),
    ("IfcRoof", "Cubiertas"),
    ("IfcStair", "Escaleras"),
    ("IfcRailing", "Barandillas"),
    ("IfcCovering", "Revestimientos"),
    ("IfcCurtainWall", "Muros cortina"),
    ("IfcBeam", "Vigas"),
    ("IfcColumn", "Pilares"),
    ("IfcFooting", "Cimentaciones"),
    ("IfcPipeSegment", "Tuberías"),
    ("IfcSanitaryTerminal", "Aparatos sanitarios"),
    ("IfcValve", "Válvulas"),
    ("IfcDuctSegment", "Conductos"),
    ("IfcAirTerminal", "Difusores"),
    ("IfcLightFixture", "Luminarias"),
    ("IfcOutlet", "Tomas de corriente"),
    ("IfcSwitchingDevice", "Interruptores"),
    ("IfcFireSuppressionTerminal", "Rociadores"),
];

// Classes that are not discipline-specific but still commonly carry marks.
const EXTRA_CLASSES: &[&str] = &[
    "IfcFurnishingElement",
    "IfcFlowTerminal",
    "IfcFlowFixture",
    "IfcBuildingElementProxy",
    "IfcMember",
    "IfcPlate",
];

fn known_classes() -> impl Iterator<Item = &'static str> {
    DISCIPLINE_CLASSES
        .iter()
        .flat_map(|(_, classes)| classes.iter().copied())
        .chain(EXTRA_CLASSES.iter().copied())
}

/// Maps a STEP entity keyword (`IFCWALL`) to its schema spelling (`IfcWall`).
///
/// Uncatalogued classes fall back to `Ifc` + the rest in lower case.
#[must_use]
pub fn canonical_class_name(entity_type: &str) -> String {
    if let Some(known) = known_classes().find(|c| c.eq_ignore_ascii_case(entity_type)) {
        return known.to_string();
    }
    let lower = entity_type.to_ascii_lowercase();
    match lower.strip_prefix("ifc") {
        Some(rest) => {
            let mut chars = rest.chars();
            match chars.next() {
                Some(first) => format!("Ifc{}{}", first.to_ascii_uppercase(), chars.as_str()),
                None => "Ifc".to_string(),
            }
        }
        None => entity_type.to_string(),
    }
}

#[must_use]
pub fn discipline_for_class(class: &str) -> Option<&'static str> {
    DISCIPLINE_CLASSES
        .iter()
        .find(|(_, classes)| classes.iter().any(|c| c.eq_ignore_ascii_case(class)))
        .map(|(discipline, _)| *discipline)
}

/// Category label for a class; uncatalogued classes use the class name
/// without its `Ifc` prefix.
#[must_use]
pub fn category_for_class(class: &str) -> String {
    CLASS_CATEGORIES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(class))
        .map_or_else(|| class.replace("Ifc", ""), |(_, category)| (*category).to_string())
}
