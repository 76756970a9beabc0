use std::collections::BTreeMap;

use crate::model::ElementRecord;

/// Records whose discipline equals `discipline`, ignoring case and
/// surrounding whitespace. An unmatched discipline yields an empty result.
#[must_use]
pub fn filter_by_discipline(records: &[ElementRecord], discipline: &str) -> Vec<ElementRecord> {
    let wanted = discipline.trim().to_lowercase();
    records
        .iter()
        .filter(|r| r.discipline.to_lowercase() == wanted)
        .cloned()
        .collect()
}

/// Record count per discipline, sorted by discipline name.
#[must_use]
pub fn discipline_counts(records: &[ElementRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.discipline.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn records() -> Vec<ElementRecord> {
        let disciplines = [
            "Arquitectura",
            "Estructura",
            "arquitectura",
            "Arquitectura",
            "Electricidad",
            "ARQUITECTURA",
            "Arquitectura",
            "Estructura",
            "Arquitectura",
            "Climatizacion-Ventilacion",
            "Arquitectura",
            "Electricidad",
        ];
        disciplines
            .iter()
            .enumerate()
            .map(|(i, d)| ElementRecord::new(&format!("G{i}"), "Elemento", &format!("M{i}"), d))
            .collect()
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let filtered = filter_by_discipline(&records(), "Arquitectura");
        assert_eq!(filtered.len(), 7);
        assert!(filtered
            .iter()
            .all(|r| r.discipline.eq_ignore_ascii_case("arquitectura")));
    }

    #[test]
    fn test_filter_keeps_order() {
        let filtered = filter_by_discipline(&records(), " estructura ");
        let marks: Vec<_> = filtered.iter().map(|r| r.mark.as_str()).collect();
        assert_eq!(marks, vec!["M1", "M7"]);
    }

    #[test]
    fn test_unknown_discipline_is_empty_not_error() {
        assert!(filter_by_discipline(&records(), "Paisajismo").is_empty());
    }

    #[test]
    fn test_discipline_counts() {
        let counts = discipline_counts(&records());
        assert_eq!(counts.get("Arquitectura"), Some(&5));
        assert_eq!(counts.get("Electricidad"), Some(&2));
        assert_eq!(counts.values().sum::<usize>(), 12);
    }
}
