//! Integration tests for a full generation run.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;

use bim_qr::config::{parse_base_url, GenerateConfig};
use bim_qr::error::{ParseError, RecordError};
use bim_qr::parser::InputEncoding;
use bim_qr::pipeline::{generate, load_records, select_records, InputKind};

const HEADER: &str = "IfcGUID,Name,Marca,Nombre de tipo,Disciplina,IFC Class,Category,Operacion";

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn sample_csv(dir: &Path) -> PathBuf {
    let text = [
        HEADER,
        "GUID001,Puerta 1 hoja,PA001,210x120,Arquitectura,IfcDoor,Puertas,Abatible",
        "GUID002,Ventana fija,VE001,120x150,Arquitectura,IfcWindow,Ventanas,Fija",
        "GUID003,Pilar HEB200,PI001,HEB200,Estructura,IfcColumn,Pilares,",
    ]
    .join("\n");
    write_file(dir, "test.csv", text.as_bytes())
}

fn config(output_root: &Path) -> GenerateConfig {
    GenerateConfig::new(
        "Test Project",
        parse_base_url("https://bim.porqueviven.org").unwrap(),
        output_root.to_path_buf(),
    )
}

#[test]
fn test_load_sample_table() {
    let dir = tempfile::tempdir().unwrap();
    let input = load_records(&sample_csv(dir.path()), InputEncoding::Auto).unwrap();

    assert_eq!(input.kind, InputKind::Table);
    let records = &input.normalized.records;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].mark, "PA001");
    assert_eq!(records[0].discipline, "Arquitectura");
    assert_eq!(records[0].ifc_class.as_deref(), Some("IfcDoor"));
    assert_eq!(records[0].type_name.as_deref(), Some("210x120"));
    assert_eq!(records[0].operation.as_deref(), Some("Abatible"));
    assert_eq!(records[2].operation, None);
}

#[test]
fn test_header_only_table_has_no_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "empty.csv", format!("{HEADER}\n").as_bytes());

    let input = load_records(&path, InputEncoding::Auto).unwrap();
    assert!(input.normalized.records.is_empty());
    assert!(matches!(
        select_records(&input.normalized, None),
        Err(RecordError::NoValidRecords { .. })
    ));
}

#[test]
fn test_missing_required_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "bad.csv", b"Foo,Bar\na,b\n");

    match load_records(&path, InputEncoding::Auto) {
        Err(ParseError::MissingColumns { missing, found, .. }) => {
            assert_eq!(missing, vec!["ifc_guid", "name", "mark", "discipline"]);
            assert_eq!(found, vec!["Foo", "Bar"]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_missing_file() {
    let err = load_records(Path::new("/nonexistent/path.csv"), InputEncoding::Auto).unwrap_err();
    assert!(matches!(err, ParseError::FileRead { .. }));
}

#[test]
fn test_duplicates_keep_first_occurrence() {
    let dir = tempfile::tempdir().unwrap();
    let text = [
        HEADER,
        "GUID001,Puerta A,PA001,210x120,Arquitectura,IfcDoor,Puertas,",
        "GUID002,Puerta B,PA001,210x120,Arquitectura,IfcDoor,Puertas,",
        "GUID003,Ventana A,VE001,120x150,Arquitectura,IfcWindow,Ventanas,",
    ]
    .join("\n");
    let path = write_file(dir.path(), "dupes.csv", text.as_bytes());

    let input = load_records(&path, InputEncoding::Auto).unwrap();
    let normalized = &input.normalized;
    assert_eq!(normalized.records.len(), 2);
    assert_eq!(normalized.records[0].name, "Puerta A");
    assert_eq!(normalized.duplicates, 1);
}

#[test]
fn test_special_characters_survive() {
    let dir = tempfile::tempdir().unwrap();
    let text = format!(
        "{HEADER}\nGUID010,Tuberia DN50 a 90\u{b0},TB001,DN50 \u{b1} 2mm,Saneamiento-Fontaneria-Geotermia,IfcPipeSegment,Tuberias,\n"
    );
    let path = write_file(dir.path(), "special.csv", text.as_bytes());

    let input = load_records(&path, InputEncoding::Auto).unwrap();
    let record = &input.normalized.records[0];
    assert!(record.name.contains('\u{b0}'));
    assert!(record.type_name.as_deref().unwrap().contains('\u{b1}'));
}

#[test]
fn test_windows_1252_semicolon_export() {
    let dir = tempfile::tempdir().unwrap();
    // Excel on Spanish Windows: semicolons, cp1252 ("ó" is 0xF3)
    let mut bytes = b"IfcGUID;Nombre;Marca;Disciplina;Operaci\xf3n\n".to_vec();
    bytes.extend_from_slice(b"G1;Puerta corredera;PA201;Arquitectura;Corredera\n");
    let path = write_file(dir.path(), "excel.csv", &bytes);

    let input = load_records(&path, InputEncoding::Auto).unwrap();
    let record = &input.normalized.records[0];
    assert_eq!(record.name, "Puerta corredera");
    assert_eq!(record.operation.as_deref(), Some("Corredera"));

    let strict = load_records(&path, InputEncoding::Utf8).unwrap_err();
    assert!(matches!(strict, ParseError::Decode { .. }));
}

#[test]
fn test_utf16_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "utf16.csv", b"\xff\xfeI\0f\0c\0");
    assert!(matches!(
        load_records(&path, InputEncoding::Auto),
        Err(ParseError::Decode { .. })
    ));
}

#[test]
fn test_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "elementos.xlsx", b"PK");
    assert!(matches!(
        load_records(&path, InputEncoding::Auto),
        Err(ParseError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_unknown_discipline_is_fatal_before_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = load_records(&sample_csv(dir.path()), InputEncoding::Auto).unwrap();

    match select_records(&input.normalized, Some("Paisajismo")) {
        Err(RecordError::NoDisciplineMatch { available, .. }) => {
            assert_eq!(available, vec!["Arquitectura", "Estructura"]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_generate_site_and_labels() {
    let dir = tempfile::tempdir().unwrap();
    let input = load_records(&sample_csv(dir.path()), InputEncoding::Auto).unwrap();
    let records = select_records(&input.normalized, None).unwrap();

    let out = dir.path().join("output");
    let output = generate(&records, &config(&out)).unwrap();

    assert_eq!(output.site_pages, 3);
    let site = out.join("site");
    for mark in ["PA001", "VE001", "PI001"] {
        assert!(site.join("e").join(mark).join("index.html").is_file(), "{mark}");
    }

    let detail = std::fs::read_to_string(site.join("e/PA001/index.html")).unwrap();
    assert!(detail.contains("PA001"));
    assert!(detail.contains("Test Project"));
    assert!(detail.contains("Puerta 1 hoja"));

    let index = std::fs::read_to_string(site.join("index.html")).unwrap();
    assert!(index.contains(r#"id="search""#));
    assert!(index.contains("Buscar"));
    assert!(site.join("404.html").is_file());

    assert_eq!(output.hosting_config, Some(out.join("firebase.json")));
    assert!(out.join("firebase.json").is_file());

    let pdf_path = output.label_sheet.unwrap();
    assert_eq!(pdf_path, out.join("pdf").join("QR_Todas.pdf"));
    let pdf = std::fs::read(&pdf_path).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn test_generate_filtered_labels_only() {
    let dir = tempfile::tempdir().unwrap();
    let input = load_records(&sample_csv(dir.path()), InputEncoding::Auto).unwrap();
    let records = select_records(&input.normalized, Some(" estructura ")).unwrap();
    assert_eq!(records.len(), 1);

    let out = dir.path().join("output");
    let mut config = config(&out);
    config.discipline = Some("Estructura".to_string());
    config.generate_site = false;
    let output = generate(&records, &config).unwrap();

    assert_eq!(output.site_dir, None);
    assert!(!out.join("site").exists());
    assert_eq!(
        output.label_sheet,
        Some(out.join("pdf").join("QR_Estructura.pdf"))
    );
}

#[test]
fn test_regenerated_site_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = load_records(&sample_csv(dir.path()), InputEncoding::Auto).unwrap();
    let records = select_records(&input.normalized, None).unwrap();

    let out = dir.path().join("output");
    let mut config = config(&out);
    config.generate_labels = false;

    generate(&records, &config).unwrap();
    let first = std::fs::read(out.join("site/index.html")).unwrap();
    generate(&records, &config).unwrap();
    assert_eq!(std::fs::read(out.join("site/index.html")).unwrap(), first);
}

#[test]
fn test_load_ifc_model() {
    let dir = tempfile::tempdir().unwrap();
    let model = "ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0P',$,'CAPPI',$,$,$,$,$,$);
#10=IFCDOOR('2D',$,'Puerta 1 hoja',$,$,$,$,$,2100.,1200.,$,$,$);
#11=IFCBEAM('2B',$,'Viga IPE300',$,$,$,$,$,$);
#30=IFCPROPERTYSINGLEVALUE('Marca',$,IFCLABEL('PA107'),$);
#31=IFCPROPERTYSINGLEVALUE('Marca',$,IFCLABEL('VG001'),$);
#40=IFCPROPERTYSET('P1',$,'Datos',$,(#30));
#41=IFCPROPERTYSET('P2',$,'Datos',$,(#31));
#50=IFCRELDEFINESBYPROPERTIES('R1',$,$,$,(#10),#40);
#51=IFCRELDEFINESBYPROPERTIES('R2',$,$,$,(#11),#41);
ENDSEC;
END-ISO-10303-21;
";
    let path = write_file(dir.path(), "modelo.ifc", model.as_bytes());

    let input = load_records(&path, InputEncoding::Auto).unwrap();
    assert_eq!(input.kind, InputKind::Model);
    assert_eq!(input.model_project_name.as_deref(), Some("CAPPI"));
    assert_eq!(input.unmarked, 0);

    let marks: Vec<_> = input
        .normalized
        .records
        .iter()
        .map(|r| (r.mark.as_str(), r.discipline.as_str()))
        .collect();
    assert_eq!(
        marks,
        vec![("PA107", "Arquitectura"), ("VG001", "Estructura")]
    );

    let records = select_records(&input.normalized, Some("Arquitectura")).unwrap();
    let out = dir.path().join("output");
    let mut config = config(&out);
    config.generate_labels = false;
    generate(&records, &config).unwrap();
    let page = std::fs::read_to_string(out.join("site/e/PA107/index.html")).unwrap();
    assert!(page.contains("https://bim.porqueviven.org/e/PA107/"));
}
