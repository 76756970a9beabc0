//! Printable QR label sheet.
//!
//! Building a sheet is split in two: [`LabelSheet::plan`] assigns every
//! record a page and grid slot, [`render_pdf`] draws the plan with
//! `printpdf`. The PDF has a cover page, the label pages, and a mark index.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rect, Rgb,
};
use tracing::{debug, info};
use url::Url;

use crate::config::{
    lookup_url, GenerateConfig, SheetLayout, DETAIL_GAP, MARK_GAP, NAME_GAP, QR_TOP_GAP,
};
use crate::error::ExportError;
use crate::export::qr::{QrMatrix, QUIET_ZONE};
use crate::model::ElementRecord;

const LAYER: &str = "Capa 1";
const PT_TO_MM: f32 = 0.352_778;

// Average glyph advance as a fraction of the font size, for centering.
const HELVETICA_ADVANCE: f32 = 0.52;
const HELVETICA_BOLD_ADVANCE: f32 = 0.58;

const CELL_PADDING: f32 = 1.0;
const MARK_PT: f32 = 11.0;
const NAME_PT: f32 = 7.0;
const DETAIL_PT: f32 = 6.5;
const INDEX_PT: f32 = 7.0;
const INDEX_ROW: f32 = 4.5;
const CONTENTS_ROW: f32 = 5.0;
const INDEX_COLUMNS: [(&str, f32); 4] = [
    ("Marca", 25.0),
    ("Nombre", 65.0),
    ("Disciplina", 45.0),
    ("Categoría", 35.0),
];

/// One record placed on the sheet.
#[derive(Debug, Clone)]
pub struct Label<'a> {
    pub record: &'a ElementRecord,
    /// The URL encoded in the QR symbol.
    pub payload: String,
    pub page: usize,
    pub row: usize,
    pub column: usize,
}

/// Records laid out onto label pages, in sheet order.
#[derive(Debug, Clone)]
pub struct LabelSheet<'a> {
    pub layout: SheetLayout,
    pub pages: Vec<Vec<Label<'a>>>,
}

impl<'a> LabelSheet<'a> {
    /// Orders records by (discipline, category, mark) and fills pages
    /// left-to-right, top-to-bottom. Only the last page may be partial.
    pub fn plan(
        records: &'a [ElementRecord],
        layout: &SheetLayout,
        base_url: &Url,
    ) -> Result<Self, ExportError> {
        let per_page = layout.labels_per_page().max(1);
        let mut pages: Vec<Vec<Label<'a>>> = Vec::new();

        for (i, record) in sheet_order(records).into_iter().enumerate() {
            let slot = i % per_page;
            if slot == 0 {
                pages.push(Vec::with_capacity(per_page));
            }
            let label = Label {
                record,
                payload: lookup_url(base_url, &record.mark)?,
                page: i / per_page,
                row: slot / layout.columns,
                column: slot % layout.columns,
            };
            if let Some(page) = pages.last_mut() {
                page.push(label);
            }
        }

        Ok(Self {
            layout: layout.clone(),
            pages,
        })
    }

    #[must_use]
    pub fn label_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// Every label in sheet order, as listed by the index section.
    pub fn labels(&self) -> impl Iterator<Item = &Label<'a>> {
        self.pages.iter().flatten()
    }
}

/// Records sorted for printing: grouped by discipline, then category, then
/// mark.
#[must_use]
pub fn sheet_order(records: &[ElementRecord]) -> Vec<&ElementRecord> {
    let mut ordered: Vec<&ElementRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        (&a.discipline, a.category_or_empty(), &a.mark).cmp(&(
            &b.discipline,
            b.category_or_empty(),
            &b.mark,
        ))
    });
    ordered
}

/// Cover page contents.
#[derive(Debug, Clone)]
pub struct SheetHeader {
    pub project_name: String,
    pub discipline: Option<String>,
    pub generated_at: String,
}

impl SheetHeader {
    #[must_use]
    pub fn discipline_label(&self) -> &str {
        self.discipline.as_deref().unwrap_or("Todas")
    }
}

/// `QR_{discipline}.pdf`, with characters unsafe in file names replaced.
#[must_use]
pub fn sheet_file_name(discipline: Option<&str>) -> String {
    let label: String = discipline
        .unwrap_or("Todas")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("QR_{label}.pdf")
}

/// Plans, renders and writes the label sheet; returns the PDF path.
pub fn write_label_sheet(
    records: &[ElementRecord],
    config: &GenerateConfig,
) -> Result<PathBuf, ExportError> {
    let sheet = LabelSheet::plan(records, &config.layout, &config.base_url)?;
    let header = SheetHeader {
        project_name: config.project_name.clone(),
        discipline: config.discipline.clone(),
        generated_at: chrono::Local::now().format("%d/%m/%Y %H:%M").to_string(),
    };
    let bytes = render_pdf(&sheet, &header)?;

    let dir = config.pdf_dir();
    std::fs::create_dir_all(&dir).map_err(|source| ExportError::DirCreate {
        path: dir.clone(),
        source,
    })?;
    let path = dir.join(sheet_file_name(config.discipline.as_deref()));
    write_bytes(&path, &bytes)?;

    info!(
        "PDF: {} ({} labels on {} page(s))",
        path.display(),
        sheet.label_count(),
        sheet.pages.len()
    );
    Ok(path)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    std::fs::write(path, bytes).map_err(|source| ExportError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn pdf_error<E: std::fmt::Debug>(err: E) -> ExportError {
    ExportError::Pdf {
        message: format!("{err:?}"),
    }
}

/// Renders a planned sheet into PDF bytes.
pub fn render_pdf(sheet: &LabelSheet<'_>, header: &SheetHeader) -> Result<Vec<u8>, ExportError> {
    let layout = &sheet.layout;
    let (doc, cover_page, cover_layer) = PdfDocument::new(
        format!("QR {} - {}", header.project_name, header.discipline_label()),
        Mm(layout.page_width),
        Mm(layout.page_height),
        LAYER,
    );
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
    };

    let cover = doc.get_page(cover_page).get_layer(cover_layer);
    draw_cover(&doc, cover, sheet, header, &fonts);

    for (i, labels) in sheet.pages.iter().enumerate() {
        let layer = new_page(&doc, layout);
        draw_label_page(&layer, labels, layout, &fonts)?;
        debug!("Label page {} with {} label(s)", i + 1, labels.len());
    }

    draw_index(&doc, sheet, &fonts);

    doc.save_to_bytes().map_err(pdf_error)
}

fn new_page(doc: &PdfDocumentReference, layout: &SheetLayout) -> PdfLayerReference {
    let (page, layer) = doc.add_page(Mm(layout.page_width), Mm(layout.page_height), LAYER);
    doc.get_page(page).get_layer(layer)
}

fn grey(level: f32) -> Color {
    Color::Rgb(Rgb::new(level, level, level, None))
}

fn text_width(text: &str, size_pt: f32, advance: f32) -> f32 {
    text.chars().count() as f32 * size_pt * advance * PT_TO_MM
}

fn centered(
    layer: &PdfLayerReference,
    text: &str,
    size_pt: f32,
    center_x: f32,
    baseline: f32,
    font: &IndirectFontRef,
    advance: f32,
) {
    let x = center_x - text_width(text, size_pt, advance) / 2.0;
    layer.use_text(text, size_pt, Mm(x), Mm(baseline), font);
}

/// How many characters of a font fit in `width` millimetres.
#[must_use]
pub fn fit_chars(width: f32, size_pt: f32, advance: f32) -> usize {
    (width / (size_pt * advance * PT_TO_MM)).floor().max(0.0) as usize
}

/// Shortens text to `max` characters, ending in `..` when cut.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(2)).collect();
    format!("{kept}..")
}

/// One line of the cover's contents table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentsLine<'a> {
    Discipline(&'a str),
    Category(&'a str, usize),
}

/// Discipline → category counts, in sheet order.
#[must_use]
pub fn contents_lines<'a>(sheet: &LabelSheet<'a>) -> Vec<ContentsLine<'a>> {
    let mut contents: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for label in sheet.labels() {
        let category = label.record.category.as_deref().unwrap_or("Otros");
        *contents
            .entry(label.record.discipline.as_str())
            .or_default()
            .entry(category)
            .or_insert(0) += 1;
    }

    let mut lines = Vec::new();
    for (discipline, categories) in contents {
        lines.push(ContentsLine::Discipline(discipline));
        for (category, count) in categories {
            lines.push(ContentsLine::Category(category, count));
        }
    }
    lines
}

/// `(page, baseline)` for each of `count` lines starting at `first_y` on
/// page 0, continuing on further pages below the top margin.
#[must_use]
pub fn flow_lines(count: usize, first_y: f32, layout: &SheetLayout) -> Vec<(usize, f32)> {
    let top = continuation_top(layout);
    let mut page = 0;
    let mut y = first_y;
    let mut positions = Vec::with_capacity(count);
    for _ in 0..count {
        if y < layout.margin {
            page += 1;
            y = top;
        }
        positions.push((page, y));
        y -= CONTENTS_ROW;
    }
    positions
}

fn continuation_top(layout: &SheetLayout) -> f32 {
    layout.page_height - layout.margin - 5.0
}

fn draw_cover(
    doc: &PdfDocumentReference,
    cover: PdfLayerReference,
    sheet: &LabelSheet<'_>,
    header: &SheetHeader,
    fonts: &Fonts,
) {
    let layout = &sheet.layout;
    let center = layout.page_width / 2.0;
    let mut y = layout.page_height - layout.margin - 45.0;
    let layer = &cover;

    layer.set_fill_color(grey(0.0));
    centered(
        layer,
        &header.project_name,
        24.0,
        center,
        y,
        &fonts.bold,
        HELVETICA_BOLD_ADVANCE,
    );
    y -= 20.0;

    layer.set_fill_color(grey(0.27));
    for line in [
        format!("Disciplina: {}", header.discipline_label()),
        format!("Elementos: {}", sheet.label_count()),
        format!("Generado: {}", header.generated_at),
    ] {
        centered(layer, &line, 14.0, center, y, &fonts.regular, HELVETICA_ADVANCE);
        y -= 8.0;
    }

    y -= 10.0;
    layer.set_fill_color(grey(0.0));
    layer.use_text("Contenido", 14.0, Mm(layout.margin), Mm(y), &fonts.bold);
    y -= 8.0;

    let lines = contents_lines(sheet);
    let positions = flow_lines(lines.len(), y, layout);
    let mut current_page = 0;
    let mut layer = cover;
    layer.set_fill_color(grey(0.4));
    for (line, (page, y)) in lines.iter().zip(positions) {
        if page != current_page {
            current_page = page;
            layer = new_page(doc, layout);
            layer.set_fill_color(grey(0.4));
        }
        match line {
            ContentsLine::Discipline(discipline) => {
                layer.use_text(*discipline, 10.0, Mm(layout.margin), Mm(y), &fonts.bold);
            }
            ContentsLine::Category(category, count) => {
                layer.use_text(
                    format!("{category}: {count}"),
                    10.0,
                    Mm(layout.margin + 6.0),
                    Mm(y),
                    &fonts.regular,
                );
            }
        }
    }
}

fn draw_label_page(
    layer: &PdfLayerReference,
    labels: &[Label<'_>],
    layout: &SheetLayout,
    fonts: &Fonts,
) -> Result<(), ExportError> {
    let cell_width = layout.cell_width();

    for label in labels {
        let left = layout.margin + label.column as f32 * cell_width;
        let top = layout.page_height - layout.margin - label.row as f32 * layout.cell_height;
        let center = left + cell_width / 2.0;

        layer.set_outline_color(grey(0.87));
        layer.set_outline_thickness(0.5);
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(left), Mm(top)), false),
                (Point::new(Mm(left + cell_width), Mm(top)), false),
                (Point::new(Mm(left + cell_width), Mm(top - layout.cell_height)), false),
                (Point::new(Mm(left), Mm(top - layout.cell_height)), false),
            ],
            is_closed: true,
        });

        let qr_top = top - QR_TOP_GAP;
        draw_qr(
            layer,
            &QrMatrix::encode(&label.payload)?,
            center - layout.qr_size / 2.0,
            qr_top,
            layout.qr_size,
        );

        let record = label.record;
        let text_width = cell_width - 2.0 * CELL_PADDING;
        let mut baseline = qr_top - layout.qr_size - MARK_GAP;
        layer.set_fill_color(grey(0.0));
        centered(
            layer,
            &truncate(
                &record.mark,
                fit_chars(text_width, MARK_PT, HELVETICA_BOLD_ADVANCE),
            ),
            MARK_PT,
            center,
            baseline,
            &fonts.bold,
            HELVETICA_BOLD_ADVANCE,
        );

        baseline -= NAME_GAP;
        layer.set_fill_color(grey(0.2));
        centered(
            layer,
            &truncate(
                &record.name,
                fit_chars(text_width, NAME_PT, HELVETICA_ADVANCE).min(35),
            ),
            NAME_PT,
            center,
            baseline,
            &fonts.regular,
            HELVETICA_ADVANCE,
        );

        layer.set_fill_color(grey(0.4));
        for (detail, max) in [(&record.type_name, 30), (&record.operation, 25)] {
            if let Some(text) = detail {
                baseline -= DETAIL_GAP;
                centered(
                    layer,
                    &truncate(
                        text,
                        fit_chars(text_width, DETAIL_PT, HELVETICA_ADVANCE).min(max),
                    ),
                    DETAIL_PT,
                    center,
                    baseline,
                    &fonts.regular,
                    HELVETICA_ADVANCE,
                );
            }
        }
    }

    Ok(())
}

fn draw_qr(layer: &PdfLayerReference, matrix: &QrMatrix, left: f32, top: f32, size: f32) {
    let module = size / (matrix.width() + 2 * QUIET_ZONE) as f32;
    layer.set_fill_color(grey(0.0));
    for (row, start, len) in matrix.dark_runs() {
        let x = left + (QUIET_ZONE + start) as f32 * module;
        let y_top = top - (QUIET_ZONE + row) as f32 * module;
        layer.add_rect(Rect::new(
            Mm(x),
            Mm(y_top - module),
            Mm(x + len as f32 * module),
            Mm(y_top),
        ));
    }
}

fn draw_index(doc: &PdfDocumentReference, sheet: &LabelSheet<'_>, fonts: &Fonts) {
    let layout = &sheet.layout;
    let bottom = layout.margin;
    let mut layer = new_page(doc, layout);
    let mut y = layout.page_height - layout.margin - 5.0;

    layer.set_fill_color(grey(0.0));
    layer.use_text("Índice de marcas", 14.0, Mm(layout.margin), Mm(y), &fonts.bold);
    y -= 10.0;
    draw_index_header(&layer, layout, y, fonts);
    y -= INDEX_ROW;

    for label in sheet.labels() {
        if y < bottom {
            layer = new_page(doc, layout);
            y = layout.page_height - layout.margin - 5.0;
            draw_index_header(&layer, layout, y, fonts);
            y -= INDEX_ROW;
        }
        let record = label.record;
        let cells = [
            record.mark.clone(),
            truncate(&record.name, 40),
            truncate(&record.discipline, 28),
            truncate(record.category_or_empty(), 22),
        ];
        let mut x = layout.margin;
        layer.set_fill_color(grey(0.0));
        for (cell, (_, width)) in cells.iter().zip(INDEX_COLUMNS) {
            layer.use_text(cell.as_str(), INDEX_PT, Mm(x + 1.0), Mm(y), &fonts.regular);
            x += width;
        }
        y -= INDEX_ROW;
    }
}

fn draw_index_header(layer: &PdfLayerReference, layout: &SheetLayout, y: f32, fonts: &Fonts) {
    let total: f32 = INDEX_COLUMNS.iter().map(|(_, w)| w).sum();
    layer.set_fill_color(grey(0.94));
    layer.add_rect(Rect::new(
        Mm(layout.margin),
        Mm(y - 1.5),
        Mm(layout.margin + total),
        Mm(y + INDEX_ROW - 1.5),
    ));
    layer.set_fill_color(grey(0.0));
    let mut x = layout.margin;
    for (title, width) in INDEX_COLUMNS {
        layer.use_text(title, INDEX_PT, Mm(x + 1.0), Mm(y), &fonts.bold);
        x += width;
    }
}
