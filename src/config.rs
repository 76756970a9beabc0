//! Run configuration assembled from command-line arguments and environment.

use std::path::PathBuf;

use url::Url;

use crate::error::{ConfigError, ExportError};
use crate::model::ElementRecord;

/// Base URL of the deployed site when neither `--base-url` nor `BASE_URL`
/// is given.
pub const DEFAULT_BASE_URL: &str = "https://bim.porqueviven.org";

/// Default output root.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Validates a base URL: http(s) only, surrounding whitespace and trailing
/// slashes removed.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("must start with http:// or https://"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not contain a query or fragment"));
    }
    Ok(url)
}

/// `{base_url}/e/{mark}/`, with the mark percent-encoded as one segment.
pub fn lookup_url(base_url: &Url, mark: &str) -> Result<String, ExportError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| ExportError::LookupUrl {
            mark: mark.to_string(),
        })?
        .pop_if_empty()
        .push("e")
        .push(mark)
        .push("");
    Ok(url.into())
}

/// `e/{mark}/` relative to the site root, encoded like [`lookup_url`].
pub fn lookup_path(mark: &str) -> Result<String, ExportError> {
    const ROOT: &str = "http://site.invalid/";
    let root = Url::parse(ROOT).map_err(|_| ExportError::LookupUrl {
        mark: mark.to_string(),
    })?;
    let url = lookup_url(&root, mark)?;
    Ok(url.trim_start_matches(ROOT).to_string())
}

/// Base URL rendered without a trailing slash, for display.
#[must_use]
pub fn display_base_url(base_url: &Url) -> String {
    base_url.as_str().trim_end_matches('/').to_string()
}

/// Gap between the cell top and the QR symbol, in millimetres.
pub const QR_TOP_GAP: f32 = 2.0;
/// QR bottom to mark baseline.
pub const MARK_GAP: f32 = 4.0;
/// Mark baseline to name baseline.
pub const NAME_GAP: f32 = 3.4;
/// Baseline step for each of the type and operation lines.
pub const DETAIL_GAP: f32 = 2.9;
/// Smallest QR symbol accepted, in millimetres.
pub const MIN_QR_SIZE: f32 = 10.0;

/// Vertical space a label needs besides the QR symbol.
const LABEL_TEXT_DEPTH: f32 = QR_TOP_GAP + MARK_GAP + NAME_GAP + 2.0 * DETAIL_GAP;

/// Fixed page geometry of the label sheet, in millimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub columns: usize,
    pub rows: usize,
    pub cell_height: f32,
    pub qr_size: f32,
}

impl Default for SheetLayout {
    /// A4 portrait, 3 × 6 labels of 60 × 42 mm with 25 mm QR codes.
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            margin: 15.0,
            columns: 3,
            rows: 6,
            cell_height: 42.0,
            qr_size: 25.0,
        }
    }
}

impl SheetLayout {
    /// Default geometry with a different grid. Cell height shrinks to fit
    /// the rows and the QR symbol shrinks to leave room for the text lines.
    pub fn with_grid(columns: usize, rows: usize) -> Result<Self, ConfigError> {
        let base = Self::default();
        if columns == 0 || rows == 0 {
            return Err(ConfigError::InvalidLayout {
                message: format!("grid must be at least 1 × 1, got {columns} × {rows}"),
            });
        }
        let usable_height = base.page_height - 2.0 * base.margin;
        let cell_height = base.cell_height.min(usable_height / rows as f32);
        let layout = Self {
            columns,
            rows,
            cell_height,
            qr_size: base.qr_size.min(cell_height - LABEL_TEXT_DEPTH),
            ..base
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::InvalidLayout { message });
        if self.columns == 0 || self.rows == 0 {
            return invalid("grid must be at least 1 × 1".to_string());
        }
        if self.rows as f32 * self.cell_height > self.page_height - 2.0 * self.margin + 0.01 {
            return invalid(format!(
                "{} rows of {} mm do not fit on the page",
                self.rows, self.cell_height
            ));
        }
        if self.qr_size < MIN_QR_SIZE {
            return invalid(format!(
                "{} rows leave {:.1} mm QR codes, smaller than {MIN_QR_SIZE} mm",
                self.rows, self.qr_size
            ));
        }
        if self.lowest_baseline() > self.cell_height + 0.01 {
            return invalid(format!(
                "label text needs {:.1} mm but cells are {:.1} mm high",
                self.lowest_baseline(),
                self.cell_height
            ));
        }
        if self.qr_size > self.cell_width().min(self.cell_height) {
            return invalid(format!(
                "{} mm QR codes do not fit in {:.1} × {:.1} mm cells",
                self.qr_size,
                self.cell_width(),
                self.cell_height
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn labels_per_page(&self) -> usize {
        self.columns * self.rows
    }

    #[must_use]
    pub fn cell_width(&self) -> f32 {
        (self.page_width - 2.0 * self.margin) / self.columns as f32
    }

    /// Distance from the cell top to the last text baseline of a label
    /// with every optional line present.
    #[must_use]
    pub fn lowest_baseline(&self) -> f32 {
        self.qr_size + LABEL_TEXT_DEPTH
    }
}

/// Everything one generation run needs besides the records.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub project_name: String,
    pub base_url: Url,
    pub output_root: PathBuf,
    pub discipline: Option<String>,
    pub generate_labels: bool,
    pub generate_site: bool,
    pub template_dir: Option<PathBuf>,
    pub layout: SheetLayout,
}

impl GenerateConfig {
    #[must_use]
    pub fn new(project_name: &str, base_url: Url, output_root: PathBuf) -> Self {
        Self {
            project_name: project_name.to_string(),
            base_url,
            output_root,
            discipline: None,
            generate_labels: true,
            generate_site: true,
            template_dir: None,
            layout: SheetLayout::default(),
        }
    }

    #[must_use]
    pub fn site_dir(&self) -> PathBuf {
        self.output_root.join("site")
    }

    #[must_use]
    pub fn pdf_dir(&self) -> PathBuf {
        self.output_root.join("pdf")
    }

    pub fn lookup_url(&self, record: &ElementRecord) -> Result<String, ExportError> {
        lookup_url(&self.base_url, &record.mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_base_url_accepts_http_and_https() {
        let url = parse_base_url("https://bim.porqueviven.org").unwrap();
        assert_eq!(display_base_url(&url), "https://bim.porqueviven.org");
        let local = parse_base_url("http://localhost:8090").unwrap();
        assert_eq!(display_base_url(&local), "http://localhost:8090");
    }

    #[test]
    fn test_parse_base_url_strips_trailing_slash() {
        let url = parse_base_url("  https://bim.porqueviven.org/  ").unwrap();
        assert_eq!(display_base_url(&url), "https://bim.porqueviven.org");
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://example.com").is_err());
        assert!(parse_base_url("bim.porqueviven.org").is_err());
        assert!(parse_base_url("https://example.com/?q=1").is_err());
    }

    #[test]
    fn test_lookup_url() {
        let base = parse_base_url("https://bim.porqueviven.org").unwrap();
        assert_eq!(
            lookup_url(&base, "PA107").unwrap(),
            "https://bim.porqueviven.org/e/PA107/"
        );
    }

    #[test]
    fn test_lookup_url_with_path_and_spaces() {
        let base = parse_base_url("https://example.org/cappi/").unwrap();
        assert_eq!(
            lookup_url(&base, "PA 107").unwrap(),
            "https://example.org/cappi/e/PA%20107/"
        );
    }

    #[test]
    fn test_default_layout_fits() {
        let layout = SheetLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.labels_per_page(), 18);
        assert!((layout.cell_width() - 60.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_with_grid() {
        let layout = SheetLayout::with_grid(2, 4).unwrap();
        assert_eq!(layout.labels_per_page(), 8);
        assert!(SheetLayout::with_grid(0, 4).is_err());
        // 10 columns leave 18 mm cells, too narrow for 25 mm codes
        assert!(SheetLayout::with_grid(10, 6).is_err());
    }

    #[test]
    fn test_more_rows_shrink_qr_to_keep_text_in_cell() {
        let layout = SheetLayout::with_grid(3, 10).unwrap();
        assert!((layout.cell_height - 26.7).abs() < 0.01);
        assert!(layout.qr_size < 25.0);
        assert!(layout.lowest_baseline() <= layout.cell_height + 0.01);
        // 14 rows would need QR codes under the minimum size
        assert!(SheetLayout::with_grid(3, 14).is_err());
    }

    #[test]
    fn test_every_accepted_grid_keeps_text_in_cell() {
        for columns in 1..=8 {
            for rows in 1..=20 {
                if let Ok(layout) = SheetLayout::with_grid(columns, rows) {
                    assert!(
                        layout.lowest_baseline() <= layout.cell_height + 0.01,
                        "{columns} x {rows}"
                    );
                    assert!(layout.qr_size >= MIN_QR_SIZE);
                }
            }
        }
    }

    #[test]
    fn test_default_layout_text_depth() {
        let layout = SheetLayout::default();
        assert!((layout.lowest_baseline() - 40.2).abs() < 0.01);
    }

    #[test]
    fn test_lookup_path_encodes_mark() {
        assert_eq!(lookup_path("PA107").unwrap(), "e/PA107/");
        assert_eq!(lookup_path("PA#1").unwrap(), "e/PA%231/");
        assert_eq!(lookup_path("PA%1").unwrap(), "e/PA%251/");
    }
}
