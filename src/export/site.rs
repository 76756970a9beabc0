//! Static lookup site: one page per element, an index with client-side
//! search, and a not-found page.
//!
//! Rendering is a pure function of the records, project name and base URL,
//! so regenerating an unchanged set rewrites identical bytes.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::config::{display_base_url, lookup_path, lookup_url, GenerateConfig};
use crate::error::ExportError;
use crate::filter::discipline_counts;
use crate::model::ElementRecord;

const ELEMENT_TEMPLATE: &str = "element";
const INDEX_TEMPLATE: &str = "index";
const NOT_FOUND_TEMPLATE: &str = "404";

/// Built-in templates; file names are what `--templates` overrides.
const BUILTIN_TEMPLATES: &[(&str, &str, &str)] = &[
    (
        ELEMENT_TEMPLATE,
        "element.hbs",
        include_str!("../../templates/element.hbs"),
    ),
    (
        INDEX_TEMPLATE,
        "index.hbs",
        include_str!("../../templates/index.hbs"),
    ),
    (
        NOT_FOUND_TEMPLATE,
        "404.hbs",
        include_str!("../../templates/404.hbs"),
    ),
];

/// A rendered file, path relative to the site root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePage {
    pub path: PathBuf,
    pub html: String,
}

#[derive(Serialize)]
struct ElementContext<'a> {
    project_name: &'a str,
    base_url: String,
    url: String,
    element: &'a ElementRecord,
}

#[derive(Serialize)]
struct IndexEntry<'a> {
    mark: &'a str,
    name: &'a str,
    discipline: &'a str,
    category: &'a str,
    type_name: &'a str,
    href: String,
    search: String,
}

#[derive(Serialize)]
struct DisciplineCount {
    name: String,
    count: usize,
}

#[derive(Serialize)]
struct IndexContext<'a> {
    project_name: &'a str,
    total: usize,
    disciplines: Vec<DisciplineCount>,
    elements: Vec<IndexEntry<'a>>,
}

#[derive(Serialize)]
struct NotFoundContext<'a> {
    project_name: &'a str,
}

/// Path of an element's detail page relative to the site root.
#[must_use]
pub fn detail_path(mark: &str) -> PathBuf {
    Path::new("e").join(mark).join("index.html")
}

pub struct SiteRenderer<'reg> {
    registry: Handlebars<'reg>,
}

impl SiteRenderer<'_> {
    /// Renderer with the built-in templates.
    pub fn new() -> Result<Self, ExportError> {
        let mut registry = Handlebars::new();
        // HTML-escape every {{ }} interpolation; templates use no raw blocks.
        registry.register_escape_fn(handlebars::html_escape);
        for (name, _, source) in BUILTIN_TEMPLATES {
            registry.register_template_string(name, source)?;
        }
        Ok(Self { registry })
    }

    /// Built-in templates, replaced by any `element.hbs`, `index.hbs` or
    /// `404.hbs` present in `dir`.
    pub fn with_overrides(dir: &Path) -> Result<Self, ExportError> {
        let mut renderer = Self::new()?;
        for (name, file, _) in BUILTIN_TEMPLATES {
            let path = dir.join(file);
            if !path.is_file() {
                continue;
            }
            let source = std::fs::read_to_string(&path).map_err(|source| {
                ExportError::TemplateRead {
                    path: path.clone(),
                    source,
                }
            })?;
            renderer.registry.register_template_string(name, source)?;
            debug!("Using template override {}", path.display());
        }
        Ok(renderer)
    }

    /// Renders every page of the site in memory.
    pub fn render(
        &self,
        records: &[ElementRecord],
        project_name: &str,
        base_url: &Url,
    ) -> Result<Vec<SitePage>, ExportError> {
        let mut pages = Vec::with_capacity(records.len() + 2);

        for record in records {
            let context = ElementContext {
                project_name,
                base_url: display_base_url(base_url),
                url: lookup_url(base_url, &record.mark)?,
                element: record,
            };
            pages.push(SitePage {
                path: detail_path(&record.mark),
                html: self.registry.render(ELEMENT_TEMPLATE, &context)?,
            });
        }

        pages.push(SitePage {
            path: PathBuf::from("index.html"),
            html: self
                .registry
                .render(INDEX_TEMPLATE, &index_context(records, project_name)?)?,
        });

        pages.push(SitePage {
            path: PathBuf::from("404.html"),
            html: self
                .registry
                .render(NOT_FOUND_TEMPLATE, &NotFoundContext { project_name })?,
        });

        Ok(pages)
    }
}

fn index_context<'a>(
    records: &'a [ElementRecord],
    project_name: &'a str,
) -> Result<IndexContext<'a>, ExportError> {
    let disciplines = discipline_counts(records)
        .into_iter()
        .map(|(name, count)| DisciplineCount { name, count })
        .collect();

    let mut sorted: Vec<&ElementRecord> = records.iter().collect();
    sorted.sort_by(|a, b| (&a.discipline, &a.mark).cmp(&(&b.discipline, &b.mark)));

    let elements = sorted
        .into_iter()
        .map(|r| {
            let type_name = r.type_name.as_deref().unwrap_or_default();
            Ok(IndexEntry {
                mark: &r.mark,
                name: &r.name,
                discipline: &r.discipline,
                category: r.category_or_empty(),
                type_name,
                href: lookup_path(&r.mark)?,
                search: [r.mark.as_str(), &r.name, r.category_or_empty(), type_name]
                    .join(" ")
                    .to_lowercase(),
            })
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    Ok(IndexContext {
        project_name,
        total: records.len(),
        disciplines,
        elements,
    })
}

/// Writes rendered pages under `site_dir`, overwriting existing files.
pub fn write_pages(pages: &[SitePage], site_dir: &Path) -> Result<(), ExportError> {
    for page in pages {
        let path = site_dir.join(&page.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ExportError::DirCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, &page.html).map_err(|source| ExportError::FileWrite {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Renders and writes the whole site; returns the number of detail pages.
pub fn write_site(records: &[ElementRecord], config: &GenerateConfig) -> Result<usize, ExportError> {
    let renderer = match &config.template_dir {
        Some(dir) => SiteRenderer::with_overrides(dir)?,
        None => SiteRenderer::new()?,
    };
    let pages = renderer.render(records, &config.project_name, &config.base_url)?;
    let site_dir = config.site_dir();
    write_pages(&pages, &site_dir)?;

    info!("HTML: {} page(s) generated in {}", records.len(), site_dir.display());
    Ok(records.len())
}
