//! # BIM QR
//!
//! Turns the element schedule of a building model into printable QR label
//! sheets and a static lookup site. Scanning a label opens
//! `{base_url}/e/{mark}/`, the element's page.
//!
//! ## Features
//!
//! - Read delimited schedules (comma, semicolon or tab; UTF-8 or Windows-1252)
//!   or IFC STEP models (IFC2x3 and IFC4 schemas)
//! - Resolve Spanish and English column names
//! - Validate rows and keep the first occurrence of each mark
//! - Filter by discipline
//! - Render a PDF label sheet with cover page and mark index
//! - Render a static site with client-side search, ready for Firebase Hosting
//!
//! ## Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//!
//! use bim_qr::config::{parse_base_url, GenerateConfig};
//! use bim_qr::parser::InputEncoding;
//! use bim_qr::pipeline::{generate, load_records, select_records};
//!
//! let input = load_records(Path::new("elementos.csv"), InputEncoding::Auto)?;
//! let records = select_records(&input.normalized, Some("Arquitectura"))?;
//!
//! let base_url = parse_base_url("https://bim.porqueviven.org")?;
//! let config = GenerateConfig::new("CAPPI", base_url, PathBuf::from("output"));
//! let output = generate(&records, &config)?;
//! println!("{} pages", output.site_pages);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod report;
