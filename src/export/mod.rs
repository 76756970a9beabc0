pub mod hosting;
pub mod labels;
pub mod qr;
pub mod site;

pub use crate::error::ExportError;
pub use hosting::write_hosting_config;
pub use labels::{write_label_sheet, LabelSheet};
pub use qr::QrMatrix;
pub use site::{write_site, SiteRenderer};
