pub mod discipline;
pub mod element;

pub use element::{ElementRecord, Field, Origin, RawRecord};
