//! Pure transformations of fetched documents: text units and relations.

pub mod citations;
mod error;
pub mod metadata;
pub mod relations;
pub mod templates;
pub mod units;

pub use error::{ExtractionError, RelationError};
pub use relations::{RelationOptions, RelationSet, extract_relations};
pub use templates::Template;
pub use units::{DocumentBodies, ExtractOptions, Extraction, extract_text_units};
