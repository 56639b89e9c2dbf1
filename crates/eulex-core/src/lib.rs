pub mod celex;
pub mod config;
pub mod error;
pub mod model;
pub mod schema;
pub mod text;

pub use celex::{Celex, InvalidIdentifierError, ProcedureNumberError, normalize_celex, normalize_procedure_number};
pub use config::{Config, DataConfig, OutputFormat};
pub use error::ConfigError;
pub use model::{DocumentResult, DocumentType, Relation, RelationKind, SegmentKind, TextUnit, Work};
pub use schema::tables;
pub use text::normalize_text;
