//! Storage layer: DuckDB (consolidated dataset) and tabular exports.

mod duck;
mod error;
pub mod export;

pub use duck::{CommitReceipt, DuckStore};
pub use error::{ExportError, StoreError};
pub use export::{ExportSummary, export};
