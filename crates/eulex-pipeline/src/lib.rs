//! The eulex build pipeline.
//!
//! Resolver → (bounded pool: Fetcher → extraction) → Aggregator → export.

pub mod aggregator;
mod error;
pub mod fetcher;
mod pipeline;
pub mod resolver;
pub mod review;
pub mod testing;

pub use error::{PipelineError, ResolutionError};
pub use pipeline::{Pipeline, RunOutcome, RunSummary, Skipped};
