//! Remote access to the EU Publications Office repository (Cellar) and the
//! EuroVoc concept thesaurus.

mod client;
mod error;
pub mod notice;
pub mod repository;
pub mod rest;
pub mod retry;
pub mod sparql;

pub use client::CellarClient;
pub use error::FetchError;
pub use repository::{
    BodyStream, ConceptLabels, ExpressionMetadata, ProcedureDocuments, Repository, SearchHit, SearchQuery, Thesaurus,
    WorkMetadata,
};
pub use retry::{RetryPolicy, with_retry};
