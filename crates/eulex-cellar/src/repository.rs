//! Abstract remote services.
//!
//! The pipeline talks to the repository and the concept thesaurus only
//! through these traits, so it can run against [`crate::CellarClient`] in
//! production and in-memory fakes in tests.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use eulex_core::{Celex, DocumentType, RelationKind};

use crate::FetchError;

/// Which manifestation stream of a work to retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyStream {
    /// The act itself.
    Main,
    /// Separately published annexes (Commission proposals).
    Annex,
}

/// Metadata of one work as stored by the repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkMetadata {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    /// Structured relations with raw, unnormalised target identifiers.
    pub relations: Vec<(RelationKind, String)>,
}

/// Title and document date read from the object notice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionMetadata {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Documents attached to one interinstitutional procedure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureDocuments {
    /// Raw identifiers of Commission proposals.
    pub proposals: Vec<String>,
    /// Raw identifiers of acts adopting one of the proposals.
    pub adopted: Vec<String>,
}

impl ProcedureDocuments {
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty() && self.adopted.is_empty()
    }
}

/// Descriptive selection handed to the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Inclusive.
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
    pub document_types: Vec<DocumentType>,
    /// Concept URIs. Empty means no concept filter.
    pub concepts: Vec<String>,
    pub include_corrigenda: bool,
    pub include_consolidated_texts: bool,
    pub include_national_transpositions: bool,
}

/// One repository hit for a descriptive search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub celex: String,
    pub date: Option<NaiveDate>,
}

/// keyword → concept URI → labels.
pub type ConceptLabels = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// The remote legal-document repository.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Title, adoption date and structured relations of one work.
    async fn metadata(&self, celex: &Celex, language: &str) -> Result<WorkMetadata, FetchError>;

    /// Title and date from the object notice, consulted when
    /// [`metadata`](Self::metadata) lacks them.
    async fn expression_metadata(&self, celex: &Celex, language: &str) -> Result<ExpressionMetadata, FetchError>;

    /// Full document body of one work.
    async fn body(&self, celex: &Celex, stream: BodyStream, language: &str) -> Result<String, FetchError>;

    /// Proposals and adopted acts attached to a normalised procedure number.
    async fn procedure_documents(&self, procedure: &str) -> Result<ProcedureDocuments, FetchError>;

    /// Works matching a descriptive selection.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, FetchError>;
}

/// The concept thesaurus (EuroVoc).
#[async_trait]
pub trait Thesaurus: Send + Sync {
    /// Concepts whose preferred or alternative label contains a keyword,
    /// case-insensitively, grouped per keyword.
    async fn concepts(&self, keywords: &[String], language: &str) -> Result<ConceptLabels, FetchError>;
}
