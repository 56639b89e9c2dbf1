//! In-memory stand-ins for the remote services.
//!
//! Used by this crate's unit and integration tests, and handy for
//! dry-running a configuration without network access.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use eulex_cellar::{
    BodyStream, ConceptLabels, ExpressionMetadata, FetchError, ProcedureDocuments, Repository, SearchHit, SearchQuery, Thesaurus,
    WorkMetadata,
};
use eulex_core::Celex;

#[derive(Debug, Clone)]
struct FakeWork {
    metadata: WorkMetadata,
    body: Option<String>,
    annex: Option<String>,
}

/// A repository backed by maps. Unknown identifiers are `NotFound`.
#[derive(Debug, Default)]
pub struct FakeRepository {
    works: HashMap<String, FakeWork>,
    notices: HashMap<String, ExpressionMetadata>,
    panics: HashSet<String>,
    procedures: HashMap<String, ProcedureDocuments>,
    hits: Vec<SearchHit>,
    transient: Mutex<HashMap<String, usize>>,
    metadata_calls: AtomicUsize,
    body_calls: AtomicUsize,
    notice_calls: AtomicUsize,
    last_search: Mutex<Option<SearchQuery>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a work. A `None` body makes body retrieval fail with 404.
    pub fn with_work(mut self, celex: &str, metadata: WorkMetadata, body: Option<&str>) -> Self {
        self.works.insert(
            celex.to_string(),
            FakeWork {
                metadata,
                body: body.map(str::to_string),
                annex: None,
            },
        );
        self
    }

    /// Attach a separately published annex stream to a registered work.
    pub fn with_annex(mut self, celex: &str, annex: &str) -> Self {
        if let Some(work) = self.works.get_mut(celex) {
            work.annex = Some(annex.to_string());
        }
        self
    }

    /// Object notice of a work. Works without one answer 404.
    pub fn with_notice(mut self, celex: &str, notice: ExpressionMetadata) -> Self {
        self.notices.insert(celex.to_string(), notice);
        self
    }

    /// Panic inside any metadata call for `celex`.
    pub fn panic_on(mut self, celex: &str) -> Self {
        self.panics.insert(celex.to_string());
        self
    }

    pub fn with_procedure(mut self, procedure: &str, proposals: &[&str], adopted: &[&str]) -> Self {
        self.procedures.insert(
            procedure.to_string(),
            ProcedureDocuments {
                proposals: proposals.iter().map(|s| s.to_string()).collect(),
                adopted: adopted.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    /// A descriptive search hit. Returned for every search regardless of
    /// the query, so callers must filter.
    pub fn with_hit(mut self, celex: &str, date: Option<NaiveDate>) -> Self {
        self.hits.push(SearchHit {
            celex: celex.to_string(),
            date,
        });
        self
    }

    /// Make the next `times` metadata calls for `celex` fail with a 503.
    pub fn fail_transiently(self, celex: &str, times: usize) -> Self {
        if let Ok(mut map) = self.transient.lock() {
            map.insert(celex.to_string(), times);
        }
        self
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn body_calls(&self) -> usize {
        self.body_calls.load(Ordering::SeqCst)
    }

    pub fn notice_calls(&self) -> usize {
        self.notice_calls.load(Ordering::SeqCst)
    }

    pub fn last_search(&self) -> Option<SearchQuery> {
        self.last_search.lock().ok().and_then(|q| q.clone())
    }

    fn url(celex: &Celex) -> String {
        format!("fake://{celex}")
    }
}

#[async_trait]
impl Repository for FakeRepository {
    async fn metadata(&self, celex: &Celex, _language: &str) -> Result<WorkMetadata, FetchError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.panics.contains(celex.as_str()) {
            panic!("metadata lookup for {celex} blew up");
        }
        if let Ok(mut map) = self.transient.lock()
            && let Some(left) = map.get_mut(celex.as_str())
            && *left > 0
        {
            *left -= 1;
            return Err(FetchError::from_status(Self::url(celex), 503));
        }
        self.works
            .get(celex.as_str())
            .map(|w| w.metadata.clone())
            .ok_or_else(|| FetchError::from_status(Self::url(celex), 404))
    }

    async fn expression_metadata(&self, celex: &Celex, _language: &str) -> Result<ExpressionMetadata, FetchError> {
        self.notice_calls.fetch_add(1, Ordering::SeqCst);
        self.notices
            .get(celex.as_str())
            .cloned()
            .ok_or_else(|| FetchError::from_status(Self::url(celex), 404))
    }

    async fn body(&self, celex: &Celex, stream: BodyStream, _language: &str) -> Result<String, FetchError> {
        self.body_calls.fetch_add(1, Ordering::SeqCst);
        let work = self.works.get(celex.as_str());
        let body = match stream {
            BodyStream::Main => work.and_then(|w| w.body.clone()),
            BodyStream::Annex => work.and_then(|w| w.annex.clone()),
        };
        body.ok_or_else(|| FetchError::from_status(Self::url(celex), 404))
    }

    async fn procedure_documents(&self, procedure: &str) -> Result<ProcedureDocuments, FetchError> {
        Ok(self.procedures.get(procedure).cloned().unwrap_or_default())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, FetchError> {
        if let Ok(mut last) = self.last_search.lock() {
            *last = Some(query.clone());
        }
        Ok(self.hits.clone())
    }
}

/// A thesaurus of concept URI → labels, matched case-insensitively by
/// substring.
#[derive(Debug, Default)]
pub struct FakeThesaurus {
    concepts: BTreeMap<String, BTreeSet<String>>,
}

impl FakeThesaurus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concept(mut self, uri: &str, labels: &[&str]) -> Self {
        self.concepts
            .entry(uri.to_string())
            .or_default()
            .extend(labels.iter().map(|l| l.to_string()));
        self
    }
}

#[async_trait]
impl Thesaurus for FakeThesaurus {
    async fn concepts(&self, keywords: &[String], _language: &str) -> Result<ConceptLabels, FetchError> {
        let mut out = ConceptLabels::new();
        for keyword in keywords {
            let needle = keyword.trim().to_lowercase();
            for (uri, labels) in &self.concepts {
                let matched: BTreeSet<String> = labels
                    .iter()
                    .filter(|l| l.to_lowercase().contains(&needle))
                    .cloned()
                    .collect();
                if !matched.is_empty() {
                    out.entry(keyword.clone()).or_default().insert(uri.clone(), matched);
                }
            }
        }
        Ok(out)
    }
}
