//! HTTP client for the Publications Office Cellar.

use std::time::Duration;

use async_trait::async_trait;
use eulex_core::Celex;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use tracing::{debug, info};

use crate::notice::{self, NOTICE_MEDIA_TYPE};
use crate::repository::{
    BodyStream, ConceptLabels, ExpressionMetadata, ProcedureDocuments, Repository, SearchHit, SearchQuery, Thesaurus,
    WorkMetadata,
};
use crate::rest::{self, BODY_MEDIA_TYPES};
use crate::sparql::{self, SparqlResponse};
use crate::FetchError;

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Client for the Cellar SPARQL endpoint and REST resource API.
///
/// Performs single attempts only; callers wrap calls in
/// [`with_retry`](crate::with_retry).
#[derive(Clone)]
pub struct CellarClient {
    client: reqwest::Client,
    sparql_endpoint: String,
    resource_base: String,
}

impl CellarClient {
    /// Create a client against the public Cellar endpoints.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::with_endpoints(timeout, sparql::DEFAULT_ENDPOINT, rest::DEFAULT_RESOURCE_BASE)
    }

    /// Create a client against custom endpoints (mirrors, proxies).
    pub fn with_endpoints(
        timeout: Duration,
        sparql_endpoint: &str,
        resource_base: &str,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("eulex/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            sparql_endpoint: sparql_endpoint.to_string(),
            resource_base: resource_base.trim_end_matches('/').to_string(),
        })
    }

    async fn sparql(&self, query: &str) -> Result<SparqlResponse, FetchError> {
        let url = &self.sparql_endpoint;
        debug!(url = %url, query = %query, "running SPARQL query");
        let resp = self
            .client
            .post(url)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[("query", query), ("format", SPARQL_RESULTS_JSON)])
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(url.as_str(), status.as_u16()));
        }
        let text = resp.text().await.map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| FetchError::Parse {
            url: url.clone(),
            reason: e.to_string(),
        })
    }

    async fn get(&self, url: &str, media_type: &str, language: &str) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url)
            .header(ACCEPT, media_type)
            .header(ACCEPT_LANGUAGE, language)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })
    }

    /// GET a body with one media type, following a `300 Multiple Choices`
    /// answer to the alternative holding `stream`.
    async fn negotiate(
        &self,
        url: &str,
        media_type: &str,
        stream: BodyStream,
        language: &str,
    ) -> Result<String, FetchError> {
        let mut resp = self.get(url, media_type, language).await?;
        let mut final_url = url.to_string();

        if resp.status() == StatusCode::MULTIPLE_CHOICES {
            let listing = resp.text().await.map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;
            let items = rest::parse_alternatives(&listing);
            debug!(url = %url, count = items.len(), "multiple choices");
            let chosen = match rest::select_alternative(&items, stream) {
                Some(chosen) => chosen,
                None if items.is_empty() => {
                    return Err(FetchError::Parse {
                        url: url.to_string(),
                        reason: "300 response lists no alternatives".into(),
                    });
                }
                None => return Err(FetchError::NotFound { url: url.to_string() }),
            };
            final_url = chosen.url.clone();
            resp = self.get(&final_url, media_type, language).await?;
        } else if stream == BodyStream::Annex {
            // Annexes only exist as separate streams.
            return Err(FetchError::NotFound { url: url.to_string() });
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(final_url, status.as_u16()));
        }
        resp.text().await.map_err(|source| FetchError::Http {
            url: final_url,
            source,
        })
    }
}

#[async_trait]
impl Repository for CellarClient {
    async fn metadata(&self, celex: &Celex, language: &str) -> Result<WorkMetadata, FetchError> {
        let response = self.sparql(&sparql::metadata_query(celex, language)).await?;
        sparql::parse_metadata(&response).ok_or_else(|| FetchError::NotFound {
            url: rest::resource_url(&self.resource_base, celex),
        })
    }

    async fn expression_metadata(&self, celex: &Celex, language: &str) -> Result<ExpressionMetadata, FetchError> {
        let url = rest::resource_url(&self.resource_base, celex);
        let resp = self.get(&url, NOTICE_MEDIA_TYPE, language).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(url, status.as_u16()));
        }
        let xml = resp.text().await.map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;
        let found = notice::parse_notice(&xml);
        debug!(
            celex = %celex,
            title = found.title.is_some(),
            date = found.date.is_some(),
            "read object notice"
        );
        Ok(found)
    }

    async fn body(&self, celex: &Celex, stream: BodyStream, language: &str) -> Result<String, FetchError> {
        let url = rest::resource_url(&self.resource_base, celex);
        let mut last = None;
        for media_type in BODY_MEDIA_TYPES {
            match self.negotiate(&url, media_type, stream, language).await {
                Ok(body) => {
                    info!(celex = %celex, media_type, bytes = body.len(), "fetched body");
                    return Ok(body);
                }
                // Transient failures go back to the retry loop untouched.
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    debug!(celex = %celex, media_type, error = %e, "media type unavailable");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or(FetchError::NotFound { url }))
    }

    async fn procedure_documents(&self, procedure: &str) -> Result<ProcedureDocuments, FetchError> {
        let response = self.sparql(&sparql::procedure_query(procedure)).await?;
        Ok(sparql::parse_procedure(&response))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, FetchError> {
        let response = self.sparql(&sparql::search_query(query)).await?;
        let hits = sparql::parse_search(&response);
        info!(count = hits.len(), "descriptive search returned");
        Ok(hits)
    }
}

#[async_trait]
impl Thesaurus for CellarClient {
    async fn concepts(&self, keywords: &[String], language: &str) -> Result<ConceptLabels, FetchError> {
        if keywords.is_empty() {
            return Ok(ConceptLabels::new());
        }
        let response = self.sparql(&sparql::concepts_query(keywords, language)).await?;
        Ok(sparql::parse_concepts(&response))
    }
}
