//! Turns a data selection into a concrete, deduplicated set of CELEX ids.
//!
//! Fixed mode is a single pass. Descriptive mode with keywords runs in two
//! phases around the concept review artifact: [`Resolver::begin`] looks up
//! concepts and writes the artifact, [`Resolver::resume`] reads back the
//! confirmed concepts and queries the repository.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eulex_cellar::{Repository, RetryPolicy, SearchQuery, Thesaurus, with_retry};
use eulex_core::config::{DescriptiveSelection, FixedSelection};
use eulex_core::{Celex, DataConfig, normalize_procedure_number};
use tracing::{debug, info, warn};

use crate::review;
use crate::{PipelineError, ResolutionError};

/// Resolved identifiers in first-seen order, plus the entries that
/// resolved to nothing.
#[derive(Debug, Default)]
pub struct Resolution {
    pub ids: Vec<Celex>,
    pub errors: Vec<ResolutionError>,
}

impl Resolution {
    fn push(&mut self, seen: &mut HashSet<Celex>, celex: Celex) {
        if seen.insert(celex.clone()) {
            self.ids.push(celex);
        }
    }
}

/// Outcome of the first resolution phase.
#[derive(Debug)]
pub enum Phase {
    Resolved(Resolution),
    /// Concepts were written for review; call [`Resolver::resume`] once the
    /// artifact has been checked.
    AwaitingReview { artifact: PathBuf },
}

pub struct Resolver {
    repository: Arc<dyn Repository>,
    thesaurus: Arc<dyn Thesaurus>,
    policy: RetryPolicy,
    language: String,
}

impl Resolver {
    pub fn new(
        repository: Arc<dyn Repository>,
        thesaurus: Arc<dyn Thesaurus>,
        policy: RetryPolicy,
        language: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            thesaurus,
            policy,
            language: language.into(),
        }
    }

    /// Phase one. Pauses only for descriptive selections with keywords.
    pub async fn begin(&self, data: &DataConfig, artifact: &Path) -> Result<Phase, PipelineError> {
        match data {
            DataConfig::Fixed(sel) => Ok(Phase::Resolved(self.fixed(sel).await)),
            DataConfig::Descriptive(sel) if sel.filter_keywords.is_empty() => {
                Ok(Phase::Resolved(self.search(sel, &[]).await?))
            }
            DataConfig::Descriptive(sel) => {
                let labels = self
                    .thesaurus
                    .concepts(&sel.filter_keywords, &self.language)
                    .await
                    .map_err(PipelineError::Thesaurus)?;
                for keyword in &sel.filter_keywords {
                    if !labels.contains_key(keyword) {
                        warn!(keyword = keyword.as_str(), "no concepts match keyword");
                    }
                }
                review::write_artifact(artifact, &labels)?;
                Ok(Phase::AwaitingReview {
                    artifact: artifact.to_path_buf(),
                })
            }
        }
    }

    /// Phase two: resolve with the concepts confirmed in the artifact.
    ///
    /// Selections that never pause resolve exactly as in [`begin`](Self::begin).
    pub async fn resume(&self, data: &DataConfig, artifact: &Path) -> Result<Resolution, PipelineError> {
        match data {
            DataConfig::Descriptive(sel) if !sel.filter_keywords.is_empty() => {
                let concepts: Vec<String> = review::read_confirmed(artifact)?.into_iter().collect();
                if concepts.is_empty() {
                    warn!(
                        keywords = sel.filter_keywords.len(),
                        "no concepts confirmed for the filter keywords, nothing to resolve"
                    );
                    return Ok(Resolution::default());
                }
                self.search(sel, &concepts).await
            }
            _ => match self.begin(data, artifact).await? {
                Phase::Resolved(resolution) => Ok(resolution),
                Phase::AwaitingReview { .. } => Ok(Resolution::default()),
            },
        }
    }

    // ── Fixed mode ──

    /// Explicit ids plus the ids behind each procedure number.
    pub async fn fixed(&self, sel: &FixedSelection) -> Resolution {
        let mut out = Resolution::default();
        let mut seen = HashSet::new();

        for raw in &sel.celex_ids {
            match Celex::parse(raw) {
                Ok(celex) => out.push(&mut seen, celex),
                Err(e) => {
                    warn!(input = raw.as_str(), "skipping invalid CELEX id");
                    out.errors.push(e.into());
                }
            }
        }

        for raw in &sel.procedure_numbers {
            match self.procedure(raw).await {
                Ok(ids) => {
                    for celex in ids {
                        out.push(&mut seen, celex);
                    }
                }
                Err(e) => {
                    warn!(procedure = raw.as_str(), error = %e, "procedure number resolved to nothing");
                    out.errors.push(e);
                }
            }
        }

        info!(resolved = out.ids.len(), skipped = out.errors.len(), "fixed selection resolved");
        out
    }

    /// Adopted acts win over proposals. All adopted acts are kept.
    async fn procedure(&self, raw: &str) -> Result<Vec<Celex>, ResolutionError> {
        let procedure = normalize_procedure_number(raw)?;
        let docs = with_retry(&self.policy, "procedure", || {
            self.repository.procedure_documents(&procedure)
        })
        .await
        .map_err(|source| ResolutionError::Lookup {
            procedure: procedure.clone(),
            source,
        })?;

        let candidates = if docs.adopted.is_empty() { &docs.proposals } else { &docs.adopted };
        let ids: BTreeSet<Celex> = candidates
            .iter()
            .filter_map(|raw| match Celex::parse(raw) {
                Ok(c) => Some(c),
                Err(_) => {
                    warn!(procedure = procedure.as_str(), id = raw.as_str(), "ignoring invalid id in procedure");
                    None
                }
            })
            .collect();

        if ids.is_empty() {
            return Err(ResolutionError::ProcedureNotFound { procedure });
        }
        debug!(procedure = procedure.as_str(), count = ids.len(), adopted = !docs.adopted.is_empty(), "procedure resolved");
        Ok(ids.into_iter().collect())
    }

    // ── Descriptive mode ──

    /// Query the repository and enforce the selection locally: date range,
    /// allowed types and the three post-filters.
    async fn search(&self, sel: &DescriptiveSelection, concepts: &[String]) -> Result<Resolution, PipelineError> {
        let Some((start, end)) = sel.date_range() else {
            return Err(eulex_core::ConfigError::MissingDate("start_date").into());
        };
        let query = SearchQuery {
            start,
            end,
            document_types: sel.document_types.clone(),
            concepts: concepts.to_vec(),
            include_corrigenda: sel.include_corrigenda,
            include_consolidated_texts: sel.include_consolidated_texts,
            include_national_transpositions: sel.include_national_transpositions,
        };
        let hits = with_retry(&self.policy, "search", || self.repository.search(&query))
            .await
            .map_err(PipelineError::Search)?;

        let mut out = Resolution::default();
        let mut seen = HashSet::new();
        let total = hits.len();
        for hit in hits {
            let celex = match Celex::parse(&hit.celex) {
                Ok(c) => c,
                Err(e) => {
                    warn!(input = hit.celex.as_str(), "skipping invalid id in search results");
                    out.errors.push(e.into());
                    continue;
                }
            };
            if !hit.date.is_some_and(|d| start <= d && d <= end) {
                debug!(celex = %celex, date = ?hit.date, "outside date range");
                continue;
            }
            if !sel.document_types.contains(&celex.base_document_type()) {
                debug!(celex = %celex, "document type not selected");
                continue;
            }
            if (celex.is_corrigendum() && !sel.include_corrigenda)
                || (celex.is_consolidated() && !sel.include_consolidated_texts)
                || (celex.is_national_transposition() && !sel.include_national_transpositions)
            {
                debug!(celex = %celex, "removed by post-filter");
                continue;
            }
            out.push(&mut seen, celex);
        }

        info!(hits = total, resolved = out.ids.len(), concepts = concepts.len(), "descriptive selection resolved");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRepository, FakeThesaurus};
    use chrono::NaiveDate;
    use eulex_core::DocumentType;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn resolver(repo: FakeRepository, thesaurus: FakeThesaurus) -> Resolver {
        Resolver::new(Arc::new(repo), Arc::new(thesaurus), RetryPolicy::none(), "eng")
    }

    fn january(keywords: &[&str]) -> DescriptiveSelection {
        DescriptiveSelection {
            document_types: vec![DocumentType::Regulation, DocumentType::Directive],
            start_date: Some(date("2020-01-01")),
            end_date: Some(date("2020-01-31")),
            filter_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            include_corrigenda: false,
            include_consolidated_texts: false,
            include_national_transpositions: false,
        }
    }

    fn ids(resolution: &Resolution) -> Vec<&str> {
        resolution.ids.iter().map(Celex::as_str).collect()
    }

    #[tokio::test]
    async fn fixed_union_collapses_duplicates() {
        let repo = FakeRepository::new().with_procedure("2012/0011/COD", &["52012PC0011"], &["32016R0679"]);
        let r = resolver(repo, FakeThesaurus::new());
        let sel = FixedSelection {
            celex_ids: vec!["3 2016 R 0679".into(), "32016r0679".into(), "32016L0680".into(), "bogus".into()],
            procedure_numbers: vec!["2012/0011(COD)".into()],
        };
        let out = r.fixed(&sel).await;
        assert_eq!(ids(&out), vec!["32016R0679", "32016L0680"]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].subject(), "bogus");
    }

    #[tokio::test]
    async fn procedure_prefers_adopted_act() {
        let repo = FakeRepository::new()
            .with_procedure("2012/0011/COD", &["52012PC0011"], &["32016R0679"])
            .with_procedure("2023/0001/COD", &["52023PC0001"], &[]);
        let r = resolver(repo, FakeThesaurus::new());
        let sel = FixedSelection {
            celex_ids: vec![],
            procedure_numbers: vec!["2012/0011/COD".into(), "2023/0001/cod".into()],
        };
        let out = r.fixed(&sel).await;
        assert_eq!(ids(&out), vec!["32016R0679", "52023PC0001"]);
    }

    #[tokio::test]
    async fn unknown_and_malformed_procedures_are_recorded() {
        let r = resolver(FakeRepository::new(), FakeThesaurus::new());
        let sel = FixedSelection {
            celex_ids: vec![],
            procedure_numbers: vec!["2099/9999/COD".into(), "not-a-procedure".into()],
        };
        let out = r.fixed(&sel).await;
        assert!(out.ids.is_empty());
        assert!(matches!(out.errors[0], ResolutionError::ProcedureNotFound { .. }));
        assert!(matches!(out.errors[1], ResolutionError::InvalidProcedure(_)));
    }

    #[tokio::test]
    async fn descriptive_enforces_range_and_types() {
        let repo = FakeRepository::new()
            .with_hit("32020R0001", Some(date("2020-01-01")))
            .with_hit("32020L0002", Some(date("2020-01-31")))
            .with_hit("32019R2000", Some(date("2019-12-31")))
            .with_hit("32020D0003", Some(date("2020-01-15")))
            .with_hit("32020R0004", None);
        let r = resolver(repo, FakeThesaurus::new());
        let dir = TempDir::new().unwrap();
        let data = DataConfig::Descriptive(january(&[]));
        let Phase::Resolved(out) = r.begin(&data, &dir.path().join("review.yaml")).await.unwrap() else {
            panic!("no keywords should not pause");
        };
        assert_eq!(ids(&out), vec!["32020R0001", "32020L0002"]);
    }

    #[tokio::test]
    async fn post_filters_only_remove() {
        let hits = || {
            FakeRepository::new()
                .with_hit("32020R0001", Some(date("2020-01-10")))
                .with_hit("32020R0001R(01)", Some(date("2020-01-12")))
                .with_hit("02020R0001-20200120", Some(date("2020-01-20")))
                .with_hit("72020L0002", Some(date("2020-01-21")))
        };
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("review.yaml");

        let mut open = january(&[]);
        open.include_corrigenda = true;
        open.include_consolidated_texts = true;
        open.include_national_transpositions = true;
        let all = resolver(hits(), FakeThesaurus::new())
            .resume(&DataConfig::Descriptive(open.clone()), &artifact)
            .await
            .unwrap();
        assert_eq!(all.ids.len(), 4);

        open.include_corrigenda = false;
        let fewer = resolver(hits(), FakeThesaurus::new())
            .resume(&DataConfig::Descriptive(open), &artifact)
            .await
            .unwrap();
        assert_eq!(fewer.ids.len(), 3);
        assert!(fewer.ids.iter().all(|c| all.ids.contains(c)));
        assert!(fewer.ids.iter().all(|c| !c.is_corrigendum()));
    }

    #[tokio::test]
    async fn keywords_pause_then_resume_with_confirmed_concepts() {
        let repo = Arc::new(FakeRepository::new().with_hit("32020R0001", Some(date("2020-01-10"))));
        let thesaurus = FakeThesaurus::new()
            .with_concept("http://eurovoc.europa.eu/5595", &["Data protection"])
            .with_concept("http://eurovoc.europa.eu/1000", &["fisheries"]);
        let r = Resolver::new(repo.clone(), Arc::new(thesaurus), RetryPolicy::none(), "eng");
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("eurovoc_labels.yaml");
        let data = DataConfig::Descriptive(january(&["data protection"]));

        let phase = r.begin(&data, &artifact).await.unwrap();
        assert!(matches!(phase, Phase::AwaitingReview { .. }));
        assert!(repo.last_search().is_none());

        let out = r.resume(&data, &artifact).await.unwrap();
        assert_eq!(ids(&out), vec!["32020R0001"]);
        let query = repo.last_search().unwrap();
        assert_eq!(query.concepts, vec!["http://eurovoc.europa.eu/5595"]);
    }

    #[tokio::test]
    async fn no_confirmed_concepts_means_empty_resolution() {
        let repo = Arc::new(FakeRepository::new().with_hit("32020R0001", Some(date("2020-01-10"))));
        let r = Resolver::new(repo.clone(), Arc::new(FakeThesaurus::new()), RetryPolicy::none(), "eng");
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("eurovoc_labels.yaml");
        let data = DataConfig::Descriptive(january(&["nothing matches"]));

        r.begin(&data, &artifact).await.unwrap();
        let out = r.resume(&data, &artifact).await.unwrap();
        assert!(out.ids.is_empty());
        assert!(repo.last_search().is_none());
    }

    #[tokio::test]
    async fn resume_without_artifact_is_config_error() {
        let r = resolver(FakeRepository::new(), FakeThesaurus::new());
        let dir = TempDir::new().unwrap();
        let data = DataConfig::Descriptive(january(&["data protection"]));
        let err = r.resume(&data, &dir.path().join("missing.yaml")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
