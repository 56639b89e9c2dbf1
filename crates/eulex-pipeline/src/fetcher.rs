//! Per-document retrieval and extraction.
//!
//! One call to [`Fetcher::fetch`] produces everything the aggregator needs
//! for one identifier. Metadata failure skips the document; every later
//! failure only degrades it.

use std::sync::Arc;

use eulex_cellar::{BodyStream, ExpressionMetadata, FetchError, Repository, RetryPolicy, WorkMetadata, with_retry};
use eulex_core::config::ProcessingConfig;
use eulex_core::{Celex, DocumentResult, DocumentType, Work};
use eulex_extract::metadata::{body_text, date_in_title, main_title};
use eulex_extract::{DocumentBodies, ExtractOptions, RelationOptions, extract_relations, extract_text_units};
use tracing::{debug, warn};

pub struct Fetcher {
    repository: Arc<dyn Repository>,
    policy: RetryPolicy,
    language: String,
    text: ExtractOptions,
    relations: RelationOptions,
    original_act_relations: bool,
}

/// What the original act of a consolidated text contributes.
#[derive(Default)]
struct OriginalAct {
    metadata: Option<WorkMetadata>,
    body: Option<String>,
}

impl Fetcher {
    pub fn new(repository: Arc<dyn Repository>, processing: &ProcessingConfig) -> Self {
        Self {
            repository,
            policy: RetryPolicy::from(&processing.retry),
            language: processing.language.clone(),
            text: ExtractOptions::from(&processing.text_extraction),
            relations: RelationOptions::from(&processing.relations_extraction),
            original_act_relations: processing.relations_extraction.include_relations
                && processing
                    .relations_extraction
                    .include_original_act_relations_for_consolidated_texts,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retrieve, segment and link one document.
    pub async fn fetch(&self, celex: &Celex) -> Result<DocumentResult, FetchError> {
        let metadata = with_retry(&self.policy, "metadata", || {
            self.repository.metadata(celex, &self.language)
        })
        .await?;

        let body = match self.body(celex, BodyStream::Main).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(celex = %celex, error = %e, "body unavailable, committing metadata only");
                None
            }
        };

        let original = match celex.original_act() {
            Some(act) => self.original_act(celex, &act, &metadata, body.is_some()).await,
            None => OriginalAct::default(),
        };

        let annexes = if body.is_some() && self.text.annexes && celex.document_type() == DocumentType::Proposal {
            match self.body(celex, BodyStream::Annex).await {
                Ok(annex) => Some(annex),
                Err(e) if e.is_not_found() => {
                    debug!(celex = %celex, "no separate annex stream");
                    None
                }
                Err(e) => {
                    warn!(celex = %celex, error = %e, "annex stream unavailable");
                    None
                }
            }
        } else {
            None
        };

        // Title: query result, object notice, body. Date: query result (own
        // or original act's), object notice of the dated act, title.
        let notice = match metadata.title {
            Some(_) => None,
            None => self.notice(celex).await,
        };
        let title = metadata
            .title
            .clone()
            .or_else(|| notice.as_ref().and_then(|n| n.title.clone()))
            .or_else(|| body.as_deref().and_then(main_title));

        let mut date_adopted = metadata.date.or_else(|| original.metadata.as_ref().and_then(|m| m.date));
        if date_adopted.is_none() {
            date_adopted = match celex.original_act() {
                Some(act) => self.notice(&act).await.and_then(|n| n.date),
                None if notice.is_some() => notice.and_then(|n| n.date),
                None => self.notice(celex).await.and_then(|n| n.date),
            };
        }
        let date_adopted = date_adopted.or_else(|| title.as_deref().and_then(date_in_title));

        let text_units = match body.as_deref() {
            Some(main) => {
                let bodies = DocumentBodies {
                    main,
                    recitals: original.body.as_deref(),
                    annexes: annexes.as_deref(),
                };
                extract_text_units(celex, &bodies, &self.text).units
            }
            None => Vec::new(),
        };

        let mut structured = metadata.relations;
        if let Some(orig) = original.metadata.filter(|_| self.original_act_relations) {
            structured.extend(orig.relations);
        }
        let text = body.as_deref().map(body_text);
        let relations = extract_relations(celex, &structured, text.as_deref(), &self.relations).relations;

        debug!(
            celex = %celex,
            units = text_units.len(),
            relations = relations.len(),
            has_body = body.is_some(),
            "fetched"
        );

        Ok(DocumentResult {
            work: Work {
                celex: celex.clone(),
                document_type: celex.document_type(),
                title,
                date_adopted,
                language: self.language.clone(),
                full_text_html: body,
            },
            text_units,
            relations,
        })
    }

    async fn body(&self, celex: &Celex, stream: BodyStream) -> Result<String, FetchError> {
        with_retry(&self.policy, "body", || self.repository.body(celex, stream, &self.language)).await
    }

    /// Object notice of `celex`, or `None` when it cannot be read.
    async fn notice(&self, celex: &Celex) -> Option<ExpressionMetadata> {
        match with_retry(&self.policy, "object notice", || {
            self.repository.expression_metadata(celex, &self.language)
        })
        .await
        {
            Ok(notice) => Some(notice),
            Err(e) if e.is_not_found() => {
                debug!(celex = %celex, "no object notice");
                None
            }
            Err(e) => {
                warn!(celex = %celex, error = %e, "object notice unavailable");
                None
            }
        }
    }

    /// Date fallback, recitals and optionally relations of the act a
    /// consolidated text is built on. Failures here never fail the text.
    async fn original_act(
        &self,
        celex: &Celex,
        act: &Celex,
        metadata: &WorkMetadata,
        has_body: bool,
    ) -> OriginalAct {
        let mut out = OriginalAct::default();

        if metadata.date.is_none() || self.original_act_relations {
            match with_retry(&self.policy, "metadata", || self.repository.metadata(act, &self.language)).await {
                Ok(m) => out.metadata = Some(m),
                Err(e) => warn!(celex = %celex, original = %act, error = %e, "original act metadata unavailable"),
            }
        }

        if has_body && self.text.recitals {
            match self.body(act, BodyStream::Main).await {
                Ok(b) => out.body = Some(b),
                Err(e) => warn!(celex = %celex, original = %act, error = %e, "original act body unavailable"),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRepository;
    use chrono::NaiveDate;
    use eulex_core::{RelationKind, SegmentKind};

    const REGULATION: &str = r#"<html><body>
      <div class="eli-main-title"><p>REGULATION (EU) 2016/679 of 27 April 2016</p></div>
      <div id="rct_1"><p>(1) The protection of natural persons is a fundamental right.</p></div>
      <div id="rct_2"><p>(2) Directive 95/46/EC should be repealed.</p></div>
      <div id="art_1"><p class="oj-ti-art">Article 1</p><div class="eli-title"><p>Subject-matter</p></div><p>This Regulation lays down rules.</p></div>
      <div id="art_2"><p class="oj-ti-art">Article 2</p><div class="eli-title"><p>Scope</p></div><p>This Regulation applies.</p></div>
      <div id="anx_I"><p class="oj-doc-ti">ANNEX I</p><p class="oj-doc-ti">List</p><p>Annex text.</p></div>
    </body></html>"#;

    const CONSOLIDATED: &str = r#"<html><body>
      <div id="art_1"><p class="oj-ti-art">Article 1</p><p>Consolidated text.</p></div>
    </body></html>"#;

    fn celex(s: &str) -> Celex {
        Celex::parse(s).unwrap()
    }

    fn fetcher(repo: FakeRepository, processing: &ProcessingConfig) -> Fetcher {
        Fetcher::new(Arc::new(repo), processing).with_retry_policy(RetryPolicy {
            max_retries: 3,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
        })
    }

    fn gdpr_metadata() -> WorkMetadata {
        WorkMetadata {
            title: Some("General Data Protection Regulation".into()),
            date: NaiveDate::from_ymd_opt(2016, 4, 27),
            relations: vec![(RelationKind::Repeals, "31995L0046".into())],
        }
    }

    #[tokio::test]
    async fn full_document() {
        let repo = FakeRepository::new().with_work("32016R0679", gdpr_metadata(), Some(REGULATION));
        let result = fetcher(repo, &ProcessingConfig::default())
            .fetch(&celex("32016R0679"))
            .await
            .unwrap();

        assert_eq!(result.work.document_type, DocumentType::Regulation);
        assert!(result.work.full_text_html.is_some());
        let kinds: Vec<_> = result.text_units.iter().map(|u| u.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SegmentKind::Recital,
                SegmentKind::Recital,
                SegmentKind::Article,
                SegmentKind::Article,
                SegmentKind::Annex
            ]
        );
        // Structured repeal and in-text citation point at the same act with
        // different kinds.
        let edges: Vec<_> = result.relations.iter().map(|r| (r.target.as_str(), r.kind)).collect();
        assert_eq!(
            edges,
            vec![("31995L0046", RelationKind::Repeals), ("31995L0046", RelationKind::Cites)]
        );
    }

    #[tokio::test]
    async fn disabled_annexes_produce_none() {
        let repo = FakeRepository::new().with_work("32016R0679", gdpr_metadata(), Some(REGULATION));
        let mut processing = ProcessingConfig::default();
        processing.text_extraction.include_annexes = false;
        let result = fetcher(repo, &processing).fetch(&celex("32016R0679")).await.unwrap();
        assert!(result.text_units.iter().all(|u| u.kind != SegmentKind::Annex));
        assert!(!result.text_units.is_empty());
    }

    #[tokio::test]
    async fn missing_metadata_is_a_skip() {
        let err = fetcher(FakeRepository::new(), &ProcessingConfig::default())
            .fetch(&celex("32016R0679"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn transient_metadata_failures_are_retried() {
        let repo = Arc::new(
            FakeRepository::new()
                .with_work("32016R0679", gdpr_metadata(), Some(REGULATION))
                .fail_transiently("32016R0679", 2),
        );
        let f = Fetcher::new(repo.clone(), &ProcessingConfig::default()).with_retry_policy(RetryPolicy {
            max_retries: 3,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
        });
        f.fetch(&celex("32016R0679")).await.unwrap();
        assert_eq!(repo.metadata_calls(), 3);
    }

    #[tokio::test]
    async fn missing_body_keeps_work_without_units() {
        let repo = FakeRepository::new().with_work("32016R0679", gdpr_metadata(), None);
        let result = fetcher(repo, &ProcessingConfig::default())
            .fetch(&celex("32016R0679"))
            .await
            .unwrap();
        assert!(result.work.full_text_html.is_none());
        assert!(result.text_units.is_empty());
        assert_eq!(result.relations.len(), 1);
    }

    #[tokio::test]
    async fn title_and_date_fall_back_to_body() {
        let repo = FakeRepository::new().with_work("32016R0679", WorkMetadata::default(), Some(REGULATION));
        let result = fetcher(repo, &ProcessingConfig::default())
            .fetch(&celex("32016R0679"))
            .await
            .unwrap();
        assert_eq!(result.work.title.as_deref(), Some("REGULATION (EU) 2016/679 of 27 April 2016"));
        assert_eq!(result.work.date_adopted, NaiveDate::from_ymd_opt(2016, 4, 27));
    }

    #[tokio::test]
    async fn object_notice_fills_gaps_before_body() {
        let notice = ExpressionMetadata {
            title: Some("Regulation (EU) 2016/679 on the protection of natural persons".into()),
            date: NaiveDate::from_ymd_opt(2016, 4, 14),
        };
        let repo = Arc::new(
            FakeRepository::new()
                .with_work("32016R0679", WorkMetadata::default(), Some(REGULATION))
                .with_notice("32016R0679", notice),
        );
        let f = Fetcher::new(repo.clone(), &ProcessingConfig::default());
        let result = f.fetch(&celex("32016R0679")).await.unwrap();

        assert_eq!(
            result.work.title.as_deref(),
            Some("Regulation (EU) 2016/679 on the protection of natural persons")
        );
        assert_eq!(result.work.date_adopted, NaiveDate::from_ymd_opt(2016, 4, 14));
        assert_eq!(repo.notice_calls(), 1);
    }

    #[tokio::test]
    async fn object_notice_not_read_when_query_is_complete() {
        let repo = Arc::new(FakeRepository::new().with_work("32016R0679", gdpr_metadata(), Some(REGULATION)));
        let f = Fetcher::new(repo.clone(), &ProcessingConfig::default());
        f.fetch(&celex("32016R0679")).await.unwrap();
        assert_eq!(repo.notice_calls(), 0);
    }

    #[tokio::test]
    async fn consolidated_date_comes_from_original_notice() {
        let repo = FakeRepository::new()
            .with_work("32016R0679", WorkMetadata::default(), None)
            .with_notice(
                "32016R0679",
                ExpressionMetadata {
                    title: None,
                    date: NaiveDate::from_ymd_opt(2016, 4, 27),
                },
            )
            .with_work(
                "02016R0679-20160504",
                WorkMetadata {
                    title: Some("Consolidated text".into()),
                    date: None,
                    relations: vec![],
                },
                Some(CONSOLIDATED),
            );
        let result = fetcher(repo, &ProcessingConfig::default())
            .fetch(&celex("02016R0679-20160504"))
            .await
            .unwrap();
        assert_eq!(result.work.date_adopted, NaiveDate::from_ymd_opt(2016, 4, 27));
    }

    #[tokio::test]
    async fn consolidated_text_borrows_from_original_act() {
        let repo = FakeRepository::new()
            .with_work("32016R0679", gdpr_metadata(), Some(REGULATION))
            .with_work(
                "02016R0679-20160504",
                WorkMetadata {
                    title: Some("Consolidated GDPR".into()),
                    date: None,
                    relations: vec![],
                },
                Some(CONSOLIDATED),
            );
        let mut processing = ProcessingConfig::default();
        processing
            .relations_extraction
            .include_original_act_relations_for_consolidated_texts = true;
        let result = fetcher(repo, &processing)
            .fetch(&celex("02016R0679-20160504"))
            .await
            .unwrap();

        assert_eq!(result.work.document_type, DocumentType::Consolidated);
        assert_eq!(result.work.date_adopted, NaiveDate::from_ymd_opt(2016, 4, 27));
        let recitals = result.text_units.iter().filter(|u| u.kind == SegmentKind::Recital).count();
        assert_eq!(recitals, 2);
        assert!(result
            .relations
            .iter()
            .all(|r| r.source.as_str() == "02016R0679-20160504"));
        assert!(result
            .relations
            .iter()
            .any(|r| r.kind == RelationKind::Repeals && r.target.as_str() == "31995L0046"));
    }

    #[tokio::test]
    async fn proposal_annexes_come_from_annex_stream() {
        let proposal = r#"<html><body><div id="TexteOnly">
            <p>Whereas the proposal is needed.</p>
            <p>Article 1</p><p>Proposal text.</p>
        </div></body></html>"#;
        let annex = r#"<html><body><div id="TexteOnly">
            <p>ANNEX I Definitions</p><p>Annex body.</p>
        </div></body></html>"#;
        let repo = FakeRepository::new()
            .with_work("52020PC0825", WorkMetadata::default(), Some(proposal))
            .with_annex("52020PC0825", annex);
        let result = fetcher(repo, &ProcessingConfig::default())
            .fetch(&celex("52020PC0825"))
            .await
            .unwrap();
        let annexes: Vec<_> = result.text_units.iter().filter(|u| u.kind == SegmentKind::Annex).collect();
        assert_eq!(annexes.len(), 1);
        assert_eq!(annexes[0].number, "I");
    }
}
