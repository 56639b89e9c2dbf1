//! End-to-end runs against in-memory remote services.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use eulex_cellar::WorkMetadata;
use eulex_core::config::{DescriptiveSelection, FixedSelection};
use eulex_core::{Config, DataConfig, DocumentType, OutputFormat, RelationKind, tables};
use eulex_pipeline::testing::{FakeRepository, FakeThesaurus};
use eulex_pipeline::{Pipeline, RunOutcome, RunSummary};
use eulex_store::DuckStore;
use eulex_store::export::{read_csv, read_ipc, read_parquet};
use tempfile::TempDir;

const GDPR: &str = r#"<html><body>
  <div class="eli-main-title"><p>REGULATION (EU) 2016/679 of 27 April 2016</p></div>
  <div id="rct_1"><p>(1) The protection of natural persons is a fundamental right.</p></div>
  <div id="rct_2"><p>(2) Directive 95/46/EC should be repealed.</p></div>
  <div id="art_1"><p class="oj-ti-art">Article 1</p><div class="eli-title"><p>Subject-matter</p></div><p>This Regulation lays down rules.</p></div>
  <div id="art_2"><p class="oj-ti-art">Article 2</p><div class="eli-title"><p>Scope</p></div><p>It applies to processing, see Regulation (EU) 2018/1725.</p></div>
  <div id="anx_I"><p class="oj-doc-ti">ANNEX I</p><p>Annex text.</p></div>
</body></html>"#;

const SHORT_ACT: &str = r#"<html><body>
  <div id="art_1"><p class="oj-ti-art">Article 1</p><p>Sole article.</p></div>
</body></html>"#;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn metadata(title: &str, on: &str) -> WorkMetadata {
    WorkMetadata {
        title: Some(title.into()),
        date: Some(date(on)),
        relations: vec![],
    }
}

fn gdpr_metadata() -> WorkMetadata {
    WorkMetadata {
        title: Some("General Data Protection Regulation".into()),
        date: Some(date("2016-04-27")),
        relations: vec![(RelationKind::Repeals, "31995L0046".into())],
    }
}

fn config(data: DataConfig, dir: &Path) -> Config {
    let mut config = Config::new(data).with_output_directory(dir);
    config.processing.retry.base_delay_ms = 1;
    config.processing.retry.max_delay_ms = 2;
    config.processing.max_threads = 2;
    config.output.formats = vec![OutputFormat::Csv, OutputFormat::Parquet, OutputFormat::Arrow];
    config
}

fn fixed(ids: &[&str], procedures: &[&str]) -> DataConfig {
    DataConfig::Fixed(FixedSelection {
        celex_ids: ids.iter().map(|s| s.to_string()).collect(),
        procedure_numbers: procedures.iter().map(|s| s.to_string()).collect(),
    })
}

async fn completed(pipeline: &Pipeline) -> RunSummary {
    match pipeline.run().await.unwrap() {
        RunOutcome::Completed(summary) => summary,
        RunOutcome::AwaitingReview { artifact } => panic!("unexpected pause at {}", artifact.display()),
    }
}

fn open_store(dir: &Path) -> DuckStore {
    DuckStore::open_persistent(&dir.join("eulex_build.duckdb")).unwrap()
}

fn strings(batches: &[RecordBatch], column: &str) -> Vec<String> {
    let mut out = Vec::new();
    for batch in batches {
        let col = batch
            .column_by_name(column)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        out.extend((0..col.len()).map(|i| col.value(i).to_string()));
    }
    out
}

fn ids(batches: &[RecordBatch]) -> Vec<i64> {
    let mut out = Vec::new();
    for batch in batches {
        let col = batch
            .column_by_name("id")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        out.extend((0..col.len()).map(|i| col.value(i)));
    }
    out
}

// ── Scenarios ──

#[tokio::test]
async fn fixed_single_regulation() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new().with_work("32016R0679", gdpr_metadata(), Some(GDPR));
    let pipeline = Pipeline::new(
        config(fixed(&["32016R0679"], &[]), dir.path()),
        Arc::new(repo),
        Arc::new(FakeThesaurus::new()),
    );
    let summary = completed(&pipeline).await;
    assert_eq!(summary.resolved, 1);
    assert_eq!(summary.committed, 1);
    assert!(summary.skipped.is_empty());

    let store = open_store(dir.path());
    assert_eq!(store.works_count().unwrap(), 1);
    let work = store.get_work("32016R0679").unwrap().unwrap();
    assert_eq!(work.document_type, DocumentType::Regulation);
    assert_eq!(work.title.as_deref(), Some("General Data Protection Regulation"));
    let units = store.text_units_for("32016R0679").unwrap();
    assert!(units.iter().any(|(_, u)| u.kind.as_str() == "annex"));
}

#[tokio::test]
async fn fixed_single_regulation_without_annexes() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new().with_work("32016R0679", gdpr_metadata(), Some(GDPR));
    let mut cfg = config(fixed(&["32016R0679"], &[]), dir.path());
    cfg.processing.text_extraction.include_annexes = false;
    let pipeline = Pipeline::new(cfg, Arc::new(repo), Arc::new(FakeThesaurus::new()));
    completed(&pipeline).await;

    let store = open_store(dir.path());
    let annexes = store
        .query_arrow("SELECT count(*)::BIGINT FROM text_units WHERE type = 'annex'")
        .unwrap();
    let count = annexes[0].column(0).as_any().downcast_ref::<Int64Array>().unwrap().value(0);
    assert_eq!(count, 0);
    assert_eq!(store.text_units_count().unwrap(), 4);
}

#[tokio::test]
async fn descriptive_january_2020() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new()
        .with_work("32020R0001", metadata("January regulation", "2020-01-02"), Some(SHORT_ACT))
        .with_work("32020L0002", metadata("January directive", "2020-01-31"), Some(SHORT_ACT))
        .with_work("32019R2000", metadata("December regulation", "2019-12-31"), Some(SHORT_ACT))
        .with_hit("32020R0001", Some(date("2020-01-02")))
        .with_hit("32020L0002", Some(date("2020-01-31")))
        .with_hit("32019R2000", Some(date("2019-12-31")));
    let data = DataConfig::Descriptive(DescriptiveSelection {
        document_types: vec![DocumentType::Regulation, DocumentType::Directive],
        start_date: Some(date("2020-01-01")),
        end_date: Some(date("2020-01-31")),
        filter_keywords: vec![],
        include_corrigenda: false,
        include_consolidated_texts: false,
        include_national_transpositions: false,
    });
    let pipeline = Pipeline::new(config(data, dir.path()), Arc::new(repo), Arc::new(FakeThesaurus::new()));
    let summary = completed(&pipeline).await;
    assert_eq!(summary.resolved, 2);

    let store = open_store(dir.path());
    let batches = store
        .query_arrow("SELECT count(*)::BIGINT FROM works WHERE date_adopted NOT BETWEEN DATE '2020-01-01' AND DATE '2020-01-31'")
        .unwrap();
    let outside = batches[0].column(0).as_any().downcast_ref::<Int64Array>().unwrap().value(0);
    assert_eq!(outside, 0);
    assert_eq!(store.works_count().unwrap(), 2);
}

#[tokio::test]
async fn procedure_with_proposal_and_regulation_keeps_regulation() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new()
        .with_procedure("2012/0011/COD", &["52012PC0011"], &["32016R0679"])
        .with_work("52012PC0011", metadata("Proposal", "2012-01-25"), Some(SHORT_ACT))
        .with_work("32016R0679", gdpr_metadata(), Some(GDPR));
    let pipeline = Pipeline::new(
        config(fixed(&[], &["2012/0011(COD)"]), dir.path()),
        Arc::new(repo),
        Arc::new(FakeThesaurus::new()),
    );
    let summary = completed(&pipeline).await;
    assert_eq!(summary.resolved, 1);

    let store = open_store(dir.path());
    assert!(store.get_work("32016R0679").unwrap().is_some());
    assert!(store.get_work("52012PC0011").unwrap().is_none());
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(
        FakeRepository::new()
            .with_work("32016R0679", gdpr_metadata(), Some(GDPR))
            .with_work("32020R0001", metadata("Other", "2020-01-02"), Some(SHORT_ACT)),
    );
    let pipeline = Pipeline::new(
        config(fixed(&["32016R0679", "32020R0001"], &[]), dir.path()),
        repo.clone(),
        Arc::new(FakeThesaurus::new()),
    );

    let first = completed(&pipeline).await;
    assert_eq!(first.committed, 2);
    let (works, units, relations) = {
        let store = open_store(dir.path());
        (
            store.works_count().unwrap(),
            store.text_units_count().unwrap(),
            store.relations_count().unwrap(),
        )
    };
    let metadata_calls = repo.metadata_calls();

    let second = completed(&pipeline).await;
    assert_eq!(second.already_present, 2);
    assert_eq!(second.committed, 0);
    assert_eq!(repo.metadata_calls(), metadata_calls);
    assert_eq!(second.exported["works"], works);

    let store = open_store(dir.path());
    assert_eq!(store.works_count().unwrap(), works);
    assert_eq!(store.text_units_count().unwrap(), units);
    assert_eq!(store.relations_count().unwrap(), relations);
}

#[tokio::test]
async fn force_refresh_replaces_rows() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new().with_work("32016R0679", gdpr_metadata(), Some(GDPR));
    let mut cfg = config(fixed(&["32016R0679"], &[]), dir.path());
    cfg.processing.force_refresh = true;
    let pipeline = Pipeline::new(cfg, Arc::new(repo), Arc::new(FakeThesaurus::new()));

    completed(&pipeline).await;
    let units = open_store(dir.path()).text_units_count().unwrap();
    let second = completed(&pipeline).await;
    assert_eq!(second.committed, 1);
    assert_eq!(open_store(dir.path()).text_units_count().unwrap(), units);
}

#[tokio::test]
async fn failures_are_recorded_not_fatal() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new()
        .with_work("32016R0679", gdpr_metadata(), Some(GDPR))
        .with_work("32020R0001", metadata("No body", "2020-01-02"), None);
    let pipeline = Pipeline::new(
        config(fixed(&["32016R0679", "32020R0001", "32099R9999", "garbage"], &[]), dir.path()),
        Arc::new(repo),
        Arc::new(FakeThesaurus::new()),
    );
    let summary = completed(&pipeline).await;
    assert_eq!(summary.resolved, 3);
    assert_eq!(summary.committed, 1);
    assert_eq!(summary.committed_without_body, 1);
    let skipped: BTreeSet<_> = summary.skipped.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(skipped, BTreeSet::from(["32099R9999", "garbage"]));

    let store = open_store(dir.path());
    assert_eq!(store.works_count().unwrap(), 2);
    assert!(!store.completed_ids().unwrap().contains("32020R0001"));
    drop(store);

    // The body-less work is not fully present and is retried.
    let again = completed(&pipeline).await;
    assert_eq!(again.already_present, 1);
    assert_eq!(again.committed_without_body, 1);
}

#[tokio::test]
async fn panicking_fetch_is_a_skip() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new()
        .with_work("32016R0679", gdpr_metadata(), Some(GDPR))
        .with_work("32020R0001", metadata("Short act", "2020-01-02"), Some(SHORT_ACT))
        .with_work("32020R0002", metadata("Cursed act", "2020-01-03"), Some(SHORT_ACT))
        .panic_on("32020R0002");
    let pipeline = Pipeline::new(
        config(fixed(&["32016R0679", "32020R0002", "32020R0001"], &[]), dir.path()),
        Arc::new(repo),
        Arc::new(FakeThesaurus::new()),
    );
    let summary = completed(&pipeline).await;
    assert_eq!(summary.resolved, 3);
    assert_eq!(summary.committed, 2);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].id, "32020R0002");
    assert!(summary.skipped[0].reason.contains("fetch task failed"));

    let store = open_store(dir.path());
    assert_eq!(store.works_count().unwrap(), 2);
    assert!(store.get_work("32020R0002").unwrap().is_none());
}

#[tokio::test]
async fn keyword_review_pauses_then_resumes() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new()
        .with_work("32020R0001", metadata("Data regulation", "2020-01-02"), Some(SHORT_ACT))
        .with_hit("32020R0001", Some(date("2020-01-02")));
    let thesaurus = FakeThesaurus::new().with_concept("http://eurovoc.europa.eu/5595", &["data protection"]);
    let data = DataConfig::Descriptive(DescriptiveSelection {
        document_types: vec![DocumentType::Regulation],
        start_date: Some(date("2020-01-01")),
        end_date: Some(date("2020-01-31")),
        filter_keywords: vec!["Data Protection".into()],
        include_corrigenda: false,
        include_consolidated_texts: false,
        include_national_transpositions: false,
    });
    let pipeline = Pipeline::new(config(data.clone(), dir.path()), Arc::new(repo), Arc::new(thesaurus));

    let RunOutcome::AwaitingReview { artifact } = pipeline.run().await.unwrap() else {
        panic!("interactive run should pause for review");
    };
    assert_eq!(artifact, dir.path().join("eurovoc_labels.yaml"));
    assert!(!dir.path().join("works.csv").exists());

    let summary = pipeline.resume().await.unwrap();
    assert_eq!(summary.committed, 1);
}

#[tokio::test]
async fn automated_mode_skips_the_pause() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new()
        .with_work("32020R0001", metadata("Data regulation", "2020-01-02"), Some(SHORT_ACT))
        .with_hit("32020R0001", Some(date("2020-01-02")));
    let thesaurus = FakeThesaurus::new().with_concept("http://eurovoc.europa.eu/5595", &["data protection"]);
    let data = DataConfig::Descriptive(DescriptiveSelection {
        document_types: vec![DocumentType::Regulation],
        start_date: Some(date("2020-01-01")),
        end_date: Some(date("2020-01-31")),
        filter_keywords: vec!["data".into()],
        include_corrigenda: false,
        include_consolidated_texts: false,
        include_national_transpositions: false,
    });
    let mut cfg = config(data, dir.path());
    cfg.processing.automated_mode = true;
    let pipeline = Pipeline::new(cfg, Arc::new(repo), Arc::new(thesaurus));
    let summary = completed(&pipeline).await;
    assert_eq!(summary.committed, 1);
    assert!(dir.path().join("eurovoc_labels.yaml").exists());
}

#[tokio::test]
async fn invalid_config_aborts_before_any_call() {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(FakeRepository::new());
    let pipeline = Pipeline::new(config(fixed(&[], &[]), dir.path()), repo.clone(), Arc::new(FakeThesaurus::new()));
    assert!(matches!(
        pipeline.run().await,
        Err(eulex_pipeline::PipelineError::Config(_))
    ));
    assert_eq!(repo.metadata_calls(), 0);
    assert!(!dir.path().join("eulex_build.duckdb").exists());
}

#[tokio::test]
async fn exports_agree_with_store() {
    let dir = TempDir::new().unwrap();
    let repo = FakeRepository::new()
        .with_work("32016R0679", gdpr_metadata(), Some(GDPR))
        .with_work("32020R0001", metadata("Other", "2020-01-02"), Some(SHORT_ACT));
    let pipeline = Pipeline::new(
        config(fixed(&["32016R0679", "32020R0001"], &[]), dir.path()),
        Arc::new(repo),
        Arc::new(FakeThesaurus::new()),
    );
    let summary = completed(&pipeline).await;
    let out = dir.path();

    let store = open_store(out);
    let store_works = strings(&store.table_batches(tables::WORKS, false).unwrap(), "celex_id");
    let store_units = ids(&store.table_batches(tables::TEXT_UNITS, false).unwrap());
    let store_relations = ids(&store.table_batches(tables::RELATIONS, false).unwrap());
    assert_eq!(summary.exported["works"], store_works.len());
    assert_eq!(summary.exported["text_units"], store_units.len());
    assert_eq!(summary.exported["relations"], store_relations.len());
    assert!(store_relations.len() >= 3);

    let works_csv = read_csv(&out.join("works.csv"), tables::works_schema(false)).unwrap();
    assert_eq!(strings(&works_csv, "celex_id"), store_works);
    assert_eq!(strings(&read_parquet(&out.join("works.parquet")).unwrap(), "celex_id"), store_works);
    assert_eq!(strings(&read_ipc(&out.join("works.arrow")).unwrap(), "celex_id"), store_works);

    let units_csv = read_csv(&out.join("text_units.csv"), tables::text_units_schema()).unwrap();
    assert_eq!(ids(&units_csv), store_units);
    assert_eq!(ids(&read_parquet(&out.join("text_units.parquet")).unwrap()), store_units);
    assert_eq!(ids(&read_ipc(&out.join("text_units.arrow")).unwrap()), store_units);

    let rel_csv = read_csv(&out.join("relations.csv"), tables::relations_schema()).unwrap();
    assert_eq!(ids(&rel_csv), store_relations);
    assert_eq!(ids(&read_parquet(&out.join("relations.parquet")).unwrap()), store_relations);
    assert_eq!(ids(&read_ipc(&out.join("relations.arrow")).unwrap()), store_relations);

    // Every child row points at an exported work.
    let work_set: BTreeSet<_> = store_works.iter().cloned().collect();
    let unit_owners = strings(&read_parquet(&out.join("text_units.parquet")).unwrap(), "celex_id");
    assert!(unit_owners.iter().all(|c| work_set.contains(c)));
    let sources = strings(&read_ipc(&out.join("relations.arrow")).unwrap(), "celex_source");
    assert!(sources.iter().all(|c| work_set.contains(c)));
}
