//! Run orchestration: resolve, fetch in a bounded pool, aggregate, export.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use eulex_cellar::{CellarClient, Repository, RetryPolicy, Thesaurus};
use eulex_core::{Celex, Config};
use eulex_store::DuckStore;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::aggregator::Aggregator;
use crate::fetcher::Fetcher;
use crate::resolver::{Phase, Resolution, Resolver};
use crate::PipelineError;

/// One selection entry or document that did not make it into the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub id: String,
    pub reason: String,
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub resolved: usize,
    /// Already fully present from an earlier run and not fetched again.
    pub already_present: usize,
    pub committed: usize,
    pub committed_without_body: usize,
    pub skipped: Vec<Skipped>,
    /// Exported rows per table.
    pub exported: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// The concept review artifact was written; edit it and call
    /// [`Pipeline::resume`].
    AwaitingReview { artifact: PathBuf },
}

pub struct Pipeline {
    config: Config,
    repository: Arc<dyn Repository>,
    thesaurus: Arc<dyn Thesaurus>,
    today: NaiveDate,
}

impl Pipeline {
    pub fn new(config: Config, repository: Arc<dyn Repository>, thesaurus: Arc<dyn Thesaurus>) -> Self {
        Self {
            config,
            repository,
            thesaurus,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// A pipeline talking to the public Cellar endpoints.
    pub fn with_cellar(config: Config) -> Result<Self, PipelineError> {
        let timeout = Duration::from_secs(config.processing.retry.timeout_secs);
        let client = Arc::new(CellarClient::new(timeout).map_err(PipelineError::Client)?);
        Ok(Self::new(config, client.clone(), client))
    }

    /// Date used to reject future selection bounds.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Phase one. In automated mode a review pause is skipped and the
    /// unedited artifact is used right away.
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.config.validate(self.today)?;
        let artifact = self.config.output.review_artifact_path();

        match self.resolver().begin(&self.config.data, &artifact).await? {
            Phase::Resolved(resolution) => Ok(RunOutcome::Completed(self.process(resolution).await?)),
            Phase::AwaitingReview { artifact } if self.config.processing.automated_mode => {
                info!(path = %artifact.display(), "automated mode, using all discovered concepts");
                Ok(RunOutcome::Completed(self.resume().await?))
            }
            Phase::AwaitingReview { artifact } => {
                info!(path = %artifact.display(), "review required before resolution can continue");
                Ok(RunOutcome::AwaitingReview { artifact })
            }
        }
    }

    /// Phase two: resolve from the reviewed artifact and finish the run.
    pub async fn resume(&self) -> Result<RunSummary, PipelineError> {
        self.config.validate(self.today)?;
        let artifact = self.config.output.review_artifact_path();
        let resolution = self.resolver().resume(&self.config.data, &artifact).await?;
        self.process(resolution).await
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(
            self.repository.clone(),
            self.thesaurus.clone(),
            RetryPolicy::from(&self.config.processing.retry),
            self.config.processing.language.clone(),
        )
    }

    async fn process(&self, resolution: Resolution) -> Result<RunSummary, PipelineError> {
        let output = &self.config.output;
        std::fs::create_dir_all(&output.output_directory)?;

        let mut summary = RunSummary {
            resolved: resolution.ids.len(),
            skipped: resolution
                .errors
                .iter()
                .map(|e| Skipped {
                    id: e.subject().to_string(),
                    reason: e.to_string(),
                })
                .collect(),
            ..RunSummary::default()
        };

        let store = DuckStore::open_persistent(&output.database_path())?;
        let pending = self.pending(&store, resolution.ids, &mut summary)?;

        // ── Fetch and aggregate ──
        let pool = self.config.processing.pool_size();
        info!(documents = pending.len(), pool, "processing documents");

        let (tx, rx) = mpsc::channel(pool * 2);
        let aggregator = Aggregator::new(store).spawn(rx);
        let fetcher = Arc::new(Fetcher::new(self.repository.clone(), &self.config.processing));
        let permits = Arc::new(Semaphore::new(pool));
        let mut tasks = JoinSet::new();
        let mut in_flight = HashMap::new();

        for celex in pending {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let fetcher = fetcher.clone();
            let tx = tx.clone();
            let id = celex.to_string();
            let handle = tasks.spawn(async move {
                let _permit = permit;
                match fetcher.fetch(&celex).await {
                    Ok(result) => {
                        if tx.send(result).await.is_err() {
                            return Some(Skipped {
                                id: celex.to_string(),
                                reason: "aggregator stopped".into(),
                            });
                        }
                        None
                    }
                    Err(e) => {
                        warn!(celex = %celex, error = %e, "skipping document");
                        Some(Skipped {
                            id: celex.to_string(),
                            reason: e.to_string(),
                        })
                    }
                }
            });
            in_flight.insert(handle.id(), id);
        }
        drop(tx);

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((task, skip)) => {
                    in_flight.remove(&task);
                    summary.skipped.extend(skip);
                }
                Err(e) => {
                    let id = in_flight.remove(&e.id()).unwrap_or_default();
                    error!(celex = %id, error = %e, "fetch task failed");
                    summary.skipped.push(Skipped {
                        id,
                        reason: format!("fetch task failed: {e}"),
                    });
                }
            }
        }
        let (store, stats) = aggregator.await?;
        summary.committed = stats.committed;
        summary.committed_without_body = stats.committed_without_body;
        summary.skipped.extend(stats.failed);

        // ── Export ──
        let dir = output.output_directory.clone();
        let formats = output.formats.clone();
        let include_full_text = output.include_raw_full_text;
        let exported =
            tokio::task::spawn_blocking(move || eulex_store::export(&store, &dir, &formats, include_full_text))
                .await??;
        summary.exported = exported.rows;

        info!(
            resolved = summary.resolved,
            already_present = summary.already_present,
            committed = summary.committed,
            without_body = summary.committed_without_body,
            skipped = summary.skipped.len(),
            "run complete"
        );
        Ok(summary)
    }

    /// Resolved ids minus those already fully present, unless refreshing.
    fn pending(
        &self,
        store: &DuckStore,
        ids: Vec<Celex>,
        summary: &mut RunSummary,
    ) -> Result<Vec<Celex>, PipelineError> {
        if self.config.processing.force_refresh {
            return Ok(ids);
        }
        let done: HashSet<String> = store.completed_ids()?;
        let (present, pending): (Vec<Celex>, Vec<Celex>) =
            ids.into_iter().partition(|c| done.contains(c.as_str()));
        summary.already_present = present.len();
        if !present.is_empty() {
            info!(count = present.len(), "skipping documents already present");
        }
        Ok(pending)
    }
}
