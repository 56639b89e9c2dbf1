//! Build configuration.
//!
//! Mirrors the YAML file handed to the `eulex` binary. Deserialisation only
//! checks shape; [`Config::validate`] enforces the cross-field rules and must
//! pass before any network call is made.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::DocumentType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub metadata: Metadata,
    pub data: DataConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Informational fields, carried into logs only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub project_name: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
}

/// Document selection, tagged by `mode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DataConfig {
    Fixed(FixedSelection),
    Descriptive(DescriptiveSelection),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedSelection {
    pub celex_ids: Vec<String>,
    pub procedure_numbers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveSelection {
    #[serde(default)]
    pub document_types: Vec<DocumentType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub filter_keywords: Vec<String>,
    #[serde(default)]
    pub include_corrigenda: bool,
    #[serde(default)]
    pub include_consolidated_texts: bool,
    #[serde(default)]
    pub include_national_transpositions: bool,
}

impl DescriptiveSelection {
    /// Inclusive date range. Only meaningful after validation.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.start_date?, self.end_date?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub enable_parallel_processing: bool,
    pub max_threads: usize,
    pub automated_mode: bool,
    pub force_refresh: bool,
    /// ISO 639-2 code of the expression to fetch.
    pub language: String,
    pub text_extraction: TextExtractionConfig,
    pub relations_extraction: RelationsExtractionConfig,
    pub retry: RetryConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            enable_parallel_processing: true,
            max_threads: 4,
            automated_mode: false,
            force_refresh: false,
            language: "eng".into(),
            text_extraction: TextExtractionConfig::default(),
            relations_extraction: RelationsExtractionConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ProcessingConfig {
    /// Worker pool size: `min(max_threads, available_parallelism)`, or 1
    /// when parallel processing is disabled.
    pub fn pool_size(&self) -> usize {
        if !self.enable_parallel_processing {
            return 1;
        }
        let host = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.max_threads.clamp(1, host)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextExtractionConfig {
    pub include_recitals: bool,
    pub include_articles: bool,
    pub include_annexes: bool,
}

impl Default for TextExtractionConfig {
    fn default() -> Self {
        Self {
            include_recitals: true,
            include_articles: true,
            include_annexes: true,
        }
    }
}

impl TextExtractionConfig {
    /// Whether any segment kind is enabled at all.
    pub fn any(&self) -> bool {
        self.include_recitals || self.include_articles || self.include_annexes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationsExtractionConfig {
    pub include_relations: bool,
    pub include_original_act_relations_for_consolidated_texts: bool,
    pub include_citations_in_text: bool,
}

impl Default for RelationsExtractionConfig {
    fn default() -> Self {
        Self {
            include_relations: true,
            include_original_act_relations_for_consolidated_texts: false,
            include_citations_in_text: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            timeout_secs: 20,
        }
    }
}

/// Tabular export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Parquet,
    /// Arrow IPC file.
    Arrow,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Arrow => "arrow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub include_raw_full_text: bool,
    pub formats: Vec<OutputFormat>,
    pub output_directory: PathBuf,
    pub database_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_raw_full_text: false,
            formats: vec![OutputFormat::Csv, OutputFormat::Parquet],
            output_directory: PathBuf::from("./output"),
            database_name: "eulex_build.duckdb".into(),
        }
    }
}

impl OutputConfig {
    pub fn database_path(&self) -> PathBuf {
        self.output_directory.join(&self.database_name)
    }

    pub fn review_artifact_path(&self) -> PathBuf {
        self.output_directory.join("eurovoc_labels.yaml")
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_directory.join("pipeline.log")
    }
}

impl Config {
    /// A configuration with default processing and output settings.
    pub fn new(data: DataConfig) -> Self {
        Self {
            metadata: Metadata::default(),
            data,
            processing: ProcessingConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Put every output artifact under `dir`.
    pub fn with_output_directory(mut self, dir: &Path) -> Self {
        self.output.output_directory = dir.to_path_buf();
        self
    }

    /// Check cross-field rules. `today` bounds the descriptive date range.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ConfigError> {
        match &self.data {
            DataConfig::Fixed(sel) => {
                if sel.celex_ids.is_empty() && sel.procedure_numbers.is_empty() {
                    return Err(ConfigError::EmptySelection);
                }
            }
            DataConfig::Descriptive(sel) => {
                let start = sel.start_date.ok_or(ConfigError::MissingDate("start_date"))?;
                let end = sel.end_date.ok_or(ConfigError::MissingDate("end_date"))?;
                for (field, date) in [("start_date", start), ("end_date", end)] {
                    if date > today {
                        return Err(ConfigError::FutureDate { field, date });
                    }
                }
                if start > end {
                    return Err(ConfigError::InvertedRange { start, end });
                }
                if sel.document_types.is_empty() {
                    return Err(ConfigError::NoDocumentTypes);
                }
                if let Some(kind) = sel.document_types.iter().find(|t| t.type_code().is_none()) {
                    return Err(ConfigError::UnselectableDocumentType(*kind));
                }
            }
        }
        if self.processing.max_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.output.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }
        Ok(())
    }
}
