//! Tabular exports of the consolidated store.
//!
//! Each requested format gets one file per table (`works.csv`,
//! `text_units.parquet`, ...). Files are written to a temporary sibling and
//! renamed into place, so a failed export never leaves a truncated file
//! behind a previous good one.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::cast;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use eulex_core::{OutputFormat, tables};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{DuckStore, ExportError, StoreError};

/// Files and row counts produced by one [`export`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Rows per table. Identical for every format.
    pub rows: BTreeMap<String, usize>,
    pub files: Vec<PathBuf>,
}

/// Serialize all three tables to every requested format under `dir`.
pub fn export(
    store: &DuckStore,
    dir: &Path,
    formats: &[OutputFormat],
    include_full_text: bool,
) -> Result<ExportSummary, ExportError> {
    std::fs::create_dir_all(dir)?;
    let mut summary = ExportSummary::default();

    for table in tables::ALL {
        let schema = Arc::new(
            tables::schema_for(table, include_full_text)
                .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?,
        );
        let batches = conform(store.table_batches(table, include_full_text)?, &schema)?;
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();

        for format in formats {
            let path = dir.join(format!("{table}.{}", format.extension()));
            write_atomic(&path, |file| match format {
                OutputFormat::Csv => write_csv(file, &schema, &batches),
                OutputFormat::Parquet => write_parquet(file, &schema, &batches),
                OutputFormat::Arrow => write_ipc(file, &schema, &batches),
            })?;
            info!(table, rows, path = %path.display(), "exported");
            summary.files.push(path);
        }
        summary.rows.insert(table.to_string(), rows);
    }

    Ok(summary)
}

/// Cast store batches to the declared export schema. DuckDB reports every
/// column as nullable and may pick different string encodings.
fn conform(batches: Vec<RecordBatch>, schema: &SchemaRef) -> Result<Vec<RecordBatch>, ExportError> {
    batches
        .into_iter()
        .filter(|b| b.num_rows() > 0)
        .map(|batch| {
            let columns = batch
                .columns()
                .iter()
                .zip(schema.fields())
                .map(|(col, field)| cast(col, field.data_type()))
                .collect::<Result<Vec<ArrayRef>, _>>()?;
            Ok(RecordBatch::try_new(schema.clone(), columns)?)
        })
        .collect()
}

fn write_atomic<F>(path: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut File) -> Result<(), ExportError>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.persist(path).map_err(|e| ExportError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

// ── Writers ──

fn write_csv(file: &mut File, schema: &SchemaRef, batches: &[RecordBatch]) -> Result<(), ExportError> {
    let mut writer = arrow::csv::WriterBuilder::new().with_header(true).build(file);
    // An empty batch still emits the header row.
    writer.write(&RecordBatch::new_empty(schema.clone()))?;
    for batch in batches {
        writer.write(batch)?;
    }
    Ok(())
}

fn write_parquet(file: &mut File, schema: &SchemaRef, batches: &[RecordBatch]) -> Result<(), ExportError> {
    let mut writer = ArrowWriter::try_new(file, schema.clone(), None)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(())
}

fn write_ipc(file: &mut File, schema: &SchemaRef, batches: &[RecordBatch]) -> Result<(), ExportError> {
    let mut writer = arrow::ipc::writer::FileWriter::try_new(file, schema)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.finish()?;
    Ok(())
}

// ── Readers ──

/// Read a Parquet file into Arrow RecordBatches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, ExportError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Read an Arrow IPC file into RecordBatches.
pub fn read_ipc(path: &Path) -> Result<Vec<RecordBatch>, ExportError> {
    let file = File::open(path)?;
    let reader = arrow::ipc::reader::FileReader::try_new(file, None)?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Read a CSV export back with its known schema.
pub fn read_csv(path: &Path, schema: Schema) -> Result<Vec<RecordBatch>, ExportError> {
    let file = File::open(path)?;
    let reader = arrow::csv::ReaderBuilder::new(Arc::new(schema))
        .with_header(true)
        .build(file)?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}
