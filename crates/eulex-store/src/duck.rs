//! DuckDB relational store for the consolidated dataset.

use std::collections::HashSet;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use duckdb::{Connection, OptionalExt, params};
use eulex_core::tables::{RELATIONS, TEXT_UNITS, WORKS};
use eulex_core::{Celex, DocumentResult, DocumentType, SegmentKind, TextUnit, Work};
use tracing::{debug, info};

use crate::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS works (
    celex_id       VARCHAR NOT NULL,
    document_type  VARCHAR NOT NULL,
    title          VARCHAR,
    date_adopted   DATE,
    language       VARCHAR NOT NULL,
    full_text_html VARCHAR
);
CREATE TABLE IF NOT EXISTS text_units (
    id       BIGINT  NOT NULL,
    celex_id VARCHAR NOT NULL,
    type     VARCHAR NOT NULL,
    number   VARCHAR NOT NULL,
    title    VARCHAR,
    text     VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS relations (
    id            BIGINT  NOT NULL,
    celex_source  VARCHAR NOT NULL,
    celex_target  VARCHAR NOT NULL,
    relation_type VARCHAR NOT NULL
);
";

/// Rows written by one [`DuckStore::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitReceipt {
    pub text_units: usize,
    pub relations: usize,
}

/// DuckDB store holding `works`, `text_units` and `relations`.
///
/// Exactly one owner writes to it. Every [`commit`](Self::commit) replaces
/// one work and everything it owns inside a single transaction, so an
/// interrupted run leaves each work either fully old or fully new.
///
/// Key integrity (unique `celex_id`, unique triples, child rows pointing at
/// an existing work) is maintained by `commit` rather than by table
/// constraints.
pub struct DuckStore {
    conn: Connection,
    next_unit_id: i64,
    next_relation_id: i64,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    ///
    /// Rows from earlier runs are kept; surrogate ids continue after the
    /// highest stored id.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened store");
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        let mut store = Self {
            conn,
            next_unit_id: 1,
            next_relation_id: 1,
        };
        store.next_unit_id = store.max_id(TEXT_UNITS)? + 1;
        store.next_relation_id = store.max_id(RELATIONS)? + 1;
        Ok(store)
    }

    fn max_id(&self, table: &str) -> Result<i64, StoreError> {
        let sql = format!("SELECT coalesce(max(id), 0)::BIGINT FROM {table}");
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    // ── Writes ──

    /// Atomically replace one work with its text units and relations.
    pub fn commit(&mut self, result: &DocumentResult) -> Result<CommitReceipt, StoreError> {
        let work = &result.work;
        let id = work.celex.as_str();
        let date = work.date_adopted.map(|d| d.format("%Y-%m-%d").to_string());

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM relations WHERE celex_source = ?", params![id])?;
        tx.execute("DELETE FROM text_units WHERE celex_id = ?", params![id])?;
        tx.execute("DELETE FROM works WHERE celex_id = ?", params![id])?;

        tx.execute(
            "INSERT INTO works VALUES (?, ?, ?, CAST(? AS DATE), ?, ?)",
            params![
                id,
                work.document_type.as_str(),
                work.title.as_deref(),
                date.as_deref(),
                work.language.as_str(),
                work.full_text_html.as_deref(),
            ],
        )?;

        let mut unit_id = self.next_unit_id;
        {
            let mut stmt = tx.prepare("INSERT INTO text_units VALUES (?, ?, ?, ?, ?, ?)")?;
            for unit in &result.text_units {
                stmt.execute(params![
                    unit_id,
                    id,
                    unit.kind.as_str(),
                    unit.number.as_str(),
                    unit.title.as_deref(),
                    unit.text.as_str(),
                ])?;
                unit_id += 1;
            }
        }

        let mut relation_id = self.next_relation_id;
        {
            let mut stmt = tx.prepare("INSERT INTO relations VALUES (?, ?, ?, ?)")?;
            let mut seen = HashSet::new();
            for rel in &result.relations {
                if rel.source != work.celex || !seen.insert((rel.target.as_str(), rel.kind)) {
                    continue;
                }
                stmt.execute(params![relation_id, id, rel.target.as_str(), rel.kind.as_str()])?;
                relation_id += 1;
            }
        }

        tx.commit()?;

        let receipt = CommitReceipt {
            text_units: (unit_id - self.next_unit_id) as usize,
            relations: (relation_id - self.next_relation_id) as usize,
        };
        self.next_unit_id = unit_id;
        self.next_relation_id = relation_id;
        debug!(
            celex = %work.celex,
            text_units = receipt.text_units,
            relations = receipt.relations,
            "committed"
        );
        Ok(receipt)
    }

    // ── Resumability ──

    /// Identifiers whose work row carries a body. Works committed without a
    /// body are retried by the next run.
    pub fn completed_ids(&self) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT celex_id FROM works WHERE full_text_html IS NOT NULL")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<HashSet<_>, _>>()?)
    }

    // ── Reads ──

    pub fn get_work(&self, celex: &str) -> Result<Option<Work>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT celex_id, document_type, title, CAST(date_adopted AS VARCHAR), language, full_text_html
                 FROM works WHERE celex_id = ?",
                params![celex],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, doc_type, title, date, language, body)) = row else {
            return Ok(None);
        };
        let corrupt = |reason: String| StoreError::CorruptRow { table: WORKS, reason };
        Ok(Some(Work {
            celex: Celex::parse(&id).map_err(|e| corrupt(e.to_string()))?,
            document_type: doc_type.parse::<DocumentType>().map_err(corrupt)?,
            title,
            date_adopted: date
                .map(|d| chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
                .transpose()
                .map_err(|e| corrupt(e.to_string()))?,
            language,
            full_text_html: body,
        }))
    }

    /// Text units of one work with their surrogate ids, in document order.
    pub fn text_units_for(&self, celex: &str) -> Result<Vec<(i64, TextUnit)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, type, number, title, text FROM text_units WHERE celex_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map(params![celex], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, kind, number, title, text) = row?;
            let kind = kind.parse::<SegmentKind>().map_err(|reason| StoreError::CorruptRow {
                table: TEXT_UNITS,
                reason,
            })?;
            out.push((
                id,
                TextUnit {
                    kind,
                    number,
                    title,
                    text,
                },
            ));
        }
        Ok(out)
    }

    /// Full contents of one table as Arrow batches, in key order.
    ///
    /// `full_text_html` is only selected from `works` when requested.
    pub fn table_batches(&self, table: &str, include_full_text: bool) -> Result<Vec<RecordBatch>, StoreError> {
        let sql = match table {
            WORKS if include_full_text => {
                "SELECT celex_id, document_type, title, date_adopted, language, full_text_html
                 FROM works ORDER BY celex_id"
            }
            WORKS => "SELECT celex_id, document_type, title, date_adopted, language FROM works ORDER BY celex_id",
            TEXT_UNITS => "SELECT id, celex_id, type, number, title, text FROM text_units ORDER BY id",
            RELATIONS => "SELECT id, celex_source, celex_target, relation_type FROM relations ORDER BY id",
            other => return Err(StoreError::UnknownTable(other.to_string())),
        };
        self.query_arrow(sql)
    }

    // ── Counts ──

    pub fn works_count(&self) -> Result<usize, StoreError> {
        self.count_table(WORKS)
    }

    pub fn text_units_count(&self) -> Result<usize, StoreError> {
        self.count_table(TEXT_UNITS)
    }

    pub fn relations_count(&self) -> Result<usize, StoreError> {
        self.count_table(RELATIONS)
    }

    pub fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let batches = self.query_arrow(&sql)?;
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| StoreError::CorruptRow {
                table: "count",
                reason: "count column not i64".into(),
            })?;
        Ok(col.value(0) as usize)
    }

    // ── Escape hatch ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}
