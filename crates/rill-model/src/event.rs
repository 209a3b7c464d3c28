//! Row and DDL event types.
//!
//! These are the payloads the control plane routes: row mutations flow
//! from per-table feeds through table sinks to the backend; finished
//! DDL jobs flow from the DDL region stream through the owner's
//! barrier logic to the backend. Wire encodings of row data are out of
//! scope; events carry decoded, sink-ready values.

use serde::{Deserialize, Serialize};

use crate::{TableId, Ts};

/// Fully-qualified table name plus its source-side identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    /// Schema (database) name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Source-side table identifier.
    #[serde(rename = "tbl-id")]
    pub table_id: TableId,
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// One column value within a row change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Decoded value, JSON-typed.
    pub value: serde_json::Value,
}

/// A committed row-level mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChangedEvent {
    /// Transaction start timestamp.
    #[serde(rename = "start-ts")]
    pub start_ts: Ts,
    /// Transaction commit timestamp.
    #[serde(rename = "commit-ts")]
    pub commit_ts: Ts,
    /// Table the row belongs to.
    pub table: TableName,
    /// Column values after the mutation; empty for deletes.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Whether this event is a delete.
    #[serde(default)]
    pub is_delete: bool,
}

impl RowChangedEvent {
    /// Builds a minimal row event for the given table and commit-ts.
    #[must_use]
    pub fn new(table: TableName, start_ts: Ts, commit_ts: Ts) -> Self {
        Self {
            start_ts,
            commit_ts,
            table,
            columns: Vec::new(),
            is_delete: false,
        }
    }
}

/// Category of a schema-change job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DdlJobType {
    /// `CREATE DATABASE`.
    CreateSchema,
    /// `DROP DATABASE`.
    DropSchema,
    /// `CREATE TABLE`.
    CreateTable,
    /// `DROP TABLE`.
    DropTable,
    /// `TRUNCATE TABLE`.
    TruncateTable,
    /// `RENAME TABLE`.
    RenameTable,
    /// `ALTER TABLE ... ADD COLUMN`.
    AddColumn,
    /// `ALTER TABLE ... DROP COLUMN`.
    DropColumn,
    /// `ALTER TABLE ... MODIFY COLUMN`.
    ModifyColumn,
    /// `CREATE INDEX`.
    AddIndex,
    /// `DROP INDEX`.
    DropIndex,
}

/// A finished schema-change job decoded from the DDL region stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdlJob {
    /// Source-side job identifier.
    pub id: i64,
    /// Job category.
    #[serde(rename = "type")]
    pub job_type: DdlJobType,
    /// Schema the job applies to.
    pub schema_name: String,
    /// Table the job applies to; empty for schema-level jobs.
    #[serde(default)]
    pub table_name: String,
    /// Table identifier; zero for schema-level jobs.
    #[serde(default)]
    pub table_id: TableId,
    /// Original DDL statement.
    pub query: String,
    /// Commit timestamp at which the job finished on the source.
    #[serde(rename = "finished-ts")]
    pub finished_ts: Ts,
}

impl DdlJob {
    /// Decodes a job from the raw value of a DDL region entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ModelError::Decode`] if the bytes are not a
    /// valid job record.
    pub fn from_json(value: &[u8]) -> Result<Self, crate::ModelError> {
        Ok(serde_json::from_slice(value)?)
    }
}

/// A schema-change event as delivered to a backend sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlEvent {
    /// Commit timestamp of the schema change.
    pub commit_ts: Ts,
    /// Schema name.
    pub schema: String,
    /// Table name; empty for schema-level changes.
    pub table: String,
    /// Original DDL statement.
    pub query: String,
    /// Job category.
    pub job_type: DdlJobType,
}

impl DdlEvent {
    /// Builds the sink-facing event from a finished job.
    #[must_use]
    pub fn from_job(job: &DdlJob) -> Self {
        Self {
            commit_ts: job.finished_ts,
            schema: job.schema_name.clone(),
            table: job.table_name.clone(),
            query: job.query.clone(),
            job_type: job.job_type,
        }
    }
}

/// Table description handed to `Sink::initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTableInfo {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Source-side table identifier.
    pub table_id: TableId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_event_from_job() {
        let job = DdlJob {
            id: 7,
            job_type: DdlJobType::CreateTable,
            schema_name: "test".into(),
            table_name: "t1".into(),
            table_id: 42,
            query: "create table t1(a int)".into(),
            finished_ts: 100,
        };
        let event = DdlEvent::from_job(&job);
        assert_eq!(event.commit_ts, 100);
        assert_eq!(event.schema, "test");
        assert_eq!(event.job_type, DdlJobType::CreateTable);
    }

    #[test]
    fn job_decode_requires_finished_ts() {
        let err = DdlJob::from_json(br#"{"id":1,"type":"create-table","schema_name":"s","query":"q"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn table_name_display() {
        let t = TableName {
            schema: "shop".into(),
            table: "orders".into(),
            table_id: 3,
        };
        assert_eq!(t.to_string(), "shop.orders");
    }
}
