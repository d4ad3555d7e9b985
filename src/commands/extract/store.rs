use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::model::{Field, FieldValue, Provenance, Record};
use crate::util::now_utc_string;

/// Destination for finished records, keyed by source document.
pub(crate) trait RecordSink {
    fn upsert(&mut self, record: &Record) -> Result<()>;
}

pub(crate) struct SqliteSink {
    connection: Connection,
}

impl SqliteSink {
    pub(crate) fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            crate::util::ensure_directory(parent)?;
        }
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        configure_connection(&connection)?;
        Self::with_connection(connection)
    }

    pub(crate) fn with_connection(connection: Connection) -> Result<Self> {
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl RecordSink for SqliteSink {
    fn upsert(&mut self, record: &Record) -> Result<()> {
        let columns = Field::ALL
            .iter()
            .map(|field| field.as_str())
            .collect::<Vec<&str>>();
        let placeholders = (1..=columns.len() + 3)
            .map(|index| format!("?{index}"))
            .collect::<Vec<String>>();
        let updates = columns
            .iter()
            .chain(["provenance"].iter())
            .map(|column| format!("{column}=excluded.{column}"))
            .collect::<Vec<String>>();

        let sql = format!(
            "INSERT INTO wells (source_pdf, {}, provenance, updated_at) VALUES ({})
             ON CONFLICT(source_pdf) DO UPDATE SET {}, updated_at=excluded.updated_at",
            columns.join(", "),
            placeholders.join(", "),
            updates.join(", ")
        );

        let mut values = Vec::with_capacity(columns.len() + 3);
        values.push(Value::Text(record.source_pdf.clone()));
        for field in Field::ALL {
            values.push(match record.value(field) {
                Some(FieldValue::Text(text)) => Value::Text(text.clone()),
                Some(FieldValue::Integer(number)) => Value::Integer(*number),
                None => Value::Null,
            });
        }
        values.push(Value::Text(provenance_json(record)?));
        values.push(Value::Text(now_utc_string()));

        self.connection
            .execute(&sql, params_from_iter(values))
            .with_context(|| format!("failed to upsert well record {}", record.source_pdf))?;
        Ok(())
    }
}

fn provenance_json(record: &Record) -> Result<String> {
    let provenance = Field::ALL
        .iter()
        .filter(|field| record.provenance(**field) != Provenance::Absent)
        .map(|field| (field.as_str(), record.provenance(*field).as_str()))
        .collect::<BTreeMap<&str, &str>>();
    serde_json::to_string(&provenance).context("failed to serialize field provenance")
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    let field_columns = Field::ALL
        .iter()
        .map(|field| {
            let sql_type = if field.is_integer() { "INTEGER" } else { "TEXT" };
            format!("  {} {},", field.as_str(), sql_type)
        })
        .collect::<Vec<String>>()
        .join("\n");

    connection
        .execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS wells (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              source_pdf TEXT NOT NULL UNIQUE,
            {field_columns}
              provenance TEXT NOT NULL DEFAULT '{{}}',
              created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
              updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_wells_api10 ON wells(api_number_10);
            "
        ))
        .context("failed to create wells schema")?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StoreSummary {
    pub wells: i64,
    pub with_well_name: i64,
    pub with_api_number: i64,
}

pub(crate) fn summarize_store(connection: &Connection) -> Result<StoreSummary> {
    Ok(StoreSummary {
        wells: count_rows(connection, "SELECT COUNT(*) FROM wells")?,
        with_well_name: count_rows(
            connection,
            "SELECT COUNT(*) FROM wells WHERE well_name_and_number IS NOT NULL",
        )?,
        with_api_number: count_rows(
            connection,
            "SELECT COUNT(*) FROM wells WHERE api_number_10 IS NOT NULL",
        )?,
    })
}

fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to run {sql}"))?;
    Ok(count)
}
