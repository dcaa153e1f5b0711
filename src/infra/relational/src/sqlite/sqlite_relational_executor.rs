// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::str::FromStr;

use dill::*;
use internal_error::{ErrorIntoInternal, InternalError, ResultIntoInternal};
use itertools::Itertools;
use sqlx::{Row as _, SqlitePool, TypeInfo, ValueRef};
use tidemark_ingestion::*;

use super::read_staged_files;
use crate::sinks::{SqliteSink, copy_engine_values, copy_target_columns};
use crate::sql::SqlRenderer;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;
const DEFAULT_SCHEMA: &str = "main";

/// Executes SQL of the SQLite dialect against a pool. Tables are addressed
/// as `[group.]name`, the group naming an attached database.
pub struct SqliteRelationalExecutor {
    sqlite_pool: SqlitePool,
}

#[component(pub)]
#[interface(dyn RelationalExecutor)]
impl SqliteRelationalExecutor {
    pub fn new(sqlite_pool: SqlitePool) -> Self {
        Self { sqlite_pool }
    }

    fn schema_name(dataset: &DatasetReference) -> &str {
        dataset.group.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<Row, ExecutionError> {
        (0..row.columns().len())
            .map(|i| -> Result<SqlValue, ExecutionError> {
                let raw = row.try_get_raw(i).int_err()?;
                if raw.is_null() {
                    return Ok(SqlValue::Null);
                }
                let storage_class = raw.type_info().name().to_string();
                let value = match storage_class.as_str() {
                    "INTEGER" | "BOOLEAN" => SqlValue::Integer(row.try_get_unchecked(i).int_err()?),
                    "REAL" => SqlValue::Real(row.try_get_unchecked(i).int_err()?),
                    "BLOB" => SqlValue::Blob(row.try_get_unchecked(i).int_err()?),
                    _ => SqlValue::Text(row.try_get_unchecked(i).int_err()?),
                };
                Ok(value)
            })
            .collect()
    }

    /// `VARCHAR(255)` -> `VARCHAR` with length 255
    fn parse_declared_type(declared: &str) -> Result<FieldType, InternalError> {
        let (name, size) = match declared.split_once('(') {
            Some((name, rest)) => (name, rest.trim_end_matches(')')),
            None => (declared, ""),
        };

        let data_type = DataType::from_str(name.trim())
            .context_int_err(format!("Unknown column type {declared}"))?;

        let mut sizes = size
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(u32::from_str);

        let length = sizes.next().transpose().int_err()?;
        let scale = sizes.next().transpose().int_err()?;

        Ok(FieldType {
            data_type,
            length,
            scale,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Busy and locked databases and pool exhaustion clear up on their own
fn classify(e: sqlx::Error) -> ExecutionError {
    let transient = match &e {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i64>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        _ => false,
    };

    if transient {
        ExecutionError::Transient {
            message: e.to_string(),
        }
    } else {
        ExecutionError::Internal(e.int_err())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl RelationalExecutor for SqliteRelationalExecutor {
    #[tracing::instrument(level = "debug", skip_all, fields(num_statements = statements.len()))]
    async fn execute_statements(&self, statements: &[String]) -> Result<(), ExecutionError> {
        if statements.is_empty() {
            return Ok(());
        }

        let mut tx = self.sqlite_pool.begin().await.map_err(classify)?;

        for sql in statements {
            tracing::debug!(%sql, "Executing statement");
            sqlx::query(sql).execute(&mut *tx).await.map_err(classify)?;
        }

        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn query_rows(&self, sql: &str) -> Result<Vec<Row>, ExecutionError> {
        tracing::debug!(%sql, "Running query");

        let rows = sqlx::query(sql)
            .fetch_all(&self.sqlite_pool)
            .await
            .map_err(classify)?;

        rows.iter().map(Self::decode_row).collect()
    }

    async fn dataset_exists(&self, dataset: &DatasetReference) -> Result<bool, ExecutionError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info($1, $2)")
            .bind(dataset.name.as_str())
            .bind(Self::schema_name(dataset))
            .fetch_one(&self.sqlite_pool)
            .await
            .map_err(classify)?;

        Ok(count > 0)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(%dataset))]
    async fn describe_dataset(
        &self,
        dataset: &DatasetReference,
    ) -> Result<SchemaDefinition, ExecutionError> {
        let columns: Vec<(String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT name, type, "notnull", pk
                FROM pragma_table_info($1, $2)
                ORDER BY cid
            "#,
        )
        .bind(dataset.name.as_str())
        .bind(Self::schema_name(dataset))
        .fetch_all(&self.sqlite_pool)
        .await
        .map_err(classify)?;

        if columns.is_empty() {
            return Err(DatasetNotFoundError::new(dataset.qualified_name()).into());
        }

        let fields = columns
            .into_iter()
            .map(|(name, declared_type, not_null, pk)| {
                let field = Field::new(name, Self::parse_declared_type(&declared_type)?);
                Ok::<_, InternalError>(match (pk > 0, not_null != 0) {
                    (true, _) => field.as_primary_key(),
                    (false, true) => field.as_not_null(),
                    (false, false) => field,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SchemaDefinition::new(fields).int_err()?)
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(target = %copy.target, num_files = copy.source.files.len())
    )]
    async fn copy_staged_files(
        &self,
        copy: &CopyOperation,
        context: &TransformContext,
    ) -> Result<CopyOutcome, ExecutionError> {
        let sink = SqliteSink::new();
        let renderer = SqlRenderer::new(&sink, context);

        let digest_param = copy.digest.as_ref().map(|_| "?".to_string());
        let values = copy
            .file_fields
            .iter()
            .map(|_| "?".to_string())
            .chain(copy_engine_values(&renderer, copy, digest_param).int_err()?)
            .join(",");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({values})",
            renderer.table(&copy.target),
            copy_target_columns(copy)
                .iter()
                .map(|c| renderer.identifier(c))
                .join(", ")
        );

        let staged = {
            let copy = copy.clone();
            tokio::task::spawn_blocking(move || read_staged_files(&copy))
                .await
                .int_err()??
        };

        let mut tx = self.sqlite_pool.begin().await.map_err(classify)?;
        for row in &staged.rows {
            let query = row.iter().fold(sqlx::query(&insert), |query, value| match value {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Integer(v) => query.bind(*v),
                SqlValue::Real(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
                SqlValue::Blob(v) => query.bind(v.as_slice()),
            });
            query.execute(&mut *tx).await.map_err(classify)?;
        }
        tx.commit().await.map_err(classify)?;

        let outcome = CopyOutcome {
            files_loaded: staged.files_read,
            rows_loaded: staged.rows.len() as u64,
            rows_with_errors: staged.rows_with_errors,
            errors: staged.errors,
        };

        tracing::info!(
            rows_loaded = outcome.rows_loaded,
            rows_with_errors = outcome.rows_with_errors,
            "Loaded staged files"
        );

        Ok(outcome)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
