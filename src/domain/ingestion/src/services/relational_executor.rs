// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use internal_error::InternalError;
use thiserror::Error;

use crate::{
    CopyOperation,
    DatasetNotFoundError,
    DatasetReference,
    SchemaDefinition,
    TransformContext,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runs SQL against a live sink
#[async_trait::async_trait]
pub trait RelationalExecutor: Send + Sync {
    /// Executes all statements in a single transaction
    async fn execute_statements(&self, statements: &[String]) -> Result<(), ExecutionError>;

    async fn query_rows(&self, sql: &str) -> Result<Vec<Row>, ExecutionError>;

    /// First column of the first row, if it holds an integer
    async fn query_i64(&self, sql: &str) -> Result<Option<i64>, ExecutionError> {
        let rows = self.query_rows(sql).await?;
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(SqlValue::as_i64))
    }

    async fn dataset_exists(&self, dataset: &DatasetReference) -> Result<bool, ExecutionError>;

    /// Introspects the physical schema of a table
    async fn describe_dataset(
        &self,
        dataset: &DatasetReference,
    ) -> Result<SchemaDefinition, ExecutionError>;

    /// Loads staged files into the copy target in a single transaction.
    /// Rows that fail conversion are skipped and reported.
    async fn copy_staged_files(
        &self,
        copy: &CopyOperation,
        context: &TransformContext,
    ) -> Result<CopyOutcome, ExecutionError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub type Row = Vec<SqlValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            #[allow(clippy::cast_possible_truncation)]
            Self::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOutcome {
    pub files_loaded: u64,
    pub rows_loaded: u64,
    pub rows_with_errors: u64,
    /// First few row errors, for diagnostics
    pub errors: Vec<String>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    DatasetNotFound(#[from] DatasetNotFoundError),
    /// Failure expected to go away on retry, e.g. a locked database or an
    /// interrupted read
    #[error("Transient failure: {message}")]
    Transient { message: String },
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl ExecutionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
