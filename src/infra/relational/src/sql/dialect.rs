// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tidemark_ingestion::*;

use super::SqlRenderer;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Points where SQL dialects of the supported sinks diverge. Defaults follow
/// ANSI SQL.
pub(crate) trait Dialect: Send + Sync {
    fn dialect_name(&self) -> &'static str;

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn date_time_literal(&self, value: &str) -> String {
        string_literal(value)
    }

    /// Wall clock of the sink, used as the end time of a batch
    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP()"
    }

    /// Physical column type
    fn column_type(&self, field_type: &FieldType) -> String {
        let name = match field_type.data_type {
            DataType::Int => "INTEGER".to_string(),
            other => other.to_string(),
        };
        with_size(name, field_type)
    }

    /// `INSERT INTO t (..) (SELECT ..)` vs `INSERT INTO t (..) SELECT ..`
    fn parenthesize_insert_selection(&self) -> bool {
        true
    }

    /// `SET sink."c" = ..` vs `SET "c" = ..`
    fn qualify_update_columns(&self) -> bool {
        true
    }

    fn supports_merge(&self) -> bool {
        true
    }

    fn alter(
        &self,
        table: &str,
        change: AlterChange,
        column: &str,
        column_type: &str,
    ) -> Result<String, TransformError> {
        Ok(match change {
            AlterChange::AddColumn => {
                format!("ALTER TABLE {table} ADD COLUMN {column} {column_type}")
            }
            AlterChange::ChangeDataType => {
                format!("ALTER TABLE {table} ALTER COLUMN {column} {column_type}")
            }
            AlterChange::MakeNullable => {
                format!("ALTER TABLE {table} ALTER COLUMN {column} DROP NOT NULL")
            }
        })
    }

    /// Statements loading staged files into the copy target
    fn copy(
        &self,
        _renderer: &SqlRenderer<'_>,
        _copy: &CopyOperation,
    ) -> Result<Vec<String>, TransformError> {
        Err(TransformError::Unsupported {
            sink: self.dialect_name(),
            operation: "Loading staged files".to_string(),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn with_size(name: String, field_type: &FieldType) -> String {
    match (field_type.length, field_type.scale) {
        (Some(length), Some(scale)) => format!("{name}({length},{scale})"),
        (Some(length), None) => format!("{name}({length})"),
        (None, _) => name,
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
