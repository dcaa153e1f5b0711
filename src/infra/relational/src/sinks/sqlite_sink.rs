// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use dill::*;
use tidemark_ingestion::*;

use super::is_widening_conversion;
use crate::sql::{Dialect, SqlRenderer, with_size};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// SQLite dialect. Has no `MERGE` and can only add columns; staged files are
/// loaded by the executor itself.
pub struct SqliteSink {
    capabilities: BTreeSet<Capability>,
}

#[component(pub)]
#[interface(dyn RelationalSink)]
impl SqliteSink {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeSet::from([
                Capability::AddColumn,
                Capability::ImplicitDataTypeConversion,
            ]),
        }
    }
}

impl Dialect for SqliteSink {
    fn dialect_name(&self) -> &'static str {
        "SQLite"
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// Declared types only drive column affinity. Text-like types whose
    /// names would get numeric affinity are declared as `TEXT`.
    fn column_type(&self, field_type: &FieldType) -> String {
        match field_type.data_type {
            DataType::String | DataType::Json | DataType::Variant => "TEXT".to_string(),
            DataType::Int => with_size("INTEGER".to_string(), field_type),
            other => with_size(other.to_string(), field_type),
        }
    }

    fn parenthesize_insert_selection(&self) -> bool {
        false
    }

    fn qualify_update_columns(&self) -> bool {
        false
    }

    fn supports_merge(&self) -> bool {
        false
    }

    fn alter(
        &self,
        table: &str,
        change: AlterChange,
        column: &str,
        column_type: &str,
    ) -> Result<String, TransformError> {
        match change {
            AlterChange::AddColumn => Ok(format!(
                "ALTER TABLE {table} ADD COLUMN {column} {column_type}"
            )),
            AlterChange::ChangeDataType | AlterChange::MakeNullable => {
                Err(TransformError::Unsupported {
                    sink: self.dialect_name(),
                    operation: format!("{change} of column {column}"),
                })
            }
        }
    }
}

impl RelationalSink for SqliteSink {
    fn name(&self) -> &'static str {
        self.dialect_name()
    }

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    fn supports_implicit_mapping(&self, main_type: DataType, staging_type: DataType) -> bool {
        is_widening_conversion(main_type, staging_type)
    }

    fn supports_explicit_mapping(&self, _main_type: DataType, _staging_type: DataType) -> bool {
        false
    }

    fn transform(
        &self,
        plan: &LogicalPlan,
        context: &TransformContext,
    ) -> Result<Vec<String>, TransformError> {
        SqlRenderer::new(self, context).render_plan(plan)
    }

    fn transform_query(
        &self,
        selection: &Selection,
        context: &TransformContext,
    ) -> Result<String, TransformError> {
        SqlRenderer::new(self, context).selection(selection)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
