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
use itertools::Itertools;
use tidemark_ingestion::*;

use super::{
    copy_engine_values,
    copy_target_columns,
    is_altering_conversion,
    is_widening_conversion,
};
use crate::sql::{Dialect, SqlRenderer, string_literal, with_size};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

const STAGED_FILES_ALIAS: &str = "staged_files";
const DEFAULT_STAGE_LOCATION: &str = "@~";

pub struct SnowflakeSink {
    capabilities: BTreeSet<Capability>,
}

#[component(pub)]
#[interface(dyn RelationalSink)]
impl SnowflakeSink {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeSet::from([
                Capability::Merge,
                Capability::AddColumn,
                Capability::ImplicitDataTypeConversion,
                Capability::ExplicitDataTypeConversion,
                Capability::DataTypeLengthChange,
                Capability::ColumnNullabilityChange,
            ]),
        }
    }

    /// Expression reading a file column inside the `COPY` sub-query
    fn file_column(format: FileFormat, position: usize, name: &str) -> String {
        match format {
            FileFormat::Csv => format!("{STAGED_FILES_ALIAS}.${}", position + 1),
            FileFormat::Json => format!("{STAGED_FILES_ALIAS}.$1:{name}"),
        }
    }
}

impl Dialect for SnowflakeSink {
    fn dialect_name(&self) -> &'static str {
        "Snowflake"
    }

    fn current_timestamp(&self) -> &'static str {
        "SYSDATE()"
    }

    fn column_type(&self, field_type: &FieldType) -> String {
        let name = match field_type.data_type {
            DataType::Int => "INTEGER",
            DataType::Int64 => "BIGINT",
            DataType::Float64 => "DOUBLE",
            DataType::String | DataType::Longvarchar | DataType::Longtext => "VARCHAR",
            DataType::Bool => "BOOLEAN",
            DataType::Json => "VARIANT",
            DataType::Bytes => "BINARY",
            other => return with_size(other.to_string(), field_type),
        };
        with_size(name.to_string(), field_type)
    }

    fn copy(
        &self,
        renderer: &SqlRenderer<'_>,
        copy: &CopyOperation,
    ) -> Result<Vec<String>, TransformError> {
        let format = copy.source.format;
        let mut values: Vec<String> = copy
            .file_fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                format!(
                    "{} as {}",
                    Self::file_column(format, i, &f.name),
                    renderer.identifier(&f.name)
                )
            })
            .collect();

        let digest = copy.digest.as_ref().map(|digest| {
            let pairs = digest
                .fields
                .iter()
                .filter_map(|name| {
                    copy.file_fields
                        .iter()
                        .position(|f| f.has_name(name))
                        .map(|i| {
                            format!(
                                "{},{}",
                                string_literal(name),
                                Self::file_column(format, i, name)
                            )
                        })
                })
                .join(",");
            format!("{}(OBJECT_CONSTRUCT({pairs}))", digest.udf_name)
        });
        values.extend(copy_engine_values(renderer, copy, digest)?);

        let options = &copy.source.options;
        let file_format = match format {
            FileFormat::Csv => {
                let mut file_format = format!(
                    "TYPE = 'CSV', FIELD_DELIMITER = {}, SKIP_HEADER = {}",
                    string_literal(&options.delimiter.to_string()),
                    u8::from(options.header)
                );
                if let Some(null_marker) = &options.null_marker {
                    file_format.push_str(&format!(", NULL_IF = ({})", string_literal(null_marker)));
                }
                file_format
            }
            FileFormat::Json => "TYPE = 'JSON'".to_string(),
        };

        Ok(vec![format!(
            "COPY INTO {} ({}) FROM (SELECT {} FROM {} as {STAGED_FILES_ALIAS}) FILES = ({}) \
             FILE_FORMAT = ({file_format}) ON_ERROR = 'ABORT_STATEMENT'",
            renderer.table(&copy.target),
            copy_target_columns(copy)
                .iter()
                .map(|c| renderer.identifier(c))
                .join(", "),
            values.join(","),
            options.stage_location.as_deref().unwrap_or(DEFAULT_STAGE_LOCATION),
            copy.source.files.iter().map(|f| string_literal(f)).join(", "),
        )])
    }
}

impl RelationalSink for SnowflakeSink {
    fn name(&self) -> &'static str {
        self.dialect_name()
    }

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    fn supports_implicit_mapping(&self, main_type: DataType, staging_type: DataType) -> bool {
        is_widening_conversion(main_type, staging_type)
    }

    fn supports_explicit_mapping(&self, main_type: DataType, staging_type: DataType) -> bool {
        is_altering_conversion(main_type, staging_type)
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
