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

pub struct H2Sink {
    capabilities: BTreeSet<Capability>,
}

#[component(pub)]
#[interface(dyn RelationalSink)]
impl H2Sink {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeSet::from([
                Capability::Merge,
                Capability::AddColumn,
                Capability::ImplicitDataTypeConversion,
                Capability::ExplicitDataTypeConversion,
                Capability::DataTypeLengthChange,
                Capability::DataTypeScaleChange,
                Capability::ColumnNullabilityChange,
            ]),
        }
    }
}

impl Dialect for H2Sink {
    fn dialect_name(&self) -> &'static str {
        "H2"
    }

    fn column_type(&self, field_type: &FieldType) -> String {
        let name = match field_type.data_type {
            DataType::Int => "INTEGER",
            DataType::Int64 => "BIGINT",
            DataType::Float64 => "DOUBLE",
            DataType::Number => "NUMERIC",
            DataType::String | DataType::Text | DataType::Longtext => "VARCHAR",
            DataType::Datetime | DataType::TimestampNtz => "TIMESTAMP",
            DataType::TimestampTz | DataType::TimestampLtz => "TIMESTAMP WITH TIME ZONE",
            DataType::Bool => "BOOLEAN",
            DataType::Variant => "JSON",
            DataType::Bytes => "VARBINARY",
            other => return with_size(other.to_string(), field_type),
        };
        with_size(name.to_string(), field_type)
    }

    /// One `INSERT .. SELECT .. FROM CSVREAD(..)` per file
    fn copy(
        &self,
        renderer: &SqlRenderer<'_>,
        copy: &CopyOperation,
    ) -> Result<Vec<String>, TransformError> {
        if copy.source.format != FileFormat::Csv {
            return Err(TransformError::Unsupported {
                sink: self.dialect_name(),
                operation: format!("Loading {} files", copy.source.format),
            });
        }

        let convert = |name: &str, type_name: &str| {
            format!("CONVERT({},{type_name})", renderer.identifier(name))
        };

        let mut values: Vec<String> = copy
            .file_fields
            .iter()
            .map(|f| convert(&f.name, &self.column_type(&f.field_type)))
            .collect();

        let digest = copy.digest.as_ref().map(|digest| {
            format!(
                "{}(ARRAY[{}],ARRAY[{}])",
                digest.udf_name,
                digest.fields.iter().map(|f| string_literal(f)).join(","),
                digest.fields.iter().map(|f| convert(f, "VARCHAR")).join(",")
            )
        });
        values.extend(copy_engine_values(renderer, copy, digest)?);

        let options = &copy.source.options;
        let mut csv_options = format!("fieldSeparator={}", options.delimiter);
        if let Some(null_marker) = &options.null_marker {
            csv_options.push_str(&format!(" nullString={null_marker}"));
        }
        let column_names = if options.header {
            "NULL".to_string()
        } else {
            string_literal(&copy.file_fields.iter().map(|f| f.name.as_str()).join(","))
        };

        let columns = copy_target_columns(copy)
            .iter()
            .map(|c| renderer.identifier(c))
            .join(", ");

        Ok(copy
            .source
            .files
            .iter()
            .map(|file| {
                format!(
                    "INSERT INTO {} ({columns}) SELECT {} FROM CSVREAD({},{column_names},{})",
                    renderer.table(&copy.target),
                    values.join(","),
                    string_literal(file),
                    string_literal(&csv_options)
                )
            })
            .collect())
    }
}

impl RelationalSink for H2Sink {
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
