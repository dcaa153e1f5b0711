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

pub struct BigQuerySink {
    capabilities: BTreeSet<Capability>,
}

#[component(pub)]
#[interface(dyn RelationalSink)]
impl BigQuerySink {
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

impl Dialect for BigQuerySink {
    fn dialect_name(&self) -> &'static str {
        "BigQuery"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "\\`"))
    }

    fn date_time_literal(&self, value: &str) -> String {
        format!("PARSE_DATETIME('%Y-%m-%d %H:%M:%E*S',{})", string_literal(value))
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_DATETIME()"
    }

    fn column_type(&self, field_type: &FieldType) -> String {
        let data_type = field_type.data_type;
        let name = match data_type {
            _ if data_type.is_integral() => "INT64",
            _ if data_type.is_floating() => "FLOAT64",
            _ if data_type.is_string() => "STRING",
            _ if data_type.is_boolean() => "BOOL",
            DataType::Number | DataType::Numeric | DataType::Decimal => "NUMERIC",
            DataType::Timestamp
            | DataType::TimestampNtz
            | DataType::TimestampTz
            | DataType::TimestampLtz => "TIMESTAMP",
            DataType::Json | DataType::Variant => "JSON",
            DataType::Binary | DataType::Varbinary | DataType::Bytes => "BYTES",
            other => return with_size(other.to_string(), field_type),
        };
        // Integral and floating types carry no size
        if data_type.is_integral() || data_type.is_floating() {
            return name.to_string();
        }
        with_size(name.to_string(), field_type)
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
                format!("ALTER TABLE {table} ALTER COLUMN {column} SET DATA TYPE {column_type}")
            }
            AlterChange::MakeNullable => {
                format!("ALTER TABLE {table} ALTER COLUMN {column} DROP NOT NULL")
            }
        })
    }

    /// Loads the files into the staged files table, then copies it into the
    /// target stamping engine-managed columns
    fn copy(
        &self,
        renderer: &SqlRenderer<'_>,
        copy: &CopyOperation,
    ) -> Result<Vec<String>, TransformError> {
        let staging = &copy.source.reference;
        let options = &copy.source.options;

        let mut load_options = vec![format!(
            "format = {}",
            string_literal(match copy.source.format {
                FileFormat::Csv => "CSV",
                FileFormat::Json => "NEWLINE_DELIMITED_JSON",
            })
        )];
        load_options.push(format!(
            "uris = [{}]",
            copy.source.files.iter().map(|f| string_literal(f)).join(",")
        ));
        if copy.source.format == FileFormat::Csv {
            load_options.push(format!(
                "field_delimiter = {}",
                string_literal(&options.delimiter.to_string())
            ));
            load_options.push(format!("skip_leading_rows = {}", u8::from(options.header)));
            if let Some(null_marker) = &options.null_marker {
                load_options.push(format!("null_marker = {}", string_literal(null_marker)));
            }
        }

        let load = format!(
            "LOAD DATA OVERWRITE {} ({}) FROM FILES ({})",
            renderer.table(staging),
            copy.file_fields
                .iter()
                .map(|f| format!(
                    "{} {}",
                    renderer.identifier(&f.name),
                    self.column_type(&f.field_type)
                ))
                .join(", "),
            load_options.join(", ")
        );

        let file_column =
            |name: &str| format!("{STAGED_FILES_ALIAS}.{}", renderer.identifier(name));
        let mut values: Vec<String> =
            copy.file_fields.iter().map(|f| file_column(&f.name)).collect();
        let digest = copy.digest.as_ref().map(|digest| {
            format!(
                "{}(TO_JSON_STRING(STRUCT({})))",
                digest.udf_name,
                digest.fields.iter().map(|f| file_column(f)).join(",")
            )
        });
        values.extend(copy_engine_values(renderer, copy, digest)?);

        let insert = format!(
            "INSERT INTO {} ({}) (SELECT {} FROM {} as {STAGED_FILES_ALIAS})",
            renderer.table(&copy.target),
            copy_target_columns(copy)
                .iter()
                .map(|c| renderer.identifier(c))
                .join(", "),
            values.join(","),
            renderer.table(staging)
        );

        Ok(vec![load, insert])
    }
}

impl RelationalSink for BigQuerySink {
    fn name(&self) -> &'static str {
        self.dialect_name()
    }

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    fn supports_implicit_mapping(&self, main_type: DataType, staging_type: DataType) -> bool {
        // Integral types are all INT64 and floating types all FLOAT64
        (main_type.is_integral() && staging_type.is_integral())
            || (main_type.is_floating() && staging_type.is_floating())
            || is_widening_conversion(main_type, staging_type)
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
