// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod ansi_sink;
mod bigquery_sink;
mod h2_sink;
mod snowflake_sink;
mod sqlite_sink;

pub use ansi_sink::*;
pub use bigquery_sink::*;
pub use h2_sink::*;
pub use snowflake_sink::*;
pub use sqlite_sink::*;
use tidemark_ingestion::*;

use crate::sql::SqlRenderer;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn integral_rank(data_type: DataType) -> Option<u8> {
    match data_type {
        DataType::Tinyint => Some(1),
        DataType::Smallint => Some(2),
        DataType::Int | DataType::Integer => Some(3),
        DataType::Bigint | DataType::Int64 => Some(4),
        _ => None,
    }
}

fn is_exact_numeric(data_type: DataType) -> bool {
    matches!(data_type, DataType::Decimal | DataType::Numeric | DataType::Number)
}

fn is_wide_floating(data_type: DataType) -> bool {
    matches!(data_type, DataType::Double | DataType::Float64)
}

/// A column of `main` holds `staging` values as they are
pub(crate) fn is_widening_conversion(main: DataType, staging: DataType) -> bool {
    if let (Some(main_rank), Some(staging_rank)) = (integral_rank(main), integral_rank(staging)) {
        return main_rank >= staging_rank;
    }
    if is_exact_numeric(main) || is_wide_floating(main) {
        return staging.is_integral() || staging.is_floating();
    }
    if main.is_floating() {
        return staging.is_floating() || integral_rank(staging).is_some_and(|rank| rank <= 3);
    }
    if main.is_string() && main != DataType::Char {
        return staging.is_string();
    }
    if main.is_temporal() && main != DataType::Date && main != DataType::Time {
        return staging == DataType::Date;
    }
    (main.is_boolean() && staging.is_boolean())
        || (is_binary(main) && is_binary(staging))
        || (is_semi_structured(main) && is_semi_structured(staging))
}

/// A column of `main` can be altered to `staging` without losing values
pub(crate) fn is_altering_conversion(main: DataType, staging: DataType) -> bool {
    if let (Some(main_rank), Some(staging_rank)) = (integral_rank(main), integral_rank(staging)) {
        return staging_rank > main_rank;
    }
    match main {
        _ if main.is_integral() => is_exact_numeric(staging) || is_wide_floating(staging),
        DataType::Float | DataType::Real => is_wide_floating(staging),
        DataType::Char => staging.is_string() && staging != DataType::Char,
        DataType::Date => staging.is_temporal() && staging != DataType::Time,
        _ => false,
    }
}

fn is_binary(data_type: DataType) -> bool {
    matches!(data_type, DataType::Binary | DataType::Varbinary | DataType::Bytes)
}

fn is_semi_structured(data_type: DataType) -> bool {
    matches!(data_type, DataType::Json | DataType::Variant)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Columns of the copy target written by a load, in the order values are
/// produced: file columns, digest, batch id, audit time
pub(crate) fn copy_target_columns(copy: &CopyOperation) -> Vec<String> {
    copy.file_fields
        .iter()
        .map(|f| f.name.clone())
        .chain(copy.digest.as_ref().map(|d| d.field.clone()))
        .chain([copy.batch_id_field.clone()])
        .chain(copy.audit_field.clone())
        .collect()
}

/// Values following the file columns; `digest` is the rendered digest
/// expression, if any
pub(crate) fn copy_engine_values(
    renderer: &SqlRenderer<'_>,
    copy: &CopyOperation,
    digest: Option<String>,
) -> Result<Vec<String>, TransformError> {
    let mut values: Vec<String> = digest.into_iter().collect();
    values.push(renderer.value(&copy.batch_id)?);
    if copy.audit_field.is_some() {
        values.push(renderer.value(&Value::BatchStartTimestamp)?);
    }
    Ok(values)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
