// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::io::BufRead;

use internal_error::{InternalError, ResultIntoInternal};
use sha2::Digest;
use tidemark_ingestion::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

const MAX_REPORTED_ERRORS: usize = 10;

/// Rows parsed out of staged files, each holding the file columns followed by
/// the digest when one is requested
#[derive(Debug, Default)]
pub(crate) struct StagedRows {
    pub rows: Vec<Row>,
    pub files_read: u64,
    pub rows_with_errors: u64,
    pub errors: Vec<String>,
}

impl StagedRows {
    fn reject(&mut self, file: &str, line: u64, reason: impl std::fmt::Display) {
        self.rows_with_errors += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(format!("{file}, row {line}: {reason}"));
        }
    }

    fn accept(
        &mut self,
        file: &str,
        line: u64,
        fields: &[Field],
        digest: Option<&CopyDigest>,
        mut row: Row,
    ) {
        let violated = fields
            .iter()
            .zip(&row)
            .find_map(|(f, v)| (v.is_null() && !f.nullable).then_some(f));
        if let Some(field) = violated {
            self.reject(file, line, format!("NULL value in NOT NULL column \"{}\"", field.name));
            return;
        }

        if let Some(digest) = digest {
            row.push(SqlValue::Text(row_digest(fields, &row, digest)));
        }
        self.rows.push(row);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Reads all files of a copy operation. Blocking.
///
/// A file that cannot be opened fails the whole load, while a row that
/// cannot be parsed or converted is only counted and skipped.
pub(crate) fn read_staged_files(copy: &CopyOperation) -> Result<StagedRows, ExecutionError> {
    let mut staged = StagedRows::default();

    for file in &copy.source.files {
        match copy.source.format {
            FileFormat::Csv => read_csv(file, copy, &mut staged)?,
            FileFormat::Json => read_ndjson(file, copy, &mut staged)?,
        }
        staged.files_read += 1;
    }

    Ok(staged)
}

fn read_csv(
    file: &str,
    copy: &CopyOperation,
    staged: &mut StagedRows,
) -> Result<(), ExecutionError> {
    let options = &copy.source.options;
    let delimiter = u8::try_from(options.delimiter).map_err(|_| {
        InternalError::new(format!("Unsupported CSV delimiter {:?}", options.delimiter))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(options.header)
        .from_path(file)
        .context_int_err(format!("Cannot open staged file {file}"))?;

    let fields = &copy.file_fields;
    let first_line = u64::from(options.header) + 1;

    for (line, record) in (first_line..).zip(reader.records()) {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(io_failure(file, &e)),
            Err(e) => {
                staged.reject(file, line, e);
                continue;
            }
        };
        if record.len() != fields.len() {
            staged.reject(
                file,
                line,
                format!("Expected {} columns but found {}", fields.len(), record.len()),
            );
            continue;
        }

        let row: Result<Row, String> = fields
            .iter()
            .zip(record.iter())
            .map(|(field, cell)| {
                if options.null_marker.as_deref() == Some(cell) || cell.is_empty() {
                    Ok(SqlValue::Null)
                } else {
                    convert_text(field, cell)
                }
            })
            .collect();

        match row {
            Ok(row) => staged.accept(file, line, fields, copy.digest.as_ref(), row),
            Err(reason) => staged.reject(file, line, reason),
        }
    }

    Ok(())
}

fn read_ndjson(
    file: &str,
    copy: &CopyOperation,
    staged: &mut StagedRows,
) -> Result<(), ExecutionError> {
    let reader = std::fs::File::open(file)
        .map(std::io::BufReader::new)
        .context_int_err(format!("Cannot open staged file {file}"))?;

    let fields = &copy.file_fields;

    for (line, text) in (1..).zip(reader.lines()) {
        let text = text.map_err(|e| io_failure(file, &e))?;
        if text.trim().is_empty() {
            continue;
        }

        let object = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(serde_json::Value::Object(object)) => object,
            Ok(_) => {
                staged.reject(file, line, "Expected a JSON object");
                continue;
            }
            Err(e) => {
                staged.reject(file, line, e);
                continue;
            }
        };

        let row: Result<Row, String> = fields
            .iter()
            .map(|field| {
                let value = object
                    .iter()
                    .find_map(|(k, v)| field.has_name(k).then_some(v))
                    .unwrap_or(&serde_json::Value::Null);
                convert_json(field, value)
            })
            .collect();

        match row {
            Ok(row) => staged.accept(file, line, fields, copy.digest.as_ref(), row),
            Err(reason) => staged.reject(file, line, reason),
        }
    }

    Ok(())
}

fn io_failure(file: &str, e: &dyn std::fmt::Display) -> ExecutionError {
    ExecutionError::Transient {
        message: format!("Reading staged file {file} failed: {e}"),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Converts a textual cell into the storage value of the field's type
fn convert_text(field: &Field, cell: &str) -> Result<SqlValue, String> {
    let data_type = field.data_type();
    let invalid = || {
        format!("Cannot convert '{cell}' to {data_type} for column \"{}\"", field.name)
    };
    let trimmed = cell.trim();

    match data_type {
        _ if data_type.is_integral() => {
            trimmed.parse().map(SqlValue::Integer).map_err(|_| invalid())
        }
        _ if data_type.is_floating() => trimmed.parse().map(SqlValue::Real).map_err(|_| invalid()),
        DataType::Number | DataType::Numeric | DataType::Decimal => {
            trimmed.parse().map(SqlValue::Real).map_err(|_| invalid())
        }
        _ if data_type.is_boolean() => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(SqlValue::Integer(1)),
            "false" | "0" => Ok(SqlValue::Integer(0)),
            _ => Err(invalid()),
        },
        _ if data_type.is_string() => {
            let max_chars = field
                .field_type
                .length
                .map_or(usize::MAX, |length| usize::try_from(length).unwrap_or(usize::MAX));
            if cell.chars().count() > max_chars {
                Err(format!(
                    "Value '{cell}' exceeds length {max_chars} of column \"{}\"",
                    field.name
                ))
            } else {
                Ok(SqlValue::Text(cell.to_string()))
            }
        }
        _ if data_type.is_temporal() => {
            if is_valid_temporal(data_type, trimmed) {
                Ok(SqlValue::Text(trimmed.to_string()))
            } else {
                Err(invalid())
            }
        }
        DataType::Json | DataType::Variant => serde_json::from_str::<serde_json::Value>(cell)
            .map(|_| SqlValue::Text(cell.to_string()))
            .map_err(|_| invalid()),
        _ => hex::decode(trimmed).map(SqlValue::Blob).map_err(|_| invalid()),
    }
}

fn convert_json(field: &Field, value: &serde_json::Value) -> Result<SqlValue, String> {
    use serde_json::Value as J;

    let data_type = field.data_type();
    match value {
        J::Null => Ok(SqlValue::Null),
        J::String(s) => convert_text(field, s),
        J::Bool(b) if data_type.is_boolean() => Ok(SqlValue::Integer(i64::from(*b))),
        J::Number(n) if data_type.is_integral() => n.as_i64().map(SqlValue::Integer).ok_or_else(|| {
            format!("Cannot convert {n} to {data_type} for column \"{}\"", field.name)
        }),
        J::Object(_) | J::Array(_) if matches!(data_type, DataType::Json | DataType::Variant) => {
            Ok(SqlValue::Text(value.to_string()))
        }
        other => convert_text(field, &other.to_string()),
    }
}

fn is_valid_temporal(data_type: DataType, value: &str) -> bool {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

    match data_type {
        DataType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        DataType::Time => NaiveTime::parse_from_str(value, "%H:%M:%S%.f").is_ok(),
        _ => {
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .into_iter()
                .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
                || DateTime::parse_from_rfc3339(value).is_ok()
                || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        }
    }
}

/// Hex SHA-256 of the digest columns as a JSON object keyed by column name
fn row_digest(fields: &[Field], row: &[SqlValue], digest: &CopyDigest) -> String {
    let object: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .zip(row)
        .filter(|(f, _)| digest.fields.iter().any(|d| f.has_name(d)))
        .map(|(f, v)| {
            let value = match v {
                SqlValue::Null => serde_json::Value::Null,
                SqlValue::Integer(i) => (*i).into(),
                SqlValue::Real(r) => (*r).into(),
                SqlValue::Text(s) => s.clone().into(),
                SqlValue::Blob(b) => hex::encode(b).into(),
            };
            (f.name.clone(), value)
        })
        .collect();

    hex::encode(sha2::Sha256::digest(serde_json::Value::Object(object).to_string()))
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////


////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
