// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use internal_error::InternalError;
use thiserror::Error;

use crate::{Capability, DataSplitRange, DataType, Field, FieldType, LogicalPlan, Selection};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A relational target: its capabilities, type conversion rules and SQL
/// dialect
pub trait RelationalSink: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> &BTreeSet<Capability>;

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Whether a column of `main_type` can take values of `staging_type`
    /// without changing its declared type
    fn supports_implicit_mapping(&self, main_type: DataType, staging_type: DataType) -> bool;

    /// Whether a column of `main_type` can be altered to `staging_type`
    fn supports_explicit_mapping(&self, main_type: DataType, staging_type: DataType) -> bool;

    /// Field of `evolve_to`'s type wide enough to hold both fields' values.
    /// An unspecified length or scale leaves the other side's in place.
    fn evolve_field_length(&self, evolve_from: &Field, evolve_to: &Field) -> Field {
        let length = wider(evolve_from.field_type.length, evolve_to.field_type.length);
        let scale = wider(evolve_from.field_type.scale, evolve_to.field_type.scale);

        Field {
            name: evolve_to.name.clone(),
            field_type: FieldType {
                data_type: evolve_to.data_type(),
                length,
                scale,
            },
            nullable: evolve_to.nullable || evolve_from.nullable,
            primary_key: evolve_to.primary_key,
            alias: evolve_to.alias.clone(),
        }
    }

    /// Lowers the plan into SQL statements of this sink's dialect
    fn transform(
        &self,
        plan: &LogicalPlan,
        context: &TransformContext,
    ) -> Result<Vec<String>, TransformError>;

    /// Lowers a query into one `SELECT` statement
    fn transform_query(
        &self,
        selection: &Selection,
        context: &TransformContext,
    ) -> Result<String, TransformError>;
}

/// Unspecified length means unbounded
fn wider(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Per-batch values that placeholders of a plan are rendered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformContext {
    pub batch_start_ts_utc: DateTime<Utc>,
    /// When absent, the batch id is rendered as a metadata sub-query
    pub batch_id: Option<i64>,
    pub data_split: Option<DataSplitRange>,
}

impl TransformContext {
    pub fn new(batch_start_ts_utc: DateTime<Utc>) -> Self {
        Self {
            batch_start_ts_utc,
            batch_id: None,
            data_split: None,
        }
    }

    pub fn with_batch_id(mut self, batch_id: i64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_data_split(mut self, data_split: Option<DataSplitRange>) -> Self {
        self.data_split = data_split;
        self
    }

    pub fn batch_start_literal(&self) -> String {
        self.batch_start_ts_utc
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("{operation} is not supported by the {sink} sink")]
    Unsupported {
        sink: &'static str,
        operation: String,
    },
    #[error("Data split placeholder used without a data split range")]
    MissingDataSplit,
    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
