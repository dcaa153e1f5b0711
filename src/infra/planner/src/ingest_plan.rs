// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use tidemark_ingestion::{CopyOperation, Dataset, LogicalPlan, Operation, Selection, StatisticName};

use crate::BatchMetadataPlan;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Everything needed to run one ingestion, as logical plans.
///
/// Stages are executed in field order. `ingest` and `metadata_ingest` are
/// executed once per batch (one batch per data split range) and share a
/// transaction; the other stages run once per ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestPlan {
    /// Main dataset as planned, enriched with engine-managed fields when its
    /// schema was derived from staging
    pub main_dataset: Dataset,
    pub pre_actions: LogicalPlan,
    pub deduplication: LogicalPlan,
    pub deduplication_checks: BTreeMap<DeduplicationCheck, Selection>,
    /// Distinct data split values of the deduplicated staging, when the
    /// deduplication strategy numbers versions into the data split column
    pub data_split_values: Option<Selection>,
    pub incoming_record_count: Selection,
    pub ingest: LogicalPlan,
    pub metadata_ingest: LogicalPlan,
    pub post_actions: LogicalPlan,
    pub post_cleanup: LogicalPlan,
    pub pre_ingest_statistics: BTreeMap<StatisticName, Selection>,
    pub post_ingest_statistics: BTreeMap<StatisticName, Selection>,
    pub batch_metadata: BatchMetadataPlan,
}

impl IngestPlan {
    /// The staged files copy of a bulk load, if this is one
    pub fn copy_operation(&self) -> Option<&CopyOperation> {
        self.ingest.operations.iter().find_map(|op| match op {
            Operation::Copy(copy) => Some(copy.as_ref()),
            _ => None,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Query run after deduplication; a result above one fails the ingestion
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display, serde::Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeduplicationCheck {
    /// Largest number of identical staging rows
    MaxDuplicates,
    /// Largest number of distinct digests sharing one key and version
    MaxDataErrors,
}

impl DeduplicationCheck {
    pub fn column_alias(self) -> &'static str {
        match self {
            Self::MaxDuplicates => "maxDuplicates",
            Self::MaxDataErrors => "maxDataErrors",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
