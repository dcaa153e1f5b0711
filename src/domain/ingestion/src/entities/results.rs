// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{DataSplitRange, Dataset, Datasets, StatisticName};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Deserialize, serde::Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestStatus {
    Succeeded,
    Failed,
}

/// Outcome of one ingestion pass (one batch)
#[derive(Debug, Clone, PartialEq)]
pub struct IngestorResult {
    pub status: IngestStatus,
    pub batch_id: Option<i64>,
    pub data_split_range: Option<DataSplitRange>,
    pub statistics: BTreeMap<StatisticName, i64>,
    /// Datasets as they look after the pass, including an evolved main schema
    pub updated_datasets: Datasets,
    pub schema_evolution_sql: Vec<String>,
    pub ingestion_timestamp_utc: DateTime<Utc>,
    pub message: Option<String>,
}

impl IngestorResult {
    pub fn statistic(&self, name: StatisticName) -> Option<i64> {
        self.statistics.get(&name).copied()
    }

    pub fn is_success(&self) -> bool {
        self.status == IngestStatus::Succeeded
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Outcome of evolving a live main table
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEvolutionServiceResult {
    pub status: IngestStatus,
    pub evolved_dataset: Option<Dataset>,
    pub executed_sql: Vec<String>,
    pub message: Option<String>,
}

impl SchemaEvolutionServiceResult {
    pub fn succeeded(evolved_dataset: Dataset, executed_sql: Vec<String>) -> Self {
        Self {
            status: IngestStatus::Succeeded,
            evolved_dataset: Some(evolved_dataset),
            executed_sql,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: IngestStatus::Failed,
            evolved_dataset: None,
            executed_sql: Vec::new(),
            message: Some(message.into()),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
