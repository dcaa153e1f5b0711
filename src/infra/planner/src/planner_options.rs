// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tidemark_ingestion::DEFAULT_BATCH_SUCCESS_STATUS;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PlannerOptions {
    /// Deletes all staging rows once the batch is committed
    pub cleanup_staging_data: bool,
    pub collect_statistics: bool,
    pub enable_schema_evolution: bool,
    /// Emits `CREATE TABLE IF NOT EXISTS` for main and metadata
    pub create_datasets: bool,
    pub create_staging_dataset: bool,
    pub batch_success_status_value: String,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            cleanup_staging_data: false,
            collect_statistics: false,
            enable_schema_evolution: false,
            create_datasets: true,
            create_staging_dataset: false,
            batch_success_status_value: DEFAULT_BATCH_SUCCESS_STATUS.to_string(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
