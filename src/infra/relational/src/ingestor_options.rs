// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use tidemark_ingestion::{
    CaseConversion,
    ConfigurationError,
    DEFAULT_BATCH_SUCCESS_STATUS,
    SchemaEvolutionCapability,
};
use tidemark_planner::PlannerOptions;

use crate::BulkLoadRetryPolicy;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Options of the ingestor and generator, loadable from YAML:
///
/// ```yaml
/// cleanupStagingData: false
/// enableSchemaEvolution: true
/// schemaEvolutionCapabilities: [ADD_COLUMN]
/// caseConversion: toUpper
/// bulkLoadRetry:
///   maxRetries: 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct IngestorOptions {
    pub cleanup_staging_data: bool,
    pub collect_statistics: bool,
    pub enable_schema_evolution: bool,
    pub schema_evolution_capabilities: BTreeSet<SchemaEvolutionCapability>,
    pub create_datasets: bool,
    pub create_staging_dataset: bool,
    pub batch_success_status_value: String,
    pub case_conversion: CaseConversion,
    pub bulk_load_retry: BulkLoadRetryPolicy,
}

impl Default for IngestorOptions {
    fn default() -> Self {
        Self {
            cleanup_staging_data: true,
            collect_statistics: false,
            enable_schema_evolution: false,
            schema_evolution_capabilities: BTreeSet::new(),
            create_datasets: true,
            create_staging_dataset: false,
            batch_success_status_value: DEFAULT_BATCH_SUCCESS_STATUS.to_string(),
            case_conversion: CaseConversion::None,
            bulk_load_retry: BulkLoadRetryPolicy::default(),
        }
    }
}

impl IngestorOptions {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ConfigurationError::new(format!("Invalid ingestor options: {e}")))
    }

    pub fn planner_options(&self) -> PlannerOptions {
        PlannerOptions {
            cleanup_staging_data: self.cleanup_staging_data,
            collect_statistics: self.collect_statistics,
            enable_schema_evolution: self.enable_schema_evolution,
            create_datasets: self.create_datasets,
            create_staging_dataset: self.create_staging_dataset,
            batch_success_status_value: self.batch_success_status_value.clone(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
