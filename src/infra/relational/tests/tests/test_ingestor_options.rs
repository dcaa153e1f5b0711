// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use indoc::indoc;
use pretty_assertions::assert_eq;
use tidemark_relational::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_options_from_yaml() {
    let options = IngestorOptions::from_yaml_str(indoc!(
        r#"
        cleanupStagingData: false
        collectStatistics: true
        enableSchemaEvolution: true
        schemaEvolutionCapabilities: [ADD_COLUMN, COLUMN_NULLABILITY_CHANGE]
        caseConversion: toUpper
        batchSuccessStatusValue: SUCCEEDED
        bulkLoadRetry:
          maxRetries: 3
        "#
    ))
    .unwrap();

    assert_eq!(
        options,
        IngestorOptions {
            cleanup_staging_data: false,
            collect_statistics: true,
            enable_schema_evolution: true,
            schema_evolution_capabilities: BTreeSet::from([
                SchemaEvolutionCapability::AddColumn,
                SchemaEvolutionCapability::ColumnNullabilityChange,
            ]),
            case_conversion: CaseConversion::ToUpper,
            batch_success_status_value: "SUCCEEDED".to_string(),
            bulk_load_retry: BulkLoadRetryPolicy {
                max_retries: 3,
                backoff_ms: 1_000,
            },
            ..Default::default()
        }
    );

    let planner_options = options.planner_options();
    assert!(!planner_options.cleanup_staging_data);
    assert!(planner_options.collect_statistics);
    assert_eq!(planner_options.batch_success_status_value, "SUCCEEDED");
}

#[test]
fn test_options_defaults() {
    let options = IngestorOptions::from_yaml_str("{}").unwrap();

    assert_eq!(options, IngestorOptions::default());
    assert!(options.cleanup_staging_data);
    assert!(options.create_datasets);
    assert!(!options.enable_schema_evolution);
    assert_eq!(options.batch_success_status_value, DEFAULT_BATCH_SUCCESS_STATUS);
    assert_eq!(options.bulk_load_retry.max_retries, 10);
}

#[test]
fn test_options_reject_unknown_fields() {
    let err = IngestorOptions::from_yaml_str("cleanupStaging: false").unwrap_err();
    assert!(
        err.message.starts_with("Invalid ingestor options: unknown field `cleanupStaging`"),
        "{err}"
    );

    let err = IngestorOptions::from_yaml_str("schemaEvolutionCapabilities: [DROP_COLUMN]")
        .unwrap_err();
    assert!(err.message.contains("DROP_COLUMN"), "{err}");
}

#[test]
fn test_no_retries_policy() {
    let policy = BulkLoadRetryPolicy::no_retries();
    assert_eq!(policy.max_retries, 0);
    assert_eq!(policy.backoff(), chrono::Duration::zero());
    assert_eq!(
        BulkLoadRetryPolicy::default().backoff(),
        chrono::Duration::seconds(1)
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
