// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use pretty_assertions::assert_eq;
use tidemark_ingestion::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_case_conversion_of_ingest_mode() {
    let mode = IngestMode::NontemporalDelta(NontemporalDelta {
        digest_field: "digest".to_string(),
        auditing: Auditing::DateTime {
            date_time_field: "batch_update_time".to_string(),
        },
        merge_strategy: MergeStrategy::DeleteIndicator {
            delete_field: "delete_indicator".to_string(),
            delete_values: vec!["yes".to_string()],
        },
        deduplication_strategy: DeduplicationStrategy::MaxVersion {
            version_field: "version".to_string(),
        },
        data_split_field: Some("data_split".to_string()),
    });

    let upper = CaseConversion::ToUpper.apply_to_ingest_mode(&mode);

    assert_eq!(
        upper,
        IngestMode::NontemporalDelta(NontemporalDelta {
            digest_field: "DIGEST".to_string(),
            auditing: Auditing::DateTime {
                date_time_field: "BATCH_UPDATE_TIME".to_string(),
            },
            merge_strategy: MergeStrategy::DeleteIndicator {
                delete_field: "DELETE_INDICATOR".to_string(),
                // Values are data, not identifiers
                delete_values: vec!["yes".to_string()],
            },
            deduplication_strategy: DeduplicationStrategy::MaxVersion {
                version_field: "VERSION".to_string(),
            },
            data_split_field: Some("DATA_SPLIT".to_string()),
        })
    );

    assert_eq!(CaseConversion::None.apply_to_ingest_mode(&mode), mode);
}

#[test]
fn test_case_conversion_of_datasets() {
    let main = Dataset::table(
        DatasetReference::new("Main").with_database("MyDb"),
        SchemaDefinition::new(vec![
            Field::new("Id", DataType::Integer).as_primary_key(),
            Field::new("Name", DataType::Varchar),
        ])
        .unwrap(),
    );
    let staging = Dataset::derived(
        DatasetReference::new("Staging").with_database("MyDb"),
        main.schema().clone(),
        vec![DatasetFilter::new("Name", FilterType::EqualTo, "x")],
    );

    let datasets = CaseConversion::ToLower
        .apply_to_datasets(&Datasets::new(main, staging))
        .unwrap();

    assert_eq!(datasets.main.reference().qualified_name(), "mydb.main");
    assert_eq!(
        datasets.main.schema().field_names(),
        vec!["id".to_string(), "name".to_string()]
    );
    assert_eq!(datasets.staging.filters()[0].field, "name");
    assert_eq!(
        datasets.staging.filters()[0].value,
        FilterValue::String("x".to_string())
    );
    assert_eq!(datasets.metadata.name, "batch_metadata");
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
