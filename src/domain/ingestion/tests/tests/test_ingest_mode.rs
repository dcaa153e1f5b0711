// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use assert_matches::assert_matches;
use indoc::indoc;
use pretty_assertions::assert_eq;
use tidemark_ingestion::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn batch_id_milestoning() -> TransactionMilestoning {
    TransactionMilestoning::BatchId {
        batch_id_in_field: "batch_id_in".to_string(),
        batch_id_out_field: "batch_id_out".to_string(),
    }
}

fn unitemporal_delta() -> UnitemporalDelta {
    UnitemporalDelta {
        digest_field: "digest".to_string(),
        transaction_milestoning: batch_id_milestoning(),
        merge_strategy: MergeStrategy::NoDeletes,
        deduplication_strategy: DeduplicationStrategy::None,
        data_split_field: None,
    }
}

fn assert_invalid(ingest_mode: &IngestMode, expected_message: &str) {
    assert_matches!(
        ingest_mode.validate(),
        Err(ConfigurationError { message }) if message == expected_message
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_valid_modes_pass_validation() {
    IngestMode::UnitemporalDelta(unitemporal_delta())
        .validate()
        .unwrap();

    IngestMode::AppendOnly(AppendOnly {
        digest_gen_strategy: DigestGenStrategy::UserProvided {
            digest_field: "digest".to_string(),
        },
        auditing: Auditing::DateTime {
            date_time_field: "batch_update_time".to_string(),
        },
        deduplication_strategy: DeduplicationStrategy::AnyVersion {
            version_field: "version".to_string(),
        },
        filter_existing_records: true,
        data_split_field: Some("data_split".to_string()),
    })
    .validate()
    .unwrap();
}

#[test]
fn test_any_version_requires_data_split() {
    let mut mode = unitemporal_delta();
    mode.deduplication_strategy = DeduplicationStrategy::AnyVersion {
        version_field: "version".to_string(),
    };

    assert_invalid(
        &IngestMode::UnitemporalDelta(mode),
        "Data split field must be provided when using AnyVersion deduplication",
    );
}

#[test]
fn test_any_version_not_supported_by_snapshots() {
    let mode = IngestMode::NontemporalSnapshot(NontemporalSnapshot {
        auditing: Auditing::None,
        deduplication_strategy: DeduplicationStrategy::AnyVersion {
            version_field: "version".to_string(),
        },
        empty_dataset_handling: EmptyDatasetHandling::NoOp,
    });

    assert_invalid(
        &mode,
        "AnyVersion deduplication is not supported by NontemporalSnapshot",
    );
}

#[test]
fn test_delete_indicator_requires_values() {
    let mut mode = unitemporal_delta();
    mode.merge_strategy = MergeStrategy::DeleteIndicator {
        delete_field: "delete_indicator".to_string(),
        delete_values: vec![],
    };

    assert_invalid(
        &IngestMode::UnitemporalDelta(mode),
        "Delete indicator values must not be empty",
    );
}

#[test]
fn test_filter_existing_records_requires_digest() {
    let mode = IngestMode::AppendOnly(AppendOnly {
        digest_gen_strategy: DigestGenStrategy::NoDigest,
        auditing: Auditing::None,
        deduplication_strategy: DeduplicationStrategy::None,
        filter_existing_records: true,
        data_split_field: None,
    });

    assert_invalid(
        &mode,
        "Primary keys and digest are mandatory for filterExistingRecords",
    );
}

#[test]
fn test_bitemporal_snapshot_requires_thru() {
    let mode = IngestMode::BitemporalSnapshot(BitemporalSnapshot {
        digest_field: "digest".to_string(),
        transaction_milestoning: batch_id_milestoning(),
        validity_milestoning: ValidityMilestoning::DateTime {
            date_time_from_field: "validity_from_target".to_string(),
            date_time_thru_field: "validity_through_target".to_string(),
            derivation: ValidityDerivation::SourceSpecifiesFrom {
                source_date_time_from_field: "validity_from_reference".to_string(),
            },
        },
        partitioning: Partitioning::default(),
        empty_dataset_handling: EmptyDatasetHandling::NoOp,
        deduplication_strategy: DeduplicationStrategy::None,
    });

    assert_invalid(
        &mode,
        "BitemporalSnapshot requires the source to specify both validity from and thru",
    );
}

#[test]
fn test_partition_values_must_reference_partition_fields() {
    let mode = IngestMode::UnitemporalSnapshot(UnitemporalSnapshot {
        digest_field: "digest".to_string(),
        transaction_milestoning: batch_id_milestoning(),
        partitioning: Partitioning {
            partition_fields: vec!["biz_date".to_string()],
            partition_values_by_field: BTreeMap::from([(
                "region".to_string(),
                vec!["EU".to_string()],
            )]),
        },
        empty_dataset_handling: EmptyDatasetHandling::DeleteTargetData,
        deduplication_strategy: DeduplicationStrategy::None,
    });

    assert_invalid(
        &mode,
        "Partition values provided for field \"region\" which is not a partition field",
    );
}

#[test]
fn test_same_in_and_out_fields_are_rejected() {
    let mut mode = unitemporal_delta();
    mode.transaction_milestoning = TransactionMilestoning::BatchId {
        batch_id_in_field: "batch_id".to_string(),
        batch_id_out_field: "batch_id".to_string(),
    };

    assert_invalid(
        &IngestMode::UnitemporalDelta(mode),
        "Batch id in and batch id out fields must be different",
    );
}

#[test]
fn test_ingest_mode_from_yaml() {
    let mode: IngestMode = serde_yaml::from_str(indoc!(
        r#"
        kind: bitemporalDelta
        digestField: digest
        transactionMilestoning:
          kind: batchIdAndDateTime
          batchIdInField: batch_id_in
          batchIdOutField: batch_id_out
          dateTimeInField: batch_time_in
          dateTimeOutField: batch_time_out
        validityMilestoning:
          kind: dateTime
          dateTimeFromField: validity_from_target
          dateTimeThruField: validity_through_target
          derivation:
            kind: sourceSpecifiesFrom
            sourceDateTimeFromField: validity_from_reference
        mergeStrategy:
          kind: deleteIndicator
          deleteField: delete_indicator
          deleteValues: ["yes", "1"]
        "#
    ))
    .unwrap();

    mode.validate().unwrap();

    assert_eq!(mode.name(), "BitemporalDelta");
    assert_eq!(mode.digest_field(), Some("digest"));
    assert_eq!(mode.delete_field(), Some("delete_indicator"));
    assert_eq!(
        mode.transaction_milestoning().unwrap().fields(),
        vec!["batch_id_in", "batch_id_out", "batch_time_in", "batch_time_out"]
    );
    assert_eq!(
        mode.validity_milestoning()
            .unwrap()
            .derivation()
            .source_thru(),
        None
    );
    assert!(mode.deduplication_strategy().is_none());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
