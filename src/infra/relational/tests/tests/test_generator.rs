// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tidemark_relational::*;
use time_source::SystemTimeSourceStub;

use super::harness::batch_start;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

const NEXT_BATCH_ID: &str = "(SELECT COALESCE(MAX(batch_metadata.\"table_batch_id\"),0)+1 FROM \
                             \"batch_metadata\" as batch_metadata WHERE \
                             batch_metadata.\"table_name\" = 'employees')";

fn generator(ingest_mode: IngestMode, options: IngestorOptions) -> RelationalGenerator {
    RelationalGenerator::new(
        ingest_mode,
        options,
        Arc::new(SqliteSink::new()),
        Arc::new(SystemTimeSourceStub::new_set(batch_start())),
    )
    .unwrap()
}

fn id() -> Field {
    Field::new("id", DataType::Integer).as_primary_key()
}

fn name() -> Field {
    Field::new("name", DataType::Varchar).with_length(64)
}

fn datasets(main_fields: Vec<Field>, staging_fields: Vec<Field>) -> Datasets {
    Datasets::new(
        Dataset::table(
            DatasetReference::new("employees"),
            SchemaDefinition::new(main_fields).unwrap(),
        ),
        Dataset::table(
            DatasetReference::new("staging"),
            SchemaDefinition::new(staging_fields).unwrap(),
        ),
    )
}

fn nontemporal_snapshot() -> IngestMode {
    IngestMode::NontemporalSnapshot(NontemporalSnapshot {
        auditing: Auditing::None,
        deduplication_strategy: DeduplicationStrategy::None,
        empty_dataset_handling: EmptyDatasetHandling::DeleteTargetData,
    })
}

fn with_add_column() -> IngestorOptions {
    IngestorOptions {
        enable_schema_evolution: true,
        schema_evolution_capabilities: BTreeSet::from([SchemaEvolutionCapability::AddColumn]),
        ..Default::default()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test]
fn test_generate_nontemporal_snapshot() {
    let generator = generator(nontemporal_snapshot(), IngestorOptions::default());

    let res = generator
        .generate_operations(&datasets(vec![], vec![id(), name()]))
        .unwrap();

    assert_eq!(res.data_split_range, None);
    assert!(res.schema_evolution.is_empty());
    assert!(res.deduplication_checks.is_empty());
    assert!(
        res.pre_actions
            .iter()
            .any(|sql| sql.starts_with("CREATE TABLE IF NOT EXISTS \"employees\"")),
        "{:?}",
        res.pre_actions
    );
    assert!(
        res.pre_actions
            .iter()
            .any(|sql| sql.starts_with("CREATE TABLE IF NOT EXISTS \"batch_metadata\"")),
        "{:?}",
        res.pre_actions
    );
    assert_eq!(
        res.ingest,
        [
            "DELETE FROM \"employees\" as sink",
            "INSERT INTO \"employees\" (\"id\", \"name\") SELECT stage.\"id\",stage.\"name\" \
             FROM \"staging\" as stage",
        ]
    );
    assert_eq!(
        res.metadata_ingest,
        [format!(
            "INSERT INTO \"batch_metadata\" (\"table_name\", \"table_batch_id\", \
             \"batch_start_ts_utc\", \"batch_end_ts_utc\", \"batch_status\") SELECT \
             'employees',{NEXT_BATCH_ID},'2000-01-01 00:00:00.000000',CURRENT_TIMESTAMP,'DONE'"
        )]
    );
    assert_eq!(
        res.batch_statements().count(),
        res.ingest.len() + res.metadata_ingest.len()
    );
    assert_eq!(
        res.main_dataset.schema().field_names(),
        ["id", "name"]
    );
}

#[test_log::test]
fn test_generate_one_result_per_data_split() {
    let generator = generator(
        IngestMode::UnitemporalDelta(UnitemporalDelta {
            digest_field: "digest".to_string(),
            transaction_milestoning: TransactionMilestoning::BatchId {
                batch_id_in_field: "batch_id_in".to_string(),
                batch_id_out_field: "batch_id_out".to_string(),
            },
            merge_strategy: MergeStrategy::NoDeletes,
            deduplication_strategy: DeduplicationStrategy::None,
            data_split_field: Some("data_split".to_string()),
        }),
        IngestorOptions::default(),
    );

    let staging = vec![
        id(),
        name(),
        Field::new("digest", DataType::Varchar),
        Field::new("data_split", DataType::Integer).as_not_null(),
    ];
    let results = generator
        .generate_operations_with_data_splits(
            &datasets(vec![], staging),
            &[DataSplitRange::single(1), DataSplitRange::new(2, 3)],
        )
        .unwrap();

    assert_eq!(
        results
            .iter()
            .map(|r| r.data_split_range)
            .collect::<Vec<_>>(),
        [Some(DataSplitRange::single(1)), Some(DataSplitRange::new(2, 3))]
    );
    assert_eq!(results[0].pre_actions, results[1].pre_actions);
    assert_eq!(results[0].metadata_ingest, results[1].metadata_ingest);

    let ingest = results[1].ingest.join(";\n");
    assert!(ingest.contains("stage.\"data_split\" >= 2"), "{ingest}");
    assert!(ingest.contains("stage.\"data_split\" <= 3"), "{ingest}");
    assert!(ingest.contains(NEXT_BATCH_ID), "{ingest}");
    assert!(!ingest.contains("\"data_split\" >= 1"), "{ingest}");
}

#[test_log::test]
fn test_generate_schema_evolution_for_known_main_schema() {
    let generator = generator(nontemporal_snapshot(), with_add_column());
    let income = Field::new("income", DataType::Bigint);

    let res = generator
        .generate_operations(&datasets(
            vec![id(), name()],
            vec![id(), name(), income.clone()],
        ))
        .unwrap();

    assert_eq!(
        res.schema_evolution,
        ["ALTER TABLE \"employees\" ADD COLUMN \"income\" BIGINT"]
    );
    assert_eq!(
        res.main_dataset.schema().field_names(),
        ["id", "name", "income"]
    );
    assert_eq!(res.main_dataset.reference().name, "employees");

    // Nothing to compare against without the main schema
    let res = generator
        .generate_operations(&datasets(vec![], vec![id(), name(), income]))
        .unwrap();
    assert!(res.schema_evolution.is_empty());
}

#[test_log::test]
fn test_generate_rejects_incompatible_schema() {
    let generator = generator(nontemporal_snapshot(), IngestorOptions {
        enable_schema_evolution: true,
        ..Default::default()
    });

    let res = generator.generate_operations(&datasets(
        vec![id(), name()],
        vec![id(), name(), Field::new("income", DataType::Bigint)],
    ));
    assert_matches!(res, Err(GenerateError::IncompatibleSchemaChange(_)));
}

#[test_log::test]
fn test_generate_bulk_load_requires_staged_files() {
    let generator = generator(
        IngestMode::BulkLoad(BulkLoad {
            batch_id_field: "batch_id".to_string(),
            digest_gen_strategy: DigestGenStrategy::NoDigest,
            auditing: Auditing::None,
        }),
        IngestorOptions::default(),
    );

    let res = generator.generate_operations(&datasets(vec![], vec![id(), name()]));
    assert_matches!(
        res,
        Err(GenerateError::Configuration(e))
            if e.to_string().contains("BulkLoad requires a staged files dataset")
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
