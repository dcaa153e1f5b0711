// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tidemark_planner::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Sink with a small, predictable type lattice
struct TestSink {
    capabilities: BTreeSet<Capability>,
}

impl TestSink {
    fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            capabilities: capabilities.into_iter().collect(),
        }
    }

    fn full() -> Self {
        Self::new([
            Capability::AddColumn,
            Capability::ExplicitDataTypeConversion,
            Capability::DataTypeLengthChange,
            Capability::DataTypeScaleChange,
            Capability::ColumnNullabilityChange,
        ])
    }
}

impl RelationalSink for TestSink {
    fn name(&self) -> &'static str {
        "test"
    }

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    fn supports_implicit_mapping(&self, main_type: DataType, staging_type: DataType) -> bool {
        match main_type {
            DataType::Bigint => staging_type.is_integral(),
            DataType::Varchar => staging_type.is_string(),
            _ => false,
        }
    }

    fn supports_explicit_mapping(&self, main_type: DataType, staging_type: DataType) -> bool {
        main_type.is_integral() && staging_type == DataType::Bigint
    }

    fn transform(
        &self,
        _plan: &LogicalPlan,
        _context: &TransformContext,
    ) -> Result<Vec<String>, TransformError> {
        Ok(Vec::new())
    }

    fn transform_query(
        &self,
        _selection: &Selection,
        _context: &TransformContext,
    ) -> Result<String, TransformError> {
        Ok(String::new())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn append_only() -> IngestMode {
    IngestMode::AppendOnly(AppendOnly {
        digest_gen_strategy: DigestGenStrategy::NoDigest,
        auditing: Auditing::None,
        deduplication_strategy: DeduplicationStrategy::None,
        filter_existing_records: false,
        data_split_field: None,
    })
}

fn main_dataset(fields: Vec<Field>) -> Dataset {
    Dataset::table(
        DatasetReference::new("main"),
        SchemaDefinition::new(fields).unwrap(),
    )
}

fn schema(fields: Vec<Field>) -> SchemaDefinition {
    SchemaDefinition::new(fields).unwrap()
}

fn id() -> Field {
    Field::new("id", DataType::Integer).as_primary_key()
}

fn name(length: u32) -> Field {
    Field::new("name", DataType::Varchar).with_length(length)
}

fn evolve(
    sink: &TestSink,
    capabilities: impl IntoIterator<Item = SchemaEvolutionCapability>,
    main: &Dataset,
    staging: &SchemaDefinition,
) -> Result<SchemaEvolutionResult, IncompatibleSchemaChangeError> {
    let capabilities: BTreeSet<_> = capabilities.into_iter().collect();
    SchemaEvolution::new(sink, &append_only(), &capabilities)
        .unwrap()
        .build_logical_plan(main, staging)
}

fn alters(result: &SchemaEvolutionResult) -> Vec<(AlterChange, Field)> {
    result
        .logical_plan
        .operations
        .iter()
        .map(|op| match op {
            Operation::Alter {
                dataset,
                change,
                field,
            } => {
                assert_eq!(dataset.name, "main");
                (*change, field.clone())
            }
            other => panic!("Unexpected operation {other:?}"),
        })
        .collect()
}

fn assert_incompatible(
    result: Result<SchemaEvolutionResult, IncompatibleSchemaChangeError>,
    expected_message: &str,
) {
    assert_matches!(
        result,
        Err(IncompatibleSchemaChangeError { message, .. }) if message == expected_message
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test]
fn test_conflicting_capabilities_are_rejected() {
    let sink = TestSink::full();
    let capabilities = BTreeSet::from([
        SchemaEvolutionCapability::DataTypeLengthChange,
        SchemaEvolutionCapability::DataTypeLengthChangeAllowIncrementOnly,
    ]);

    assert_matches!(
        SchemaEvolution::new(&sink, &append_only(), &capabilities).map(|_| ()),
        Err(ConfigurationError { message }) if message ==
            "Invalid schema evolution capabilities. Select either DATA_TYPE_LENGTH_CHANGE or \
             DATA_TYPE_LENGTH_CHANGE_ALLOW_INCREMENT_ONLY."
    );
}

#[test_log::test]
fn test_identical_schemas_need_no_change() {
    let main = main_dataset(vec![id(), name(64)]);

    let result = evolve(&TestSink::full(), [], &main, main.schema()).unwrap();

    assert!(result.logical_plan.is_empty());
    assert_eq!(result.evolved_dataset, main);
}

#[test_log::test]
fn test_add_column() {
    let main = main_dataset(vec![id(), name(64)]);
    let staging = schema(vec![
        id(),
        name(64),
        Field::new("income", DataType::Bigint).as_not_null(),
    ]);

    let result = evolve(
        &TestSink::full(),
        [SchemaEvolutionCapability::AddColumn],
        &main,
        &staging,
    )
    .unwrap();

    let income = Field::new("income", DataType::Bigint);
    assert_eq!(alters(&result), [(AlterChange::AddColumn, income.clone())]);
    assert_eq!(
        result.evolved_dataset.schema(),
        &schema(vec![id(), name(64), income])
    );
}

#[test_log::test]
fn test_add_column_requires_user_and_sink_capability() {
    let main = main_dataset(vec![id(), name(64)]);
    let staging = schema(vec![id(), name(64), Field::new("income", DataType::Bigint)]);
    let expected = "Field \"income\" in staging dataset does not exist in main dataset. Couldn't \
                    add column since sink/user capabilities do not permit operation.";

    assert_incompatible(evolve(&TestSink::full(), [], &main, &staging), expected);
    assert_incompatible(
        evolve(
            &TestSink::new([]),
            [SchemaEvolutionCapability::AddColumn],
            &main,
            &staging,
        ),
        expected,
    );
}

#[test_log::test]
fn test_primary_key_change_is_never_allowed() {
    let main = main_dataset(vec![id(), name(64)]);
    let staging = schema(vec![id(), name(64).as_primary_key()]);
    let sink = TestSink::full();
    let capabilities = BTreeSet::from([
        SchemaEvolutionCapability::AddColumn,
        SchemaEvolutionCapability::ColumnNullabilityChange,
    ]);
    let evolution = SchemaEvolution::new(&sink, &append_only(), &capabilities).unwrap();

    assert!(!evolution.is_schema_evolvable(&main, &staging));
    assert!(evolution.is_schema_evolvable(&main, main.schema()));
    assert_incompatible(
        evolution.build_logical_plan(&main, &staging),
        "Primary keys for main table has changed which is not allowed",
    );
}

#[test_log::test]
fn test_breaking_type_change() {
    let main = main_dataset(vec![id(), Field::new("score", DataType::Int64)]);
    let staging = schema(vec![id(), Field::new("score", DataType::String)]);

    let result = evolve(
        &TestSink::full(),
        [SchemaEvolutionCapability::DataTypeConversion],
        &main,
        &staging,
    );

    assert_matches!(
        result,
        Err(IncompatibleSchemaChangeError {
            message,
            main_type: Some(DataType::Int64),
            staging_type: Some(DataType::String),
        }) if message == "Breaking schema change from datatype \"INT64\" to \"STRING\""
    );
}

#[test_log::test]
fn test_implicit_mapping_keeps_main_type() {
    let main = main_dataset(vec![id(), Field::new("amount", DataType::Bigint)]);
    let staging = schema(vec![id(), Field::new("amount", DataType::Integer)]);

    let result = evolve(&TestSink::full(), [], &main, &staging).unwrap();

    assert!(result.logical_plan.is_empty());
    assert_eq!(result.evolved_dataset, main);
}

#[test_log::test]
fn test_implicit_mapping_widens_length() {
    let main = main_dataset(vec![id(), name(64)]);
    let staging = schema(vec![
        id(),
        Field::new("name", DataType::String).with_length(128),
    ]);

    assert_incompatible(
        evolve(&TestSink::full(), [], &main, &staging),
        "Data type length changes couldn't be performed on column \"name\" since user \
         capability does not allow it",
    );

    let result = evolve(
        &TestSink::full(),
        [SchemaEvolutionCapability::DataTypeLengthChangeAllowIncrementOnly],
        &main,
        &staging,
    )
    .unwrap();
    assert_eq!(alters(&result), [(AlterChange::ChangeDataType, name(128))]);
}

#[test_log::test]
fn test_explicit_conversion() {
    let main = main_dataset(vec![id(), Field::new("amount", DataType::Integer)]);
    let staging = schema(vec![id(), Field::new("amount", DataType::Bigint)]);

    assert_matches!(
        evolve(&TestSink::full(), [], &main, &staging),
        Err(IncompatibleSchemaChangeError { message, .. }) if message ==
            "Explicit data type conversion from \"INTEGER\" to \"BIGINT\" couldn't be performed \
             since user capability does not allow it"
    );

    let result = evolve(
        &TestSink::full(),
        [SchemaEvolutionCapability::DataTypeConversion],
        &main,
        &staging,
    )
    .unwrap();

    let amount = Field::new("amount", DataType::Bigint);
    assert_eq!(alters(&result), [(AlterChange::ChangeDataType, amount.clone())]);
    assert_eq!(result.evolved_dataset.schema(), &schema(vec![id(), amount]));
}

#[test_log::test]
fn test_length_increase() {
    let main = main_dataset(vec![id(), name(64)]);
    let staging = schema(vec![id(), name(128)]);

    let result = evolve(
        &TestSink::full(),
        [SchemaEvolutionCapability::DataTypeLengthChange],
        &main,
        &staging,
    )
    .unwrap();
    assert_eq!(alters(&result), [(AlterChange::ChangeDataType, name(128))]);

    // Sink without length changes
    assert_incompatible(
        evolve(
            &TestSink::new([]),
            [SchemaEvolutionCapability::DataTypeLengthChange],
            &main,
            &staging,
        ),
        "Data type length changes couldn't be performed on column \"name\" since user \
         capability does not allow it",
    );
}

#[test_log::test]
fn test_length_decrease() {
    let main = main_dataset(vec![id(), name(128)]);
    let staging = schema(vec![id(), name(64)]);

    let result = evolve(
        &TestSink::full(),
        [SchemaEvolutionCapability::DataTypeLengthChange],
        &main,
        &staging,
    )
    .unwrap();
    assert!(result.logical_plan.is_empty());
    assert_eq!(result.evolved_dataset, main);

    let result = evolve(&TestSink::full(), [], &main, &staging).unwrap();
    assert!(result.logical_plan.is_empty());

    assert_incompatible(
        evolve(
            &TestSink::full(),
            [SchemaEvolutionCapability::DataTypeLengthChangeAllowIncrementOnly],
            &main,
            &staging,
        ),
        "Data type length is decremented for column \"name\", but user capability does not \
         allow it",
    );
}

#[test_log::test]
fn test_scale_increase() {
    let price = |scale| {
        Field::new("price", DataType::Decimal)
            .with_length(10)
            .with_scale(scale)
    };
    let main = main_dataset(vec![id(), price(2)]);
    let staging = schema(vec![id(), price(4)]);

    assert_incompatible(
        evolve(&TestSink::full(), [], &main, &staging),
        "Data type scale changes couldn't be performed on column \"price\" since user \
         capability does not allow it",
    );

    let result = evolve(
        &TestSink::full(),
        [SchemaEvolutionCapability::DataTypeScaleChangeAllowIncrementOnly],
        &main,
        &staging,
    )
    .unwrap();
    assert_eq!(alters(&result), [(AlterChange::ChangeDataType, price(4))]);
}

#[test_log::test]
fn test_nullability_change() {
    let main = main_dataset(vec![id(), name(64).as_not_null()]);
    let staging = schema(vec![id(), name(64)]);

    assert_incompatible(
        evolve(&TestSink::full(), [], &main, &staging),
        "Column \"name\" couldn't be made nullable since user capability does not allow it",
    );

    let result = evolve(
        &TestSink::full(),
        [SchemaEvolutionCapability::ColumnNullabilityChange],
        &main,
        &staging,
    )
    .unwrap();
    assert_eq!(alters(&result), [(AlterChange::MakeNullable, name(64))]);
}

#[test_log::test]
fn test_nullability_is_never_tightened() {
    let main = main_dataset(vec![id(), name(64)]);
    let staging = schema(vec![id(), name(64).as_not_null()]);

    let result = evolve(&TestSink::full(), [], &main, &staging).unwrap();

    assert!(result.logical_plan.is_empty());
}

#[test_log::test]
fn test_column_missing_from_staging_is_made_nullable() {
    let main = main_dataset(vec![
        id(),
        name(64),
        Field::new("rank", DataType::Integer).as_not_null(),
    ]);
    let staging = schema(vec![id(), name(64)]);

    let result = evolve(
        &TestSink::full(),
        [SchemaEvolutionCapability::ColumnNullabilityChange],
        &main,
        &staging,
    )
    .unwrap();

    let rank = Field::new("rank", DataType::Integer);
    assert_eq!(alters(&result), [(AlterChange::MakeNullable, rank.clone())]);
    assert_eq!(
        result.evolved_dataset.schema(),
        &schema(vec![id(), name(64), rank])
    );
}

#[test_log::test]
fn test_additions_come_first() {
    let main = main_dataset(vec![id(), name(64)]);
    let staging = schema(vec![
        id(),
        Field::new("income", DataType::Bigint),
        name(128),
    ]);

    let result = evolve(
        &TestSink::full(),
        [
            SchemaEvolutionCapability::AddColumn,
            SchemaEvolutionCapability::DataTypeLengthChange,
        ],
        &main,
        &staging,
    )
    .unwrap();

    let income = Field::new("income", DataType::Bigint);
    assert_eq!(
        alters(&result),
        [
            (AlterChange::AddColumn, income.clone()),
            (AlterChange::ChangeDataType, name(128)),
        ]
    );
    assert_eq!(
        result.evolved_dataset.schema(),
        &schema(vec![id(), name(128), income])
    );
}

#[test_log::test]
fn test_engine_managed_fields_are_ignored() {
    let mode = IngestMode::UnitemporalDelta(UnitemporalDelta {
        digest_field: "digest".to_string(),
        transaction_milestoning: TransactionMilestoning::BatchId {
            batch_id_in_field: "batch_id_in".to_string(),
            batch_id_out_field: "batch_id_out".to_string(),
        },
        merge_strategy: MergeStrategy::DeleteIndicator {
            delete_field: "delete_flag".to_string(),
            delete_values: vec!["Y".to_string()],
        },
        deduplication_strategy: DeduplicationStrategy::None,
        data_split_field: None,
    });
    let main = main_dataset(vec![
        id(),
        name(64),
        Field::new("digest", DataType::Varchar),
        Field::new("batch_id_in", DataType::Integer).as_primary_key(),
        Field::new("batch_id_out", DataType::Integer).as_not_null(),
    ]);
    let staging = schema(vec![
        id(),
        name(64),
        Field::new("digest", DataType::Varchar),
        Field::new("delete_flag", DataType::Varchar),
    ]);
    let sink = TestSink::full();
    let capabilities = BTreeSet::new();

    let result = SchemaEvolution::new(&sink, &mode, &capabilities)
        .unwrap()
        .build_logical_plan(&main, &staging)
        .unwrap();

    assert!(result.logical_plan.is_empty());
    assert_eq!(result.evolved_dataset, main);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
