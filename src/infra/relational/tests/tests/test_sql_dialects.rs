// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tidemark_relational::*;

use super::harness::batch_start;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn employees() -> DatasetReference {
    DatasetReference::new("employees").with_group("hr")
}

fn create_employees() -> LogicalPlan {
    LogicalPlan::new(vec![Operation::Create {
        dataset: employees(),
        schema: SchemaDefinition::new(vec![
            Field::new("id", DataType::Int).as_primary_key(),
            Field::new("name", DataType::Varchar).with_length(64),
        ])
        .unwrap(),
        if_not_exists: true,
    }])
}

fn alter_rank(change: AlterChange) -> LogicalPlan {
    LogicalPlan::new(vec![Operation::Alter {
        dataset: employees(),
        change,
        field: Field::new("rank", DataType::Bigint),
    }])
}

fn render(sink: &dyn RelationalSink, plan: &LogicalPlan) -> Vec<String> {
    sink.transform(plan, &TransformContext::new(batch_start()))
        .unwrap()
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_create_table() {
    let expected = "CREATE TABLE IF NOT EXISTS \"hr\".\"employees\"(\"id\" INTEGER NOT NULL,\
                    \"name\" VARCHAR(64),PRIMARY KEY (\"id\"))";

    for sink in [
        &AnsiSink::new() as &dyn RelationalSink,
        &H2Sink::new(),
        &SnowflakeSink::new(),
        &SqliteSink::new(),
    ] {
        assert_eq!(render(sink, &create_employees()), [expected], "{}", sink.name());
    }

    assert_eq!(
        render(&BigQuerySink::new(), &create_employees()),
        ["CREATE TABLE IF NOT EXISTS `hr`.`employees`(`id` INT64 NOT NULL,`name` STRING(64),\
          PRIMARY KEY (`id`))"]
    );
}

#[test]
fn test_alter_column_per_dialect() {
    assert_eq!(
        render(&AnsiSink::new(), &alter_rank(AlterChange::ChangeDataType)),
        [r#"ALTER TABLE "hr"."employees" ALTER COLUMN "rank" BIGINT"#]
    );
    assert_eq!(
        render(&BigQuerySink::new(), &alter_rank(AlterChange::ChangeDataType)),
        ["ALTER TABLE `hr`.`employees` ALTER COLUMN `rank` SET DATA TYPE INT64"]
    );
    assert_eq!(
        render(&SqliteSink::new(), &alter_rank(AlterChange::AddColumn)),
        [r#"ALTER TABLE "hr"."employees" ADD COLUMN "rank" BIGINT"#]
    );

    let res = SqliteSink::new().transform(
        &alter_rank(AlterChange::MakeNullable),
        &TransformContext::new(batch_start()),
    );
    assert_matches!(res, Err(TransformError::Unsupported { sink: "SQLite", .. }));
}

#[test]
fn test_batch_placeholders() {
    let metadata = MetadataDataset::default();
    let plan = LogicalPlan::new(vec![Operation::Update {
        target: employees().with_alias("sink"),
        assignments: vec![
            (
                "batch_id_out".to_string(),
                Value::batch_id(&metadata, "employees").minus(Value::Integer(1)),
            ),
            ("updated_at".to_string(), Value::BatchStartTimestamp),
        ],
        condition: Some(Condition::equals(
            Value::field("sink", "batch_id_out"),
            Value::Integer(INFINITE_BATCH_ID),
        )),
    }]);

    let context = TransformContext::new(batch_start());
    assert_eq!(
        AnsiSink::new().transform(&plan, &context).unwrap(),
        [
            "UPDATE \"hr\".\"employees\" as sink SET sink.\"batch_id_out\" = (SELECT \
             COALESCE(MAX(batch_metadata.\"table_batch_id\"),0)+1 FROM \"batch_metadata\" as \
             batch_metadata WHERE batch_metadata.\"table_name\" = 'employees')-1,\
             sink.\"updated_at\" = '2000-01-01 00:00:00.000000' WHERE sink.\"batch_id_out\" = \
             999999999"
        ]
    );

    // A resolved batch id is inlined, SQLite also leaves columns unqualified
    let context = context.with_batch_id(7);
    assert_eq!(
        SqliteSink::new().transform(&plan, &context).unwrap(),
        [
            "UPDATE \"hr\".\"employees\" as sink SET \"batch_id_out\" = 7-1,\"updated_at\" = \
             '2000-01-01 00:00:00.000000' WHERE sink.\"batch_id_out\" = 999999999"
        ]
    );
    assert_eq!(
        BigQuerySink::new().transform(&plan, &context).unwrap(),
        [
            "UPDATE `hr`.`employees` as sink SET sink.`batch_id_out` = 7-1,sink.`updated_at` = \
             PARSE_DATETIME('%Y-%m-%d %H:%M:%E*S','2000-01-01 00:00:00.000000') WHERE \
             sink.`batch_id_out` = 999999999"
        ]
    );
}

#[test]
fn test_data_split_bounds_require_a_range() {
    let in_range = Condition::all([
        Condition::gte(Value::unqualified_field("data_split"), Value::DataSplitLowerBound),
        Condition::lte(Value::unqualified_field("data_split"), Value::DataSplitUpperBound),
    ]);
    let selection = Selection::from(employees()).filter(in_range);

    let context = TransformContext::new(batch_start());
    assert_matches!(
        AnsiSink::new().transform_query(&selection, &context),
        Err(TransformError::MissingDataSplit)
    );

    let context = context.with_data_split(Some(DataSplitRange::new(2, 5)));
    assert_eq!(
        AnsiSink::new().transform_query(&selection, &context).unwrap(),
        r#"SELECT * FROM "hr"."employees" WHERE ("data_split" >= 2) AND ("data_split" <= 5)"#
    );
}

#[test]
fn test_merge_only_where_supported() {
    let plan = LogicalPlan::new(vec![Operation::Merge(Box::new(MergeOperation {
        target: employees().with_alias("sink"),
        source: Source::Dataset(DatasetReference::new("staging").with_alias("stage")),
        source_alias: "stage".to_string(),
        on: Condition::equals(Value::field("sink", "id"), Value::field("stage", "id")),
        matched_condition: None,
        update_assignments: vec![("name".to_string(), Value::field("stage", "name"))],
        insert_fields: vec!["id".to_string(), "name".to_string()],
        insert_values: vec![Value::field("stage", "id"), Value::field("stage", "name")],
    }))]);

    assert_eq!(
        render(&SnowflakeSink::new(), &plan),
        [
            "MERGE INTO \"hr\".\"employees\" as sink USING \"staging\" as stage ON sink.\"id\" = \
             stage.\"id\" WHEN MATCHED THEN UPDATE SET sink.\"name\" = stage.\"name\" WHEN NOT \
             MATCHED THEN INSERT (\"id\", \"name\") VALUES (stage.\"id\",stage.\"name\")"
        ]
    );

    let res = SqliteSink::new().transform(&plan, &TransformContext::new(batch_start()));
    assert_matches!(
        res,
        Err(TransformError::Unsupported { sink: "SQLite", operation }) if operation == "MERGE"
    );
}

#[test]
fn test_copy_staged_files() {
    let staged = StagedFilesDataset {
        reference: DatasetReference::new("staged"),
        schema: SchemaDefinition::new(vec![
            Field::new("id", DataType::Int),
            Field::new("name", DataType::Varchar),
        ])
        .unwrap(),
        files: vec!["/data/a.csv".to_string(), "/data/b.csv".to_string()],
        format: FileFormat::Csv,
        options: LoadOptions::default(),
    };
    let plan = LogicalPlan::new(vec![Operation::Copy(Box::new(CopyOperation {
        target: employees(),
        file_fields: staged.schema.fields().to_vec(),
        source: staged,
        digest: None,
        batch_id_field: "batch_id".to_string(),
        batch_id: Value::Integer(3),
        audit_field: None,
    }))]);

    let context = TransformContext::new(batch_start());

    let h2 = H2Sink::new().transform(&plan, &context).unwrap();
    assert_eq!(h2.len(), 2);
    assert_eq!(
        h2[0],
        "INSERT INTO \"hr\".\"employees\" (\"id\", \"name\", \"batch_id\") SELECT \
         CONVERT(\"id\",INTEGER),CONVERT(\"name\",VARCHAR),3 FROM \
         CSVREAD('/data/a.csv',NULL,'fieldSeparator=,')"
    );

    let snowflake = SnowflakeSink::new().transform(&plan, &context).unwrap();
    assert_matches!(snowflake.as_slice(), [sql] if sql.starts_with(
        "COPY INTO \"hr\".\"employees\" (\"id\", \"name\", \"batch_id\") FROM (SELECT \
         staged_files.$1 as \"id\",staged_files.$2 as \"name\",3 FROM "
    ) && sql.contains("FILES = ('/data/a.csv', '/data/b.csv')"));

    assert_matches!(
        AnsiSink::new().transform(&plan, &context),
        Err(TransformError::Unsupported { sink: "ANSI", .. })
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
