// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use tidemark_ingestion::*;

use crate::DeduplicationCheck;
use crate::planning_context::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) struct DeduplicationPlan {
    pub operations: LogicalPlan,
    pub checks: BTreeMap<DeduplicationCheck, Selection>,
    pub data_split_values: Option<Selection>,
}

/// Populates the deduplicated staging table the ingest stage reads from
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(strategy = ?ctx.mode.deduplication_strategy())
)]
pub(crate) fn plan_deduplication(ctx: &PlanningContext<'_>) -> Option<DeduplicationPlan> {
    let target = &ctx.deduplicated_staging;
    let staging = ctx.staging.reference();
    let staging_fields = ctx.staging.schema().field_names();
    let staging_scope = Condition::all(filter_conditions(ctx.staging.filters(), STAGE));
    let stage_values =
        |fields: &[String]| -> Vec<Value> {
            fields.iter().map(|f| Value::field(STAGE, f)).collect()
        };

    let mut checks = BTreeMap::new();
    let mut data_split_values = None;

    let insert = match ctx.mode.deduplication_strategy() {
        DeduplicationStrategy::None => return None,
        DeduplicationStrategy::FilterDuplicates => Operation::Insert {
            target: target.without_alias(),
            fields: staging_fields.clone(),
            source: Selection::from(staging)
                .fields(stage_values(&staging_fields))
                .filter(staging_scope)
                .distinct(),
        },
        DeduplicationStrategy::FailOnDuplicates => {
            checks.insert(
                DeduplicationCheck::MaxDuplicates,
                Selection::from(target).fields(vec![
                    Value::max(Value::field(STAGE, DUPLICATE_COUNT_COLUMN))
                        .alias(DeduplicationCheck::MaxDuplicates.column_alias()),
                ]),
            );
            grouped_with_count(
                target,
                staging,
                &staging_fields,
                DUPLICATE_COUNT_COLUMN,
                staging_scope,
            )
        }
        DeduplicationStrategy::DuplicateCount { count_field } => {
            let fields: Vec<String> = staging_fields
                .iter()
                .filter(|f| !f.eq_ignore_ascii_case(count_field))
                .cloned()
                .collect();
            grouped_with_count(target, staging, &fields, count_field, staging_scope)
        }
        DeduplicationStrategy::MaxVersion { version_field } => {
            let mut partition_by = version_partition(ctx);
            let ranked = Selection::from(staging)
                .fields(vec![
                    Value::All,
                    Value::Window {
                        name: FunctionName::DenseRank,
                        partition_by: partition_by.clone(),
                        order_by: vec![OrderedValue::desc(Value::field(STAGE, version_field))],
                    }
                    .alias(VERSION_RANK_COLUMN),
                ])
                .filter(staging_scope.clone())
                .alias(STAGE);

            if let Some(digest) = ctx.digest() {
                partition_by.push(Value::field(STAGE, version_field));
                let digests_per_version = Selection::from(staging)
                    .fields(vec![
                        Value::function(
                            FunctionName::CountDistinct,
                            vec![Value::field(STAGE, digest)],
                        )
                        .alias("digest_count"),
                    ])
                    .filter(staging_scope)
                    .group_by(partition_by)
                    .alias(STAGE);
                checks.insert(
                    DeduplicationCheck::MaxDataErrors,
                    Selection::from(digests_per_version).fields(vec![
                        Value::max(Value::field(STAGE, "digest_count"))
                            .alias(DeduplicationCheck::MaxDataErrors.column_alias()),
                    ]),
                );
            }

            Operation::Insert {
                target: target.without_alias(),
                fields: staging_fields.clone(),
                source: Selection::from(ranked)
                    .fields(stage_values(&staging_fields))
                    .filter(Some(Condition::equals(
                        Value::field(STAGE, VERSION_RANK_COLUMN),
                        Value::Integer(1),
                    )))
                    .distinct(),
            }
        }
        DeduplicationStrategy::AnyVersion { version_field } => {
            // AnyVersion always has a data split field, checked by the mode validation
            let split = ctx.mode.data_split_field().unwrap_or_default();
            let fields: Vec<String> = staging_fields
                .iter()
                .filter(|f| !f.eq_ignore_ascii_case(split))
                .cloned()
                .collect();

            let mut values = stage_values(&fields);
            values.push(Value::Window {
                name: FunctionName::DenseRank,
                partition_by: version_partition(ctx),
                order_by: vec![OrderedValue::asc(Value::field(STAGE, version_field))],
            });
            let mut insert_fields = fields;
            insert_fields.push(split.to_string());

            data_split_values = Some(
                Selection::from(target)
                    .fields(vec![Value::field(STAGE, split)])
                    .distinct(),
            );

            Operation::Insert {
                target: target.without_alias(),
                fields: insert_fields,
                source: Selection::from(staging)
                    .fields(values)
                    .filter(staging_scope)
                    .distinct(),
            }
        }
    };

    Some(DeduplicationPlan {
        operations: LogicalPlan::new(vec![
            Operation::Delete {
                dataset: target.without_alias(),
                condition: None,
            },
            insert,
        ]),
        checks,
        data_split_values,
    })
}

fn grouped_with_count(
    target: &DatasetReference,
    staging: &DatasetReference,
    fields: &[String],
    count_field: &str,
    condition: Option<Condition>,
) -> Operation {
    let group_by: Vec<Value> = fields.iter().map(|f| Value::field(STAGE, f)).collect();
    let mut values = group_by.clone();
    values.push(Value::count_all().alias(count_field));
    let mut insert_fields = fields.to_vec();
    insert_fields.push(count_field.to_string());

    Operation::Insert {
        target: target.without_alias(),
        fields: insert_fields,
        source: Selection::from(staging)
            .fields(values)
            .filter(condition)
            .group_by(group_by),
    }
}

/// Versions are ranked per record, and per data split when splits are given
fn version_partition(ctx: &PlanningContext<'_>) -> Vec<Value> {
    let mut partition: Vec<Value> = ctx
        .primary_keys
        .iter()
        .map(|k| Value::field(STAGE, k))
        .collect();
    let numbers_splits = matches!(
        ctx.mode.deduplication_strategy(),
        DeduplicationStrategy::AnyVersion { .. }
    );
    if let Some(split) = ctx.mode.data_split_field().filter(|_| !numbers_splits) {
        partition.push(Value::field(STAGE, split));
    }
    partition
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
