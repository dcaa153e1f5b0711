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

use super::ModePlan;
use crate::milestoning::TransactionMilestones;
use crate::planning_context::*;
use crate::statistics::temporal_statistics;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Makes the open versions of main match the staging snapshot
pub(super) fn plan(ctx: &PlanningContext<'_>, mode: &UnitemporalSnapshot) -> ModePlan {
    let milestones = TransactionMilestones::new(&mode.transaction_milestoning, &ctx.batch);
    let data_fields = ctx.data_fields();

    let mut fields = data_fields.clone();
    let mut values: Vec<Value> = data_fields.iter().map(|f| Value::field(STAGE, f)).collect();
    for (field, value) in milestones.open_assignments() {
        fields.push(field);
        values.push(value);
    }

    snapshot_plan(ctx, &milestones, &mode.partitioning, fields, values, &ctx.primary_keys)
}

/// Closes open rows (within the partition scope) whose version is absent from
/// staging, then opens staging rows without an open version
pub(super) fn snapshot_plan(
    ctx: &PlanningContext<'_>,
    milestones: &TransactionMilestones<'_>,
    partitioning: &Partitioning,
    insert_fields: Vec<String>,
    insert_values: Vec<Value>,
    version_key: &[String],
) -> ModePlan {
    let main = ctx.main_reference();
    let same_version: Vec<Condition> = ctx
        .key_match(SINK, STAGE)
        .into_iter()
        .chain(ctx.digest_match(SINK, STAGE))
        .collect();

    let mut close_conditions = vec![
        milestones.is_open(SINK),
        Condition::not_exists(ctx.select_stage(same_version)),
    ];
    close_conditions.extend(partition_scope(ctx, partitioning));

    let close = Operation::Update {
        target: main.clone(),
        assignments: milestones.close_assignments(),
        condition: Condition::all(close_conditions),
    };

    let mut open_conditions = Vec::new();
    if let Some(digest) = ctx.digest() {
        open_conditions.push(Condition::not_in_selection(
            Value::field(STAGE, digest),
            Selection::from(main)
                .fields(vec![Value::field(SINK, digest)])
                .filter(Some(milestones.is_open(SINK))),
        ));
    }
    let open = Operation::Insert {
        target: main.without_alias(),
        fields: insert_fields,
        source: ctx.select_stage(open_conditions).fields(insert_values),
    };

    let mut pre_statistics = BTreeMap::new();
    let mut post_statistics = BTreeMap::new();
    if ctx.options.collect_statistics {
        pre_statistics.insert(
            StatisticName::IncomingRecordCount,
            ctx.incoming_record_count(),
        );
        post_statistics = temporal_statistics(ctx, milestones, version_key);
    }

    ModePlan {
        ingest: LogicalPlan::new(vec![close, open]),
        pre_statistics,
        post_statistics,
        ..Default::default()
    }
}

/// Restricts closing to the partitions the batch covers: explicit partition
/// values, or the partitions present in staging
fn partition_scope(ctx: &PlanningContext<'_>, partitioning: &Partitioning) -> Vec<Condition> {
    let mut conditions = Vec::new();
    let mut derived = Vec::new();

    for field in &partitioning.partition_fields {
        match partitioning.partition_values_by_field.get(field) {
            Some(values) => conditions.push(Condition::In {
                value: Value::field(SINK, field),
                list: values.iter().map(Value::string).collect(),
            }),
            None => derived.push(field.clone()),
        }
    }

    if !derived.is_empty() {
        conditions.push(Condition::exists(
            ctx.select_stage(fields_match(&derived, SINK, STAGE)),
        ));
    }
    conditions
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
