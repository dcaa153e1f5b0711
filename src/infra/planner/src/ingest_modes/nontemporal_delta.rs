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
use crate::planning_context::*;
use crate::statistics::count_statistic;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Upserts staging rows into main by primary key, deleting flagged rows.
///
/// Sinks with `MERGE` get a single merge statement, others an `UPDATE` with
/// correlated sub-queries followed by an `INSERT` of the unmatched rows.
pub(super) fn plan(ctx: &PlanningContext<'_>) -> ModePlan {
    let main = ctx.main_reference();
    let data_fields = ctx.data_fields();
    let key_match = ctx.key_match(SINK, STAGE);
    let not_deleted = ctx.not_delete_flagged(STAGE);

    let mut operations = Vec::new();

    if let Some(flagged) = ctx.delete_flagged(STAGE) {
        operations.push(Operation::Delete {
            dataset: main.clone(),
            condition: Some(Condition::exists(
                ctx.select_stage(key_match.clone().into_iter().chain([flagged])),
            )),
        });
    }

    let audit = ctx.audit_assignment();

    if ctx.capabilities.contains(&Capability::Merge) {
        let scope: Vec<Condition> = ctx
            .stage_scope()
            .into_iter()
            .chain(not_deleted.clone())
            .collect();
        let source: Source = if scope.is_empty() {
            ctx.stage.clone().into()
        } else {
            Selection::from(&ctx.stage)
                .filter(Condition::all(scope))
                .alias(STAGE)
                .into()
        };

        let mut update_assignments: Vec<(String, Value)> = data_fields
            .iter()
            .map(|f| (f.clone(), Value::field(STAGE, f)))
            .collect();
        update_assignments.extend(audit.clone());

        let mut insert_fields = data_fields.clone();
        let mut insert_values: Vec<Value> =
            data_fields.iter().map(|f| Value::field(STAGE, f)).collect();
        if let Some((field, value)) = audit {
            insert_fields.push(field);
            insert_values.push(value);
        }

        operations.push(Operation::Merge(Box::new(MergeOperation {
            target: main.clone(),
            source,
            source_alias: STAGE.to_string(),
            on: key_match.clone().unwrap_or(Condition::And(Vec::new())),
            matched_condition: ctx.digest_differs(SINK, STAGE),
            update_assignments,
            insert_fields,
            insert_values,
        })));
    } else {
        let changed: Vec<Condition> = key_match
            .clone()
            .into_iter()
            .chain(ctx.digest_differs(SINK, STAGE))
            .chain(not_deleted.clone())
            .collect();

        let mut assignments: Vec<(String, Value)> = data_fields
            .iter()
            .map(|f| {
                (
                    f.clone(),
                    Value::subquery(
                        ctx.select_stage(changed.clone())
                            .fields(vec![Value::field(STAGE, f)]),
                    ),
                )
            })
            .collect();
        assignments.extend(audit.clone());

        operations.push(Operation::Update {
            target: main.clone(),
            assignments,
            condition: Some(Condition::exists(ctx.select_stage(changed))),
        });

        let existing: Vec<Condition> = key_match
            .clone()
            .into_iter()
            .chain(ctx.digest_match(SINK, STAGE))
            .collect();

        let mut fields = data_fields.clone();
        let mut values: Vec<Value> = data_fields.iter().map(|f| Value::field(STAGE, f)).collect();
        if let Some((field, value)) = audit {
            fields.push(field);
            values.push(value);
        }

        operations.push(Operation::Insert {
            target: main.without_alias(),
            fields,
            source: ctx
                .select_stage(not_deleted.clone().into_iter().chain([Condition::not_exists(
                    Selection::from(main).filter(Condition::all(existing)),
                )]))
                .fields(values),
        });
    }

    let mut pre_statistics = BTreeMap::new();
    if ctx.options.collect_statistics {
        let in_stage = |extra: Vec<Condition>| {
            Condition::exists(ctx.select_stage(key_match.clone().into_iter().chain(extra)))
        };

        pre_statistics.extend([
            (
                StatisticName::IncomingRecordCount,
                ctx.incoming_record_count(),
            ),
            count_statistic(
                StatisticName::RowsUpdated,
                main,
                Some(in_stage(
                    ctx.digest_differs(SINK, STAGE)
                        .into_iter()
                        .chain(not_deleted.clone())
                        .collect(),
                )),
            ),
            count_statistic(
                StatisticName::RowsInserted,
                &ctx.stage,
                Condition::all(ctx.stage_scope().into_iter().chain(not_deleted).chain([
                    Condition::not_exists(Selection::from(main).filter(key_match.clone())),
                ])),
            ),
        ]);
        if let Some(flagged) = ctx.delete_flagged(STAGE) {
            pre_statistics.extend([count_statistic(
                StatisticName::RowsDeleted,
                main,
                Some(in_stage(vec![flagged])),
            )]);
        }
    }

    ModePlan {
        ingest: LogicalPlan::new(operations),
        pre_statistics,
        ..Default::default()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
