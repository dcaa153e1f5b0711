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
use crate::statistics::{StatisticQueries, temporal_statistics};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(super) fn plan(ctx: &PlanningContext<'_>, mode: &BitemporalDelta) -> ModePlan {
    let planner = BitemporalDeltaPlanner::new(ctx, mode);
    match mode.validity_milestoning.derivation().source_thru() {
        Some(source_thru) => planner.plan_from_and_thru(source_thru),
        None => planner.plan_from_only(),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

struct BitemporalDeltaPlanner<'a> {
    ctx: &'a PlanningContext<'a>,
    milestones: TransactionMilestones<'a>,
    /// Validity columns of main
    valid_from: &'a str,
    valid_thru: &'a str,
    /// Validity start column of staging
    source_from: &'a str,
}

impl<'a> BitemporalDeltaPlanner<'a> {
    fn new(ctx: &'a PlanningContext<'a>, mode: &'a BitemporalDelta) -> Self {
        let validity = &mode.validity_milestoning;
        Self {
            ctx,
            milestones: TransactionMilestones::new(&mode.transaction_milestoning, &ctx.batch),
            valid_from: validity.from_field(),
            valid_thru: validity.thru_field(),
            source_from: validity.derivation().source_from(),
        }
    }

    fn version_key(&self) -> Vec<String> {
        let mut key = self.ctx.primary_keys.clone();
        key.push(self.valid_from.to_string());
        key
    }

    /// Main row of `main_alias` starts where the staging row of `stage_alias` does
    fn starts_with(&self, main_alias: &str, stage_alias: &str) -> Condition {
        Condition::equals(
            Value::field(main_alias, self.valid_from),
            Value::field(stage_alias, self.source_from),
        )
    }

    fn statistics(&self) -> (StatisticQueries, StatisticQueries) {
        if !self.ctx.options.collect_statistics {
            return Default::default();
        }
        (
            BTreeMap::from([(
                StatisticName::IncomingRecordCount,
                self.ctx.incoming_record_count(),
            )]),
            temporal_statistics(self.ctx, &self.milestones, &self.version_key()),
        )
    }

    fn open_fields(
        &self,
        mut fields: Vec<String>,
        mut values: Vec<Value>,
    ) -> (Vec<String>, Vec<Value>) {
        for (field, value) in self.milestones.open_assignments() {
            fields.push(field);
            values.push(value);
        }
        (fields, values)
    }

    /// Source gives both validity bounds: versions are replaced per
    /// (key, valid from)
    fn plan_from_and_thru(&self, source_thru: &str) -> ModePlan {
        let ctx = self.ctx;
        let main = ctx.main_reference();

        let changed_or_deleted = Condition::any(
            ctx.digest_differs(SINK, STAGE)
                .into_iter()
                .chain(ctx.delete_flagged(STAGE)),
        );
        let close = Operation::Update {
            target: main.clone(),
            assignments: self.milestones.close_assignments(),
            condition: Some(self.milestones.is_open(SINK).and(Condition::exists(
                ctx.select_stage(
                    ctx.key_match(SINK, STAGE)
                        .into_iter()
                        .chain([self.starts_with(SINK, STAGE)])
                        .chain(changed_or_deleted),
                ),
            ))),
        };

        let identical_open: Vec<Condition> = [self.milestones.is_open(SINK)]
            .into_iter()
            .chain(ctx.key_match(SINK, STAGE))
            .chain([self.starts_with(SINK, STAGE)])
            .chain(ctx.digest_match(SINK, STAGE))
            .collect();

        let data_fields = ctx.data_fields();
        let mut fields = data_fields.clone();
        let mut values: Vec<Value> = data_fields.iter().map(|f| Value::field(STAGE, f)).collect();
        fields.extend([self.valid_from.to_string(), self.valid_thru.to_string()]);
        values.extend([
            Value::field(STAGE, self.source_from),
            Value::field(STAGE, source_thru),
        ]);
        let (fields, values) = self.open_fields(fields, values);

        let open = Operation::Insert {
            target: main.without_alias(),
            fields,
            source: ctx
                .select_stage(ctx.not_delete_flagged(STAGE).into_iter().chain([
                    Condition::not_exists(
                        Selection::from(main).filter(Condition::all(identical_open)),
                    ),
                ]))
                .fields(values),
        };

        let (pre_statistics, post_statistics) = self.statistics();
        ModePlan {
            ingest: LogicalPlan::new(vec![close, open]),
            pre_statistics,
            post_statistics,
            ..Default::default()
        }
    }

    /// Source only gives the validity start: the end of each version is the
    /// start of the next version of the same record, and versions arriving in
    /// the middle of an existing interval split it.
    ///
    /// Works through two tables: the changed staging rows, and the versions to
    /// be opened by the batch.
    fn plan_from_only(&self) -> ModePlan {
        let ctx = self.ctx;
        let main = ctx.main_reference();
        let changes = &ctx.staging_without_duplicates;
        let temp = &ctx.temp;
        let data_fields = ctx.data_fields();
        let not_deleted = ctx.not_delete_flagged(STAGE);

        let changes_schema = match ctx.mode.data_split_field() {
            Some(split) => ctx.stage_schema.without_fields(&[split]),
            None => ctx.stage_schema.clone(),
        };
        let changes_fields = changes_schema.field_names();

        let mut operations = vec![
            Operation::Delete {
                dataset: changes.without_alias(),
                condition: None,
            },
            Operation::Delete {
                dataset: temp.without_alias(),
                condition: None,
            },
        ];

        // 1. Staging rows of the batch, minus versions main already has open
        let identical_open: Vec<Condition> = [self.milestones.is_open(SINK)]
            .into_iter()
            .chain(ctx.key_match(SINK, STAGE))
            .chain([self.starts_with(SINK, STAGE)])
            .chain(ctx.digest_match(SINK, STAGE))
            .collect();
        let not_yet_open =
            Condition::not_exists(Selection::from(main).filter(Condition::all(identical_open)));
        let wanted = match ctx.delete_flagged(STAGE) {
            Some(flagged) => Condition::Or(vec![flagged, not_yet_open]),
            None => not_yet_open,
        };
        operations.push(Operation::Insert {
            target: changes.without_alias(),
            fields: changes_fields.clone(),
            source: ctx
                .select_stage([wanted])
                .fields(changes_fields.iter().map(|f| Value::field(STAGE, f)).collect()),
        });

        // 2. New versions, valid until the next open main version
        let next_main_start = Selection::from(main)
            .fields(vec![Value::min(Value::field(SINK, self.valid_from))])
            .filter(Condition::all(
                [self.milestones.is_open(SINK)]
                    .into_iter()
                    .chain(ctx.key_match(SINK, STAGE))
                    .chain([Condition::gt(
                        Value::field(SINK, self.valid_from),
                        Value::field(STAGE, self.source_from),
                    )]),
            ));

        let mut fields = data_fields.clone();
        let mut values: Vec<Value> = data_fields.iter().map(|f| Value::field(STAGE, f)).collect();
        fields.extend([self.valid_from.to_string(), self.valid_thru.to_string()]);
        values.extend([
            Value::field(STAGE, self.source_from),
            Value::coalesce(vec![
                Value::subquery(next_main_start),
                Value::DateTime(INFINITE_BATCH_TIME.to_string()),
            ]),
        ]);
        let (temp_fields, values) = self.open_fields(fields, values);

        operations.push(Operation::Insert {
            target: temp.without_alias(),
            fields: temp_fields.clone(),
            source: Selection::from(changes)
                .fields(values)
                .filter(not_deleted.clone()),
        });

        // 3. ... or until the next staging version inside that interval
        let starts_inside = |alias: &str| -> Vec<Condition> {
            ctx.key_match(alias, STAGE)
                .into_iter()
                .chain([
                    Condition::gt(
                        Value::field(STAGE, self.source_from),
                        Value::field(alias, self.valid_from),
                    ),
                    Condition::lt(
                        Value::field(STAGE, self.source_from),
                        Value::field(alias, self.valid_thru),
                    ),
                ])
                .chain(not_deleted.clone())
                .collect()
        };
        let first_start_inside = |alias: &str| {
            Selection::from(changes)
                .fields(vec![Value::min(Value::field(STAGE, self.source_from))])
                .filter(Condition::all(starts_inside(alias)))
        };

        operations.push(Operation::Update {
            target: temp.clone(),
            assignments: vec![(
                self.valid_thru.to_string(),
                Value::subquery(first_start_inside(TEMP)),
            )],
            condition: Some(Condition::exists(
                Selection::from(changes).filter(Condition::all(starts_inside(TEMP))),
            )),
        });

        // 4. Open main versions split by a staging version starting inside
        // them keep their head, unless staging replaces or deletes the head
        let mut main_values: Vec<Value> =
            data_fields.iter().map(|f| Value::field(SINK, f)).collect();
        main_values.extend([
            Value::field(SINK, self.valid_from),
            Value::subquery(first_start_inside(SINK)),
        ]);
        let (_, main_values) = self.open_fields(Vec::new(), main_values);

        let replaced_head: Vec<Condition> = ctx
            .key_match(SINK, STAGE)
            .into_iter()
            .chain([self.starts_with(SINK, STAGE)])
            .collect();
        operations.push(Operation::Insert {
            target: temp.without_alias(),
            fields: temp_fields.clone(),
            source: Selection::from(main)
                .fields(main_values)
                .filter(Condition::all([
                    self.milestones.is_open(SINK),
                    Condition::exists(
                        Selection::from(changes).filter(Condition::all(starts_inside(SINK))),
                    ),
                    Condition::not_exists(
                        Selection::from(changes).filter(Condition::all(replaced_head)),
                    ),
                ])),
        });

        // 5. Open main versions ending where a deleted version starts take
        // over its interval
        if let Some(flagged) = ctx.delete_flagged(STAGE) {
            operations.push(Operation::Insert {
                target: temp.without_alias(),
                fields: temp_fields.clone(),
                source: self.predecessors_of_deleted(&data_fields, flagged),
            });
        }

        // 6. Close open main versions superseded by the new ones
        let superseded: Vec<Condition> = ctx
            .key_match(SINK, TEMP)
            .into_iter()
            .chain([Condition::equals(
                Value::field(SINK, self.valid_from),
                Value::field(TEMP, self.valid_from),
            )])
            .collect();
        operations.push(Operation::Update {
            target: main.clone(),
            assignments: self.milestones.close_assignments(),
            condition: Some(self.milestones.is_open(SINK).and(Condition::exists(
                Selection::from(temp).filter(Condition::all(superseded)),
            ))),
        });

        // 7. Close open main versions deleted by staging
        if let Some(flagged) = ctx.delete_flagged(STAGE) {
            let deleted: Vec<Condition> = ctx
                .key_match(SINK, STAGE)
                .into_iter()
                .chain([self.starts_with(SINK, STAGE), flagged])
                .collect();
            operations.push(Operation::Update {
                target: main.clone(),
                assignments: self.milestones.close_assignments(),
                condition: Some(self.milestones.is_open(SINK).and(Condition::exists(
                    Selection::from(changes).filter(Condition::all(deleted)),
                ))),
            });
        }

        // 8. Open the new versions
        operations.push(Operation::Insert {
            target: main.without_alias(),
            fields: temp_fields.clone(),
            source: Selection::from(temp)
                .fields(temp_fields.iter().map(|f| Value::field(TEMP, f)).collect()),
        });

        let (pre_statistics, post_statistics) = self.statistics();
        ModePlan {
            ingest: LogicalPlan::new(operations),
            pre_statistics,
            post_statistics,
            work_tables: vec![
                (changes.without_alias(), changes_schema),
                (temp.without_alias(), ctx.main_schema().clone()),
            ],
        }
    }

    /// Open main versions directly followed by an open version that staging
    /// deletes, re-emitted to run until the end of the deleted version. A
    /// version that is deleted itself, or already re-emitted by a split, is
    /// left alone.
    fn predecessors_of_deleted(&self, data_fields: &[String], flagged: Condition) -> Selection {
        let ctx = self.ctx;
        let main = ctx.main_reference();
        let changes = &ctx.staging_without_duplicates;

        let deleted_by_stage: Vec<Condition> = ctx
            .key_match(STAGE, SINK_DELETED)
            .into_iter()
            .chain([
                Condition::equals(
                    Value::field(STAGE, self.source_from),
                    Value::field(SINK_DELETED, self.valid_from),
                ),
                flagged.clone(),
            ])
            .collect();
        let deleted_successor = Selection::from(main.clone().with_alias(SINK_DELETED)).filter(
            Condition::all(
                [self.milestones.is_open(SINK_DELETED)]
                    .into_iter()
                    .chain(ctx.key_match(SINK_DELETED, SINK))
                    .chain([
                        Condition::equals(
                            Value::field(SINK_DELETED, self.valid_from),
                            Value::field(SINK, self.valid_thru),
                        ),
                        Condition::exists(
                            Selection::from(changes).filter(Condition::all(deleted_by_stage)),
                        ),
                    ]),
            ),
        );

        let deleted_itself: Vec<Condition> = ctx
            .key_match(STAGE, SINK)
            .into_iter()
            .chain([self.starts_with(SINK, STAGE), flagged])
            .collect();
        let already_emitted: Vec<Condition> = ctx
            .key_match(TEMP, SINK)
            .into_iter()
            .chain([Condition::equals(
                Value::field(TEMP, self.valid_from),
                Value::field(SINK, self.valid_from),
            )])
            .collect();

        let mut values: Vec<Value> = data_fields.iter().map(|f| Value::field(SINK, f)).collect();
        values.extend([
            Value::field(SINK, self.valid_from),
            Value::subquery(deleted_successor.clone().fields(vec![Value::max(
                Value::field(SINK_DELETED, self.valid_thru),
            )])),
        ]);
        let (_, values) = self.open_fields(Vec::new(), values);

        Selection::from(main).fields(values).filter(Condition::all([
            self.milestones.is_open(SINK),
            Condition::exists(deleted_successor),
            Condition::not_exists(Selection::from(changes).filter(Condition::all(deleted_itself))),
            Condition::not_exists(
                Selection::from(&ctx.temp).filter(Condition::all(already_emitted)),
            ),
        ]))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
