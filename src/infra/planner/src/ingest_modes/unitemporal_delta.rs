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

/// Versions main rows in transaction time: changed or deleted records get
/// their open version closed, new and changed records get a new open version
pub(super) fn plan(ctx: &PlanningContext<'_>, mode: &UnitemporalDelta) -> ModePlan {
    let main = ctx.main_reference();
    let milestones = TransactionMilestones::new(&mode.transaction_milestoning, &ctx.batch);
    let data_fields = ctx.data_fields();

    let changed_or_deleted = Condition::any(
        ctx.digest_differs(SINK, STAGE)
            .into_iter()
            .chain(ctx.delete_flagged(STAGE)),
    );
    let close = Operation::Update {
        target: main.clone(),
        assignments: milestones.close_assignments(),
        condition: Some(milestones.is_open(SINK).and(Condition::exists(
            ctx.select_stage(ctx.key_match(SINK, STAGE).into_iter().chain(changed_or_deleted)),
        ))),
    };

    let identical_open: Vec<Condition> = std::iter::once(milestones.is_open(SINK))
        .chain(ctx.key_match(SINK, STAGE))
        .chain(ctx.digest_match(SINK, STAGE))
        .collect();

    let mut fields = data_fields.clone();
    let mut values: Vec<Value> = data_fields.iter().map(|f| Value::field(STAGE, f)).collect();
    for (field, value) in milestones.open_assignments() {
        fields.push(field);
        values.push(value);
    }

    let open = Operation::Insert {
        target: main.without_alias(),
        fields,
        source: ctx
            .select_stage(ctx.not_delete_flagged(STAGE).into_iter().chain([
                Condition::not_exists(Selection::from(main).filter(Condition::all(identical_open))),
            ]))
            .fields(values),
    };

    let mut pre_statistics = BTreeMap::new();
    let mut post_statistics = BTreeMap::new();
    if ctx.options.collect_statistics {
        pre_statistics.insert(
            StatisticName::IncomingRecordCount,
            ctx.incoming_record_count(),
        );
        post_statistics = temporal_statistics(ctx, &milestones, &ctx.primary_keys);
    }

    ModePlan {
        ingest: LogicalPlan::new(vec![close, open]),
        pre_statistics,
        post_statistics,
        ..Default::default()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
