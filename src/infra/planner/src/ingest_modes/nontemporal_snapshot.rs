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
use crate::statistics::{count_statistic, statistic};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Replaces the content of main with the staging snapshot
pub(super) fn plan(ctx: &PlanningContext<'_>) -> ModePlan {
    let main = ctx.main_reference();
    let data_fields = ctx.data_fields();

    let mut fields = data_fields.clone();
    let mut values: Vec<Value> = data_fields.iter().map(|f| Value::field(STAGE, f)).collect();
    if let Some((field, value)) = ctx.audit_assignment() {
        fields.push(field);
        values.push(value);
    }

    let mut pre_statistics = BTreeMap::new();
    if ctx.options.collect_statistics {
        pre_statistics.extend([
            (
                StatisticName::IncomingRecordCount,
                ctx.incoming_record_count(),
            ),
            statistic(
                StatisticName::RowsInserted,
                ctx.select_stage([]).fields(vec![Value::count_all()]),
            ),
            count_statistic(StatisticName::RowsDeleted, main, None),
        ]);
    }

    ModePlan {
        ingest: LogicalPlan::new(vec![
            Operation::Delete {
                dataset: main.clone(),
                condition: None,
            },
            Operation::Insert {
                target: main.without_alias(),
                fields,
                source: ctx.select_stage([]).fields(values),
            },
        ]),
        pre_statistics,
        ..Default::default()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
