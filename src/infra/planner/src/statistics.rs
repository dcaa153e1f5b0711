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

use crate::milestoning::TransactionMilestones;
use crate::planning_context::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) type StatisticQueries = BTreeMap<StatisticName, Selection>;

pub(crate) fn statistic(name: StatisticName, selection: Selection) -> (StatisticName, Selection) {
    let fields = selection
        .fields
        .iter()
        .cloned()
        .map(|v| v.alias(name.column_alias()))
        .collect();
    (name, selection.fields(fields))
}

pub(crate) fn count_statistic(
    name: StatisticName,
    dataset: &DatasetReference,
    condition: Option<Condition>,
) -> (StatisticName, Selection) {
    statistic(name, count_where(dataset, condition))
}

/// Statistics of transaction-milestoned modes, derived from the rows the
/// batch opened and closed. `version_key` identifies one version of a record.
pub(crate) fn temporal_statistics(
    ctx: &PlanningContext<'_>,
    milestones: &TransactionMilestones<'_>,
    version_key: &[String],
) -> StatisticQueries {
    let main = ctx.main_reference();
    let latest = main.clone().with_alias(SINK_LATEST);

    let added = count_where(main, Some(milestones.opened_in_batch(SINK)));
    let invalidated = count_where(main, Some(milestones.closed_in_batch(SINK)));

    let mut replaced = vec![milestones.opened_in_batch(SINK_LATEST)];
    replaced.extend(fields_match(version_key, SINK, SINK_LATEST));
    let updated = count_where(
        main,
        Some(milestones.closed_in_batch(SINK).and(Condition::exists(
            Selection::from(latest).filter(Condition::all(replaced)),
        ))),
    );

    let difference = |left: &Selection, right: &Selection| {
        Selection::constants(vec![
            Value::subquery(left.clone()).minus(Value::subquery(right.clone())),
        ])
    };

    BTreeMap::from([
        statistic(StatisticName::RowsInserted, difference(&added, &updated)),
        statistic(StatisticName::RowsTerminated, difference(&invalidated, &updated)),
        statistic(StatisticName::RowsUpdated, updated),
    ])
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
