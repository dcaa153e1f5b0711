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
use crate::statistics::statistic;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Appends staging rows to main, optionally skipping rows main already has
pub(super) fn plan(ctx: &PlanningContext<'_>, mode: &AppendOnly) -> ModePlan {
    let data_fields = ctx.data_fields();

    let mut fields = data_fields.clone();
    let mut values: Vec<Value> = data_fields.iter().map(|f| Value::field(STAGE, f)).collect();

    let digest = match &mode.digest_gen_strategy {
        DigestGenStrategy::NoDigest => None,
        DigestGenStrategy::UserProvided { digest_field } => {
            Some((digest_field, Value::field(STAGE, digest_field)))
        }
        DigestGenStrategy::UdfBased {
            digest_udf_name,
            digest_field,
            fields_to_exclude,
        } => {
            let args = data_fields
                .iter()
                .filter(|f| !fields_to_exclude.iter().any(|e| e.eq_ignore_ascii_case(f)))
                .flat_map(|f| [Value::string(f), Value::field(STAGE, f)])
                .collect();
            let udf = Value::function(FunctionName::Custom(digest_udf_name.clone()), args);
            fields.push(digest_field.clone());
            values.push(udf.clone());
            Some((digest_field, udf))
        }
    };

    if let Some((field, value)) = ctx.audit_assignment() {
        fields.push(field);
        values.push(value);
    }

    let mut conditions = Vec::new();
    if let Some((digest_field, digest_value)) = digest.filter(|_| mode.filter_existing_records) {
        let mut existing: Vec<Condition> = ctx.key_match(SINK, STAGE).into_iter().collect();
        existing.push(Condition::equals(
            Value::field(SINK, digest_field),
            digest_value,
        ));
        conditions.push(Condition::not_exists(
            Selection::from(ctx.main_reference()).filter(Condition::all(existing)),
        ));
    }

    let source = ctx.select_stage(conditions);

    let mut pre_statistics = BTreeMap::new();
    if ctx.options.collect_statistics {
        pre_statistics.extend([
            (
                StatisticName::IncomingRecordCount,
                ctx.incoming_record_count(),
            ),
            statistic(
                StatisticName::RowsInserted,
                source.clone().fields(vec![Value::count_all()]),
            ),
        ]);
    }

    ModePlan {
        ingest: LogicalPlan::new(vec![Operation::Insert {
            target: ctx.main_reference().without_alias(),
            fields,
            source: source.fields(values),
        }]),
        pre_statistics,
        ..Default::default()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
