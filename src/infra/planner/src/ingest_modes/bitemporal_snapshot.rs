// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tidemark_ingestion::*;

use super::ModePlan;
use super::unitemporal_snapshot::snapshot_plan;
use crate::milestoning::TransactionMilestones;
use crate::planning_context::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Snapshot in transaction time whose rows carry the validity interval given
/// by the source
pub(super) fn plan(ctx: &PlanningContext<'_>, mode: &BitemporalSnapshot) -> ModePlan {
    let milestones = TransactionMilestones::new(&mode.transaction_milestoning, &ctx.batch);
    let validity = &mode.validity_milestoning;
    let derivation = validity.derivation();
    let data_fields = ctx.data_fields();

    let mut fields = data_fields.clone();
    let mut values: Vec<Value> = data_fields.iter().map(|f| Value::field(STAGE, f)).collect();

    fields.push(validity.from_field().to_string());
    values.push(Value::field(STAGE, derivation.source_from()));
    if let Some(source_thru) = derivation.source_thru() {
        fields.push(validity.thru_field().to_string());
        values.push(Value::field(STAGE, source_thru));
    }

    for (field, value) in milestones.open_assignments() {
        fields.push(field);
        values.push(value);
    }

    let mut version_key = ctx.primary_keys.clone();
    version_key.push(validity.from_field().to_string());

    snapshot_plan(ctx, &milestones, &mode.partitioning, fields, values, &version_key)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
