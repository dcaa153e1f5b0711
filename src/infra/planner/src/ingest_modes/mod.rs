// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod append_only;
mod bitemporal_delta;
mod bitemporal_snapshot;
mod bulk_load;
mod nontemporal_delta;
mod nontemporal_snapshot;
mod unitemporal_delta;
mod unitemporal_snapshot;

use tidemark_ingestion::*;

use crate::planning_context::PlanningContext;
use crate::statistics::StatisticQueries;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations of one batch and the statistics describing their effect
#[derive(Default)]
pub(crate) struct ModePlan {
    pub ingest: LogicalPlan,
    pub pre_statistics: StatisticQueries,
    pub post_statistics: StatisticQueries,
    /// Work tables the mode writes to, created up front and dropped afterwards
    pub work_tables: Vec<(DatasetReference, SchemaDefinition)>,
}

pub(crate) fn plan_ingest(ctx: &PlanningContext<'_>) -> Result<ModePlan, ConfigurationError> {
    match ctx.mode {
        IngestMode::AppendOnly(m) => Ok(append_only::plan(ctx, m)),
        IngestMode::NontemporalSnapshot(_) => Ok(nontemporal_snapshot::plan(ctx)),
        IngestMode::NontemporalDelta(_) => Ok(nontemporal_delta::plan(ctx)),
        IngestMode::UnitemporalSnapshot(m) => Ok(unitemporal_snapshot::plan(ctx, m)),
        IngestMode::UnitemporalDelta(m) => Ok(unitemporal_delta::plan(ctx, m)),
        IngestMode::BitemporalSnapshot(m) => Ok(bitemporal_snapshot::plan(ctx, m)),
        IngestMode::BitemporalDelta(m) => Ok(bitemporal_delta::plan(ctx, m)),
        IngestMode::BulkLoad(m) => bulk_load::plan(ctx, m),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
