// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use tidemark_ingestion::*;

use crate::deduplication::plan_deduplication;
use crate::ingest_modes::plan_ingest;
use crate::planning_context::PlanningContext;
use crate::{IngestPlan, PlannerOptions};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Plans an ingestion of staging into main under one ingest mode.
///
/// Construction validates the mode against the datasets, so a planner that
/// exists can always produce a plan.
pub struct Planner<'a> {
    ctx: PlanningContext<'a>,
}

impl<'a> Planner<'a> {
    pub fn new(
        ingest_mode: &'a IngestMode,
        datasets: &Datasets,
        options: &'a PlannerOptions,
        capabilities: &'a BTreeSet<Capability>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            ctx: PlanningContext::new(ingest_mode, datasets, options, capabilities)?,
        })
    }

    /// Main dataset the plan writes to
    pub fn main_dataset(&self) -> Dataset {
        let ctx = &self.ctx;
        ctx.main.with_reference(ctx.main_reference().without_alias())
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.ctx.primary_keys
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(mode = self.ctx.mode.name(), main = %self.ctx.main_reference())
    )]
    pub fn build_ingest_plan(&self) -> Result<IngestPlan, ConfigurationError> {
        let ctx = &self.ctx;
        let options = ctx.options;

        let mode_plan = plan_ingest(ctx)?;
        let deduplication = plan_deduplication(ctx);

        let mut pre_actions = LogicalPlan::default();
        let mut post_cleanup = LogicalPlan::default();

        if options.create_datasets {
            pre_actions.push(Operation::Create {
                dataset: ctx.main_reference().without_alias(),
                schema: ctx.main_schema().clone(),
                if_not_exists: true,
            });
            pre_actions.push(ctx.batch.create()?);
        }
        if let (true, Dataset::Table(staging)) = (options.create_staging_dataset, &ctx.staging) {
            pre_actions.push(Operation::Create {
                dataset: staging.reference.without_alias(),
                schema: staging.schema.clone(),
                if_not_exists: true,
            });
        }

        let mut work_tables = mode_plan.work_tables;
        if deduplication.is_some() {
            work_tables.insert(
                0,
                (ctx.deduplicated_staging.without_alias(), ctx.stage_schema.clone()),
            );
        }
        for (dataset, schema) in work_tables {
            pre_actions.push(Operation::Create {
                dataset: dataset.clone(),
                schema,
                if_not_exists: true,
            });
            post_cleanup.push(Operation::Drop {
                dataset,
                if_exists: true,
            });
        }

        let mut post_actions = LogicalPlan::default();
        if options.cleanup_staging_data && !matches!(ctx.staging, Dataset::StagedFiles(_)) {
            post_actions.push(Operation::Delete {
                dataset: ctx.staging.reference().without_alias(),
                condition: None,
            });
        }

        let (deduplication, deduplication_checks, data_split_values) = match deduplication {
            Some(d) => (d.operations, d.checks, d.data_split_values),
            None => Default::default(),
        };

        let plan = IngestPlan {
            main_dataset: self.main_dataset(),
            pre_actions,
            deduplication,
            deduplication_checks,
            data_split_values,
            incoming_record_count: ctx.incoming_record_count(),
            ingest: mode_plan.ingest,
            metadata_ingest: ctx.batch.insert_batch(&options.batch_success_status_value),
            post_actions,
            post_cleanup,
            pre_ingest_statistics: mode_plan.pre_statistics,
            post_ingest_statistics: mode_plan.post_statistics,
            batch_metadata: ctx.batch.clone(),
        };

        tracing::debug!(
            ingest_operations = plan.ingest.operations.len(),
            deduplicated = !plan.deduplication.is_empty(),
            "Planned ingestion"
        );

        Ok(plan)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
