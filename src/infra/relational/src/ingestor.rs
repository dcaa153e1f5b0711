// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::sync::Arc;

use tidemark_planner::*;
use time_source::SystemTimeSource;
use uuid::Uuid;

use crate::{IngestError, IngestorOptions, SchemaEvolutionService};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub const FAILED_BATCH_STATUS: &str = "FAILED";

/// Applies staging data to a live main table: evolves its schema, plans the
/// ingestion, runs it batch by batch and records every batch in the metadata
/// dataset.
///
/// Only one ingestion may run against a main table at a time; the metadata
/// dataset acts as a single-writer batch id sequence.
pub struct RelationalIngestor {
    ingest_mode: IngestMode,
    options: IngestorOptions,
    sink: Arc<dyn RelationalSink>,
    executor: Arc<dyn RelationalExecutor>,
    time_source: Arc<dyn SystemTimeSource>,
}

impl RelationalIngestor {
    pub fn new(
        ingest_mode: IngestMode,
        options: IngestorOptions,
        sink: Arc<dyn RelationalSink>,
        executor: Arc<dyn RelationalExecutor>,
        time_source: Arc<dyn SystemTimeSource>,
    ) -> Result<Self, ConfigurationError> {
        ingest_mode.validate()?;
        if options.enable_schema_evolution {
            SchemaEvolution::new(
                sink.as_ref(),
                &ingest_mode,
                &options.schema_evolution_capabilities,
            )?;
        }

        Ok(Self {
            ingest_mode,
            options,
            sink,
            executor,
            time_source,
        })
    }

    pub fn ingest_mode(&self) -> &IngestMode {
        &self.ingest_mode
    }

    pub fn options(&self) -> &IngestorOptions {
        &self.options
    }

    /// Ingests staging as one batch, or as one batch per distinct data split
    /// value when the deduplication strategy numbers versions
    pub async fn perform_full_ingestion(
        &self,
        datasets: &Datasets,
    ) -> Result<Vec<IngestorResult>, IngestError> {
        self.ingest(Uuid::new_v4(), datasets, None).await
    }

    /// Ingests one batch per range. Ranges must be ascending and must not
    /// overlap.
    pub async fn perform_full_ingestion_with_data_splits(
        &self,
        datasets: &Datasets,
        data_split_ranges: &[DataSplitRange],
    ) -> Result<Vec<IngestorResult>, IngestError> {
        validate_data_split_ranges(data_split_ranges)?;
        self.ingest(Uuid::new_v4(), datasets, Some(data_split_ranges))
            .await
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(%run_id, mode = self.ingest_mode.name(), main = %datasets.main.reference())
    )]
    async fn ingest(
        &self,
        run_id: Uuid,
        datasets: &Datasets,
        data_split_ranges: Option<&[DataSplitRange]>,
    ) -> Result<Vec<IngestorResult>, IngestError> {
        let case = self.options.case_conversion;
        let ingest_mode = case.apply_to_ingest_mode(&self.ingest_mode);
        let datasets = case
            .apply_to_datasets(datasets)
            .map_err(ConfigurationError::from)?;

        let batch_start = self.time_source.now();
        let base_context = TransformContext::new(batch_start);

        let (datasets, schema_evolution_sql) =
            self.evolve_schema(&ingest_mode, datasets).await?;

        let planner_options = self.options.planner_options();
        let planner = Planner::new(
            &ingest_mode,
            &datasets,
            &planner_options,
            self.sink.capabilities(),
        )?;
        let plan = planner.build_ingest_plan()?;
        let updated_datasets = datasets.with_main(plan.main_dataset.clone());

        if ingest_mode.data_split_field().is_some()
            && data_split_ranges.is_none()
            && plan.data_split_values.is_none()
        {
            return Err(ConfigurationError::new(
                "Data split ranges must be provided when a data split field is configured",
            )
            .into());
        }

        self.execute(&plan.pre_actions, &base_context).await?;
        self.execute(&plan.deduplication, &base_context).await?;
        self.run_deduplication_checks(&plan, &base_context).await?;

        let ranges: Vec<Option<DataSplitRange>> = match (data_split_ranges, &plan.data_split_values)
        {
            (Some(ranges), _) => ranges.iter().copied().map(Some).collect(),
            (None, Some(values)) => self
                .derive_data_split_ranges(values, &base_context)
                .await?
                .into_iter()
                .map(Some)
                .collect(),
            (None, None) => vec![None],
        };

        let mut results = Vec::with_capacity(ranges.len());
        for range in ranges {
            let context = base_context.clone().with_data_split(range);
            let batch = match plan.copy_operation() {
                Some(copy) => self.load_batch(&plan, copy, context).await?,
                None => self.ingest_batch(&ingest_mode, &plan, context).await?,
            };
            results.push(IngestorResult {
                status: batch.status,
                batch_id: Some(batch.batch_id),
                data_split_range: range,
                statistics: batch.statistics,
                updated_datasets: updated_datasets.clone(),
                schema_evolution_sql: schema_evolution_sql.clone(),
                ingestion_timestamp_utc: batch_start,
                message: batch.message,
            });
        }

        self.execute(&plan.post_actions, &base_context).await?;
        self.execute(&plan.post_cleanup, &base_context).await?;

        tracing::info!(num_batches = results.len(), "Ingestion complete");

        Ok(results)
    }

    /// Evolves the live main table when enabled and the table exists
    async fn evolve_schema(
        &self,
        ingest_mode: &IngestMode,
        datasets: Datasets,
    ) -> Result<(Datasets, Vec<String>), IngestError> {
        if !self.options.enable_schema_evolution {
            return Ok((datasets, Vec::new()));
        }

        let main = datasets.main.reference().without_alias();
        if !self.executor.dataset_exists(&main).await? {
            tracing::debug!(%main, "Main dataset does not exist yet, nothing to evolve");
            return Ok((datasets, Vec::new()));
        }

        let service = SchemaEvolutionService::new(
            self.sink.clone(),
            self.executor.clone(),
            self.time_source.clone(),
        );
        let staging_schema = datasets.staging.schema();
        let capabilities = &self.options.schema_evolution_capabilities;

        let result = if datasets.main.schema().is_empty() {
            service
                .evolve(&main, staging_schema, ingest_mode, capabilities)
                .await?
        } else {
            service
                .evolve_dataset(&datasets.main, staging_schema, ingest_mode, capabilities)
                .await?
        };

        match result.evolved_dataset {
            Some(evolved) => {
                let evolved = evolved.with_reference(datasets.main.reference().clone());
                Ok((datasets.with_main(evolved), result.executed_sql))
            }
            None => Ok((datasets, Vec::new())),
        }
    }

    async fn run_deduplication_checks(
        &self,
        plan: &IngestPlan,
        context: &TransformContext,
    ) -> Result<(), IngestError> {
        for (check, selection) in &plan.deduplication_checks {
            let value = self.query_i64(selection, context).await?.unwrap_or(0);
            tracing::debug!(%check, value, "Deduplication check");

            if value > 1 {
                return Err(match check {
                    DeduplicationCheck::MaxDuplicates => IngestError::Duplicates,
                    DeduplicationCheck::MaxDataErrors => IngestError::DataErrors,
                });
            }
        }
        Ok(())
    }

    /// One single-value range per distinct data split value, ascending
    async fn derive_data_split_ranges(
        &self,
        values: &Selection,
        context: &TransformContext,
    ) -> Result<Vec<DataSplitRange>, IngestError> {
        let sql = self.sink.transform_query(values, context)?;
        let rows = self.executor.query_rows(&sql).await?;

        let mut values: Vec<i64> = rows
            .iter()
            .filter_map(|row| row.first().and_then(SqlValue::as_i64))
            .collect();
        values.sort_unstable();
        values.dedup();

        Ok(values.into_iter().map(DataSplitRange::single).collect())
    }

    /// Resolves the id the batch will be recorded under
    async fn next_batch_id(
        &self,
        plan: &IngestPlan,
        context: &TransformContext,
    ) -> Result<i64, IngestError> {
        let selection = plan.batch_metadata.next_batch_id();
        let next = self.query_i64(&selection, context).await?;
        Ok(next.unwrap_or(1))
    }

    #[tracing::instrument(level = "info", skip_all, fields(data_split = ?context.data_split))]
    async fn ingest_batch(
        &self,
        ingest_mode: &IngestMode,
        plan: &IngestPlan,
        context: TransformContext,
    ) -> Result<BatchOutcome, IngestError> {
        let batch_id = self.next_batch_id(plan, &context).await?;
        let context = context.with_batch_id(batch_id);
        let collect_statistics = self.options.collect_statistics;

        let incoming = self
            .query_i64(&plan.incoming_record_count, &context)
            .await?
            .unwrap_or(0);

        let mut skip_ingest = false;
        if incoming == 0 {
            match ingest_mode.empty_dataset_handling() {
                Some(EmptyDatasetHandling::Fail) => return Err(IngestError::EmptyBatch),
                Some(EmptyDatasetHandling::NoOp) => {
                    tracing::info!("Empty batch, leaving main dataset unchanged");
                    skip_ingest = true;
                }
                Some(EmptyDatasetHandling::DeleteTargetData) | None => {}
            }
        }

        let mut statistics = BTreeMap::new();
        if collect_statistics {
            statistics.insert(StatisticName::IncomingRecordCount, incoming);
            self.collect_statistics(&plan.pre_ingest_statistics, &context, &mut statistics)
                .await?;
        }

        let mut statements = Vec::new();
        if !skip_ingest {
            statements.extend(self.sink.transform(&plan.ingest, &context)?);
        }
        statements.extend(self.sink.transform(&plan.metadata_ingest, &context)?);
        self.executor.execute_statements(&statements).await?;

        if collect_statistics && !skip_ingest {
            self.collect_statistics(&plan.post_ingest_statistics, &context, &mut statistics)
                .await?;
        }

        tracing::info!(batch_id, incoming, ?statistics, "Batch ingested");

        Ok(BatchOutcome {
            status: IngestStatus::Succeeded,
            batch_id,
            statistics,
            message: None,
        })
    }

    /// Loads staged files, retrying transient failures. Rows that could not
    /// be loaded fail the batch, but the rows that were loaded stay.
    #[tracing::instrument(level = "info", skip_all)]
    async fn load_batch(
        &self,
        plan: &IngestPlan,
        copy: &CopyOperation,
        context: TransformContext,
    ) -> Result<BatchOutcome, IngestError> {
        let batch_id = self.next_batch_id(plan, &context).await?;
        let context = context.with_batch_id(batch_id);

        let outcome = self
            .options
            .bulk_load_retry
            .run(self.time_source.as_ref(), || {
                self.executor.copy_staged_files(copy, &context)
            })
            .await?;

        let (status, status_value, message) = if outcome.rows_with_errors > 0 {
            (
                IngestStatus::Failed,
                FAILED_BATCH_STATUS.to_string(),
                Some(outcome.errors.join("; ")),
            )
        } else {
            (
                IngestStatus::Succeeded,
                self.options.batch_success_status_value.clone(),
                None,
            )
        };

        let metadata = plan.batch_metadata.insert_batch(&status_value);
        self.execute(&metadata, &context).await?;

        let mut statistics = BTreeMap::new();
        if self.options.collect_statistics {
            let to_i64 = |v: u64| i64::try_from(v).unwrap_or(i64::MAX);
            statistics.insert(
                StatisticName::IncomingRecordCount,
                to_i64(outcome.rows_loaded + outcome.rows_with_errors),
            );
            statistics.insert(StatisticName::RowsWithErrors, to_i64(outcome.rows_with_errors));
            self.collect_statistics(&plan.post_ingest_statistics, &context, &mut statistics)
                .await?;
        }

        tracing::info!(
            batch_id,
            files_loaded = outcome.files_loaded,
            rows_loaded = outcome.rows_loaded,
            rows_with_errors = outcome.rows_with_errors,
            "Staged files loaded"
        );

        Ok(BatchOutcome {
            status,
            batch_id,
            statistics,
            message,
        })
    }

    async fn collect_statistics(
        &self,
        queries: &BTreeMap<StatisticName, Selection>,
        context: &TransformContext,
        statistics: &mut BTreeMap<StatisticName, i64>,
    ) -> Result<(), IngestError> {
        for (name, selection) in queries {
            let value = self.query_i64(selection, context).await?.unwrap_or(0);
            statistics.insert(*name, value);
        }
        Ok(())
    }

    async fn query_i64(
        &self,
        selection: &Selection,
        context: &TransformContext,
    ) -> Result<Option<i64>, IngestError> {
        let sql = self.sink.transform_query(selection, context)?;
        Ok(self.executor.query_i64(&sql).await?)
    }

    async fn execute(
        &self,
        plan: &LogicalPlan,
        context: &TransformContext,
    ) -> Result<(), IngestError> {
        if plan.is_empty() {
            return Ok(());
        }
        let statements = self.sink.transform(plan, context)?;
        self.executor.execute_statements(&statements).await?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

struct BatchOutcome {
    status: IngestStatus,
    batch_id: i64,
    statistics: BTreeMap<StatisticName, i64>,
    message: Option<String>,
}

fn validate_data_split_ranges(ranges: &[DataSplitRange]) -> Result<(), IngestError> {
    if let Some(range) = ranges.iter().find(|r| !r.is_valid()) {
        return Err(ConfigurationError::new(format!(
            "Data split range {range} has its lower bound above its upper bound"
        ))
        .into());
    }
    for window in ranges.windows(2) {
        let (previous, next) = (window[0], window[1]);
        if next.lower <= previous.upper {
            return Err(IngestError::InvalidDataSplits { previous, next });
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
