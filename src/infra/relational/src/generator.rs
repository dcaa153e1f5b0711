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

use crate::{GenerateError, IngestorOptions};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// SQL of one ingestion, stage by stage, for execution outside of this crate
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorResult {
    pub main_dataset: Dataset,
    pub data_split_range: Option<DataSplitRange>,
    pub pre_actions: Vec<String>,
    /// `ALTER` statements bringing main in line with staging, when schema
    /// evolution is enabled and the main schema was supplied
    pub schema_evolution: Vec<String>,
    pub deduplication: Vec<String>,
    pub deduplication_checks: BTreeMap<DeduplicationCheck, String>,
    pub data_split_values: Option<String>,
    pub incoming_record_count: String,
    pub ingest: Vec<String>,
    pub metadata_ingest: Vec<String>,
    pub post_actions: Vec<String>,
    pub post_cleanup: Vec<String>,
    pub pre_ingest_statistics: BTreeMap<StatisticName, String>,
    pub post_ingest_statistics: BTreeMap<StatisticName, String>,
}

impl GeneratorResult {
    /// Statements to run for the batch, in execution order
    pub fn batch_statements(&self) -> impl Iterator<Item = &String> {
        self.ingest.iter().chain(&self.metadata_ingest)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Produces the SQL of an ingestion without running it. The batch id is left
/// to the metadata dataset sub-query, so the statements stay valid for
/// whichever batch eventually runs them.
pub struct RelationalGenerator {
    ingest_mode: IngestMode,
    options: IngestorOptions,
    sink: Arc<dyn RelationalSink>,
    time_source: Arc<dyn SystemTimeSource>,
}

impl RelationalGenerator {
    pub fn new(
        ingest_mode: IngestMode,
        options: IngestorOptions,
        sink: Arc<dyn RelationalSink>,
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
            time_source,
        })
    }

    pub fn generate_operations(
        &self,
        datasets: &Datasets,
    ) -> Result<GeneratorResult, GenerateError> {
        let mut results = self.generate(datasets, &[None])?;
        Ok(results.remove(0))
    }

    /// One result per range, each scoped to its range
    pub fn generate_operations_with_data_splits(
        &self,
        datasets: &Datasets,
        data_split_ranges: &[DataSplitRange],
    ) -> Result<Vec<GeneratorResult>, GenerateError> {
        let ranges: Vec<_> = data_split_ranges.iter().copied().map(Some).collect();
        self.generate(datasets, &ranges)
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(mode = self.ingest_mode.name(), sink = self.sink.name())
    )]
    fn generate(
        &self,
        datasets: &Datasets,
        ranges: &[Option<DataSplitRange>],
    ) -> Result<Vec<GeneratorResult>, GenerateError> {
        let case = self.options.case_conversion;
        let ingest_mode = case.apply_to_ingest_mode(&self.ingest_mode);
        let datasets = case
            .apply_to_datasets(datasets)
            .map_err(ConfigurationError::from)?;

        let base_context = TransformContext::new(self.time_source.now());

        let (datasets, schema_evolution) =
            self.evolve_schema(&ingest_mode, datasets, &base_context)?;

        let planner_options = self.options.planner_options();
        let planner = Planner::new(
            &ingest_mode,
            &datasets,
            &planner_options,
            self.sink.capabilities(),
        )?;
        let plan = planner.build_ingest_plan()?;

        let sink = self.sink.as_ref();
        let queries = |selections: &BTreeMap<StatisticName, Selection>,
                       context: &TransformContext|
         -> Result<BTreeMap<StatisticName, String>, TransformError> {
            selections
                .iter()
                .map(|(name, selection)| Ok((*name, sink.transform_query(selection, context)?)))
                .collect()
        };

        let results = ranges
            .iter()
            .map(|range| {
                let context = base_context.clone().with_data_split(*range);
                Ok(GeneratorResult {
                    main_dataset: plan.main_dataset.clone(),
                    data_split_range: *range,
                    pre_actions: sink.transform(&plan.pre_actions, &context)?,
                    schema_evolution: schema_evolution.clone(),
                    deduplication: sink.transform(&plan.deduplication, &context)?,
                    deduplication_checks: plan
                        .deduplication_checks
                        .iter()
                        .map(|(check, selection)| {
                            Ok((*check, sink.transform_query(selection, &context)?))
                        })
                        .collect::<Result<_, TransformError>>()?,
                    data_split_values: plan
                        .data_split_values
                        .as_ref()
                        .map(|selection| sink.transform_query(selection, &context))
                        .transpose()?,
                    incoming_record_count: sink
                        .transform_query(&plan.incoming_record_count, &context)?,
                    ingest: sink.transform(&plan.ingest, &context)?,
                    metadata_ingest: sink.transform(&plan.metadata_ingest, &context)?,
                    post_actions: sink.transform(&plan.post_actions, &context)?,
                    post_cleanup: sink.transform(&plan.post_cleanup, &context)?,
                    pre_ingest_statistics: queries(&plan.pre_ingest_statistics, &context)?,
                    post_ingest_statistics: queries(&plan.post_ingest_statistics, &context)?,
                })
            })
            .collect::<Result<Vec<_>, GenerateError>>()?;

        tracing::debug!(num_results = results.len(), "Generated ingestion SQL");

        Ok(results)
    }

    /// Schema evolution needs the live main schema, so it is only generated
    /// when the caller supplied one
    fn evolve_schema(
        &self,
        ingest_mode: &IngestMode,
        datasets: Datasets,
        context: &TransformContext,
    ) -> Result<(Datasets, Vec<String>), GenerateError> {
        if !self.options.enable_schema_evolution || datasets.main.schema().is_empty() {
            return Ok((datasets, Vec::new()));
        }

        let evolution = SchemaEvolution::new(
            self.sink.as_ref(),
            ingest_mode,
            &self.options.schema_evolution_capabilities,
        )?;
        let result = evolution.build_logical_plan(&datasets.main, datasets.staging.schema())?;

        let statements = self.sink.transform(&result.logical_plan, context)?;
        let evolved = result
            .evolved_dataset
            .with_reference(datasets.main.reference().clone());

        Ok((datasets.with_main(evolved), statements))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
