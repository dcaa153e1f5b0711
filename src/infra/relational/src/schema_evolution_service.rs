// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;
use std::sync::Arc;

use dill::*;
use internal_error::InternalError;
use thiserror::Error;
use tidemark_planner::*;
use time_source::SystemTimeSource;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Evolves the schema of a live main table towards an incoming staging
/// schema and applies the resulting `ALTER` statements
pub struct SchemaEvolutionService {
    sink: Arc<dyn RelationalSink>,
    executor: Arc<dyn RelationalExecutor>,
    time_source: Arc<dyn SystemTimeSource>,
}

#[component(pub)]
impl SchemaEvolutionService {
    pub fn new(
        sink: Arc<dyn RelationalSink>,
        executor: Arc<dyn RelationalExecutor>,
        time_source: Arc<dyn SystemTimeSource>,
    ) -> Self {
        Self {
            sink,
            executor,
            time_source,
        }
    }

    /// Introspects `main` and evolves it. A missing main table is reported
    /// as a failed result rather than an error.
    #[tracing::instrument(level = "info", skip_all, fields(%main))]
    pub async fn evolve(
        &self,
        main: &DatasetReference,
        staging_schema: &SchemaDefinition,
        ingest_mode: &IngestMode,
        capabilities: &BTreeSet<SchemaEvolutionCapability>,
    ) -> Result<SchemaEvolutionServiceResult, SchemaEvolutionServiceError> {
        let main_schema = match self.executor.describe_dataset(main).await {
            Ok(schema) => schema,
            Err(ExecutionError::DatasetNotFound(e)) => {
                tracing::warn!(error = %e, "Main dataset is missing, skipping schema evolution");
                return Ok(SchemaEvolutionServiceResult::failed(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let main_dataset = Dataset::table(main.without_alias(), main_schema);
        self.evolve_dataset(&main_dataset, staging_schema, ingest_mode, capabilities)
            .await
    }

    /// Evolves a main dataset whose current schema is already known
    pub async fn evolve_dataset(
        &self,
        main: &Dataset,
        staging_schema: &SchemaDefinition,
        ingest_mode: &IngestMode,
        capabilities: &BTreeSet<SchemaEvolutionCapability>,
    ) -> Result<SchemaEvolutionServiceResult, SchemaEvolutionServiceError> {
        let evolution = SchemaEvolution::new(self.sink.as_ref(), ingest_mode, capabilities)?;
        let result = evolution.build_logical_plan(main, staging_schema)?;

        let context = TransformContext::new(self.time_source.now());
        let statements = self.sink.transform(&result.logical_plan, &context)?;

        self.executor.execute_statements(&statements).await?;

        tracing::info!(
            num_statements = statements.len(),
            "Evolved main dataset schema"
        );

        Ok(SchemaEvolutionServiceResult::succeeded(
            result.evolved_dataset,
            statements,
        ))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum SchemaEvolutionServiceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    IncompatibleSchemaChange(#[from] IncompatibleSchemaChangeError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<SchemaEvolutionServiceError> for crate::IngestError {
    fn from(e: SchemaEvolutionServiceError) -> Self {
        match e {
            SchemaEvolutionServiceError::Configuration(e) => Self::Configuration(e),
            SchemaEvolutionServiceError::IncompatibleSchemaChange(e) => {
                Self::IncompatibleSchemaChange(e)
            }
            SchemaEvolutionServiceError::Transform(e) => Self::Transform(e),
            SchemaEvolutionServiceError::Execution(e) => Self::Execution(e),
            SchemaEvolutionServiceError::Internal(e) => Self::Internal(e),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
