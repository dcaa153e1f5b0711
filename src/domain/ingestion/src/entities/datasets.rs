// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{DataType, Dataset, DatasetReference, Field, SchemaDefinition, SchemaDefinitionError};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub const DEFAULT_METADATA_TABLE_NAME: &str = "batch_metadata";

/// Table that records one row per applied batch and acts as the batch id
/// sequence of every main table it serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDataset {
    pub database: Option<String>,
    pub group: Option<String>,
    pub name: String,
    pub table_name_field: String,
    pub table_batch_id_field: String,
    pub batch_start_ts_field: String,
    pub batch_end_ts_field: String,
    pub batch_status_field: String,
    pub staging_filters_field: String,
}

impl Default for MetadataDataset {
    fn default() -> Self {
        Self {
            database: None,
            group: None,
            name: DEFAULT_METADATA_TABLE_NAME.to_string(),
            table_name_field: "table_name".to_string(),
            table_batch_id_field: "table_batch_id".to_string(),
            batch_start_ts_field: "batch_start_ts_utc".to_string(),
            batch_end_ts_field: "batch_end_ts_utc".to_string(),
            batch_status_field: "batch_status".to_string(),
            staging_filters_field: "staging_filters".to_string(),
        }
    }
}

impl MetadataDataset {
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn reference(&self) -> DatasetReference {
        DatasetReference {
            database: self.database.clone(),
            group: self.group.clone(),
            name: self.name.clone(),
            alias: Some(self.name.clone()),
        }
    }

    /// Fails when the configured column names collide
    pub fn schema(&self) -> Result<SchemaDefinition, SchemaDefinitionError> {
        SchemaDefinition::new(vec![
            Field::new(&self.table_name_field, DataType::Varchar).with_length(255),
            Field::new(&self.batch_start_ts_field, DataType::Datetime),
            Field::new(&self.batch_end_ts_field, DataType::Datetime),
            Field::new(&self.batch_status_field, DataType::Varchar).with_length(32),
            Field::new(&self.table_batch_id_field, DataType::Integer),
            Field::new(&self.staging_filters_field, DataType::Json),
        ])
    }

    pub fn dataset(&self) -> Result<Dataset, SchemaDefinitionError> {
        Ok(Dataset::table(self.reference(), self.schema()?))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// The unit of work of one ingestion: main and staging plus the auxiliary
/// tables the engine may need. Auxiliary tables that are not provided are
/// named after main/staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datasets {
    pub main: Dataset,
    pub staging: Dataset,
    pub temp: Option<Dataset>,
    pub staging_without_duplicates: Option<Dataset>,
    pub deduplicated_staging: Option<Dataset>,
    pub metadata: MetadataDataset,
}

impl Datasets {
    pub fn new(main: Dataset, staging: Dataset) -> Self {
        Self {
            main,
            staging,
            temp: None,
            staging_without_duplicates: None,
            deduplicated_staging: None,
            metadata: MetadataDataset::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataDataset) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_temp(mut self, temp: Dataset) -> Self {
        self.temp = Some(temp);
        self
    }

    pub fn with_staging_without_duplicates(mut self, dataset: Dataset) -> Self {
        self.staging_without_duplicates = Some(dataset);
        self
    }

    pub fn with_deduplicated_staging(mut self, dataset: Dataset) -> Self {
        self.deduplicated_staging = Some(dataset);
        self
    }

    pub fn with_main(&self, main: Dataset) -> Self {
        Self {
            main,
            ..self.clone()
        }
    }

    pub fn with_staging(&self, staging: Dataset) -> Self {
        Self {
            staging,
            ..self.clone()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
