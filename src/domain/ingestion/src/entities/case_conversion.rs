// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{
    Dataset,
    DatasetReference,
    Datasets,
    IngestMode,
    MetadataDataset,
    SchemaDefinitionError,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Policy applied uniformly to every identifier before planning
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "camelCase")]
pub enum CaseConversion {
    #[default]
    None,
    ToUpper,
    ToLower,
}

impl CaseConversion {
    pub fn apply(self, identifier: &str) -> String {
        match self {
            Self::None => identifier.to_string(),
            Self::ToUpper => identifier.to_uppercase(),
            Self::ToLower => identifier.to_lowercase(),
        }
    }

    pub fn apply_to_ingest_mode(self, ingest_mode: &IngestMode) -> IngestMode {
        match self {
            Self::None => ingest_mode.clone(),
            _ => ingest_mode.map_fields(|s| self.apply(s)),
        }
    }

    pub fn apply_to_reference(self, reference: &DatasetReference) -> DatasetReference {
        DatasetReference {
            database: reference.database.as_deref().map(|s| self.apply(s)),
            group: reference.group.as_deref().map(|s| self.apply(s)),
            name: self.apply(&reference.name),
            alias: reference.alias.clone(),
        }
    }

    pub fn apply_to_dataset(self, dataset: &Dataset) -> Result<Dataset, SchemaDefinitionError> {
        if self == Self::None {
            return Ok(dataset.clone());
        }

        let schema = dataset.schema().map_names(|s| self.apply(s))?;
        let mut converted = dataset
            .with_reference(self.apply_to_reference(dataset.reference()))
            .with_schema(schema);

        if let Dataset::Derived(derived) = &mut converted {
            for filter in &mut derived.filters {
                filter.field = self.apply(&filter.field);
            }
        }

        Ok(converted)
    }

    pub fn apply_to_metadata(self, metadata: &MetadataDataset) -> MetadataDataset {
        MetadataDataset {
            database: metadata.database.as_deref().map(|s| self.apply(s)),
            group: metadata.group.as_deref().map(|s| self.apply(s)),
            name: self.apply(&metadata.name),
            table_name_field: self.apply(&metadata.table_name_field),
            table_batch_id_field: self.apply(&metadata.table_batch_id_field),
            batch_start_ts_field: self.apply(&metadata.batch_start_ts_field),
            batch_end_ts_field: self.apply(&metadata.batch_end_ts_field),
            batch_status_field: self.apply(&metadata.batch_status_field),
            staging_filters_field: self.apply(&metadata.staging_filters_field),
        }
    }

    pub fn apply_to_datasets(self, datasets: &Datasets) -> Result<Datasets, SchemaDefinitionError> {
        let convert_opt = |d: &Option<Dataset>| -> Result<Option<Dataset>, SchemaDefinitionError> {
            d.as_ref().map(|d| self.apply_to_dataset(d)).transpose()
        };

        Ok(Datasets {
            main: self.apply_to_dataset(&datasets.main)?,
            staging: self.apply_to_dataset(&datasets.staging)?,
            temp: convert_opt(&datasets.temp)?,
            staging_without_duplicates: convert_opt(&datasets.staging_without_duplicates)?,
            deduplicated_staging: convert_opt(&datasets.deduplicated_staging)?,
            metadata: self.apply_to_metadata(&datasets.metadata),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
