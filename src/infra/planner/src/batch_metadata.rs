// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tidemark_ingestion::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Bookkeeping of batches of one main table in the metadata dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMetadataPlan {
    pub metadata: MetadataDataset,
    pub table_name: String,
    /// JSON of the derived staging filters, recorded with every batch
    pub staging_filters: Option<String>,
}

impl BatchMetadataPlan {
    pub fn new(
        metadata: MetadataDataset,
        table_name: impl Into<String>,
        staging_filters: &[DatasetFilter],
    ) -> Result<Self, ConfigurationError> {
        let staging_filters = if staging_filters.is_empty() {
            None
        } else {
            Some(serde_json::to_string(staging_filters).map_err(|e| {
                ConfigurationError::new(format!("Staging filters cannot be serialized: {e}"))
            })?)
        };

        Ok(Self {
            metadata,
            table_name: table_name.into(),
            staging_filters,
        })
    }

    pub fn create(&self) -> Result<Operation, ConfigurationError> {
        Ok(Operation::Create {
            dataset: self.metadata.reference().without_alias(),
            schema: self.metadata.schema()?,
            if_not_exists: true,
        })
    }

    /// Current batch id, valid until the batch row is inserted
    pub fn batch_id(&self) -> Value {
        Value::batch_id(&self.metadata, &self.table_name)
    }

    pub fn previous_batch_id(&self) -> Value {
        self.batch_id().minus(Value::Integer(1))
    }

    /// Selection yielding the id the next batch will get
    pub fn next_batch_id(&self) -> Selection {
        Selection::constants(vec![self.batch_id().alias("nextBatchId")])
    }

    pub fn insert_batch(&self, status: &str) -> LogicalPlan {
        let md = &self.metadata;

        let mut fields = vec![
            md.table_name_field.clone(),
            md.table_batch_id_field.clone(),
            md.batch_start_ts_field.clone(),
            md.batch_end_ts_field.clone(),
            md.batch_status_field.clone(),
        ];
        let mut values = vec![
            Value::string(&self.table_name),
            self.batch_id(),
            Value::BatchStartTimestamp,
            Value::BatchEndTimestamp,
            Value::string(status),
        ];
        if let Some(filters) = &self.staging_filters {
            fields.push(md.staging_filters_field.clone());
            values.push(Value::string(filters));
        }

        LogicalPlan::new(vec![Operation::Insert {
            target: md.reference().without_alias(),
            fields,
            source: Selection::constants(values),
        }])
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
