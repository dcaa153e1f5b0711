// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use itertools::Itertools;
use tidemark_ingestion::*;

use crate::{BatchMetadataPlan, PlannerOptions};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) const SINK: &str = "sink";
pub(crate) const STAGE: &str = "stage";
pub(crate) const TEMP: &str = "temp";
/// Second reference to main inside correlated statistics queries
pub(crate) const SINK_LATEST: &str = "sink_latest";
/// Second reference to main for the versions a batch deletes
pub(crate) const SINK_DELETED: &str = "sink_deleted";

/// Row count of identical staging rows, kept in the deduplicated staging table
pub(crate) const DUPLICATE_COUNT_COLUMN: &str = "tidemark_count";
pub(crate) const VERSION_RANK_COLUMN: &str = "tidemark_rank";

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Resolved datasets and field roles shared by all planning stages
pub(crate) struct PlanningContext<'a> {
    pub mode: &'a IngestMode,
    pub options: &'a PlannerOptions,
    pub capabilities: &'a BTreeSet<Capability>,
    /// Main dataset aliased as `sink`, with its final schema
    pub main: Dataset,
    /// Staging as configured, aliased as `stage`
    pub staging: Dataset,
    /// Table the ingest stage reads: staging or its deduplicated copy
    pub stage: DatasetReference,
    pub stage_schema: SchemaDefinition,
    pub primary_keys: Vec<String>,
    pub batch: BatchMetadataPlan,
    pub deduplicated_staging: DatasetReference,
    pub staging_without_duplicates: DatasetReference,
    pub temp: DatasetReference,
}

impl<'a> PlanningContext<'a> {
    pub fn new(
        mode: &'a IngestMode,
        datasets: &Datasets,
        options: &'a PlannerOptions,
        capabilities: &'a BTreeSet<Capability>,
    ) -> Result<Self, ConfigurationError> {
        mode.validate()?;
        validate_staging_kind(mode, &datasets.staging, options)?;

        let main_reference = datasets.main.reference().clone().with_alias(SINK);
        let staging_reference = datasets.staging.reference().clone().with_alias(STAGE);

        let deduplicated_staging = datasets
            .deduplicated_staging
            .as_ref()
            .map(|d| d.reference().clone())
            .unwrap_or_else(|| {
                staging_reference.sibling(format!("{}_temp_staging", staging_reference.name))
            })
            .with_alias(STAGE);
        let staging_without_duplicates = datasets
            .staging_without_duplicates
            .as_ref()
            .map(|d| d.reference().clone())
            .unwrap_or_else(|| {
                main_reference.sibling(format!(
                    "{}_staging_without_duplicates",
                    main_reference.name
                ))
            })
            .with_alias(STAGE);
        let temp = datasets
            .temp
            .as_ref()
            .map(|d| d.reference().clone())
            .unwrap_or_else(|| main_reference.sibling(format!("{}_temp", main_reference.name)))
            .with_alias(TEMP);

        let staging_schema = datasets.staging.schema();
        if staging_schema.is_empty() {
            return Err(ConfigurationError::new(
                "The staging dataset schema must not be empty",
            ));
        }
        validate_staging_fields(mode, staging_schema)?;

        let (stage, stage_schema) = if mode.deduplication_strategy().is_none() {
            (staging_reference.clone(), staging_schema.clone())
        } else {
            (
                deduplicated_staging.clone(),
                deduplicated_staging_schema(mode, staging_schema)?,
            )
        };

        let main_schema = if datasets.main.schema().is_empty() {
            derive_main_schema(mode, &stage_schema)?
        } else {
            let schema = datasets.main.schema().clone();
            validate_main_fields(mode, &schema)?;
            schema
        };

        let primary_keys = primary_keys(mode, &stage_schema, &main_schema);
        if requires_primary_keys(mode) && primary_keys.is_empty() {
            return Err(ConfigurationError::new("Primary key list must not be empty"));
        }

        let batch = BatchMetadataPlan::new(
            datasets.metadata.clone(),
            &main_reference.name,
            datasets.staging.filters(),
        )?;

        Ok(Self {
            mode,
            options,
            capabilities,
            main: datasets
                .main
                .with_reference(main_reference)
                .with_schema(main_schema),
            staging: datasets.staging.with_reference(staging_reference),
            stage,
            stage_schema,
            primary_keys,
            batch,
            deduplicated_staging,
            staging_without_duplicates,
            temp,
        })
    }

    pub fn main_reference(&self) -> &DatasetReference {
        self.main.reference()
    }

    pub fn main_schema(&self) -> &SchemaDefinition {
        self.main.schema()
    }

    pub fn is_deduplicated(&self) -> bool {
        !self.mode.deduplication_strategy().is_none()
    }

    /// Staging columns copied into main under the same name
    pub fn data_fields(&self) -> Vec<String> {
        let excluded = staging_only_fields(self.mode);
        self.stage_schema
            .fields()
            .iter()
            .filter(|f| !excluded.iter().any(|e| f.has_name(e)))
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn digest(&self) -> Option<&str> {
        self.mode.digest_field()
    }

    pub fn key_match(&self, left: &str, right: &str) -> Option<Condition> {
        fields_match(&self.primary_keys, left, right)
    }

    pub fn digest_match(&self, left: &str, right: &str) -> Option<Condition> {
        self.digest()
            .map(|d| Condition::equals(Value::field(left, d), Value::field(right, d)))
    }

    pub fn digest_differs(&self, left: &str, right: &str) -> Option<Condition> {
        self.digest()
            .map(|d| Condition::not_equals(Value::field(left, d), Value::field(right, d)))
    }

    /// Restricts rows of `alias` to the data split range of the batch
    pub fn data_split_condition(&self, alias: &str) -> Vec<Condition> {
        match self.mode.data_split_field() {
            Some(split) => vec![
                Condition::gte(Value::field(alias, split), Value::DataSplitLowerBound),
                Condition::lte(Value::field(alias, split), Value::DataSplitUpperBound),
            ],
            None => Vec::new(),
        }
    }

    /// Filters of a derived staging dataset, when the ingest stage reads it
    /// directly
    pub fn staging_filter_condition(&self, alias: &str) -> Vec<Condition> {
        if self.is_deduplicated() {
            Vec::new()
        } else {
            filter_conditions(self.staging.filters(), alias)
        }
    }

    /// Rows of the stage visible to the current batch
    pub fn stage_scope(&self) -> Vec<Condition> {
        let mut conditions = self.data_split_condition(STAGE);
        conditions.extend(self.staging_filter_condition(STAGE));
        conditions
    }

    pub fn delete_flagged(&self, alias: &str) -> Option<Condition> {
        match self.mode.merge_strategy()? {
            MergeStrategy::NoDeletes => None,
            MergeStrategy::DeleteIndicator {
                delete_field,
                delete_values,
            } => Some(Condition::In {
                value: Value::field(alias, delete_field),
                list: delete_values.iter().map(Value::string).collect(),
            }),
        }
    }

    pub fn not_delete_flagged(&self, alias: &str) -> Option<Condition> {
        match self.mode.merge_strategy()? {
            MergeStrategy::NoDeletes => None,
            MergeStrategy::DeleteIndicator {
                delete_field,
                delete_values,
            } => Condition::any([
                Condition::NotIn {
                    value: Value::field(alias, delete_field),
                    list: delete_values.iter().map(Value::string).collect(),
                },
                Condition::IsNull(Value::field(alias, delete_field)),
            ]),
        }
    }

    pub fn audit_assignment(&self) -> Option<(String, Value)> {
        self.mode
            .audit_field()
            .map(|f| (f.to_string(), Value::BatchStartTimestamp))
    }

    /// Selection over the stage rows of the batch
    pub fn select_stage(&self, extra: impl IntoIterator<Item = Condition>) -> Selection {
        let mut conditions = self.stage_scope();
        conditions.extend(extra);
        Selection::from(&self.stage).filter(Condition::all(conditions))
    }

    pub fn incoming_record_count(&self) -> Selection {
        let alias = StatisticName::IncomingRecordCount.column_alias();
        let count = match self.mode.deduplication_strategy().count_field() {
            Some(count_field) => Value::coalesce(vec![
                Value::function(
                    FunctionName::Sum,
                    vec![Value::field(STAGE, count_field)],
                ),
                Value::Integer(0),
            ]),
            None => Value::count_all(),
        };
        self.select_stage([]).fields(vec![count.alias(alias)])
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) fn fields_match(fields: &[String], left: &str, right: &str) -> Option<Condition> {
    Condition::all(
        fields
            .iter()
            .map(|f| Condition::equals(Value::field(left, f), Value::field(right, f))),
    )
}

pub(crate) fn count_where(dataset: &DatasetReference, condition: Option<Condition>) -> Selection {
    Selection::from(dataset)
        .fields(vec![Value::count_all()])
        .filter(condition)
}

pub(crate) fn filter_conditions(filters: &[DatasetFilter], alias: &str) -> Vec<Condition> {
    filters
        .iter()
        .map(|filter| {
            let left = Value::field(alias, &filter.field);
            let right = match &filter.value {
                FilterValue::Integer(v) => Value::Integer(*v),
                FilterValue::String(v) => Value::string(v),
            };
            match filter.filter_type {
                FilterType::EqualTo => Condition::equals(left, right),
                FilterType::GreaterThan => Condition::gt(left, right),
                FilterType::GreaterThanEqualTo => Condition::gte(left, right),
                FilterType::LessThan => Condition::lt(left, right),
                FilterType::LessThanEqualTo => Condition::lte(left, right),
            }
        })
        .collect()
}

/// Staging columns that drive the ingestion and never land in main
pub(crate) fn staging_only_fields(mode: &IngestMode) -> Vec<String> {
    let mut fields: Vec<String> = [mode.data_split_field(), mode.delete_field()]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    if let Some(vm) = mode.validity_milestoning() {
        fields.push(vm.derivation().source_from().to_string());
        if let Some(thru) = vm.derivation().source_thru() {
            fields.push(thru.to_string());
        }
    }
    if matches!(
        mode.deduplication_strategy(),
        DeduplicationStrategy::FailOnDuplicates
    ) {
        fields.push(DUPLICATE_COUNT_COLUMN.to_string());
    }
    fields
}

/// Main columns maintained by the engine rather than copied from staging
pub(crate) fn engine_managed_fields(mode: &IngestMode) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    if let Some(tm) = mode.transaction_milestoning() {
        fields.extend(tm.fields().into_iter().map(str::to_string));
    }
    if let Some(vm) = mode.validity_milestoning() {
        fields.push(vm.from_field().to_string());
        fields.push(vm.thru_field().to_string());
    }
    if let Some(audit) = mode.audit_field() {
        fields.push(audit.to_string());
    }
    if let Some(DigestGenStrategy::UdfBased { digest_field, .. }) = mode.digest_gen_strategy() {
        fields.push(digest_field.clone());
    }
    if let IngestMode::BulkLoad(m) = mode {
        fields.push(m.batch_id_field.clone());
    }
    fields
}

fn requires_primary_keys(mode: &IngestMode) -> bool {
    matches!(
        mode,
        IngestMode::NontemporalDelta(_)
            | IngestMode::UnitemporalDelta(_)
            | IngestMode::UnitemporalSnapshot(_)
            | IngestMode::BitemporalDelta(_)
            | IngestMode::BitemporalSnapshot(_)
    )
}

fn primary_keys(
    mode: &IngestMode,
    stage_schema: &SchemaDefinition,
    main_schema: &SchemaDefinition,
) -> Vec<String> {
    let excluded = staging_only_fields(mode)
        .into_iter()
        .chain(engine_managed_fields(mode))
        .collect_vec();

    stage_schema
        .primary_keys()
        .filter(|f| !excluded.iter().any(|e| f.has_name(e)))
        .filter(|f| main_schema.field(&f.name).is_some_and(|m| m.primary_key))
        .map(|f| f.name.clone())
        .collect()
}

fn validate_staging_kind(
    mode: &IngestMode,
    staging: &Dataset,
    options: &PlannerOptions,
) -> Result<(), ConfigurationError> {
    match (mode, staging) {
        (IngestMode::BulkLoad(_), Dataset::StagedFiles(_)) => Ok(()),
        (IngestMode::BulkLoad(_), _) => Err(ConfigurationError::new(
            "BulkLoad requires a staged files dataset as staging",
        )),
        (_, Dataset::StagedFiles(_)) => Err(ConfigurationError::new(format!(
            "Staged files can only be ingested with BulkLoad, not {}",
            mode.name()
        ))),
        (_, Dataset::Derived(_)) if options.cleanup_staging_data => {
            Err(ConfigurationError::new(
                "cleanupStagingData cannot be turned on when using DerivedDataset or \
                 FilteredDataset",
            ))
        }
        _ => Ok(()),
    }
}

fn require_staging_field(schema: &SchemaDefinition, name: &str) -> Result<(), ConfigurationError> {
    if schema.contains(name) {
        Ok(())
    } else {
        Err(ConfigurationError::new(format!(
            "Field \"{name}\" must be present in staging dataset"
        )))
    }
}

fn validate_staging_fields(
    mode: &IngestMode,
    schema: &SchemaDefinition,
) -> Result<(), ConfigurationError> {
    let generated_digest = matches!(
        mode.digest_gen_strategy(),
        Some(DigestGenStrategy::UdfBased { .. })
    );
    if let Some(digest) = mode.digest_field().filter(|_| !generated_digest) {
        require_staging_field(schema, digest)?;
    }
    if let Some(delete) = mode.delete_field() {
        require_staging_field(schema, delete)?;
    }
    let generated_split = matches!(
        mode.deduplication_strategy(),
        DeduplicationStrategy::AnyVersion { .. }
    );
    if let Some(split) = mode.data_split_field().filter(|_| !generated_split) {
        require_staging_field(schema, split)?;
    }
    if let Some(version) = mode.deduplication_strategy().version_field() {
        require_staging_field(schema, version)?;
        if schema.field(version).is_some_and(|f| f.primary_key) {
            return Err(ConfigurationError::new(
                "Versioning field cannot be a primary key",
            ));
        }
    }
    if let Some(vm) = mode.validity_milestoning() {
        require_staging_field(schema, vm.derivation().source_from())?;
        if let Some(thru) = vm.derivation().source_thru() {
            require_staging_field(schema, thru)?;
        }
    }
    if let Some(partitioning) = mode.partitioning() {
        for field in &partitioning.partition_fields {
            require_staging_field(schema, field)?;
        }
    }
    if let Some(DigestGenStrategy::UdfBased {
        fields_to_exclude, ..
    }) = mode.digest_gen_strategy()
    {
        for field in fields_to_exclude {
            require_staging_field(schema, field)?;
        }
    }
    Ok(())
}

fn validate_main_fields(
    mode: &IngestMode,
    schema: &SchemaDefinition,
) -> Result<(), ConfigurationError> {
    let require = |name: &str, primary_key: bool| match schema.field(name) {
        None => Err(ConfigurationError::new(format!(
            "Field \"{name}\" must be present in main dataset"
        ))),
        Some(f) if primary_key && !f.primary_key => Err(ConfigurationError::new(format!(
            "Field \"{name}\" must be a primary key"
        ))),
        Some(_) => Ok(()),
    };

    if let Some(tm) = mode.transaction_milestoning() {
        match tm.batch_id_in() {
            Some(batch_id_in) => require(batch_id_in, true)?,
            None => {
                if let Some(time_in) = tm.date_time_in() {
                    require(time_in, true)?;
                }
            }
        }
        for field in tm.fields() {
            require(field, false)?;
        }
    }
    if let Some(vm) = mode.validity_milestoning() {
        require(vm.from_field(), true)?;
        require(vm.thru_field(), false)?;
    }
    if let IngestMode::BulkLoad(m) = mode {
        require(&m.batch_id_field, false)?;
    }
    Ok(())
}

/// Schema of the deduplicated staging table: staging plus the columns the
/// deduplication strategy fills in
fn deduplicated_staging_schema(
    mode: &IngestMode,
    staging_schema: &SchemaDefinition,
) -> Result<SchemaDefinition, ConfigurationError> {
    let schema = match mode.deduplication_strategy() {
        DeduplicationStrategy::FailOnDuplicates => staging_schema
            .with_field(Field::new(DUPLICATE_COUNT_COLUMN, DataType::Integer).as_not_null())?,
        DeduplicationStrategy::DuplicateCount { count_field } => staging_schema
            .without_fields(&[count_field])
            .with_field(Field::new(count_field, DataType::Integer).as_not_null())?,
        DeduplicationStrategy::AnyVersion { .. } => match mode.data_split_field() {
            Some(split) if !staging_schema.contains(split) => {
                staging_schema.with_field(Field::new(split, DataType::Integer).as_not_null())?
            }
            _ => staging_schema.clone(),
        },
        DeduplicationStrategy::None
        | DeduplicationStrategy::FilterDuplicates
        | DeduplicationStrategy::MaxVersion { .. } => staging_schema.clone(),
    };
    Ok(schema)
}

/// Main schema for a main dataset declared without fields: the staging data
/// columns plus everything the mode maintains
fn derive_main_schema(
    mode: &IngestMode,
    stage_schema: &SchemaDefinition,
) -> Result<SchemaDefinition, ConfigurationError> {
    let excluded = staging_only_fields(mode);
    let mut fields: Vec<Field> = stage_schema
        .fields()
        .iter()
        .filter(|f| !excluded.iter().any(|e| f.has_name(e)))
        .cloned()
        .collect();

    if let Some(DigestGenStrategy::UdfBased { digest_field, .. }) = mode.digest_gen_strategy() {
        fields.push(Field::new(digest_field, DataType::Varchar));
    }
    if let IngestMode::BulkLoad(m) = mode {
        fields.push(Field::new(&m.batch_id_field, DataType::Integer).as_not_null());
    }
    if let Some(vm) = mode.validity_milestoning() {
        fields.push(Field::new(vm.from_field(), DataType::Datetime).as_primary_key());
        fields.push(Field::new(vm.thru_field(), DataType::Datetime));
    }
    if let Some(tm) = mode.transaction_milestoning() {
        if let Some(batch_id_in) = tm.batch_id_in() {
            fields.push(Field::new(batch_id_in, DataType::Integer).as_primary_key());
        }
        if let Some(batch_id_out) = tm.batch_id_out() {
            fields.push(Field::new(batch_id_out, DataType::Integer));
        }
        if let Some(time_in) = tm.date_time_in() {
            let field = Field::new(time_in, DataType::Datetime);
            fields.push(if tm.batch_id_in().is_none() {
                field.as_primary_key()
            } else {
                field
            });
        }
        if let Some(time_out) = tm.date_time_out() {
            fields.push(Field::new(time_out, DataType::Datetime));
        }
    }
    if let Some(audit) = mode.audit_field() {
        fields.push(Field::new(audit, DataType::Datetime).as_not_null());
    }

    Ok(SchemaDefinition::new(fields)?)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
