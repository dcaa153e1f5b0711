// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use crate::ConfigurationError;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub const INFINITE_BATCH_ID: i64 = 999_999_999;
pub const INFINITE_BATCH_TIME: &str = "9999-12-31 23:59:59";
pub const DEFAULT_BATCH_SUCCESS_STATUS: &str = "DONE";

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Declarative description of how staging data is applied to the main
/// dataset
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum IngestMode {
    AppendOnly(AppendOnly),
    NontemporalSnapshot(NontemporalSnapshot),
    NontemporalDelta(NontemporalDelta),
    UnitemporalSnapshot(UnitemporalSnapshot),
    UnitemporalDelta(UnitemporalDelta),
    BitemporalSnapshot(BitemporalSnapshot),
    BitemporalDelta(BitemporalDelta),
    BulkLoad(BulkLoad),
}

/// Inserts every staging row, optionally skipping rows already present
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOnly {
    #[serde(default)]
    pub digest_gen_strategy: DigestGenStrategy,
    #[serde(default)]
    pub auditing: Auditing,
    #[serde(default)]
    pub deduplication_strategy: DeduplicationStrategy,
    #[serde(default)]
    pub filter_existing_records: bool,
    pub data_split_field: Option<String>,
}

/// Replaces the whole content of main with staging
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NontemporalSnapshot {
    #[serde(default)]
    pub auditing: Auditing,
    #[serde(default)]
    pub deduplication_strategy: DeduplicationStrategy,
    #[serde(default)]
    pub empty_dataset_handling: EmptyDatasetHandling,
}

/// Upserts staging rows into main by primary key without keeping history
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NontemporalDelta {
    pub digest_field: String,
    #[serde(default)]
    pub auditing: Auditing,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default)]
    pub deduplication_strategy: DeduplicationStrategy,
    pub data_split_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitemporalSnapshot {
    pub digest_field: String,
    pub transaction_milestoning: TransactionMilestoning,
    #[serde(default)]
    pub partitioning: Partitioning,
    #[serde(default)]
    pub empty_dataset_handling: EmptyDatasetHandling,
    #[serde(default)]
    pub deduplication_strategy: DeduplicationStrategy,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitemporalDelta {
    pub digest_field: String,
    pub transaction_milestoning: TransactionMilestoning,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default)]
    pub deduplication_strategy: DeduplicationStrategy,
    pub data_split_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitemporalSnapshot {
    pub digest_field: String,
    pub transaction_milestoning: TransactionMilestoning,
    pub validity_milestoning: ValidityMilestoning,
    #[serde(default)]
    pub partitioning: Partitioning,
    #[serde(default)]
    pub empty_dataset_handling: EmptyDatasetHandling,
    #[serde(default)]
    pub deduplication_strategy: DeduplicationStrategy,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitemporalDelta {
    pub digest_field: String,
    pub transaction_milestoning: TransactionMilestoning,
    pub validity_milestoning: ValidityMilestoning,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default)]
    pub deduplication_strategy: DeduplicationStrategy,
    pub data_split_field: Option<String>,
}

/// Copies staged files straight into main
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkLoad {
    pub batch_id_field: String,
    #[serde(default)]
    pub digest_gen_strategy: DigestGenStrategy,
    #[serde(default)]
    pub auditing: Auditing,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// How the transaction axis of a row version is recorded
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransactionMilestoning {
    BatchId {
        batch_id_in_field: String,
        batch_id_out_field: String,
    },
    DateTime {
        date_time_in_field: String,
        date_time_out_field: String,
    },
    BatchIdAndDateTime {
        batch_id_in_field: String,
        batch_id_out_field: String,
        date_time_in_field: String,
        date_time_out_field: String,
    },
}

impl TransactionMilestoning {
    pub fn batch_id_in(&self) -> Option<&str> {
        match self {
            Self::BatchId {
                batch_id_in_field, ..
            }
            | Self::BatchIdAndDateTime {
                batch_id_in_field, ..
            } => Some(batch_id_in_field),
            Self::DateTime { .. } => None,
        }
    }

    pub fn batch_id_out(&self) -> Option<&str> {
        match self {
            Self::BatchId {
                batch_id_out_field, ..
            }
            | Self::BatchIdAndDateTime {
                batch_id_out_field, ..
            } => Some(batch_id_out_field),
            Self::DateTime { .. } => None,
        }
    }

    pub fn date_time_in(&self) -> Option<&str> {
        match self {
            Self::DateTime {
                date_time_in_field, ..
            }
            | Self::BatchIdAndDateTime {
                date_time_in_field, ..
            } => Some(date_time_in_field),
            Self::BatchId { .. } => None,
        }
    }

    pub fn date_time_out(&self) -> Option<&str> {
        match self {
            Self::DateTime {
                date_time_out_field,
                ..
            }
            | Self::BatchIdAndDateTime {
                date_time_out_field,
                ..
            } => Some(date_time_out_field),
            Self::BatchId { .. } => None,
        }
    }

    /// All columns maintained by the engine in main
    pub fn fields(&self) -> Vec<&str> {
        [
            self.batch_id_in(),
            self.batch_id_out(),
            self.date_time_in(),
            self.date_time_out(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn map_fields(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::BatchId {
                batch_id_in_field,
                batch_id_out_field,
            } => Self::BatchId {
                batch_id_in_field: f(batch_id_in_field),
                batch_id_out_field: f(batch_id_out_field),
            },
            Self::DateTime {
                date_time_in_field,
                date_time_out_field,
            } => Self::DateTime {
                date_time_in_field: f(date_time_in_field),
                date_time_out_field: f(date_time_out_field),
            },
            Self::BatchIdAndDateTime {
                batch_id_in_field,
                batch_id_out_field,
                date_time_in_field,
                date_time_out_field,
            } => Self::BatchIdAndDateTime {
                batch_id_in_field: f(batch_id_in_field),
                batch_id_out_field: f(batch_id_out_field),
                date_time_in_field: f(date_time_in_field),
                date_time_out_field: f(date_time_out_field),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        for name in self.fields() {
            require_name(name, "transaction milestoning field")?;
        }
        if self.batch_id_in() == self.batch_id_out() && self.batch_id_in().is_some() {
            return Err(ConfigurationError::new(
                "Batch id in and batch id out fields must be different",
            ));
        }
        if self.date_time_in() == self.date_time_out() && self.date_time_in().is_some() {
            return Err(ConfigurationError::new(
                "Date time in and date time out fields must be different",
            ));
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Business validity axis of bitemporal modes
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ValidityMilestoning {
    DateTime {
        date_time_from_field: String,
        date_time_thru_field: String,
        derivation: ValidityDerivation,
    },
}

impl ValidityMilestoning {
    pub fn from_field(&self) -> &str {
        match self {
            Self::DateTime {
                date_time_from_field,
                ..
            } => date_time_from_field,
        }
    }

    pub fn thru_field(&self) -> &str {
        match self {
            Self::DateTime {
                date_time_thru_field,
                ..
            } => date_time_thru_field,
        }
    }

    pub fn derivation(&self) -> &ValidityDerivation {
        match self {
            Self::DateTime { derivation, .. } => derivation,
        }
    }

    fn map_fields(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::DateTime {
                date_time_from_field,
                date_time_thru_field,
                derivation,
            } => Self::DateTime {
                date_time_from_field: f(date_time_from_field),
                date_time_thru_field: f(date_time_thru_field),
                derivation: derivation.map_fields(f),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ValidityDerivation {
    SourceSpecifiesFrom {
        source_date_time_from_field: String,
    },
    SourceSpecifiesFromAndThru {
        source_date_time_from_field: String,
        source_date_time_thru_field: String,
    },
}

impl ValidityDerivation {
    pub fn source_from(&self) -> &str {
        match self {
            Self::SourceSpecifiesFrom {
                source_date_time_from_field,
            }
            | Self::SourceSpecifiesFromAndThru {
                source_date_time_from_field,
                ..
            } => source_date_time_from_field,
        }
    }

    pub fn source_thru(&self) -> Option<&str> {
        match self {
            Self::SourceSpecifiesFrom { .. } => None,
            Self::SourceSpecifiesFromAndThru {
                source_date_time_thru_field,
                ..
            } => Some(source_date_time_thru_field),
        }
    }

    fn map_fields(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::SourceSpecifiesFrom {
                source_date_time_from_field,
            } => Self::SourceSpecifiesFrom {
                source_date_time_from_field: f(source_date_time_from_field),
            },
            Self::SourceSpecifiesFromAndThru {
                source_date_time_from_field,
                source_date_time_thru_field,
            } => Self::SourceSpecifiesFromAndThru {
                source_date_time_from_field: f(source_date_time_from_field),
                source_date_time_thru_field: f(source_date_time_thru_field),
            },
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MergeStrategy {
    #[default]
    NoDeletes,
    /// Staging rows whose `delete_field` holds one of `delete_values` remove
    /// (or terminate) the matching main rows
    DeleteIndicator {
        delete_field: String,
        delete_values: Vec<String>,
    },
}

impl MergeStrategy {
    pub fn delete_field(&self) -> Option<&str> {
        match self {
            Self::NoDeletes => None,
            Self::DeleteIndicator { delete_field, .. } => Some(delete_field),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DeduplicationStrategy {
    #[default]
    None,
    FilterDuplicates,
    FailOnDuplicates,
    MaxVersion {
        version_field: String,
    },
    DuplicateCount {
        count_field: String,
    },
    /// Keeps every version and numbers them into the data split field
    AnyVersion {
        version_field: String,
    },
}

impl DeduplicationStrategy {
    pub fn version_field(&self) -> Option<&str> {
        match self {
            Self::MaxVersion { version_field } | Self::AnyVersion { version_field } => {
                Some(version_field)
            }
            Self::None
            | Self::FilterDuplicates
            | Self::FailOnDuplicates
            | Self::DuplicateCount { .. } => {
                None
            }
        }
    }

    pub fn count_field(&self) -> Option<&str> {
        match self {
            Self::DuplicateCount { count_field } => Some(count_field),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    fn map_fields(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::None => Self::None,
            Self::FilterDuplicates => Self::FilterDuplicates,
            Self::FailOnDuplicates => Self::FailOnDuplicates,
            Self::MaxVersion { version_field } => Self::MaxVersion {
                version_field: f(version_field),
            },
            Self::DuplicateCount { count_field } => Self::DuplicateCount {
                count_field: f(count_field),
            },
            Self::AnyVersion { version_field } => Self::AnyVersion {
                version_field: f(version_field),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DigestGenStrategy {
    #[default]
    NoDigest,
    UserProvided {
        digest_field: String,
    },
    UdfBased {
        digest_udf_name: String,
        digest_field: String,
        #[serde(default)]
        fields_to_exclude: Vec<String>,
    },
}

impl DigestGenStrategy {
    pub fn digest_field(&self) -> Option<&str> {
        match self {
            Self::NoDigest => None,
            Self::UserProvided { digest_field } | Self::UdfBased { digest_field, .. } => {
                Some(digest_field)
            }
        }
    }

    fn map_fields(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::NoDigest => Self::NoDigest,
            Self::UserProvided { digest_field } => Self::UserProvided {
                digest_field: f(digest_field),
            },
            Self::UdfBased {
                digest_udf_name,
                digest_field,
                fields_to_exclude,
            } => Self::UdfBased {
                digest_udf_name: digest_udf_name.clone(),
                digest_field: f(digest_field),
                fields_to_exclude: fields_to_exclude.iter().map(|s| f(s)).collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Auditing {
    #[default]
    None,
    /// Stamps every written row with the batch start time
    DateTime { date_time_field: String },
}

impl Auditing {
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::DateTime { date_time_field } => Some(date_time_field),
        }
    }

    fn map_fields(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::None => Self::None,
            Self::DateTime { date_time_field } => Self::DateTime {
                date_time_field: f(date_time_field),
            },
        }
    }
}

/// What a snapshot mode does when staging is empty
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    strum::Display,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "camelCase")]
pub enum EmptyDatasetHandling {
    /// Deletes or terminates the rows in scope: every row when unpartitioned,
    /// the explicit partition values when given, nothing when partitions are
    /// derived from the (empty) staging data
    #[default]
    DeleteTargetData,
    NoOp,
    Fail,
}

/// Restricts snapshot modes to a subset of main
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Partitioning {
    pub partition_fields: Vec<String>,
    pub partition_values_by_field: BTreeMap<String, Vec<String>>,
}

impl Partitioning {
    pub fn is_partitioned(&self) -> bool {
        !self.partition_fields.is_empty()
    }

    pub fn has_explicit_values(&self) -> bool {
        !self.partition_values_by_field.is_empty()
    }

    fn map_fields(&self, f: &impl Fn(&str) -> String) -> Self {
        Self {
            partition_fields: self.partition_fields.iter().map(|s| f(s)).collect(),
            partition_values_by_field: self
                .partition_values_by_field
                .iter()
                .map(|(k, v)| (f(k), v.clone()))
                .collect(),
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        for field in &self.partition_fields {
            require_name(field, "partition field")?;
        }
        for (field, values) in &self.partition_values_by_field {
            if !self.partition_fields.contains(field) {
                return Err(ConfigurationError::new(format!(
                    "Partition values provided for field \"{field}\" which is not a partition field"
                )));
            }
            if values.is_empty() {
                return Err(ConfigurationError::new(format!(
                    "Partition values for field \"{field}\" must not be empty"
                )));
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

impl IngestMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppendOnly(_) => "AppendOnly",
            Self::NontemporalSnapshot(_) => "NontemporalSnapshot",
            Self::NontemporalDelta(_) => "NontemporalDelta",
            Self::UnitemporalSnapshot(_) => "UnitemporalSnapshot",
            Self::UnitemporalDelta(_) => "UnitemporalDelta",
            Self::BitemporalSnapshot(_) => "BitemporalSnapshot",
            Self::BitemporalDelta(_) => "BitemporalDelta",
            Self::BulkLoad(_) => "BulkLoad",
        }
    }

    /// Digest column shared by staging and main, if any
    pub fn digest_field(&self) -> Option<&str> {
        match self {
            Self::AppendOnly(m) => m.digest_gen_strategy.digest_field(),
            Self::BulkLoad(m) => m.digest_gen_strategy.digest_field(),
            Self::NontemporalSnapshot(_) => None,
            Self::NontemporalDelta(m) => Some(&m.digest_field),
            Self::UnitemporalSnapshot(m) => Some(&m.digest_field),
            Self::UnitemporalDelta(m) => Some(&m.digest_field),
            Self::BitemporalSnapshot(m) => Some(&m.digest_field),
            Self::BitemporalDelta(m) => Some(&m.digest_field),
        }
    }

    pub fn digest_gen_strategy(&self) -> Option<&DigestGenStrategy> {
        match self {
            Self::AppendOnly(m) => Some(&m.digest_gen_strategy),
            Self::BulkLoad(m) => Some(&m.digest_gen_strategy),
            _ => None,
        }
    }

    pub fn data_split_field(&self) -> Option<&str> {
        match self {
            Self::AppendOnly(m) => m.data_split_field.as_deref(),
            Self::NontemporalDelta(m) => m.data_split_field.as_deref(),
            Self::UnitemporalDelta(m) => m.data_split_field.as_deref(),
            Self::BitemporalDelta(m) => m.data_split_field.as_deref(),
            Self::NontemporalSnapshot(_)
            | Self::UnitemporalSnapshot(_)
            | Self::BitemporalSnapshot(_)
            | Self::BulkLoad(_) => None,
        }
    }

    pub fn deduplication_strategy(&self) -> &DeduplicationStrategy {
        const NONE: &DeduplicationStrategy = &DeduplicationStrategy::None;
        match self {
            Self::AppendOnly(m) => &m.deduplication_strategy,
            Self::NontemporalSnapshot(m) => &m.deduplication_strategy,
            Self::NontemporalDelta(m) => &m.deduplication_strategy,
            Self::UnitemporalSnapshot(m) => &m.deduplication_strategy,
            Self::UnitemporalDelta(m) => &m.deduplication_strategy,
            Self::BitemporalSnapshot(m) => &m.deduplication_strategy,
            Self::BitemporalDelta(m) => &m.deduplication_strategy,
            Self::BulkLoad(_) => NONE,
        }
    }

    pub fn merge_strategy(&self) -> Option<&MergeStrategy> {
        match self {
            Self::NontemporalDelta(m) => Some(&m.merge_strategy),
            Self::UnitemporalDelta(m) => Some(&m.merge_strategy),
            Self::BitemporalDelta(m) => Some(&m.merge_strategy),
            _ => None,
        }
    }

    pub fn delete_field(&self) -> Option<&str> {
        self.merge_strategy().and_then(MergeStrategy::delete_field)
    }

    pub fn transaction_milestoning(&self) -> Option<&TransactionMilestoning> {
        match self {
            Self::UnitemporalSnapshot(m) => Some(&m.transaction_milestoning),
            Self::UnitemporalDelta(m) => Some(&m.transaction_milestoning),
            Self::BitemporalSnapshot(m) => Some(&m.transaction_milestoning),
            Self::BitemporalDelta(m) => Some(&m.transaction_milestoning),
            _ => None,
        }
    }

    pub fn validity_milestoning(&self) -> Option<&ValidityMilestoning> {
        match self {
            Self::BitemporalSnapshot(m) => Some(&m.validity_milestoning),
            Self::BitemporalDelta(m) => Some(&m.validity_milestoning),
            _ => None,
        }
    }

    pub fn auditing(&self) -> Option<&Auditing> {
        match self {
            Self::AppendOnly(m) => Some(&m.auditing),
            Self::NontemporalSnapshot(m) => Some(&m.auditing),
            Self::NontemporalDelta(m) => Some(&m.auditing),
            Self::BulkLoad(m) => Some(&m.auditing),
            _ => None,
        }
    }

    pub fn audit_field(&self) -> Option<&str> {
        self.auditing().and_then(Auditing::field)
    }

    pub fn partitioning(&self) -> Option<&Partitioning> {
        match self {
            Self::UnitemporalSnapshot(m) => Some(&m.partitioning),
            Self::BitemporalSnapshot(m) => Some(&m.partitioning),
            _ => None,
        }
    }

    pub fn empty_dataset_handling(&self) -> Option<EmptyDatasetHandling> {
        match self {
            Self::NontemporalSnapshot(m) => Some(m.empty_dataset_handling),
            Self::UnitemporalSnapshot(m) => Some(m.empty_dataset_handling),
            Self::BitemporalSnapshot(m) => Some(m.empty_dataset_handling),
            _ => None,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.empty_dataset_handling().is_some()
    }

    /// Checks the mode in isolation, before any dataset is looked at
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some(digest) = self.digest_field() {
            require_name(digest, "digest field")?;
        }
        if let Some(split) = self.data_split_field() {
            require_name(split, "data split field")?;
        }
        if let Some(MergeStrategy::DeleteIndicator {
            delete_field,
            delete_values,
        }) = self.merge_strategy()
        {
            require_name(delete_field, "delete indicator field")?;
            if delete_values.is_empty() {
                return Err(ConfigurationError::new(
                    "Delete indicator values must not be empty",
                ));
            }
        }
        if let Some(tm) = self.transaction_milestoning() {
            tm.validate()?;
        }
        if let Some(partitioning) = self.partitioning() {
            partitioning.validate()?;
        }

        match self.deduplication_strategy() {
            DeduplicationStrategy::AnyVersion { version_field } => {
                require_name(version_field, "version field")?;
                match self {
                    Self::AppendOnly(_)
                    | Self::NontemporalDelta(_)
                    | Self::UnitemporalDelta(_)
                    | Self::BitemporalDelta(_) => {}
                    _ => {
                        return Err(ConfigurationError::new(format!(
                            "AnyVersion deduplication is not supported by {}",
                            self.name()
                        )));
                    }
                }
                if self.data_split_field().is_none() {
                    return Err(ConfigurationError::new(
                        "Data split field must be provided when using AnyVersion deduplication",
                    ));
                }
            }
            DeduplicationStrategy::MaxVersion { version_field } => {
                require_name(version_field, "version field")?;
            }
            DeduplicationStrategy::DuplicateCount { count_field } => {
                require_name(count_field, "duplicate count field")?;
            }
            DeduplicationStrategy::None
            | DeduplicationStrategy::FilterDuplicates
            | DeduplicationStrategy::FailOnDuplicates => {}
        }

        match self {
            Self::AppendOnly(m) => {
                if m.filter_existing_records
                    && matches!(m.digest_gen_strategy, DigestGenStrategy::NoDigest)
                {
                    return Err(ConfigurationError::new(
                        "Primary keys and digest are mandatory for filterExistingRecords",
                    ));
                }
            }
            Self::BitemporalSnapshot(m) => {
                if m.validity_milestoning.derivation().source_thru().is_none() {
                    return Err(ConfigurationError::new(
                        "BitemporalSnapshot requires the source to specify both validity from \
                         and thru",
                    ));
                }
            }
            Self::BulkLoad(m) => {
                require_name(&m.batch_id_field, "batch id field")?;
                if let DigestGenStrategy::UdfBased {
                    digest_udf_name, ..
                } = &m.digest_gen_strategy
                {
                    require_name(digest_udf_name, "digest UDF name")?;
                }
            }
            _ => {}
        }

        if let Some(vm) = self.validity_milestoning() {
            require_name(vm.from_field(), "validity from field")?;
            require_name(vm.thru_field(), "validity thru field")?;
            require_name(vm.derivation().source_from(), "source validity from field")?;
        }

        Ok(())
    }

    /// Returns a copy of the mode with every column reference renamed
    pub fn map_fields(&self, f: impl Fn(&str) -> String) -> Self {
        let f = &f;
        let opt = |s: &Option<String>| s.as_deref().map(f);
        match self {
            Self::AppendOnly(m) => Self::AppendOnly(AppendOnly {
                digest_gen_strategy: m.digest_gen_strategy.map_fields(f),
                auditing: m.auditing.map_fields(f),
                deduplication_strategy: m.deduplication_strategy.map_fields(f),
                filter_existing_records: m.filter_existing_records,
                data_split_field: opt(&m.data_split_field),
            }),
            Self::NontemporalSnapshot(m) => Self::NontemporalSnapshot(NontemporalSnapshot {
                auditing: m.auditing.map_fields(f),
                deduplication_strategy: m.deduplication_strategy.map_fields(f),
                empty_dataset_handling: m.empty_dataset_handling,
            }),
            Self::NontemporalDelta(m) => Self::NontemporalDelta(NontemporalDelta {
                digest_field: f(&m.digest_field),
                auditing: m.auditing.map_fields(f),
                merge_strategy: map_merge_strategy(&m.merge_strategy, f),
                deduplication_strategy: m.deduplication_strategy.map_fields(f),
                data_split_field: opt(&m.data_split_field),
            }),
            Self::UnitemporalSnapshot(m) => Self::UnitemporalSnapshot(UnitemporalSnapshot {
                digest_field: f(&m.digest_field),
                transaction_milestoning: m.transaction_milestoning.map_fields(f),
                partitioning: m.partitioning.map_fields(f),
                empty_dataset_handling: m.empty_dataset_handling,
                deduplication_strategy: m.deduplication_strategy.map_fields(f),
            }),
            Self::UnitemporalDelta(m) => Self::UnitemporalDelta(UnitemporalDelta {
                digest_field: f(&m.digest_field),
                transaction_milestoning: m.transaction_milestoning.map_fields(f),
                merge_strategy: map_merge_strategy(&m.merge_strategy, f),
                deduplication_strategy: m.deduplication_strategy.map_fields(f),
                data_split_field: opt(&m.data_split_field),
            }),
            Self::BitemporalSnapshot(m) => Self::BitemporalSnapshot(BitemporalSnapshot {
                digest_field: f(&m.digest_field),
                transaction_milestoning: m.transaction_milestoning.map_fields(f),
                validity_milestoning: m.validity_milestoning.map_fields(f),
                partitioning: m.partitioning.map_fields(f),
                empty_dataset_handling: m.empty_dataset_handling,
                deduplication_strategy: m.deduplication_strategy.map_fields(f),
            }),
            Self::BitemporalDelta(m) => Self::BitemporalDelta(BitemporalDelta {
                digest_field: f(&m.digest_field),
                transaction_milestoning: m.transaction_milestoning.map_fields(f),
                validity_milestoning: m.validity_milestoning.map_fields(f),
                merge_strategy: map_merge_strategy(&m.merge_strategy, f),
                deduplication_strategy: m.deduplication_strategy.map_fields(f),
                data_split_field: opt(&m.data_split_field),
            }),
            Self::BulkLoad(m) => Self::BulkLoad(BulkLoad {
                batch_id_field: f(&m.batch_id_field),
                digest_gen_strategy: m.digest_gen_strategy.map_fields(f),
                auditing: m.auditing.map_fields(f),
            }),
        }
    }
}

fn map_merge_strategy(strategy: &MergeStrategy, f: &impl Fn(&str) -> String) -> MergeStrategy {
    match strategy {
        MergeStrategy::NoDeletes => MergeStrategy::NoDeletes,
        MergeStrategy::DeleteIndicator {
            delete_field,
            delete_values,
        } => MergeStrategy::DeleteIndicator {
            delete_field: f(delete_field),
            delete_values: delete_values.clone(),
        },
    }
}

fn require_name(name: &str, what: &str) -> Result<(), ConfigurationError> {
    if name.trim().is_empty() {
        Err(ConfigurationError::new(format!("The {what} must not be empty")))
    } else {
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
