// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::SchemaDefinition;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Physical location of a table: `[database.][group.]name`, plus the alias it
/// is referred to by inside a statement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetReference {
    pub database: Option<String>,
    pub group: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl DatasetReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            group: None,
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn without_alias(&self) -> Self {
        Self {
            alias: None,
            ..self.clone()
        }
    }

    /// A sibling table in the same database and group
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self {
            database: self.database.clone(),
            group: self.group.clone(),
            name: name.into(),
            alias: None,
        }
    }

    pub fn qualified_name(&self) -> String {
        [self.database.as_deref(), self.group.as_deref(), Some(&self.name)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl std::fmt::Display for DatasetReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDefinition {
    pub reference: DatasetReference,
    pub schema: SchemaDefinition,
}

/// A table viewed through a set of filters, e.g. a slice of a shared staging
/// table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedDataset {
    pub reference: DatasetReference,
    pub schema: SchemaDefinition,
    pub filters: Vec<DatasetFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFilter {
    pub field: String,
    pub filter_type: FilterType,
    pub value: FilterValue,
}

impl DatasetFilter {
    pub fn new(
        field: impl Into<String>,
        filter_type: FilterType,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            filter_type,
            value: value.into(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Deserialize, serde::Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterType {
    EqualTo,
    GreaterThan,
    GreaterThanEqualTo,
    LessThan,
    LessThanEqualTo,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Integer(i64),
    String(String),
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// External files to be bulk-loaded into a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFilesDataset {
    pub reference: DatasetReference,
    pub schema: SchemaDefinition,
    pub files: Vec<String>,
    pub format: FileFormat,
    pub options: LoadOptions,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    serde::Deserialize,
    serde::Serialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "camelCase")]
pub enum FileFormat {
    Csv,
    Json,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadOptions {
    pub delimiter: char,
    pub header: bool,
    pub null_marker: Option<String>,
    /// Location name used by dialects that load through a named stage
    pub stage_location: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            header: true,
            null_marker: None,
            stage_location: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A schema-bearing source or target of an ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dataset {
    Table(DatasetDefinition),
    Derived(DerivedDataset),
    StagedFiles(StagedFilesDataset),
}

impl Dataset {
    pub fn table(reference: DatasetReference, schema: SchemaDefinition) -> Self {
        Self::Table(DatasetDefinition { reference, schema })
    }

    pub fn derived(
        reference: DatasetReference,
        schema: SchemaDefinition,
        filters: Vec<DatasetFilter>,
    ) -> Self {
        Self::Derived(DerivedDataset {
            reference,
            schema,
            filters,
        })
    }

    pub fn reference(&self) -> &DatasetReference {
        match self {
            Self::Table(d) => &d.reference,
            Self::Derived(d) => &d.reference,
            Self::StagedFiles(d) => &d.reference,
        }
    }

    pub fn schema(&self) -> &SchemaDefinition {
        match self {
            Self::Table(d) => &d.schema,
            Self::Derived(d) => &d.schema,
            Self::StagedFiles(d) => &d.schema,
        }
    }

    pub fn filters(&self) -> &[DatasetFilter] {
        match self {
            Self::Derived(d) => &d.filters,
            Self::Table(_) | Self::StagedFiles(_) => &[],
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Derived(_))
    }

    pub fn with_schema(&self, schema: SchemaDefinition) -> Self {
        let mut res = self.clone();
        match &mut res {
            Self::Table(d) => d.schema = schema,
            Self::Derived(d) => d.schema = schema,
            Self::StagedFiles(d) => d.schema = schema,
        }
        res
    }

    pub fn with_reference(&self, reference: DatasetReference) -> Self {
        let mut res = self.clone();
        match &mut res {
            Self::Table(d) => d.reference = reference,
            Self::Derived(d) => d.reference = reference,
            Self::StagedFiles(d) => d.reference = reference,
        }
        res
    }

    pub fn with_alias(&self, alias: &str) -> Self {
        self.with_reference(self.reference().clone().with_alias(alias))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
