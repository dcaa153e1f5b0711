// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Semantic data type of a column. Sinks map these onto their physical
/// type names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    serde::Deserialize,
    serde::Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Int,
    Integer,
    Bigint,
    Tinyint,
    Smallint,
    Int64,
    Number,
    Numeric,
    Decimal,
    Float,
    Double,
    Real,
    Float64,
    Char,
    Varchar,
    Longvarchar,
    Longtext,
    Text,
    String,
    Date,
    Time,
    Datetime,
    Timestamp,
    TimestampNtz,
    TimestampTz,
    TimestampLtz,
    Boolean,
    Bool,
    Json,
    Variant,
    Binary,
    Varbinary,
    Bytes,
}

impl DataType {
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Int | Self::Integer | Self::Bigint | Self::Tinyint | Self::Smallint | Self::Int64
        )
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::Varchar
                | Self::Longvarchar
                | Self::Longtext
                | Self::Text
                | Self::String
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::Date
                | Self::Time
                | Self::Datetime
                | Self::Timestamp
                | Self::TimestampNtz
                | Self::TimestampTz
                | Self::TimestampLtz
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double | Self::Real | Self::Float64)
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, Self::Boolean | Self::Bool)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldType {
    pub data_type: DataType,
    pub length: Option<u32>,
    pub scale: Option<u32>,
}

impl FieldType {
    pub fn of(data_type: DataType) -> Self {
        Self {
            data_type,
            length: None,
            scale: None,
        }
    }
}

impl From<DataType> for FieldType {
    fn from(data_type: DataType) -> Self {
        Self::of(data_type)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.length, self.scale) {
            (Some(length), Some(scale)) => write!(f, "{}({length},{scale})", self.data_type),
            (Some(length), None) => write!(f, "{}({length})", self.data_type),
            (None, _) => write!(f, "{}", self.data_type),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A column of a dataset. Identity is the name.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    pub alias: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            nullable: true,
            primary_key: false,
            alias: None,
        }
    }

    /// Primary key columns are implicitly NOT NULL
    pub fn as_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn as_not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn as_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.field_type.length = Some(length);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.field_type.scale = Some(scale);
        self
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn data_type(&self) -> DataType {
        self.field_type.data_type
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
