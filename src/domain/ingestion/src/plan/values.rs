// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{MetadataDataset, Selection};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Scalar expression of a logical plan
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `*`
    All,
    Field(FieldValue),
    String(String),
    Integer(i64),
    /// Date-time literal in `YYYY-MM-DD HH:MM:SS` form
    DateTime(String),
    Null,
    /// Start of the current batch, fixed for the whole ingestion pass
    BatchStartTimestamp,
    /// Wall clock of the sink at statement execution
    BatchEndTimestamp,
    /// Id of the current batch: `MAX(id) + 1` over the metadata rows of the
    /// main table, or a literal once the ingestor resolved it
    BatchId {
        metadata: Box<MetadataDataset>,
        table_name: String,
    },
    DataSplitLowerBound,
    DataSplitUpperBound,
    Function {
        name: FunctionName,
        args: Vec<Value>,
    },
    Window {
        name: FunctionName,
        partition_by: Vec<Value>,
        order_by: Vec<OrderedValue>,
    },
    Subquery(Box<Selection>),
    Binary {
        op: BinaryOperator,
        left: Box<Value>,
        right: Box<Value>,
    },
    Aliased {
        value: Box<Value>,
        alias: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    /// Alias of the dataset the field is resolved against
    pub dataset_alias: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionName {
    Count,
    CountDistinct,
    Sum,
    Max,
    Min,
    Coalesce,
    Upper,
    DenseRank,
    RowNumber,
    /// User-defined function available in the sink
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Plus,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderedValue {
    pub value: Value,
    pub descending: bool,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

impl Value {
    pub fn field(dataset_alias: &str, name: impl Into<String>) -> Self {
        Self::Field(FieldValue {
            dataset_alias: Some(dataset_alias.to_string()),
            name: name.into(),
        })
    }

    pub fn unqualified_field(name: impl Into<String>) -> Self {
        Self::Field(FieldValue {
            dataset_alias: None,
            name: name.into(),
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn function(name: FunctionName, args: Vec<Value>) -> Self {
        Self::Function { name, args }
    }

    pub fn count_all() -> Self {
        Self::function(FunctionName::Count, vec![Self::All])
    }

    pub fn max(value: Value) -> Self {
        Self::function(FunctionName::Max, vec![value])
    }

    pub fn min(value: Value) -> Self {
        Self::function(FunctionName::Min, vec![value])
    }

    pub fn coalesce(args: Vec<Value>) -> Self {
        Self::function(FunctionName::Coalesce, args)
    }

    pub fn batch_id(metadata: &MetadataDataset, table_name: impl Into<String>) -> Self {
        Self::BatchId {
            metadata: Box::new(metadata.clone()),
            table_name: table_name.into(),
        }
    }

    pub fn subquery(selection: Selection) -> Self {
        Self::Subquery(Box::new(selection))
    }

    pub fn plus(self, other: Value) -> Self {
        Self::Binary {
            op: BinaryOperator::Plus,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn minus(self, other: Value) -> Self {
        Self::Binary {
            op: BinaryOperator::Minus,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn alias(self, alias: impl Into<String>) -> Self {
        Self::Aliased {
            value: Box::new(self),
            alias: alias.into(),
        }
    }

    /// Field name a selected value is exposed under, if it has one
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Self::Field(f) => Some(&f.name),
            Self::Aliased { alias, .. } => Some(alias),
            _ => None,
        }
    }
}

impl OrderedValue {
    pub fn asc(value: Value) -> Self {
        Self {
            value,
            descending: false,
        }
    }

    pub fn desc(value: Value) -> Self {
        Self {
            value,
            descending: true,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
