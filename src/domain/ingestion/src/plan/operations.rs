// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{
    Condition,
    DatasetReference,
    Field,
    SchemaDefinition,
    Selection,
    Source,
    StagedFilesDataset,
    Value,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Ordered list of dialect-independent relational operations
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogicalPlan {
    pub operations: Vec<Operation>,
}

impl LogicalPlan {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }
}

impl FromIterator<Operation> for LogicalPlan {
    fn from_iter<T: IntoIterator<Item = Operation>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create {
        dataset: DatasetReference,
        schema: SchemaDefinition,
        if_not_exists: bool,
    },
    Drop {
        dataset: DatasetReference,
        if_exists: bool,
    },
    Delete {
        dataset: DatasetReference,
        condition: Option<Condition>,
    },
    Insert {
        target: DatasetReference,
        fields: Vec<String>,
        source: Selection,
    },
    Update {
        target: DatasetReference,
        assignments: Vec<(String, Value)>,
        condition: Option<Condition>,
    },
    Merge(Box<MergeOperation>),
    Alter {
        dataset: DatasetReference,
        change: AlterChange,
        field: Field,
    },
    Copy(Box<CopyOperation>),
}

/// Upsert of `source` into `target`: matched rows satisfying
/// `matched_condition` are updated, unmatched rows are inserted
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOperation {
    pub target: DatasetReference,
    pub source: Source,
    pub source_alias: String,
    pub on: Condition,
    pub matched_condition: Option<Condition>,
    pub update_assignments: Vec<(String, Value)>,
    pub insert_fields: Vec<String>,
    pub insert_values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AlterChange {
    AddColumn,
    ChangeDataType,
    MakeNullable,
}

/// Load of staged files into `target`
#[derive(Debug, Clone, PartialEq)]
pub struct CopyOperation {
    pub target: DatasetReference,
    pub source: StagedFilesDataset,
    /// Columns present in the files, in file order
    pub file_fields: Vec<Field>,
    pub digest: Option<CopyDigest>,
    pub batch_id_field: String,
    pub batch_id: Value,
    pub audit_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyDigest {
    pub field: String,
    pub udf_name: String,
    /// File columns the digest is computed over
    pub fields: Vec<String>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
