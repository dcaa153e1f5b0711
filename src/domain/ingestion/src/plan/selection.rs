// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{Condition, DatasetReference, Value};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// `SELECT` of a logical plan. No fields means `*`, no source means a
/// selection of constants.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub source: Option<Source>,
    pub fields: Vec<Value>,
    pub condition: Option<Condition>,
    pub group_by: Vec<Value>,
    pub distinct: bool,
    /// Alias under which the selection is visible when used as a source
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Dataset(DatasetReference),
    Selection(Box<Selection>),
    Join(Box<Join>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: Source,
    pub right: Source,
    pub kind: JoinKind,
    pub on: Condition,
}

impl Selection {
    pub fn from(source: impl Into<Source>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }

    pub fn constants(fields: Vec<Value>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn fields(mut self, fields: Vec<Value>) -> Self {
        self.fields = fields;
        self
    }

    pub fn filter(mut self, condition: Option<Condition>) -> Self {
        self.condition = condition;
        self
    }

    pub fn group_by(mut self, group_by: Vec<Value>) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl From<DatasetReference> for Source {
    fn from(reference: DatasetReference) -> Self {
        Self::Dataset(reference)
    }
}

impl From<&DatasetReference> for Source {
    fn from(reference: &DatasetReference) -> Self {
        Self::Dataset(reference.clone())
    }
}

impl From<Selection> for Source {
    fn from(selection: Selection) -> Self {
        Self::Selection(Box::new(selection))
    }
}

impl From<Join> for Source {
    fn from(join: Join) -> Self {
        Self::Join(Box::new(join))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
