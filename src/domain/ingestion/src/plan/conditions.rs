// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{Selection, Value};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqualTo,
    LessThan,
    LessThanEqualTo,
}

/// Boolean predicate of a logical plan
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Compare {
        left: Value,
        op: ComparisonOperator,
        right: Value,
    },
    IsNull(Value),
    IsNotNull(Value),
    In {
        value: Value,
        list: Vec<Value>,
    },
    NotIn {
        value: Value,
        list: Vec<Value>,
    },
    InSelection {
        value: Value,
        selection: Box<Selection>,
    },
    NotInSelection {
        value: Value,
        selection: Box<Selection>,
    },
    Exists(Box<Selection>),
}

impl Condition {
    fn compare(left: Value, op: ComparisonOperator, right: Value) -> Self {
        Self::Compare { left, op, right }
    }

    pub fn equals(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::Equals, right)
    }

    pub fn not_equals(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::NotEquals, right)
    }

    pub fn gt(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::GreaterThan, right)
    }

    pub fn gte(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::GreaterThanEqualTo, right)
    }

    pub fn lt(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::LessThan, right)
    }

    pub fn lte(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::LessThanEqualTo, right)
    }

    pub fn negate(condition: Condition) -> Self {
        Self::Not(Box::new(condition))
    }

    pub fn exists(selection: Selection) -> Self {
        Self::Exists(Box::new(selection))
    }

    pub fn not_exists(selection: Selection) -> Self {
        Self::negate(Self::exists(selection))
    }

    pub fn in_selection(value: Value, selection: Selection) -> Self {
        Self::InSelection {
            value,
            selection: Box::new(selection),
        }
    }

    pub fn not_in_selection(value: Value, selection: Selection) -> Self {
        Self::NotInSelection {
            value,
            selection: Box::new(selection),
        }
    }

    /// Conjunction that collapses trivial cases: `None` when empty, the
    /// condition itself when single
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Option<Self> {
        let mut conditions: Vec<_> = conditions.into_iter().collect();
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Self::And(conditions)),
        }
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Option<Self> {
        let mut conditions: Vec<_> = conditions.into_iter().collect();
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Self::Or(conditions)),
        }
    }

    pub fn and(self, other: Condition) -> Self {
        Self::And(vec![self, other])
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
