// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations a relational sink is able to perform
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
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    Merge,
    AddColumn,
    ImplicitDataTypeConversion,
    ExplicitDataTypeConversion,
    DataTypeLengthChange,
    DataTypeScaleChange,
    ColumnNullabilityChange,
}

/// Schema changes the user allows the engine to apply to main
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
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaEvolutionCapability {
    AddColumn,
    ColumnNullabilityChange,
    DataTypeConversion,
    DataTypeLengthChange,
    DataTypeLengthChangeAllowIncrementOnly,
    DataTypeScaleChange,
    DataTypeScaleChangeAllowIncrementOnly,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
