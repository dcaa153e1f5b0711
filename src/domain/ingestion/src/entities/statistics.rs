// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

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
pub enum StatisticName {
    IncomingRecordCount,
    RowsInserted,
    RowsUpdated,
    RowsDeleted,
    RowsTerminated,
    RowsWithErrors,
}

impl StatisticName {
    /// Column alias used when the statistic is computed by a query
    pub fn column_alias(self) -> &'static str {
        match self {
            Self::IncomingRecordCount => "incomingRecordCount",
            Self::RowsInserted => "rowsInserted",
            Self::RowsUpdated => "rowsUpdated",
            Self::RowsDeleted => "rowsDeleted",
            Self::RowsTerminated => "rowsTerminated",
            Self::RowsWithErrors => "rowsWithErrors",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
