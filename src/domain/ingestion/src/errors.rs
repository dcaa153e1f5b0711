// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

use crate::{DataType, SchemaDefinitionError};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Invalid ingest mode, options, capabilities or datasets. Always raised
/// before any statement is executed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ConfigurationError {
    pub message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<SchemaDefinitionError> for ConfigurationError {
    fn from(e: SchemaDefinitionError) -> Self {
        Self::new(e.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Staging schema can't be reconciled with main under the granted
/// capabilities
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct IncompatibleSchemaChangeError {
    pub message: String,
    pub main_type: Option<DataType>,
    pub staging_type: Option<DataType>,
}

impl IncompatibleSchemaChangeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            main_type: None,
            staging_type: None,
        }
    }

    pub fn breaking_change(main_type: DataType, staging_type: DataType) -> Self {
        Self {
            message: format!(
                "Breaking schema change from datatype \"{main_type}\" to \"{staging_type}\""
            ),
            main_type: Some(main_type),
            staging_type: Some(staging_type),
        }
    }

    pub fn explicit_conversion_not_allowed(main_type: DataType, staging_type: DataType) -> Self {
        Self {
            message: format!(
                "Explicit data type conversion from \"{main_type}\" to \"{staging_type}\" \
                 couldn't be performed since user capability does not allow it"
            ),
            main_type: Some(main_type),
            staging_type: Some(staging_type),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Dataset is not found: {dataset_name}")]
pub struct DatasetNotFoundError {
    pub dataset_name: String,
}

impl DatasetNotFoundError {
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
