// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use internal_error::InternalError;
use thiserror::Error;
use tidemark_ingestion::{
    ConfigurationError,
    DataSplitRange,
    ExecutionError,
    IncompatibleSchemaChangeError,
    TransformError,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    IncompatibleSchemaChange(#[from] IncompatibleSchemaChangeError),

    #[error(
        "Encountered Duplicates, Failing the batch as Fail on Duplicates is set as Deduplication \
         strategy"
    )]
    Duplicates,

    #[error(
        "Encountered Data errors (same PK, same version but different data), hence failing the \
         batch"
    )]
    DataErrors,

    #[error("Encountered an Empty Batch, FailEmptyBatch is enabled, so failing the batch!")]
    EmptyBatch,

    #[error("Data split ranges {previous} and {next} are out of order or overlap")]
    InvalidDataSplits {
        previous: DataSplitRange,
        next: DataSplitRange,
    },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    IncompatibleSchemaChange(#[from] IncompatibleSchemaChangeError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
