// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod capability;
mod case_conversion;
mod data_split;
mod dataset;
mod datasets;
mod field;
mod ingest_mode;
mod results;
mod schema;
mod statistics;

pub use capability::*;
pub use case_conversion::*;
pub use data_split::*;
pub use dataset::*;
pub use datasets::*;
pub use field::*;
pub use ingest_mode::*;
pub use results::*;
pub use schema::*;
pub use statistics::*;
