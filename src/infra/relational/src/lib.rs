// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod errors;
mod generator;
mod ingestor;
mod ingestor_options;
mod retry;
mod schema_evolution_service;
mod sinks;
mod sql;
mod sqlite;

pub use errors::*;
pub use generator::*;
pub use ingestor::*;
pub use ingestor_options::*;
pub use retry::*;
pub use schema_evolution_service::*;
pub use sinks::*;
pub use sqlite::*;
pub use tidemark_planner::*;
