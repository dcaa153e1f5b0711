// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod batch_metadata;
mod deduplication;
mod ingest_modes;
mod ingest_plan;
mod milestoning;
mod planner;
mod planner_options;
mod planning_context;
mod schema_evolution;
mod statistics;

pub use batch_metadata::*;
pub use ingest_plan::*;
pub use planner::*;
pub use planner_options::*;
pub use schema_evolution::*;
pub use tidemark_ingestion::*;
