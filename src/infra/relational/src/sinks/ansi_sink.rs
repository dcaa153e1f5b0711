// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use dill::*;
use tidemark_ingestion::*;

use crate::sql::{Dialect, SqlRenderer};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Plain ANSI SQL. Declares no capabilities, so upserts are planned as
/// `UPDATE` + `INSERT` and no schema change can be applied.
pub struct AnsiSink {
    capabilities: BTreeSet<Capability>,
}

#[component(pub)]
#[interface(dyn RelationalSink)]
impl AnsiSink {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeSet::new(),
        }
    }
}

impl Dialect for AnsiSink {
    fn dialect_name(&self) -> &'static str {
        "ANSI"
    }
}

impl RelationalSink for AnsiSink {
    fn name(&self) -> &'static str {
        self.dialect_name()
    }

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    fn supports_implicit_mapping(&self, _main_type: DataType, _staging_type: DataType) -> bool {
        false
    }

    fn supports_explicit_mapping(&self, _main_type: DataType, _staging_type: DataType) -> bool {
        false
    }

    fn transform(
        &self,
        plan: &LogicalPlan,
        context: &TransformContext,
    ) -> Result<Vec<String>, TransformError> {
        SqlRenderer::new(self, context).render_plan(plan)
    }

    fn transform_query(
        &self,
        selection: &Selection,
        context: &TransformContext,
    ) -> Result<String, TransformError> {
        SqlRenderer::new(self, context).selection(selection)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
