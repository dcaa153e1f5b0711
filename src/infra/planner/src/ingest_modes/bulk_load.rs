// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

use tidemark_ingestion::*;

use super::ModePlan;
use crate::planning_context::*;
use crate::statistics::count_statistic;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Copies staged files into main, stamping every row with the batch id.
///
/// Incoming and error row counts come from the copy itself, only the number
/// of rows that landed in main is queried.
pub(super) fn plan(
    ctx: &PlanningContext<'_>,
    mode: &BulkLoad,
) -> Result<ModePlan, ConfigurationError> {
    let Dataset::StagedFiles(files) = &ctx.staging else {
        return Err(ConfigurationError::new(
            "BulkLoad requires a staged files dataset as staging",
        ));
    };
    if files.files.is_empty() {
        return Err(ConfigurationError::new("The staged file list must not be empty"));
    }

    let digest = match &mode.digest_gen_strategy {
        DigestGenStrategy::UdfBased {
            digest_udf_name,
            digest_field,
            fields_to_exclude,
        } => Some(CopyDigest {
            field: digest_field.clone(),
            udf_name: digest_udf_name.clone(),
            fields: files
                .schema
                .fields()
                .iter()
                .filter(|f| !fields_to_exclude.iter().any(|e| f.has_name(e)))
                .map(|f| f.name.clone())
                .collect(),
        }),
        DigestGenStrategy::NoDigest | DigestGenStrategy::UserProvided { .. } => None,
    };

    let copy = CopyOperation {
        target: ctx.main_reference().without_alias(),
        source: files.clone(),
        file_fields: files.schema.fields().to_vec(),
        digest,
        batch_id_field: mode.batch_id_field.clone(),
        batch_id: ctx.batch.batch_id(),
        audit_field: mode.auditing.field().map(str::to_string),
    };

    let mut post_statistics = BTreeMap::new();
    if ctx.options.collect_statistics {
        post_statistics.extend([count_statistic(
            StatisticName::RowsInserted,
            ctx.main_reference(),
            Some(Condition::equals(
                Value::field(SINK, &mode.batch_id_field),
                ctx.batch.batch_id(),
            )),
        )]);
    }

    Ok(ModePlan {
        ingest: LogicalPlan::new(vec![Operation::Copy(Box::new(copy))]),
        post_statistics,
        ..Default::default()
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
