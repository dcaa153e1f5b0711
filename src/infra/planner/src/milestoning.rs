// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tidemark_ingestion::*;

use crate::BatchMetadataPlan;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Transaction time columns of a main table and the values they take
pub(crate) struct TransactionMilestones<'a> {
    milestoning: &'a TransactionMilestoning,
    batch: &'a BatchMetadataPlan,
}

impl<'a> TransactionMilestones<'a> {
    pub fn new(milestoning: &'a TransactionMilestoning, batch: &'a BatchMetadataPlan) -> Self {
        Self { milestoning, batch }
    }

    fn infinite_time() -> Value {
        Value::DateTime(INFINITE_BATCH_TIME.to_string())
    }

    /// Row of `alias` is the current version
    pub fn is_open(&self, alias: &str) -> Condition {
        match self.milestoning {
            TransactionMilestoning::BatchId {
                batch_id_out_field, ..
            }
            | TransactionMilestoning::BatchIdAndDateTime {
                batch_id_out_field, ..
            } => Condition::equals(
                Value::field(alias, batch_id_out_field),
                Value::Integer(INFINITE_BATCH_ID),
            ),
            TransactionMilestoning::DateTime {
                date_time_out_field,
                ..
            } => Condition::equals(Value::field(alias, date_time_out_field), Self::infinite_time()),
        }
    }

    /// Row of `alias` was opened by the current batch
    pub fn opened_in_batch(&self, alias: &str) -> Condition {
        match self.milestoning {
            TransactionMilestoning::BatchId {
                batch_id_in_field, ..
            }
            | TransactionMilestoning::BatchIdAndDateTime {
                batch_id_in_field, ..
            } => Condition::equals(Value::field(alias, batch_id_in_field), self.batch.batch_id()),
            TransactionMilestoning::DateTime {
                date_time_in_field, ..
            } => Condition::equals(
                Value::field(alias, date_time_in_field),
                Value::BatchStartTimestamp,
            ),
        }
    }

    /// Row of `alias` was closed by the current batch
    pub fn closed_in_batch(&self, alias: &str) -> Condition {
        match self.milestoning {
            TransactionMilestoning::BatchId {
                batch_id_out_field, ..
            }
            | TransactionMilestoning::BatchIdAndDateTime {
                batch_id_out_field, ..
            } => Condition::equals(
                Value::field(alias, batch_id_out_field),
                self.batch.previous_batch_id(),
            ),
            TransactionMilestoning::DateTime {
                date_time_out_field,
                ..
            } => Condition::equals(
                Value::field(alias, date_time_out_field),
                Value::BatchStartTimestamp,
            ),
        }
    }

    pub fn close_assignments(&self) -> Vec<(String, Value)> {
        let mut assignments = Vec::new();
        if let Some(batch_id_out) = self.milestoning.batch_id_out() {
            assignments.push((batch_id_out.to_string(), self.batch.previous_batch_id()));
        }
        if let Some(time_out) = self.milestoning.date_time_out() {
            assignments.push((time_out.to_string(), Value::BatchStartTimestamp));
        }
        assignments
    }

    /// Columns and values that open a new version
    pub fn open_assignments(&self) -> Vec<(String, Value)> {
        let mut assignments = Vec::new();
        if let (Some(batch_id_in), Some(batch_id_out)) =
            (self.milestoning.batch_id_in(), self.milestoning.batch_id_out())
        {
            assignments.push((batch_id_in.to_string(), self.batch.batch_id()));
            assignments.push((batch_id_out.to_string(), Value::Integer(INFINITE_BATCH_ID)));
        }
        if let (Some(time_in), Some(time_out)) =
            (self.milestoning.date_time_in(), self.milestoning.date_time_out())
        {
            assignments.push((time_in.to_string(), Value::BatchStartTimestamp));
            assignments.push((time_out.to_string(), Self::infinite_time()));
        }
        assignments
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
