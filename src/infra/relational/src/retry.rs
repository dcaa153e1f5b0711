// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::future::Future;

use tidemark_ingestion::ExecutionError;
use time_source::SystemTimeSource;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Bounded retry of transient failures with a fixed backoff. Applies to
/// staged file loading only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct BulkLoadRetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for BulkLoadRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_ms: 1_000,
        }
    }
}

impl BulkLoadRetryPolicy {
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 0,
        }
    }

    pub fn backoff(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.backoff_ms).unwrap_or(i64::MAX))
    }

    /// Runs `operation` until it succeeds, fails with a non-transient error
    /// or runs out of retries. Waits go through `time_source`.
    pub async fn run<T, F, Fut>(
        &self,
        time_source: &dyn SystemTimeSource,
        mut operation: F,
    ) -> Result<T, ExecutionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExecutionError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        "Transient bulk load failure, retrying"
                    );
                    time_source.sleep(self.backoff()).await;
                }
                res => return res,
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
