// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use dill::*;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tidemark_relational::*;
use time_source::{SystemTimeSource, SystemTimeSourceStub};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) fn batch_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
}

/// A single-connection in-memory database, so every statement sees the same
/// data for the lifetime of the pool
pub(crate) async fn in_memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) struct SqliteHarness {
    pub pool: SqlitePool,
    pub executor: Arc<dyn RelationalExecutor>,
    pub time_source: Arc<SystemTimeSourceStub>,
}

impl SqliteHarness {
    pub async fn new() -> Self {
        let pool = in_memory_pool().await;

        let mut b = CatalogBuilder::new();
        b.add_value(pool.clone());
        b.add::<SqliteRelationalExecutor>();
        b.add_value(SystemTimeSourceStub::new_set(batch_start()))
            .bind::<dyn SystemTimeSource, SystemTimeSourceStub>();
        let catalog = b.build();

        Self {
            pool,
            executor: catalog.get_one::<dyn RelationalExecutor>().unwrap(),
            time_source: catalog.get_one::<SystemTimeSourceStub>().unwrap(),
        }
    }

    pub fn sink() -> Arc<dyn RelationalSink> {
        Arc::new(SqliteSink::new())
    }

    pub fn ingestor(
        &self,
        ingest_mode: IngestMode,
        options: IngestorOptions,
    ) -> RelationalIngestor {
        RelationalIngestor::new(
            ingest_mode,
            options,
            Self::sink(),
            self.executor.clone(),
            self.time_source.clone(),
        )
        .unwrap()
    }

    pub async fn execute(&self, sql: &str) {
        sqlx::query(sql).execute(&self.pool).await.unwrap();
    }

    pub async fn rows(&self, sql: &str) -> Vec<Row> {
        self.executor.query_rows(sql).await.unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        self.executor
            .query_i64(&format!("SELECT COUNT(*) FROM {table}"))
            .await
            .unwrap()
            .unwrap()
    }

    /// `(table_name, table_batch_id, batch_status)` of every recorded batch
    pub async fn batches(&self) -> Vec<Row> {
        self.rows(
            "SELECT table_name, table_batch_id, batch_status FROM batch_metadata ORDER BY \
             table_batch_id",
        )
        .await
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) fn int(value: i64) -> SqlValue {
    SqlValue::Integer(value)
}

pub(crate) fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

pub(crate) fn batch(table: &str, batch_id: i64, status: &str) -> Row {
    vec![text(table), int(batch_id), text(status)]
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
