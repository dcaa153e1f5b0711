// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use assert_matches::assert_matches;
use indoc::indoc;
use pretty_assertions::assert_eq;
use tidemark_relational::*;

use super::harness::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn bulk_load(digest_gen_strategy: DigestGenStrategy) -> IngestMode {
    IngestMode::BulkLoad(BulkLoad {
        batch_id_field: "batch_id".to_string(),
        digest_gen_strategy,
        auditing: Auditing::None,
    })
}

fn udf_digest() -> DigestGenStrategy {
    DigestGenStrategy::UdfBased {
        digest_udf_name: "LAKEHOUSE_MD5".to_string(),
        digest_field: "digest".to_string(),
        fields_to_exclude: Vec::new(),
    }
}

fn staged_files(files: &[PathBuf], format: FileFormat) -> Datasets {
    Datasets::new(
        Dataset::table(DatasetReference::new("employees"), SchemaDefinition::empty()),
        Dataset::StagedFiles(StagedFilesDataset {
            reference: DatasetReference::new("staged_employees"),
            schema: SchemaDefinition::new(vec![
                Field::new("id", DataType::Int).as_not_null(),
                Field::new("name", DataType::Varchar).with_length(16),
            ])
            .unwrap(),
            files: files.iter().map(|f| f.display().to_string()).collect(),
            format,
            options: LoadOptions::default(),
        }),
    )
}

fn with_statistics() -> IngestorOptions {
    IngestorOptions {
        collect_statistics: true,
        ..Default::default()
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_load_csv_files() {
    let harness = SqliteHarness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let first = write_file(
        dir.path(),
        "first.csv",
        indoc!(
            "
            id,name
            1,Andy
            2,Bella
            "
        ),
    );
    let second = write_file(dir.path(), "second.csv", "id,name\n3,Cathy\n");

    let ingestor = harness.ingestor(bulk_load(udf_digest()), with_statistics());
    let results = ingestor
        .perform_full_ingestion(&staged_files(&[first, second], FileFormat::Csv))
        .await
        .unwrap();

    assert_matches!(results.as_slice(), [r] if r.is_success() && r.batch_id == Some(1));
    assert_eq!(
        results[0].statistics,
        BTreeMap::from([
            (StatisticName::IncomingRecordCount, 3),
            (StatisticName::RowsInserted, 3),
            (StatisticName::RowsWithErrors, 0),
        ])
    );
    assert_eq!(
        results[0].updated_datasets.main.schema().field_names(),
        ["id", "name", "digest", "batch_id"]
    );
    assert_eq!(
        harness
            .rows("SELECT id, name, batch_id, LENGTH(digest) FROM employees ORDER BY id")
            .await,
        [
            vec![int(1), text("Andy"), int(1), int(64)],
            vec![int(2), text("Bella"), int(1), int(64)],
            vec![int(3), text("Cathy"), int(1), int(64)],
        ]
    );
    assert_eq!(harness.batches().await, [batch("employees", 1, "DONE")]);
}

#[test_log::test(tokio::test)]
async fn test_load_ndjson_files() {
    let harness = SqliteHarness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(
        dir.path(),
        "employees.json",
        indoc!(
            r#"
            {"id": 1, "name": "Andy"}

            {"name": "Bella", "id": 2}
            "#
        ),
    );

    let ingestor = harness.ingestor(
        bulk_load(DigestGenStrategy::NoDigest),
        IngestorOptions::default(),
    );
    let results = ingestor
        .perform_full_ingestion(&staged_files(&[file], FileFormat::Json))
        .await
        .unwrap();

    assert!(results[0].is_success());
    assert!(results[0].statistics.is_empty());
    assert_eq!(
        harness
            .rows("SELECT id, name, batch_id FROM employees ORDER BY id")
            .await,
        [
            vec![int(1), text("Andy"), int(1)],
            vec![int(2), text("Bella"), int(1)],
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_rows_with_errors_fail_the_batch() {
    let harness = SqliteHarness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(
        dir.path(),
        "employees.csv",
        indoc!(
            "
            id,name
            1,Andy
            x,Bella
            3,Cathy
            "
        ),
    );

    let ingestor = harness.ingestor(bulk_load(DigestGenStrategy::NoDigest), with_statistics());
    let results = ingestor
        .perform_full_ingestion(&staged_files(&[file.clone()], FileFormat::Csv))
        .await
        .unwrap();

    let [result] = results.as_slice() else {
        panic!("Expected a single batch, got {results:?}");
    };
    assert_eq!(result.status, IngestStatus::Failed);
    assert_eq!(
        result.message.as_deref(),
        Some(
            format!(
                "{}, row 3: Cannot convert 'x' to INT for column \"id\"",
                file.display()
            )
            .as_str()
        )
    );
    assert_eq!(result.statistic(StatisticName::IncomingRecordCount), Some(3));
    assert_eq!(result.statistic(StatisticName::RowsWithErrors), Some(1));
    assert_eq!(result.statistic(StatisticName::RowsInserted), Some(2));
    assert_eq!(
        harness.batches().await,
        [batch("employees", 1, FAILED_BATCH_STATUS)]
    );
}

#[test_log::test(tokio::test)]
async fn test_missing_file_fails_the_load() {
    let harness = SqliteHarness::new().await;
    let dir = tempfile::tempdir().unwrap();

    let ingestor = harness.ingestor(
        bulk_load(DigestGenStrategy::NoDigest),
        IngestorOptions::default(),
    );
    let res = ingestor
        .perform_full_ingestion(&staged_files(
            &[dir.path().join("absent.csv")],
            FileFormat::Csv,
        ))
        .await;

    assert_matches!(res, Err(IngestError::Execution(ExecutionError::Internal(_))));
    assert_eq!(harness.count("batch_metadata").await, 0);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Retries
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Fails the first `failures` loads with a transient error
struct FlakyExecutor {
    inner: Arc<dyn RelationalExecutor>,
    failures: u32,
    attempts: AtomicU32,
}

#[async_trait::async_trait]
impl RelationalExecutor for FlakyExecutor {
    async fn execute_statements(&self, statements: &[String]) -> Result<(), ExecutionError> {
        self.inner.execute_statements(statements).await
    }

    async fn query_rows(&self, sql: &str) -> Result<Vec<Row>, ExecutionError> {
        self.inner.query_rows(sql).await
    }

    async fn dataset_exists(&self, dataset: &DatasetReference) -> Result<bool, ExecutionError> {
        self.inner.dataset_exists(dataset).await
    }

    async fn describe_dataset(
        &self,
        dataset: &DatasetReference,
    ) -> Result<SchemaDefinition, ExecutionError> {
        self.inner.describe_dataset(dataset).await
    }

    async fn copy_staged_files(
        &self,
        copy: &CopyOperation,
        context: &TransformContext,
    ) -> Result<CopyOutcome, ExecutionError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(ExecutionError::Transient {
                message: "database is locked".to_string(),
            });
        }
        self.inner.copy_staged_files(copy, context).await
    }
}

fn flaky_ingestor(
    harness: &SqliteHarness,
    failures: u32,
) -> (RelationalIngestor, Arc<FlakyExecutor>) {
    let executor = Arc::new(FlakyExecutor {
        inner: harness.executor.clone(),
        failures,
        attempts: AtomicU32::new(0),
    });
    let options = IngestorOptions {
        bulk_load_retry: BulkLoadRetryPolicy {
            max_retries: 3,
            backoff_ms: 500,
        },
        ..Default::default()
    };
    let ingestor = RelationalIngestor::new(
        bulk_load(DigestGenStrategy::NoDigest),
        options,
        SqliteHarness::sink(),
        executor.clone(),
        harness.time_source.clone(),
    )
    .unwrap();
    (ingestor, executor)
}

#[test_log::test(tokio::test)]
async fn test_transient_failures_are_retried() {
    let harness = SqliteHarness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "employees.csv", "id,name\n1,Andy\n");

    let (ingestor, executor) = flaky_ingestor(&harness, 2);
    let results = ingestor
        .perform_full_ingestion(&staged_files(&[file], FileFormat::Csv))
        .await
        .unwrap();

    assert!(results[0].is_success());
    assert_eq!(executor.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(
        harness.time_source.sleeps(),
        [chrono::Duration::milliseconds(500); 2]
    );
    // Batch start is taken before any wait
    assert_eq!(results[0].ingestion_timestamp_utc, batch_start());
    assert_eq!(harness.count("employees").await, 1);
}

#[test_log::test(tokio::test)]
async fn test_retries_are_bounded() {
    let harness = SqliteHarness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "employees.csv", "id,name\n1,Andy\n");

    let (ingestor, executor) = flaky_ingestor(&harness, 10);
    let res = ingestor
        .perform_full_ingestion(&staged_files(&[file], FileFormat::Csv))
        .await;

    assert_matches!(res, Err(IngestError::Execution(ExecutionError::Transient { .. })));
    assert_eq!(executor.attempts.load(Ordering::SeqCst), 4);
    assert_eq!(harness.time_source.sleeps().len(), 3);
    assert_eq!(harness.count("batch_metadata").await, 0);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
