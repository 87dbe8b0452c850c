//! Batch pipeline behaviour with a scripted fetcher

mod common;

use async_trait::async_trait;
use common::{pipeline_for, zip_entry_names, ScriptedFetcher, Step};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tapedeck::core::types::parse_source_list;
use tapedeck::download::{BatchError, BatchFetchPipeline, FetchError, FetchOutcome, WorkerPool};
use tapedeck::storage::{ArchiveArtifact, ArchiveWriter};
use tapedeck::AppError;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

#[tokio::test]
async fn all_fetches_succeed_gives_one_entry_each() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with("https://a.test/1", Step::produce("Song1"))
            .with("https://a.test/2", Step::produce("Song2"))
            .with("https://a.test/3", Step::produce("Song3")),
    );
    let pipeline = pipeline_for(Arc::clone(&fetcher), root.path(), 4, TIMEOUT);

    let ids = parse_source_list("https://a.test/1,https://a.test/2,https://a.test/3");
    let batch = pipeline.run(&ids).await.unwrap();

    assert_eq!(
        sorted(zip_entry_names(batch.archive_path())),
        vec!["Song1.mp3", "Song2.mp3", "Song3.mp3"]
    );
    assert_eq!(batch.artifact.len(), 3);
    assert_eq!(batch.failed(), 0);
    assert_eq!(fetcher.calls(), 3);
    assert_eq!(batch.artifact.file_name(), "downloaded_mp3s.zip");
}

#[tokio::test]
async fn mixed_results_keep_only_successes() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with("https://a.test/1", Step::produce("Song1"))
            .with("https://a.test/2", Step::fail("Video unavailable")),
    );
    let pipeline = pipeline_for(fetcher, root.path(), 2, TIMEOUT);

    let ids = parse_source_list("https://a.test/1, https://a.test/2");
    let batch = pipeline.run(&ids).await.unwrap();

    assert_eq!(zip_entry_names(batch.archive_path()), vec!["Song1.mp3"]);
    assert_eq!(batch.failed(), 1);

    let failed: Vec<&FetchOutcome> = batch.outcomes.iter().filter(|o| !o.is_fetched()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].identifier().as_str(), "https://a.test/2");
    match failed[0] {
        FetchOutcome::Failed { error, .. } => assert_eq!(error.subcategory(), "unavailable"),
        FetchOutcome::Fetched { .. } => unreachable!(),
    }
}

#[tokio::test]
async fn all_failures_give_no_valid_results_and_clean_up() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with("https://a.test/1", Step::fail("gone"))
            .with("https://a.test/2", Step::fail("gone")),
    );
    let pipeline = pipeline_for(Arc::clone(&fetcher), root.path(), 2, TIMEOUT);

    let ids = parse_source_list("https://a.test/1,https://a.test/2");
    let err = pipeline.run(&ids).await.unwrap_err();

    assert!(matches!(err, BatchError::NoValidResults));
    assert_eq!(err.to_string(), "No valid MP3 files were downloaded");
    assert_eq!(fetcher.calls(), 2);
    // Job directory and any archive are gone.
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn empty_input_attempts_nothing() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());
    let pipeline = pipeline_for(Arc::clone(&fetcher), root.path(), 2, TIMEOUT);

    for raw in ["", "   ", " , ,, "] {
        let ids = parse_source_list(raw);
        let err = pipeline.run(&ids).await.unwrap_err();
        assert!(matches!(err, BatchError::EmptyInput), "input {:?}", raw);
    }

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn repeated_runs_are_independent() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new().with("https://a.test/1", Step::produce("Song1")));
    let pipeline = pipeline_for(Arc::clone(&fetcher), root.path(), 2, TIMEOUT);
    let ids = parse_source_list("https://a.test/1");

    let first = pipeline.run(&ids).await.unwrap();
    let second = pipeline.run(&ids).await.unwrap();

    assert_ne!(first.job().path(), second.job().path());
    assert_ne!(first.archive_path(), second.archive_path());
    assert_eq!(zip_entry_names(first.archive_path()), vec!["Song1.mp3"]);
    assert_eq!(zip_entry_names(second.archive_path()), vec!["Song1.mp3"]);

    let first_dir = first.job().path().to_path_buf();
    drop(first);
    assert!(!first_dir.exists());
    assert!(second.archive_path().is_file());
}

#[tokio::test]
async fn repeated_titles_in_one_batch_all_packaged() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with("https://a.test/1", Step::produce("Same"))
            .with("https://a.test/2", Step::produce("Same")),
    );
    let pipeline = pipeline_for(Arc::clone(&fetcher), root.path(), 2, TIMEOUT);

    let batch = pipeline
        .run(&parse_source_list("https://a.test/1,https://a.test/2"))
        .await
        .unwrap();

    assert_eq!(
        sorted(zip_entry_names(batch.archive_path())),
        vec!["Same (2).mp3", "Same.mp3"]
    );
    // Every task wrote into its own directory.
    let dirs = fetcher.seen_dirs();
    assert_eq!(dirs.len(), 2);
    assert_ne!(dirs[0], dirs[1]);
}

#[tokio::test]
async fn timed_out_fetch_counts_as_failure() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with("https://a.test/fast", Step::produce("Fast"))
            .with("https://a.test/stuck", Step::Hang),
    );
    let pipeline = pipeline_for(fetcher, root.path(), 2, Duration::from_millis(200));

    let ids = parse_source_list("https://a.test/fast,https://a.test/stuck");
    let batch = tokio::time::timeout(Duration::from_secs(5), pipeline.run(&ids))
        .await
        .expect("batch must not stall on a hung fetch")
        .unwrap();

    assert_eq!(zip_entry_names(batch.archive_path()), vec!["Fast.mp3"]);
    let stuck = batch
        .outcomes
        .iter()
        .find(|o| o.identifier().as_str() == "https://a.test/stuck")
        .unwrap();
    assert!(matches!(
        stuck,
        FetchOutcome::Failed {
            error: FetchError::Timeout(_),
            ..
        }
    ));
    assert_eq!(pipeline.pool().available(), 2);
}

#[tokio::test]
async fn concurrency_never_exceeds_pool_size() {
    let root = TempDir::new().unwrap();
    let mut fetcher = ScriptedFetcher::new();
    let mut urls = Vec::new();
    for i in 0..8 {
        let url = format!("https://a.test/{}", i);
        fetcher = fetcher.with(&url, Step::produce_after(&format!("Song{}", i), Duration::from_millis(50)));
        urls.push(url);
    }
    let fetcher = Arc::new(fetcher);
    let pipeline = pipeline_for(Arc::clone(&fetcher), root.path(), 3, TIMEOUT);

    let batch = pipeline.run(&parse_source_list(&urls.join(","))).await.unwrap();

    assert_eq!(batch.artifact.len(), 8);
    assert_eq!(fetcher.calls(), 8);
    assert!(fetcher.max_in_flight() <= 3, "max in flight {}", fetcher.max_in_flight());
    assert!(fetcher.max_in_flight() >= 2);
}

#[tokio::test]
async fn concurrent_batches_share_the_pool() {
    let root = TempDir::new().unwrap();
    let mut fetcher = ScriptedFetcher::new();
    for i in 0..6 {
        fetcher = fetcher.with(
            &format!("https://a.test/{}", i),
            Step::produce_after(&format!("Song{}", i), Duration::from_millis(50)),
        );
    }
    let fetcher = Arc::new(fetcher);
    let pipeline = Arc::new(pipeline_for(Arc::clone(&fetcher), root.path(), 2, TIMEOUT));

    let a = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            pipeline
                .run(&parse_source_list("https://a.test/0,https://a.test/1,https://a.test/2"))
                .await
        })
    };
    let b = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            pipeline
                .run(&parse_source_list("https://a.test/3,https://a.test/4,https://a.test/5"))
                .await
        })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(a.artifact.len(), 3);
    assert_eq!(b.artifact.len(), 3);
    assert_ne!(a.job().path(), b.job().path());
    assert!(fetcher.max_in_flight() <= 2);
}

#[tokio::test]
async fn vanished_file_is_left_out() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with("https://a.test/1", Step::produce("Song1"))
            .with("https://a.test/2", Step::vanish("Song2")),
    );
    let pipeline = pipeline_for(fetcher, root.path(), 2, TIMEOUT);

    let batch = pipeline
        .run(&parse_source_list("https://a.test/1,https://a.test/2"))
        .await
        .unwrap();

    assert_eq!(zip_entry_names(batch.archive_path()), vec!["Song1.mp3"]);
    assert_eq!(batch.artifact.entries, vec!["Song1.mp3"]);
    // The fetcher reported success for both; only the archive drops the missing one.
    assert_eq!(batch.failed(), 0);
}

#[tokio::test]
async fn all_vanished_gives_no_valid_results_and_clean_up() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with("https://a.test/1", Step::vanish("Song1"))
            .with("https://a.test/2", Step::vanish("Song2")),
    );
    let pipeline = pipeline_for(Arc::clone(&fetcher), root.path(), 2, TIMEOUT);

    let err = pipeline
        .run(&parse_source_list("https://a.test/1,https://a.test/2"))
        .await
        .unwrap_err();

    assert!(matches!(err, BatchError::NoValidResults));
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

/// Writes a valid but entry-less archive no matter what it is given.
struct EmptyArchiver;

#[async_trait]
impl ArchiveWriter for EmptyArchiver {
    async fn package(&self, _paths: &[PathBuf], dest: &Path) -> Result<ArchiveArtifact, AppError> {
        tokio::fs::write(dest, b"").await?;
        Ok(ArchiveArtifact {
            path: dest.to_path_buf(),
            entries: Vec::new(),
        })
    }
}

#[tokio::test]
async fn empty_archive_gives_no_valid_results() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new().with("https://a.test/1", Step::produce("Song1")));
    let pipeline = BatchFetchPipeline::new(
        fetcher,
        Arc::new(EmptyArchiver),
        WorkerPool::new(1),
        root.path(),
        TIMEOUT,
        "downloaded_mp3s.zip",
    );

    let err = pipeline.run(&parse_source_list("https://a.test/1")).await.unwrap_err();

    assert!(matches!(err, BatchError::NoValidResults));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}
