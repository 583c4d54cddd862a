//! End-to-end sessions over the saved fixture forum

mod common;

use common::*;
use kodegen_tools_threadscrape::browser::Fault;
use kodegen_tools_threadscrape::record::ContentRecord;
use kodegen_tools_threadscrape::session::{SkipKind, SkippedItem};
use kodegen_tools_threadscrape::{
    CrawlState, ExtractionConfig, ExtractionSession, JsonCheckpointStore, JsonlRecordStore,
    LazyLoad, MemoryCheckpointStore, MemoryRecordStore, ProgressReporter, RecordStore, Selector,
    SessionError, SessionReport, SetupAction, SnapshotDriver, SnapshotSite, StoreError, Termination,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

type MemorySession = ExtractionSession<SnapshotDriver, MemoryRecordStore, MemoryCheckpointStore>;

fn memory_session(config: ExtractionConfig, site: SnapshotSite) -> (MemorySession, MemoryRecordStore, MemoryCheckpointStore) {
    let records = MemoryRecordStore::new();
    let checkpoints = MemoryCheckpointStore::new();
    let session = ExtractionSession::new(
        config,
        SnapshotDriver::new(site),
        records.clone(),
        checkpoints.clone(),
    );
    (session, records, checkpoints)
}

fn ids(records: &[ContentRecord]) -> BTreeSet<String> {
    records.iter().map(|r| r.record_id.clone()).collect()
}

/// Cancels the token as soon as the n-th discussion starts.
struct CancelOnDiscussion {
    token: CancellationToken,
    at: usize,
    started: AtomicUsize,
}

impl ProgressReporter for CancelOnDiscussion {
    fn report_session_started(&self, _start_url: &str, _resumed: bool) {}
    fn report_page_started(&self, _index: usize, _url: &str) {}
    fn report_discussion_started(&self, _discussion_id: &str) {
        if self.started.fetch_add(1, Ordering::SeqCst) + 1 == self.at {
            self.token.cancel();
        }
    }
    fn report_record_assembled(&self, _record: &ContentRecord) {}
    fn report_item_skipped(&self, _item: &SkippedItem) {}
    fn report_checkpoint_written(&self, _state: &CrawlState) {}
    fn report_completed(&self, _report: &SessionReport) {}
}

#[tokio::test]
async fn full_crawl_with_block_parsed_replies() {
    let dir = TempDir::new().unwrap();
    let (session, records, checkpoints) = memory_session(forum_block_config(dir.path()), forum_site());

    let report = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.termination, Termination::Exhausted);
    assert!(!report.resumed);
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.discussions_completed, 3);
    assert_eq!(report.records_written, TOTAL_RECORDS);
    assert!(report.failed_pages.is_empty());
    assert!(report.warnings.is_empty());

    // one malformed reply of three: skipped, the rest kept
    let skipped: Vec<_> = report.skipped_of(SkipKind::Item).collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].discussion_id.as_deref(), Some(A1));
    assert_eq!(skipped[0].position, Some(2));
    assert!(skipped[0].raw.as_deref().unwrap().contains("an hour ago"));

    // clean end clears the checkpoint
    assert_eq!(checkpoints.current().await, None);

    let stored = records.read_all().await.unwrap();
    assert_eq!(stored.len(), TOTAL_RECORDS);

    let root = &stored[0];
    assert!(root.is_root);
    assert_eq!(root.discussion_id, A1);
    assert_eq!(root.author, "alice");
    assert_eq!(root.title, "First thread");
    assert_eq!(root.body, "Hello there. Second paragraph.");
    assert_eq!(root.relative_time.to_string(), "3 years ago");
    assert_eq!(root.position, 0);

    let replies: Vec<_> = stored.iter().filter(|r| r.discussion_id == A1 && !r.is_root).collect();
    let authors: Vec<_> = replies.iter().map(|r| r.author.as_str()).collect();
    assert_eq!(authors, ["bob", "carol"]);
    assert_eq!(replies[1].position, 3);
    assert!(replies.iter().all(|r| r.parent_id.as_deref() == Some(root.record_id.as_str())));
    assert!(replies.iter().all(|r| r.title == "First thread"));

    // exactly one root per discussion
    for discussion in [A1, A2, A3] {
        assert_eq!(
            stored.iter().filter(|r| r.discussion_id == discussion && r.is_root).count(),
            1
        );
    }
}

#[tokio::test]
async fn per_field_locators_match_block_parsing() {
    let block_dir = TempDir::new().unwrap();
    let (block_session, block_records, _) = memory_session(forum_block_config(block_dir.path()), forum_site());
    block_session.run(CancellationToken::new()).await.unwrap();

    let field_dir = TempDir::new().unwrap();
    let (field_session, field_records, _) = memory_session(forum_config(field_dir.path()), forum_site());
    let report = field_session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.records_written, TOTAL_RECORDS);
    assert_eq!(report.skipped_of(SkipKind::Item).count(), 1);
    assert_eq!(
        ids(&block_records.read_all().await.unwrap()),
        ids(&field_records.read_all().await.unwrap())
    );
}

#[tokio::test]
async fn expand_control_reveals_hidden_replies() {
    let dir = TempDir::new().unwrap();
    let (session, records, _) = memory_session(forum_config(dir.path()), forum_site());
    session.run(CancellationToken::new()).await.unwrap();

    let stored = records.read_all().await.unwrap();
    let a3: Vec<_> = stored.iter().filter(|r| r.discussion_id == A3).collect();
    assert_eq!(a3.len(), 2);
    assert_eq!(a3[1].author, "grace");
    assert!(session.driver().navigation_log().iter().any(|u| u == A3_FULL));
}

#[tokio::test]
async fn rerun_over_unchanged_pages_writes_nothing_new() {
    let dir = TempDir::new().unwrap();
    let config = forum_config(dir.path());

    for expected_new in [TOTAL_RECORDS, 0] {
        let records = JsonlRecordStore::open(config.records_path()).await.unwrap();
        let checkpoints = JsonCheckpointStore::new(config.checkpoint_path());
        let session = ExtractionSession::new(
            config.clone(),
            SnapshotDriver::new(forum_site()),
            records,
            checkpoints,
        );
        let report = session.run(CancellationToken::new()).await.unwrap();
        assert_eq!(report.termination, Termination::Exhausted);
        assert_eq!(report.discussions_completed, 3);
        assert_eq!(report.records_written, expected_new);
    }

    let reopened = JsonlRecordStore::open(config.records_path()).await.unwrap();
    let stored = reopened.read_all().await.unwrap();
    assert_eq!(stored.len(), TOTAL_RECORDS);
    assert_eq!(ids(&stored).len(), TOTAL_RECORDS);
    assert!(!config.checkpoint_path().exists());
}

async fn run_on_disk(config: &ExtractionConfig) -> SessionReport {
    let records = JsonlRecordStore::open(config.records_path()).await.unwrap();
    let session = ExtractionSession::new(
        config.clone(),
        SnapshotDriver::new(forum_site()),
        records,
        JsonCheckpointStore::new(config.checkpoint_path()),
    );
    session.run(CancellationToken::new()).await.unwrap()
}

#[tokio::test]
async fn resume_over_a_torn_records_file_keeps_one_record_per_id() {
    let dir = TempDir::new().unwrap();
    let config = forum_config(dir.path());
    assert_eq!(run_on_disk(&config).await.records_written, TOTAL_RECORDS);

    // crash halfway through writing the last record
    let raw = std::fs::read(config.records_path()).unwrap();
    let body = &raw[..raw.len() - 1];
    let last_start = body.iter().rposition(|&b| b == b'\n').map_or(0, |at| at + 1);
    let cut = last_start + (body.len() - last_start) / 2;
    std::fs::write(config.records_path(), &body[..cut]).unwrap();

    let report = run_on_disk(&config).await;
    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.records_written, 1);

    let stored = JsonlRecordStore::open(config.records_path())
        .await
        .unwrap()
        .read_all()
        .await
        .unwrap();
    assert_eq!(stored.len(), TOTAL_RECORDS);
    assert_eq!(ids(&stored).len(), TOTAL_RECORDS);
}

#[tokio::test]
async fn cancelled_run_resumes_to_the_same_record_set() {
    let reference_dir = TempDir::new().unwrap();
    let (reference, reference_records, _) = memory_session(forum_config(reference_dir.path()), forum_site());
    reference.run(CancellationToken::new()).await.unwrap();
    let expected = ids(&reference_records.read_all().await.unwrap());

    let dir = TempDir::new().unwrap();
    let records = MemoryRecordStore::new();
    let checkpoints = MemoryCheckpointStore::new();

    let cancel = CancellationToken::new();
    let first = ExtractionSession::new(
        forum_config(dir.path()),
        SnapshotDriver::new(forum_site()),
        records.clone(),
        checkpoints.clone(),
    )
    .with_progress(Arc::new(CancelOnDiscussion {
        token: cancel.clone(),
        at: 1,
        started: AtomicUsize::new(0),
    }));
    let report = first.run(cancel).await.unwrap();

    assert_eq!(report.termination, Termination::Cancelled);
    assert_eq!(report.discussions_completed, 1);
    let saved = checkpoints.current().await.expect("cancellation keeps a checkpoint");
    assert_eq!(saved.visited_ids, BTreeSet::from([A1.to_string()]));
    assert_eq!(saved.current_page_index, 1);

    let second = ExtractionSession::new(
        forum_config(dir.path()),
        SnapshotDriver::new(forum_site()),
        records.clone(),
        checkpoints.clone(),
    );
    let report = second.run(CancellationToken::new()).await.unwrap();

    assert!(report.resumed);
    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.discussions_completed, 2);
    // a1 was not opened again
    assert!(!second.driver().navigation_log().iter().any(|u| u == A1));

    let stored = records.read_all().await.unwrap();
    assert_eq!(stored.len(), TOTAL_RECORDS);
    assert_eq!(ids(&stored), expected);
    assert_eq!(checkpoints.current().await, None);
}

#[tokio::test]
async fn page_limit_is_a_clean_end() {
    let dir = TempDir::new().unwrap();
    let config = forum_builder(dir.path()).max_pages(Some(1)).build().unwrap();
    let (session, records, checkpoints) = memory_session(config, forum_site());

    let report = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.termination, Termination::MaxPages);
    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.discussions_completed, 2);
    assert_eq!(records.len().await, 5);
    assert_eq!(checkpoints.current().await, None);
    assert!(!session.driver().navigation_log().iter().any(|u| u == PAGE_2));
}

#[tokio::test]
async fn blocked_pagination_keeps_the_checkpoint() {
    let dir = TempDir::new().unwrap();
    let (session, _records, checkpoints) = memory_session(forum_config(dir.path()), forum_site());
    session.driver().inject(Fault::ClickFails { times: 2 });

    let report = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.termination, Termination::Blocked);
    assert_eq!(report.discussions_completed, 2);
    assert!(report.blocked_reason.as_deref().unwrap().contains("intercepted"));

    let saved = checkpoints.current().await.expect("blocked run keeps a checkpoint");
    assert_eq!(saved.current_page_index, 1);
    assert_eq!(saved.visited_ids.len(), 2);
}

#[tokio::test]
async fn one_failed_transition_is_retried() {
    let dir = TempDir::new().unwrap();
    let (session, _, _) = memory_session(forum_config(dir.path()), forum_site());
    session.driver().inject(Fault::ClickFails { times: 1 });

    let report = session.run(CancellationToken::new()).await.unwrap();
    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.pages_visited, 2);
}

#[tokio::test]
async fn discussion_navigation_gets_one_retry() {
    let dir = TempDir::new().unwrap();
    let (session, _, _) = memory_session(forum_config(dir.path()), forum_site());
    session.driver().inject(Fault::NavigationTimeout {
        url: A2.to_string(),
        times: 1,
    });

    let report = session.run(CancellationToken::new()).await.unwrap();
    assert_eq!(report.discussions_completed, 3);
    assert_eq!(report.skipped_of(SkipKind::Discussion).count(), 0);
}

#[tokio::test]
async fn unreachable_discussion_is_skipped_and_the_crawl_continues() {
    let dir = TempDir::new().unwrap();
    let (session, records, _) = memory_session(forum_config(dir.path()), forum_site());
    session.driver().inject(Fault::NavigationTimeout {
        url: A2.to_string(),
        times: 2,
    });

    let report = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.discussions_completed, 2);
    let failed: Vec<_> = report.skipped_of(SkipKind::Discussion).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].discussion_id.as_deref(), Some(A2));
    assert!(
        records
            .read_all()
            .await
            .unwrap()
            .iter()
            .all(|r| r.discussion_id != A2)
    );
}

#[tokio::test]
async fn discussion_without_root_post_fails_alone() {
    let dir = TempDir::new().unwrap();
    let site = forum_site().with_page(A2, "<html><body><p>removed by moderators</p></body></html>");
    let (session, records, _) = memory_session(forum_config(dir.path()), site);

    let report = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.discussions_completed, 2);
    let failed: Vec<_> = report.skipped_of(SkipKind::Discussion).collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].reason.contains("root_post"));
    assert_eq!(records.len().await, TOTAL_RECORDS - 2);
}

#[tokio::test]
async fn transient_listing_failure_is_retried() {
    let dir = TempDir::new().unwrap();
    let (session, _, _) = memory_session(forum_config(dir.path()), forum_site());
    session.driver().inject(Fault::StaleFind {
        selector: Selector::css("a[data-click-id=body]"),
        times: 1,
    });

    let report = session.run(CancellationToken::new()).await.unwrap();
    assert_eq!(report.discussions_completed, 3);
    assert!(report.failed_pages.is_empty());
}

#[tokio::test]
async fn unresolvable_listing_fails_the_page_only() {
    let dir = TempDir::new().unwrap();
    let (session, _, _) = memory_session(forum_config(dir.path()), forum_site());
    session.driver().inject(Fault::StaleFind {
        selector: Selector::css("a[data-click-id=body]"),
        times: 2,
    });

    let report = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.failed_pages, [BASE]);
    assert_eq!(report.skipped_of(SkipKind::Page).count(), 1);
    // pagination still moved on to page 2
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.discussions_completed, 1);
}

#[tokio::test]
async fn single_mode_treats_each_page_as_a_discussion() {
    const T1: &str = "https://forum.test/t/9";
    const T2: &str = "https://forum.test/t/9?page=2";

    let page = |when: &str, next: Option<&str>| {
        let mut html = discussion_page("op", "Long thread", when, &["Body."], &[reply("zed", "2 days ago", "Hi.")], None);
        if let Some(next) = next {
            html = html.replace(
                "</body>",
                &format!("<div class=\"nav\"><a href=\"{next}\">Next page</a></div></body>"),
            );
        }
        html
    };
    let site = SnapshotSite::new()
        .with_page(T1, page("2 years ago", Some("?page=2")))
        .with_page(T2, page("1 year ago", None));

    let dir = TempDir::new().unwrap();
    let config = thread_builder(dir.path(), T1).build().unwrap();
    assert!(!config.is_listing_mode());
    let (session, records, _) = memory_session(config, site);

    let report = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.discussions_completed, 2);
    let discussions: BTreeSet<_> = records
        .read_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.discussion_id)
        .collect();
    assert_eq!(discussions, BTreeSet::from([T1.to_string(), T2.to_string()]));
}

#[tokio::test]
async fn setup_actions_run_once_on_a_fresh_crawl() {
    const SEARCH: &str = "https://forum.test/search";
    let site = forum_site().with_page(
        SEARCH,
        "<html><body><input id=\"q\"><a id=\"go\" href=\"/r/demo/\">Search</a></body></html>",
    );

    let dir = TempDir::new().unwrap();
    let config = forum_builder_at(dir.path(), SEARCH)
        .setup_actions(vec![
            SetupAction::Type {
                selector: Selector::Id("q".into()),
                text: "demo".into(),
            },
            SetupAction::Click {
                selector: Selector::Id("go".into()),
            },
        ])
        .build()
        .unwrap();
    let (session, _, _) = memory_session(config, site);

    let report = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.discussions_completed, 3);
    assert_eq!(session.driver().typed_inputs(), ["demo"]);
    assert_eq!(session.driver().navigation_log()[0], SEARCH);
}

#[tokio::test]
async fn failed_setup_blocks_with_a_report() {
    let dir = TempDir::new().unwrap();
    let config = forum_builder(dir.path())
        .setup_actions(vec![SetupAction::Click {
            selector: Selector::Id("nope".into()),
        }])
        .build()
        .unwrap();
    let (session, records, checkpoints) = memory_session(config, forum_site());

    let report = session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(report.termination, Termination::Blocked);
    assert!(report.blocked_reason.as_deref().unwrap().starts_with("setup failed"));
    assert_eq!(report.failed_pages, [BASE]);
    assert_eq!(report.discussions_completed, 0);
    assert!(records.read_all().await.unwrap().is_empty());
    let saved = checkpoints.current().await.expect("blocked run keeps a checkpoint");
    assert!(!saved.setup_done);
    assert_eq!(saved.current_page_url, BASE);
}

#[tokio::test]
async fn lazy_loading_scrolls_every_discussion() {
    let dir = TempDir::new().unwrap();
    let config = forum_builder(dir.path())
        .lazy_load(Some(LazyLoad {
            steps: 2,
            step_px: 500,
            pause_ms: 0,
        }))
        .build()
        .unwrap();
    let (session, _, _) = memory_session(config, forum_site());

    session.run(CancellationToken::new()).await.unwrap();
    assert_eq!(session.driver().scrolled_px(), 3 * 2 * 500);
}

#[tokio::test]
async fn cancellation_interrupts_lazy_load_pauses() {
    let dir = TempDir::new().unwrap();
    let config = forum_builder(dir.path())
        .lazy_load(Some(LazyLoad {
            steps: 3,
            step_px: 500,
            pause_ms: 60_000,
        }))
        .build()
        .unwrap();
    let cancel = CancellationToken::new();
    let (session, _, _) = memory_session(config, forum_site());
    let session = session.with_progress(Arc::new(CancelOnDiscussion {
        token: cancel.clone(),
        at: 1,
        started: AtomicUsize::new(0),
    }));

    let report = tokio::time::timeout(std::time::Duration::from_secs(5), session.run(cancel))
        .await
        .expect("cancellation cuts the pause short")
        .unwrap();

    assert_eq!(report.termination, Termination::Cancelled);
    assert_eq!(session.driver().scrolled_px(), 500);
}

/// Record store whose disk is full.
struct FullDisk;

#[async_trait::async_trait]
impl RecordStore for FullDisk {
    async fn append(&self, _records: &[ContentRecord]) -> Result<usize, StoreError> {
        Err(StoreError::Io {
            path: "records.jsonl".into(),
            source: std::io::Error::other("no space left on device"),
        })
    }

    async fn read_all(&self) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(Vec::new())
    }

    async fn contains(&self, _record_id: &str) -> bool {
        false
    }
}

#[tokio::test]
async fn store_failure_stops_the_session() {
    let dir = TempDir::new().unwrap();
    let session = ExtractionSession::new(
        forum_config(dir.path()),
        SnapshotDriver::new(forum_site()),
        FullDisk,
        MemoryCheckpointStore::new(),
    );

    let err = session.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SessionError::Store(StoreError::Io { .. })));
}
