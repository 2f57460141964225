use super::*;
use crate::encoder::RenderPlan;
use crate::resolver::CoubAsset;
use crate::types::{CoubRecord, ItemOutcome, ItemState};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Resolver that records which coubs it was asked about and tracks concurrency
#[derive(Default)]
struct MockResolver {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
    with_audio: HashSet<String>,
    failing: HashSet<String>,
}

#[async_trait]
impl AssetResolver for MockResolver {
    async fn resolve(&self, record: &CoubRecord) -> Result<CoubAsset> {
        self.calls.lock().unwrap().push(record.permalink.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&record.permalink) {
            return Err(Error::Resolve {
                permalink: record.permalink.clone(),
                reason: "HTTP 404 Not Found".into(),
            });
        }
        Ok(CoubAsset {
            permalink: record.permalink.clone(),
            video_url: format!("https://cdn/{}.mp4", record.permalink),
            audio_url: self
                .with_audio
                .contains(&record.permalink)
                .then(|| format!("https://cdn/{}.mp3", record.permalink)),
        })
    }
}

/// Encoder that writes a placeholder file and tracks concurrency
#[derive(Default)]
struct MockEncoder {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    plans: Mutex<HashMap<String, RenderPlan>>,
}

#[async_trait]
impl Encoder for MockEncoder {
    async fn write(&self, asset: &CoubAsset, plan: &RenderPlan, dest: &Path) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.plans
            .lock()
            .unwrap()
            .insert(asset.permalink.clone(), plan.clone());

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(&asset.permalink) {
            panic!("encoder blew up on {}", asset.permalink);
        }
        if self.failing.contains(&asset.permalink) {
            return Err(Error::Transcode {
                path: dest.to_path_buf(),
                reason: "Invalid data found when processing input".into(),
            });
        }
        tokio::fs::write(dest, b"mp4").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn record(permalink: &str, secs: i64) -> CoubRecord {
    CoubRecord::new(permalink, Utc.timestamp_opt(secs, 0).unwrap())
}

fn catalog_of(n: usize) -> Catalog {
    Catalog::new(
        (0..n)
            .map(|i| record(&format!("c{}", i), 1_600_000_000 + i as i64))
            .collect(),
    )
}

fn test_config(out_dir: &Path) -> Config {
    let mut config = Config::for_user("alice");
    config.out_dir = out_dir.to_path_buf();
    config
}

fn create_test_archiver(
    resolver: Arc<MockResolver>,
    encoder: Arc<MockEncoder>,
) -> (CoubArchiver, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let archiver =
        CoubArchiver::with_components(test_config(temp_dir.path()), resolver, encoder).unwrap();
    (archiver, temp_dir)
}

#[test]
fn test_new_rejects_missing_user() {
    let result = CoubArchiver::new(Config::default());
    assert!(matches!(result, Err(Error::Config { key: Some(k), .. }) if k == "user"));
}

#[test]
fn test_new_rejects_missing_out_dir() {
    let mut config = Config::for_user("alice");
    config.out_dir = PathBuf::new();
    let result = CoubArchiver::new(config);
    assert!(matches!(result, Err(Error::Config { key: Some(k), .. }) if k == "out_dir"));
}

#[tokio::test]
async fn test_all_new_items_are_downloaded() {
    let resolver = Arc::new(MockResolver::default());
    let encoder = Arc::new(MockEncoder::default());
    let (archiver, temp_dir) = create_test_archiver(resolver.clone(), encoder);

    let summary = archiver.download_all(catalog_of(5)).await;

    assert_eq!(summary.total, 5);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.skipped, 0);
    assert!(summary.failed.is_empty());
    for i in 0..5 {
        assert!(temp_dir.path().join(format!("{}.mp4", 1_600_000_000 + i)).exists());
    }
    assert_eq!(resolver.calls.lock().unwrap().len(), 5);
}

#[tokio::test]
async fn test_existing_files_are_skipped_without_resolving() {
    let resolver = Arc::new(MockResolver::default());
    let encoder = Arc::new(MockEncoder::default());
    let (archiver, temp_dir) = create_test_archiver(resolver.clone(), encoder);

    // c1 and c3 are already archived
    std::fs::write(temp_dir.path().join("1600000001.mp4"), b"old").unwrap();
    std::fs::write(temp_dir.path().join("1600000003.mp4"), b"").unwrap();

    let summary = archiver.download_all(catalog_of(4)).await;

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.skipped, 2);
    let mut calls = resolver.calls.lock().unwrap().clone();
    calls.sort();
    assert_eq!(calls, ["c0", "c2"]);
    // Existing files are not re-validated or rewritten
    assert_eq!(
        std::fs::read(temp_dir.path().join("1600000001.mp4")).unwrap(),
        b"old"
    );
}

#[tokio::test]
async fn test_at_most_three_items_in_flight() {
    let resolver = Arc::new(MockResolver {
        delay: Duration::from_millis(25),
        ..Default::default()
    });
    let encoder = Arc::new(MockEncoder {
        delay: Duration::from_millis(25),
        ..Default::default()
    });
    let (archiver, _temp_dir) = create_test_archiver(resolver.clone(), encoder.clone());

    let summary = archiver.download_all(catalog_of(10)).await;

    assert_eq!(summary.succeeded, 10);
    // Lookups and encodes are both bounded by the item limit
    assert_eq!(resolver.max_in_flight.load(Ordering::SeqCst), 3);
    assert_eq!(resolver.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(encoder.max_in_flight.load(Ordering::SeqCst), 3);
    assert_eq!(encoder.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrency_follows_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.download.max_concurrent_downloads = 1;
    let encoder = Arc::new(MockEncoder {
        delay: Duration::from_millis(5),
        ..Default::default()
    });
    let archiver = CoubArchiver::with_components(
        config,
        Arc::new(MockResolver::default()),
        encoder.clone(),
    )
    .unwrap();

    archiver.download_all(catalog_of(4)).await;

    assert_eq!(encoder.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_item_does_not_stop_the_others() {
    let resolver = Arc::new(MockResolver {
        failing: set(&["c1"]),
        ..Default::default()
    });
    let encoder = Arc::new(MockEncoder {
        failing: set(&["c4"]),
        ..Default::default()
    });
    let (archiver, temp_dir) = create_test_archiver(resolver, encoder);

    let summary = archiver.download_all(catalog_of(6)).await;

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.completed(), 6);
    let mut failed: Vec<_> = summary
        .failed
        .iter()
        .map(|f| f.record.permalink.as_str())
        .collect();
    failed.sort();
    assert_eq!(failed, ["c1", "c4"]);

    let c4 = summary
        .failed
        .iter()
        .find(|f| f.record.permalink == "c4")
        .unwrap();
    assert!(c4.error.contains("Invalid data found"));
    assert!(!temp_dir.path().join("1600000004.mp4").exists());
}

#[tokio::test]
async fn test_panicking_worker_is_recorded_as_failure() {
    let resolver = Arc::new(MockResolver::default());
    let encoder = Arc::new(MockEncoder {
        panicking: set(&["c2"]),
        ..Default::default()
    });
    let (archiver, _temp_dir) = create_test_archiver(resolver, encoder);

    let summary = archiver.download_all(catalog_of(5)).await;

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].record.permalink, "c2");
    assert!(summary.failed[0].error.contains("panicked"));
}

#[tokio::test]
async fn test_every_item_reaches_exactly_one_terminal_state() {
    let resolver = Arc::new(MockResolver {
        failing: set(&["c0"]),
        ..Default::default()
    });
    let encoder = Arc::new(MockEncoder::default());
    let (archiver, temp_dir) = create_test_archiver(resolver, encoder);
    std::fs::write(temp_dir.path().join("1600000005.mp4"), b"").unwrap();
    let mut events = archiver.subscribe();

    let summary = archiver.download_all(catalog_of(8)).await;
    assert_eq!(summary.completed(), 8);

    let mut terminal: HashMap<String, Vec<ItemState>> = HashMap::new();
    let mut run_complete = false;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::ItemState { permalink, state } if state.is_terminal() => {
                terminal.entry(permalink).or_default().push(state);
            }
            Event::RunComplete { succeeded, failed } => {
                assert_eq!(succeeded, 7);
                assert_eq!(failed, 1);
                run_complete = true;
            }
            _ => {}
        }
    }

    assert!(run_complete);
    assert_eq!(terminal.len(), 8);
    assert!(terminal.values().all(|states| states.len() == 1));
    assert_eq!(terminal["c0"], [ItemState::Failed]);
    assert_eq!(terminal["c5"], [ItemState::SkippedExisting]);
    assert_eq!(terminal["c1"], [ItemState::Done]);
}

#[tokio::test]
async fn test_render_plan_depends_on_audio() {
    let resolver = Arc::new(MockResolver {
        with_audio: set(&["c0"]),
        ..Default::default()
    });
    let encoder = Arc::new(MockEncoder::default());
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.download.max_loop_count = 50;
    config.tools.extra_ffmpeg_args = vec!["-movflags".into(), "+faststart".into()];
    let archiver = CoubArchiver::with_components(config, resolver, encoder.clone()).unwrap();

    archiver.download_all(catalog_of(2)).await;

    let plans = encoder.plans.lock().unwrap();
    let with_audio = &plans["c0"];
    assert!(with_audio.attach_audio);
    assert!(with_audio.shortest);
    assert_eq!(with_audio.loop_count, 50);
    assert_eq!(with_audio.extra_options, ["-movflags", "+faststart"]);

    let silent = &plans["c1"];
    assert!(!silent.attach_audio);
    assert!(!silent.shortest);
    assert_eq!(silent.loop_count, 1);
}

#[tokio::test]
async fn test_empty_catalog() {
    let (archiver, _temp_dir) = create_test_archiver(
        Arc::new(MockResolver::default()),
        Arc::new(MockEncoder::default()),
    );

    let summary = archiver.download_all(Catalog::default()).await;

    assert_eq!(summary, RunSummary::default());
}

#[tokio::test]
async fn test_process_item_outcomes() {
    let resolver = Arc::new(MockResolver {
        failing: set(&["bad"]),
        ..Default::default()
    });
    let (archiver, temp_dir) = create_test_archiver(resolver, Arc::new(MockEncoder::default()));

    assert_eq!(
        archiver.process_item(&record("good", 1)).await,
        ItemOutcome::Done
    );
    assert_eq!(
        archiver.process_item(&record("again", 1)).await,
        ItemOutcome::SkippedExisting
    );
    assert!(matches!(
        archiver.process_item(&record("bad", 2)).await,
        ItemOutcome::Failed { .. }
    ));
    assert!(temp_dir.path().join("1.mp4").exists());
}

// Metadata phase through the archiver

async fn mount_timeline(server: &MockServer, user: &str, page: u32, total: u32, coubs: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/timeline/channel/{}", user)))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": page,
            "total_pages": total,
            "per_page": 25,
            "coubs": coubs,
        })))
        .mount(server)
        .await;
}

fn archiver_against(server: &MockServer, user: &str, out_dir: &Path) -> CoubArchiver {
    let mut config = Config::for_user(user);
    config.out_dir = out_dir.to_path_buf();
    config.api.base_url = server.uri();
    CoubArchiver::with_components(
        config,
        Arc::new(MockResolver::default()),
        Arc::new(MockEncoder::default()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_run_alice_scenario() {
    let server = MockServer::start().await;
    let coubs: Vec<_> = (0..5)
        .map(|i| json!({ "permalink": format!("a{}", i), "created_at": format!("2021-03-0{}T10:00:00Z", i + 1) }))
        .collect();
    mount_timeline(&server, "alice", 1, 1, json!(coubs)).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let out_dir = temp_dir.path().join("coubs");
    let archiver = archiver_against(&server, "alice", &out_dir);

    let summary = archiver.run().await.unwrap();

    assert_eq!(summary.succeeded, 5);
    assert!(summary.failed.is_empty());
    let snapshot: serde_json::Value =
        serde_json::from_slice(&std::fs::read(out_dir.join(".metadata.json")).unwrap()).unwrap();
    assert_eq!(snapshot.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_run_keeps_existing_snapshot() {
    let server = MockServer::start().await;
    mount_timeline(
        &server,
        "alice",
        1,
        1,
        json!([{ "permalink": "fresh", "created_at": "2021-03-01T10:00:00Z" }]),
    )
    .await;

    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(temp_dir.path().join(".metadata.json"), "[]").unwrap();
    let archiver = archiver_against(&server, "alice", temp_dir.path());

    let catalog = archiver.load_catalog().await.unwrap();

    assert_eq!(catalog.len(), 1);
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join(".metadata.json")).unwrap(),
        "[]"
    );
}

#[tokio::test]
async fn test_run_first_page_failure_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let out_dir = temp_dir.path().join("coubs");
    let archiver = archiver_against(&server, "bob", &out_dir);

    let result = archiver.run().await;

    assert!(matches!(result, Err(Error::FirstPageFailed { .. })));
    assert!(!out_dir.exists());
}
