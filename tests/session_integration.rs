//! End-to-end tests of the search -> select -> download flow.

mod support;

use std::sync::Arc;
use std::time::Duration;

use musicdl_core::download::{DownloadManager, Progress, track_filename};
use musicdl_core::{
    GaugeReading, IndexError, PreferenceStore, Session, SessionError, SourceId, SourceRegistry,
};
use support::{FakeSource, track};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_with(temp: &TempDir, sources: Vec<FakeSource>) -> Session {
    let mut registry = SourceRegistry::new();
    for source in sources {
        registry.register(Arc::new(source)).unwrap();
    }
    let store = PreferenceStore::new(temp.path().join("config.json"));
    let session = Session::new(Arc::new(registry), DownloadManager::default(), store);
    session
        .set_download_path(&temp.path().join("downloads"))
        .unwrap();
    session
}

#[tokio::test]
async fn test_two_sources_select_row_one_and_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/r2.mp3"))
        .and(header("Referer", "https://a.example/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"0123456789".to_vec()))
        .expect(2)
        .mount(&server)
        .await;

    let r1 = track("A", "S1", "first", &format!("{}/r1.mp3", server.uri()), "mp3");
    let r2 = track("A", "S2", "Second: Live?", &format!("{}/r2.mp3", server.uri()), "mp3");
    let r3 = track("B", "S3", "third", &format!("{}/r3.mp3", server.uri()), "flac");

    let temp = TempDir::new().unwrap();
    let session = session_with(
        &temp,
        vec![
            FakeSource::ok("A", vec![r1.clone(), r2.clone()])
                .with_delay(Duration::from_millis(30))
                .with_referer("https://a.example/"),
            FakeSource::ok("B", vec![r3.clone()]),
        ],
    );

    let outcome = session.search("x", &["A".into(), "B".into()]).await;
    let rows: Vec<_> = outcome.index.iter().map(|(i, t)| (i, t.clone())).collect();
    assert_eq!(rows, vec![(0, r1), (1, r2.clone()), (2, r3)]);

    // Download through the manager directly to observe every callback.
    let dir = temp.path().join("direct");
    let mut seen = Vec::new();
    let direct = DownloadManager::default()
        .download(
            outcome.index.get(1).unwrap(),
            &dir,
            &session.registry().get(&SourceId::new("A")).unwrap().download_headers(),
            |p| seen.push(p),
        )
        .await
        .unwrap();
    assert_eq!(seen, vec![Progress::Percent(100)]);
    assert_eq!(direct.path, dir.join(track_filename(&r2.song_name, &r2.ext)));

    // And through the session, which looks up the headers itself.
    let selection = session.selection(1).unwrap();
    let via_session = session
        .download(selection, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        via_session.path,
        temp.path().join("downloads").join(track_filename(&r2.song_name, &r2.ext))
    );
    assert_eq!(session.gauge().current(), GaugeReading::Idle);
}

#[tokio::test]
async fn test_session_download_writes_file_persists_dir_and_resets_gauge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/song.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"0123456789".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = session_with(
        &temp,
        vec![FakeSource::ok(
            "A",
            vec![track("A", "S", "Song/Name", &format!("{}/song.mp3", server.uri()), "mp3")],
        )],
    );
    session.search("x", &["A".into()]).await;

    let selection = session.selection(0).unwrap();
    let outcome = session
        .download(selection, &CancellationToken::new())
        .await
        .unwrap();

    let expected_dir = temp.path().join("downloads");
    assert_eq!(outcome.path, expected_dir.join("Song_Name.mp3"));
    assert_eq!(std::fs::read(&outcome.path).unwrap(), b"0123456789");
    assert_eq!(session.gauge().current(), GaugeReading::Idle);

    let reloaded = PreferenceStore::new(temp.path().join("config.json")).load();
    assert_eq!(reloaded.download_path, expected_dir);
    assert_eq!(reloaded.enabled_sources, Some(vec!["A".to_string()]));
}

#[tokio::test]
async fn test_failed_download_resets_gauge_and_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.mp3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = session_with(
        &temp,
        vec![FakeSource::ok(
            "A",
            vec![track("A", "S", "Gone", &format!("{}/gone.mp3", server.uri()), "mp3")],
        )],
    );
    session.search("x", &["A".into()]).await;
    let selection = session.selection(0).unwrap();

    let result = session.download(selection, &CancellationToken::new()).await;

    assert!(matches!(result, Err(SessionError::Download(_))));
    assert_eq!(session.gauge().current(), GaugeReading::Idle);
    assert!(!temp.path().join("downloads").join("Gone.mp3").exists());
}

#[tokio::test]
async fn test_selection_from_superseded_search_is_stale() {
    let temp = TempDir::new().unwrap();
    let session = session_with(
        &temp,
        vec![FakeSource::ok(
            "A",
            vec![track("A", "S", "One", "http://127.0.0.1:9/one.mp3", "mp3")],
        )],
    );
    session.search("x", &["A".into()]).await;
    let old = session.selection(0).unwrap();
    session.search("y", &["A".into()]).await;

    match session.download(old, &CancellationToken::new()).await {
        Err(SessionError::Index(IndexError::StaleSelection { selected, current, .. })) => {
            assert!(current > selected);
        }
        other => panic!("Expected StaleSelection, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_second_download_while_one_runs_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.mp3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = session_with(
        &temp,
        vec![FakeSource::ok(
            "A",
            vec![track("A", "S", "Slow", &format!("{}/slow.mp3", server.uri()), "mp3")],
        )],
    );
    session.search("x", &["A".into()]).await;
    let selection = session.selection(0).unwrap();
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(session.download(selection, &cancel), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.download(selection, &cancel).await
    });

    assert!(first.is_ok(), "{first:?}");
    assert!(matches!(second, Err(SessionError::DownloadInProgress)));
}

#[tokio::test]
async fn test_failing_source_does_not_hide_other_results() {
    let temp = TempDir::new().unwrap();
    let session = session_with(
        &temp,
        vec![
            FakeSource::failing("A", 503),
            FakeSource::ok("B", vec![track("B", "S", "b1", "http://x/b1", "mp3")]),
        ],
    );

    let outcome = session.search("x", &["A".into(), "B".into()]).await;

    assert_eq!(outcome.index.len(), 1);
    assert_eq!(outcome.index.get(0).unwrap().song_name, "b1");
    assert!(outcome.reports[0].failed());
    assert!(!outcome.reports[1].failed());
    assert_eq!(session.current_index().len(), 1);
}

#[tokio::test]
async fn test_cancelled_session_download_resets_gauge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 16]))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = session_with(
        &temp,
        vec![FakeSource::ok(
            "A",
            vec![track("A", "S", "A", &format!("{}/a.mp3", server.uri()), "mp3")],
        )],
    );
    session.search("x", &["A".into()]).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = session
        .download(session.selection(0).unwrap(), &cancel)
        .await;

    assert!(matches!(result, Err(SessionError::Download(_))));
    assert_eq!(session.gauge().current(), GaugeReading::Idle);
}

#[tokio::test]
async fn test_older_search_finishing_last_does_not_replace_newer_results() {
    let temp = TempDir::new().unwrap();
    let session = session_with(
        &temp,
        vec![
            FakeSource::ok("slow", vec![track("slow", "S", "old", "http://x/old", "mp3")])
                .with_delay(Duration::from_millis(200)),
            FakeSource::ok("fast", vec![track("fast", "S", "new", "http://x/new", "mp3")]),
        ],
    );

    let slow_only = [SourceId::new("slow")];
    let fast_only = [SourceId::new("fast")];
    let (older, newer) = tokio::join!(session.search("x", &slow_only), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.search("y", &fast_only).await
    });

    assert!(newer.index.generation() > older.index.generation());
    let current = session.current_index();
    assert_eq!(current.generation(), newer.index.generation());
    let names: Vec<_> = current.iter().map(|(_, t)| t.song_name.clone()).collect();
    assert_eq!(names, vec!["new".to_string()]);

    let selection = session.selection(0).unwrap();
    assert_eq!(selection.generation, newer.index.generation());

    let reloaded = PreferenceStore::new(temp.path().join("config.json")).load();
    assert_eq!(reloaded.enabled_sources, Some(vec!["fast".to_string()]));
}

#[tokio::test]
async fn test_unwritable_preferences_do_not_fail_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keep.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"keep".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    // The preferences directory is a regular file, so every save fails.
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let mut registry = SourceRegistry::new();
    registry
        .register(Arc::new(FakeSource::ok(
            "A",
            vec![track("A", "S", "Keep", &format!("{}/keep.mp3", server.uri()), "mp3")],
        )))
        .unwrap();
    let session = Session::new(
        Arc::new(registry),
        DownloadManager::default(),
        PreferenceStore::new(blocker.join("config.json")),
    );
    session
        .set_download_path(&temp.path().join("downloads"))
        .unwrap();
    session.search("x", &["A".into()]).await;

    let outcome = session
        .download(session.selection(0).unwrap(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.path, temp.path().join("downloads").join("Keep.mp3"));
    assert_eq!(std::fs::read(&outcome.path).unwrap(), b"keep");
    assert_eq!(session.download_dir(), temp.path().join("downloads"));
}
