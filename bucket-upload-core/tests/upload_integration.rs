use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bucket_upload_core::config::UploadConfig;
use bucket_upload_core::contract::{
    MockGlobEvaluator, MockStorageSession, MockUploadHandle, UploadHandle,
};
use bucket_upload_core::glob::FsGlob;
use bucket_upload_core::upload::{object_key, upload_all, SkipReason, UploadOutcome};
use bucket_upload_core::Error;
use serial_test::serial;
use tempfile::tempdir;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

type Objects = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// Collects the debug rendering of every emitted event.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

/// An upload handle that stores committed bytes under `key` in `objects`.
fn recording_handle(key: String, objects: Objects) -> MockUploadHandle {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let mut handle = MockUploadHandle::new();
    let sink = buffer.clone();
    handle.expect_write().returning(move |bytes: &[u8]| {
        sink.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    });
    handle.expect_commit().times(1).returning(move || {
        let data = buffer.lock().unwrap().clone();
        objects.lock().unwrap().insert(key.clone(), data);
        Ok(())
    });
    handle.expect_abort().never();
    handle
}

fn recording_session(objects: Objects) -> MockStorageSession {
    let mut session = MockStorageSession::new();
    session
        .expect_begin_upload()
        .returning(move |_bucket: &str, key: &str| {
            Ok(Box::new(recording_handle(key.to_string(), objects.clone())) as Box<dyn UploadHandle>)
        });
    session
}

fn fixed_glob(paths: Vec<String>) -> MockGlobEvaluator {
    let mut glob = MockGlobEvaluator::new();
    glob.expect_glob().returning(move |_| Ok(paths.clone()));
    glob
}

fn config(source: &str, target: &str) -> UploadConfig {
    UploadConfig {
        bucket: "artifacts".to_string(),
        source: source.to_string(),
        exclude: vec![],
        target: target.to_string(),
        dry_run: false,
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn uploads_every_file_with_exact_contents_and_skips_directories() {
    let dir = tempdir().unwrap();
    let small = b"hello bucket".to_vec();
    // Larger than several read chunks, with a non-repeating byte pattern.
    let large: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 251) as u8).collect();
    fs::write(dir.path().join("a.txt"), &small).unwrap();
    fs::write(dir.path().join("big.bin"), &large).unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();

    let root = path_string(dir.path());
    let objects: Objects = Arc::default();
    let session = recording_session(objects.clone());

    let report = upload_all(&config(&format!("{root}/*"), "releases"), &FsGlob, &session)
        .await
        .expect("upload should succeed");

    assert_eq!(report.uploaded(), 2);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.bytes(), (small.len() + large.len()) as u64);
    assert!(report.outcomes.contains(&UploadOutcome::Skipped {
        path: format!("{root}/sub"),
        reason: SkipReason::Directory,
    }));

    let objects = objects.lock().unwrap();
    assert_eq!(
        objects.get(&object_key("releases", &format!("{root}/a.txt"))),
        Some(&small)
    );
    assert_eq!(
        objects.get(&object_key("releases", &format!("{root}/big.bin"))),
        Some(&large)
    );
}

#[tokio::test]
#[serial]
async fn relative_include_with_exclude_uploads_remaining_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"a").unwrap();
    fs::write(dir.path().join("b.txt"), b"b").unwrap();
    fs::write(dir.path().join("c.log"), b"c").unwrap();

    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let objects: Objects = Arc::default();
    let session = recording_session(objects.clone());
    let mut cfg = config("*.txt", "site");
    cfg.exclude = vec!["b.*".to_string()];
    let result = upload_all(&cfg, &FsGlob, &session).await;

    std::env::set_current_dir(previous).unwrap();

    let report = result.expect("upload should succeed");
    assert_eq!(
        report.outcomes,
        vec![UploadOutcome::Uploaded {
            path: "a.txt".to_string(),
            key: "site/a.txt".to_string(),
            bytes: 1,
        }]
    );
    let objects = objects.lock().unwrap();
    assert_eq!(objects.keys().collect::<Vec<_>>(), vec!["site/a.txt"]);
}

#[tokio::test]
async fn dry_run_never_opens_an_upload_stream() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("one.txt"), b"1").unwrap();
    fs::write(dir.path().join("two.txt"), b"2").unwrap();
    let root = path_string(dir.path());

    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Registry::default().with(EventCollector {
        events: events.clone(),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut session = MockStorageSession::new();
    session.expect_begin_upload().never();

    let mut cfg = config(&format!("{root}/*.txt"), "out");
    cfg.dry_run = true;
    let report = upload_all(&cfg, &FsGlob, &session)
        .await
        .expect("dry run should succeed");

    assert_eq!(report.dry_run(), 2);
    assert_eq!(report.uploaded(), 0);
    assert_eq!(report.bytes(), 0);

    let events = events.lock().unwrap();
    let skips = events
        .iter()
        .filter(|msg| msg.contains("skipping file upload... dry run enabled"))
        .count();
    assert_eq!(skips, 2, "expected one dry-run skip per file, got: {events:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn open_failure_stops_the_run_before_later_matches() {
    use std::os::unix::net::UnixListener;

    let dir = tempdir().unwrap();
    let first = dir.path().join("1-first.txt");
    let socket = dir.path().join("2-socket");
    let third = dir.path().join("3-third.txt");
    fs::write(&first, b"first").unwrap();
    fs::write(&third, b"third").unwrap();
    // A socket stats fine but cannot be opened for reading.
    let _listener = UnixListener::bind(&socket).unwrap();

    let glob = fixed_glob(vec![
        path_string(&first),
        path_string(&socket),
        path_string(&third),
    ]);
    let objects: Objects = Arc::default();
    let mut session = MockStorageSession::new();
    let sink = objects.clone();
    session
        .expect_begin_upload()
        .times(1)
        .returning(move |_bucket: &str, key: &str| {
            Ok(Box::new(recording_handle(key.to_string(), sink.clone())) as Box<dyn UploadHandle>)
        });

    let err = upload_all(&config("ignored", "t"), &glob, &session)
        .await
        .expect_err("opening a socket must fail the run");

    match err {
        Error::FileOpen { path, .. } => assert_eq!(path, socket),
        other => panic!("expected FileOpen, got {other:?}"),
    }
    assert_eq!(objects.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn vanished_match_is_skipped_and_run_continues() {
    let dir = tempdir().unwrap();
    let present = dir.path().join("present.txt");
    fs::write(&present, b"here").unwrap();
    let missing = dir.path().join("gone.txt");

    let glob = fixed_glob(vec![path_string(&missing), path_string(&present)]);
    let objects: Objects = Arc::default();
    let session = recording_session(objects.clone());

    let report = upload_all(&config("ignored", "t"), &glob, &session)
        .await
        .expect("missing files are not fatal");

    assert_eq!(
        report.outcomes[0],
        UploadOutcome::Skipped {
            path: path_string(&missing),
            reason: SkipReason::Missing,
        }
    );
    assert_eq!(report.uploaded(), 1);
}

#[tokio::test]
async fn empty_file_is_committed_without_writes() {
    let dir = tempdir().unwrap();
    let empty = dir.path().join("empty");
    fs::write(&empty, b"").unwrap();

    let glob = fixed_glob(vec![path_string(&empty)]);
    let objects: Objects = Arc::default();
    let session = recording_session(objects.clone());

    let report = upload_all(&config("ignored", "t"), &glob, &session)
        .await
        .unwrap();
    assert_eq!(report.uploaded(), 1);
    assert_eq!(report.bytes(), 0);
    let objects = objects.lock().unwrap();
    assert_eq!(objects.values().next(), Some(&Vec::new()));
}

#[tokio::test]
async fn write_failure_aborts_the_upload() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("data.bin");
    fs::write(&file, vec![1u8; 4096]).unwrap();

    let glob = fixed_glob(vec![path_string(&file)]);
    let mut session = MockStorageSession::new();
    session.expect_begin_upload().times(1).returning(|_, _| {
        let mut handle = MockUploadHandle::new();
        handle
            .expect_write()
            .times(1)
            .returning(|_| Err("connection reset".into()));
        handle.expect_abort().times(1).return_const(());
        handle.expect_commit().never();
        Ok(Box::new(handle) as Box<dyn UploadHandle>)
    });

    let err = upload_all(&config("ignored", "t"), &glob, &session)
        .await
        .unwrap_err();
    match err {
        Error::UploadWrite { bucket, key, .. } => {
            assert_eq!(bucket, "artifacts");
            assert_eq!(key, object_key("t", &path_string(&file)));
        }
        other => panic!("expected UploadWrite, got {other:?}"),
    }
}

#[tokio::test]
async fn commit_failure_is_fatal() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("data.txt");
    fs::write(&file, b"payload").unwrap();

    let glob = fixed_glob(vec![path_string(&file)]);
    let mut session = MockStorageSession::new();
    session.expect_begin_upload().times(1).returning(|_, _| {
        let mut handle = MockUploadHandle::new();
        handle.expect_write().returning(|bytes| Ok(bytes.len()));
        handle
            .expect_commit()
            .times(1)
            .returning(|| Err("quota exceeded".into()));
        Ok(Box::new(handle) as Box<dyn UploadHandle>)
    });

    let err = upload_all(&config("ignored", "t"), &glob, &session)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UploadCommit { .. }), "got {err:?}");
    assert!(err.to_string().contains("quota exceeded"));
}

#[tokio::test]
async fn begin_upload_failure_is_fatal() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("data.txt");
    fs::write(&file, b"payload").unwrap();

    let glob = fixed_glob(vec![path_string(&file)]);
    let mut session = MockStorageSession::new();
    session
        .expect_begin_upload()
        .times(1)
        .returning(|_, _| Err("bucket not found".into()));

    let err = upload_all(&config("ignored", "t"), &glob, &session)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UploadBegin { .. }), "got {err:?}");
}

#[tokio::test]
async fn invalid_include_pattern_uploads_nothing() {
    let mut session = MockStorageSession::new();
    session.expect_begin_upload().never();

    let err = upload_all(&config("assets/[", "t"), &FsGlob, &session)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Glob(_)), "got {err:?}");
}
