//! End-to-end runs of the backup and restore services through the HTTP
//! client against a local fake of the storage API.

mod common;

use common::FakeStorage;
use harakka_backup::{
    errors::{ListError, RunError, StoreError},
    models::bucket::BucketSettings,
    services::{
        backup_service::{BUCKET_INFO_FILE, BackupService, EXPORT_SUMMARY_FILE},
        lister::ListOptions,
        memory_store::MemoryStore,
        restore_service::{RESTORE_SUMMARY_FILE, RestoreService},
        store::ObjectStore,
        verify::verify_backup,
    },
};
use serde_json::Value;
use std::{fs, path::Path, sync::Arc};
use tempfile::TempDir;

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

async fn backup(server: &FakeStorage, root: &Path, options: ListOptions) {
    BackupService::new(server.client(), options, root)
        .run("proj", &server.base_url, &[])
        .await
        .unwrap();
}

#[tokio::test]
async fn backs_up_nested_keys_into_files_tree() {
    let remote = Arc::new(MemoryStore::new());
    remote.put_object("images", "cat.jpg", "meow", "image/jpeg");
    remote.put_object("images", "products/shoe.png", "shoe-bytes", "image/png");
    let server = FakeStorage::start(remote).await;
    let dir = TempDir::new().unwrap();

    backup(&server, dir.path(), ListOptions::default()).await;

    let files = dir.path().join("images/files");
    assert_eq!(fs::read(files.join("cat.jpg")).unwrap(), b"meow");
    assert_eq!(
        fs::read(files.join("products/shoe.png")).unwrap(),
        b"shoe-bytes"
    );

    let info = read_json(&dir.path().join("images").join(BUCKET_INFO_FILE));
    assert_eq!(info["totalFiles"], 2);
    assert_eq!(info["downloadedFiles"], 2);
    assert_eq!(info["failedFiles"], 0);
    assert_eq!(
        info["files"],
        serde_json::json!(["cat.jpg", "products/shoe.png"])
    );

    let summary = read_json(&dir.path().join(EXPORT_SUMMARY_FILE));
    assert_eq!(summary["projectId"], "proj");
    assert_eq!(summary["totalBuckets"], 1);
    assert_eq!(summary["totalDownloaded"], 2);
    assert_eq!(summary["totalSizeBytes"], 14);

    assert!(verify_backup(dir.path()).await.unwrap().ok());
}

#[tokio::test]
async fn small_pages_and_failed_downloads_still_cover_every_key() {
    let remote = Arc::new(MemoryStore::new());
    for key in ["a.txt", "b.txt", "c.txt", "deep/x/y/z.txt", "deep/x/w.txt"] {
        remote.put_object("docs", key, key.as_bytes().to_vec(), "text/plain");
    }
    remote.insert_bucket(BucketSettings::private("empty"));
    remote.fail_download("docs", "a.txt");
    let server = FakeStorage::start(remote).await;
    let dir = TempDir::new().unwrap();

    backup(
        &server,
        dir.path(),
        ListOptions {
            page_size: 2,
            ..ListOptions::default()
        },
    )
    .await;

    let info = read_json(&dir.path().join("docs").join(BUCKET_INFO_FILE));
    assert_eq!(info["totalFiles"], 5);
    assert_eq!(info["downloadedFiles"], 4);
    assert_eq!(info["failedFiles"], 1);
    assert_eq!(info["failures"][0]["key"], "a.txt");
    assert!(!dir.path().join("docs/files/a.txt").exists());
    assert!(dir.path().join("docs/files/b.txt").exists());
    assert!(dir.path().join("docs/files/deep/x/y/z.txt").exists());

    let empty = read_json(&dir.path().join("empty").join(BUCKET_INFO_FILE));
    assert_eq!(empty["totalFiles"], 0);
    assert_eq!(empty["downloadedFiles"], 0);
    assert_eq!(empty["failedFiles"], 0);

    let summary = read_json(&dir.path().join(EXPORT_SUMMARY_FILE));
    assert_eq!(summary["totalBuckets"], 2);
    assert_eq!(summary["totalFailed"], 1);
}

#[tokio::test]
async fn round_trip_into_a_fresh_project() {
    let source = Arc::new(MemoryStore::new());
    source.insert_bucket(BucketSettings {
        name: "assets".into(),
        public: true,
        file_size_limit: Some(1024),
        allowed_mime_types: Some(vec!["image/*".into(), "text/plain".into()]),
    });
    source.put_object("assets", "a.txt", "alpha", "text/plain");
    source.put_object("assets", "sub/b.png", vec![0x89, b'P', b'N', b'G'], "image/png");
    let source_server = FakeStorage::start(source).await;
    let dir = TempDir::new().unwrap();
    backup(&source_server, dir.path(), ListOptions::default()).await;

    let target_server = FakeStorage::start(Arc::new(MemoryStore::new())).await;
    let summary = RestoreService::new(target_server.client(), dir.path())
        .run("fresh", &target_server.base_url, &[])
        .await
        .unwrap();
    assert_eq!(summary.total_uploaded, 2);
    assert_eq!(summary.total_failed, 0);

    let target = &target_server.store;
    assert_eq!(target.keys("assets"), vec!["a.txt", "sub/b.png"]);
    let a = target.object("assets", "a.txt").unwrap();
    assert_eq!(&a.data[..], b"alpha");
    assert_eq!(a.content_type, "text/plain");
    let b = target.object("assets", "sub/b.png").unwrap();
    assert_eq!(&b.data[..], &[0x89, b'P', b'N', b'G']);
    assert_eq!(b.content_type, "image/png");

    let bucket = target.bucket("assets").unwrap();
    assert!(bucket.public);
    assert_eq!(bucket.file_size_limit, Some(1024));
    assert_eq!(
        bucket.allowed_mime_types,
        Some(vec!["image/*".to_string(), "text/plain".to_string()])
    );

    let written = read_json(&dir.path().join(RESTORE_SUMMARY_FILE));
    assert_eq!(written["projectId"], "fresh");
    assert_eq!(written["totalUploaded"], 2);
}

#[tokio::test]
async fn restoring_twice_converges_on_the_backup() {
    let source = Arc::new(MemoryStore::new());
    source.put_object("docs", "a.txt", "current", "text/plain");
    source.put_object("docs", "nested/b.txt", "bee", "text/plain");
    let source_server = FakeStorage::start(source).await;
    let dir = TempDir::new().unwrap();
    backup(&source_server, dir.path(), ListOptions::default()).await;

    let target = Arc::new(MemoryStore::new());
    target.put_object("docs", "a.txt", "stale", "text/plain");
    let target_server = FakeStorage::start(target.clone()).await;
    let service = RestoreService::new(target_server.client(), dir.path());

    let first = service.run("p", &target_server.base_url, &[]).await.unwrap();
    let after_first: Vec<_> = target
        .keys("docs")
        .into_iter()
        .map(|k| (k.clone(), target.object("docs", &k).unwrap().data))
        .collect();

    let second = service.run("p", &target_server.base_url, &[]).await.unwrap();
    let after_second: Vec<_> = target
        .keys("docs")
        .into_iter()
        .map(|k| (k.clone(), target.object("docs", &k).unwrap().data))
        .collect();

    assert_eq!(after_first, after_second);
    assert_eq!(&after_second[0].1[..], b"current");
    assert_eq!(first.total_uploaded, 2);
    assert_eq!(second.total_uploaded, 2);
    assert_eq!(second.total_failed, 0);
}

#[tokio::test]
async fn wrong_key_is_rejected_before_anything_is_written() {
    let remote = Arc::new(MemoryStore::new());
    remote.put_object("images", "cat.jpg", "meow", "image/jpeg");
    let server = FakeStorage::start(remote).await;
    let dir = TempDir::new().unwrap();

    let client = server.client_with_key("not-the-key");
    match client.list_buckets().await {
        Err(StoreError::Status { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected 401, got {other:?}"),
    }

    let err = BackupService::new(client, ListOptions::default(), dir.path())
        .run("proj", &server.base_url, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::List(ListError::Buckets { .. })));
    assert!(!dir.path().join(EXPORT_SUMMARY_FILE).exists());
}

#[tokio::test]
async fn api_errors_map_to_typed_variants() {
    let remote = Arc::new(MemoryStore::new());
    remote.insert_bucket(BucketSettings::private("images"));
    let server = FakeStorage::start(remote).await;
    let client = server.client();

    assert!(matches!(
        client.download("images", "nope.jpg").await,
        Err(StoreError::ObjectNotFound { .. })
    ));
    assert!(matches!(
        client.list_page("missing", "", 10, 0).await,
        Err(StoreError::BucketNotFound(name)) if name == "missing"
    ));
    assert!(matches!(
        client.update_bucket(&BucketSettings::private("missing")).await,
        Err(StoreError::BucketNotFound(_))
    ));
    assert!(matches!(
        client.create_bucket(&BucketSettings::private("images")).await,
        Err(StoreError::AlreadyExists(name)) if name == "images"
    ));
}
