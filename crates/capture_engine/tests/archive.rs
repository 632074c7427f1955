use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use bytes::Bytes;
use capture_core::{FileEntry, FileStatus, ResourceKind};
use capture_engine::{package, ArchiveRequest, INDEX_FILE, MANIFEST_FILE};
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use url::Url;

fn entry(url: &str, local: &str, kind: ResourceKind, status: FileStatus) -> FileEntry {
    let mut entry = FileEntry::pending(url, local, kind);
    entry.status = status;
    entry
}

fn read_entry(archive: &mut zip::ZipArchive<File>, name: &str) -> Vec<u8> {
    let mut file = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).unwrap();
    buf
}

#[test]
fn archive_holds_page_completed_resources_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let page = Url::parse("https://example.com/index").unwrap();
    let html = r#"<html><head><link rel="stylesheet" href="/s.css"></head><body><img src="/a.png"><img src="/gone.png"></body></html>"#;

    let mut completed = entry(
        "https://example.com/a.png",
        "images/a--11111111.png",
        ResourceKind::Image,
        FileStatus::Completed,
    );
    completed.size_bytes = Some(3);
    let mut css = entry(
        "https://example.com/s.css",
        "css/s--22222222.css",
        ResourceKind::Stylesheet,
        FileStatus::Completed,
    );
    css.size_bytes = Some(12);
    let mut failed = entry(
        "https://example.com/gone.png",
        "images/gone--33333333.png",
        ResourceKind::Image,
        FileStatus::Failed,
    );
    failed.error = Some("http status 404".to_string());
    let entries = vec![completed, css, failed];
    let bodies = HashMap::from([
        (0, Bytes::from_static(b"PNG")),
        (1, Bytes::from_static(b"body{margin}")),
    ]);

    let packaged = package(
        &ArchiveRequest {
            source_url: "https://example.com/index",
            final_url: &page,
            base_url: &page,
            status_code: 200,
            html,
            entries: &entries,
            bodies: &bodies,
            captured_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        },
        dir.path(),
    )
    .unwrap();

    assert_eq!(packaged.path, dir.path().join("example.com_20240501_123000.zip"));
    assert_eq!(packaged.stored_resources, 2);
    assert!(packaged.html.contains(r#"src="images/a--11111111.png""#));
    assert!(packaged.html.contains(r#"href="css/s--22222222.css""#));
    assert!(packaged.html.contains(r#"src="https://example.com/gone.png""#));

    let mut archive = zip::ZipArchive::new(File::open(&packaged.path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "css/s--22222222.css",
            "images/a--11111111.png",
            INDEX_FILE,
            MANIFEST_FILE,
        ]
    );
    assert_eq!(read_entry(&mut archive, "images/a--11111111.png"), b"PNG");
    assert_eq!(
        String::from_utf8(read_entry(&mut archive, INDEX_FILE)).unwrap(),
        packaged.html
    );

    let manifest: serde_json::Value =
        serde_json::from_slice(&read_entry(&mut archive, MANIFEST_FILE)).unwrap();
    assert_eq!(manifest["sourceUrl"], "https://example.com/index");
    assert_eq!(manifest["capturedAt"], "2024-05-01T12:30:00Z");
    assert_eq!(manifest["statusCode"], 200);
    assert_eq!(manifest["files"].as_array().unwrap().len(), 3);
    assert_eq!(manifest["files"][2]["status"], "failed");
    assert_eq!(manifest["files"][2]["error"], "http status 404");
}

#[test]
fn page_without_resources_still_yields_a_valid_archive() {
    let dir = tempfile::tempdir().unwrap();
    let page = Url::parse("http://plain.example.org/").unwrap();

    let packaged = package(
        &ArchiveRequest {
            source_url: page.as_str(),
            final_url: &page,
            base_url: &page,
            status_code: 200,
            html: "<p>just text</p>",
            entries: &[],
            bodies: &HashMap::new(),
            captured_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        },
        dir.path(),
    )
    .unwrap();

    let mut archive = zip::ZipArchive::new(File::open(&packaged.path).unwrap()).unwrap();
    assert_eq!(archive.len(), 2);
    assert_eq!(read_entry(&mut archive, INDEX_FILE), b"<p>just text</p>");
}

#[test]
fn output_dir_that_is_a_file_is_an_archive_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let page = Url::parse("https://example.com/").unwrap();

    let err = package(
        &ArchiveRequest {
            source_url: page.as_str(),
            final_url: &page,
            base_url: &page,
            status_code: 200,
            html: "<p></p>",
            entries: &[],
            bodies: &HashMap::new(),
            captured_at: Utc::now(),
        },
        &blocker,
    )
    .unwrap_err();
    assert!(matches!(err, capture_engine::ArchiveError::Persist(_)), "{err:?}");
}

#[test]
fn stored_stylesheet_points_at_archived_and_live_resources() {
    let dir = tempfile::tempdir().unwrap();
    let page = Url::parse("https://example.com/").unwrap();
    let html = r#"<link rel="stylesheet" href="/static/css/site.css"><img src="/static/img/a.png">"#;

    let entries = vec![
        entry(
            "https://example.com/static/css/site.css",
            "css/site--44444444.css",
            ResourceKind::Stylesheet,
            FileStatus::Completed,
        ),
        entry(
            "https://example.com/static/img/a.png",
            "images/a--55555555.png",
            ResourceKind::Image,
            FileStatus::Completed,
        ),
    ];
    let bodies = HashMap::from([
        (
            0,
            Bytes::from_static(b"p{background:url(../img/a.png)} q{background:url(../img/b.png)}"),
        ),
        (1, Bytes::from_static(b"PNG")),
    ]);

    let packaged = package(
        &ArchiveRequest {
            source_url: page.as_str(),
            final_url: &page,
            base_url: &page,
            status_code: 200,
            html,
            entries: &entries,
            bodies: &bodies,
            captured_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        },
        dir.path(),
    )
    .unwrap();

    let mut archive = zip::ZipArchive::new(File::open(&packaged.path).unwrap()).unwrap();
    assert_eq!(
        String::from_utf8(read_entry(&mut archive, "css/site--44444444.css")).unwrap(),
        r#"p{background:url("../images/a--55555555.png")} q{background:url("https://example.com/static/img/b.png")}"#
    );
    assert_eq!(read_entry(&mut archive, "images/a--55555555.png"), b"PNG");
}
