use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use capture_core::{normalize_url_for_dedupe, FileEntry, FileStatus, ResourceKind};
use capture_logging::{capture_debug, capture_info};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use url::Url;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::persist::{PersistError, StagedFile};
use crate::rewrite::{rewrite_html, rewrite_stylesheet, RewriteError};

pub const INDEX_FILE: &str = "index.html";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Everything the archiver needs about one finished capture.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveRequest<'a> {
    pub source_url: &'a str,
    pub final_url: &'a Url,
    /// Base the page's references resolve against.
    pub base_url: &'a Url,
    pub status_code: u16,
    pub html: &'a str,
    pub entries: &'a [FileEntry],
    /// Bodies of completed entries, keyed by position in `entries`.
    pub bodies: &'a HashMap<usize, Bytes>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArchive {
    pub path: PathBuf,
    /// The rewritten page stored as `index.html`.
    pub html: String,
    pub stored_resources: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    source_url: &'a str,
    final_url: &'a str,
    captured_at: String,
    status_code: u16,
    entry_point: &'static str,
    files: &'a [FileEntry],
}

/// Rewrite the page and write it with every completed resource into
/// `{output_dir}/{host}_{YYYYMMDD_HHMMSS}.zip`.
pub fn package(
    request: &ArchiveRequest<'_>,
    output_dir: &Path,
) -> Result<PackagedArchive, ArchiveError> {
    let stored: Vec<(&FileEntry, &Bytes)> = request
        .entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.status == FileStatus::Completed)
        .filter_map(|(index, entry)| request.bodies.get(&index).map(|body| (entry, body)))
        .collect();

    let local_paths: HashMap<String, String> = stored
        .iter()
        .map(|(entry, _)| {
            let key = normalize_url_for_dedupe(&entry.url).unwrap_or_else(|| entry.url.clone());
            (key, entry.local_path.clone())
        })
        .collect();

    let rewritten = rewrite_html(request.html, request.base_url, &local_paths)?;
    capture_debug!(
        "rewrote {} references to local paths ({} resources stored)",
        rewritten.localized,
        stored.len()
    );

    let manifest = Manifest {
        source_url: request.source_url,
        final_url: request.final_url.as_str(),
        captured_at: request
            .captured_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        status_code: request.status_code,
        entry_point: INDEX_FILE,
        files: request.entries,
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest)?;

    let stem = archive_stem(request.final_url, request.captured_at);
    let mut staged = StagedFile::create(output_dir, &stem, "zip")?;
    {
        let mut zip = ZipWriter::new(staged.file_mut());
        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored_only = FileOptions::default().compression_method(CompressionMethod::Stored);

        zip.start_file(INDEX_FILE, deflated)?;
        zip.write_all(rewritten.html.as_bytes())?;

        for (entry, body) in &stored {
            // Image formats are already compressed.
            let options = if entry.kind == ResourceKind::Image {
                stored_only
            } else {
                deflated
            };
            zip.start_file(entry.local_path.as_str(), options)?;
            zip.write_all(&stored_body(entry, body, &local_paths))?;
        }

        zip.start_file(MANIFEST_FILE, deflated)?;
        zip.write_all(&manifest_json)?;
        zip.finish()?;
    }
    let path = staged.commit()?;
    capture_info!("archive written to {}", path.display());

    Ok(PackagedArchive {
        path,
        html: rewritten.html,
        stored_resources: stored.len(),
    })
}

/// Stylesheet bodies get their `url(...)` references rewritten; non-UTF-8
/// stylesheets and every other kind are stored as downloaded.
fn stored_body<'a>(
    entry: &FileEntry,
    body: &'a Bytes,
    local_paths: &HashMap<String, String>,
) -> Cow<'a, [u8]> {
    if entry.kind != ResourceKind::Stylesheet {
        return Cow::Borrowed(body);
    }
    let (Ok(css), Ok(sheet_url)) = (std::str::from_utf8(body), Url::parse(&entry.url)) else {
        return Cow::Borrowed(body);
    };
    Cow::Owned(rewrite_stylesheet(css, &sheet_url, local_paths).into_bytes())
}

/// `{sanitised host}_{YYYYMMDD_HHMMSS}`.
pub fn archive_stem(page_url: &Url, captured_at: DateTime<Utc>) -> String {
    let host: String = page_url
        .host_str()
        .unwrap_or("page")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let host = host.trim_matches('.');
    let host = if host.is_empty() { "page" } else { host };
    format!("{}_{}", host, captured_at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stem_uses_host_and_utc_timestamp() {
        let url = Url::parse("https://www.example.com:8443/a/b?c=1").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(archive_stem(&url, at), "www.example.com_20240309_070501");
    }

    #[test]
    fn ipv6_host_is_sanitised() {
        let url = Url::parse("http://[::1]:8080/").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(archive_stem(&url, at), "___1__20240101_000000");
    }
}
