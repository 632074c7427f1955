use std::collections::HashSet;

use capture_core::ResourceKind;
use sha2::{Digest, Sha256};
use url::Url;

const MAX_STEM_LEN: usize = 60;
const MAX_EXTENSION_LEN: usize = 5;

/// Hands out archive-relative paths for discovered resources:
/// `{dir}/{sanitized_stem}--{short_hash(url)}.{ext}`. Paths are deterministic
/// for a given URL and unique within one allocator.
#[derive(Debug, Default)]
pub struct LocalPathAllocator {
    used: HashSet<String>,
}

impl LocalPathAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, url: &str, kind: ResourceKind) -> String {
        let (stem, extension) = stem_and_extension(url, kind);
        let hash = short_hash(url);
        let dir = kind.directory();

        let mut candidate = format!("{dir}/{stem}--{hash}.{extension}");
        let mut suffix = 2;
        while !self.used.insert(candidate.to_ascii_lowercase()) {
            candidate = format!("{dir}/{stem}--{hash}-{suffix}.{extension}");
            suffix += 1;
        }
        candidate
    }
}

fn stem_and_extension(url: &str, kind: ResourceKind) -> (String, String) {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .map(|s| percent_decode_lossy(&s))
        .unwrap_or_default();

    let (raw_stem, raw_ext) = match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (segment.as_str(), None),
    };

    let extension = raw_ext
        .map(str::to_ascii_lowercase)
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| default_extension(kind).to_string());

    (sanitize_stem(raw_stem), extension)
}

fn default_extension(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Image => "bin",
        ResourceKind::Stylesheet => "css",
        ResourceKind::Script => "js",
        ResourceKind::Font => "woff",
    }
}

fn percent_decode_lossy(input: &str) -> String {
    url::form_urlencoded::parse(format!("x={}", input.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| input.to_string())
}

/// Windows-safe stem: forbidden characters become `_`, runs of `_` collapse,
/// reserved device names get a trailing `_`.
fn sanitize_stem(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    if compacted.is_empty() {
        compacted = "file".to_string();
    }
    if compacted.chars().count() > MAX_STEM_LEN {
        compacted = compacted.chars().take(MAX_STEM_LEN).collect();
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '%' | ' ' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

pub(crate) fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_grouped_by_kind_and_keeps_extension() {
        let mut paths = LocalPathAllocator::new();
        let path = paths.allocate("https://example.com/static/Logo.PNG?v=3", ResourceKind::Image);
        assert!(path.starts_with("images/Logo--"));
        assert!(path.ends_with(".png"));
    }

    #[test]
    fn missing_or_odd_extension_uses_kind_default() {
        let mut paths = LocalPathAllocator::new();
        let css = paths.allocate("https://example.com/css?family=Roboto", ResourceKind::Stylesheet);
        assert!(css.starts_with("css/css--") && css.ends_with(".css"), "{css}");
        let js = paths.allocate("https://example.com/", ResourceKind::Script);
        assert!(js.starts_with("js/file--") && js.ends_with(".js"), "{js}");
        let img = paths.allocate("https://example.com/a.verylongext", ResourceKind::Image);
        assert!(img.ends_with(".bin"), "{img}");
    }

    #[test]
    fn same_url_twice_gets_distinct_paths() {
        let mut paths = LocalPathAllocator::new();
        let first = paths.allocate("https://example.com/a.js", ResourceKind::Script);
        let second = paths.allocate("https://example.com/a.js", ResourceKind::Script);
        assert_ne!(first, second);
        assert!(second.ends_with("-2.js"));
    }

    #[test]
    fn reserved_and_forbidden_names_are_patched() {
        let mut paths = LocalPathAllocator::new();
        let path = paths.allocate("https://example.com/CON.png", ResourceKind::Image);
        assert!(path.starts_with("images/CON_--"), "{path}");
        let path = paths.allocate("https://example.com/a%20b%3Fc.png", ResourceKind::Image);
        assert!(path.starts_with("images/a_b_c--"), "{path}");
    }
}
