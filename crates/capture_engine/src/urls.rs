use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Schemes whose references are never fetched: the content is inline, or it
/// is not a resource at all.
const SKIPPED_SCHEMES: &[&str] = &["data:", "javascript:", "blob:", "about:", "mailto:", "tel:"];

static CSS_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]+))\s*\)"#).ok()
});

/// Resolve an attribute or CSS reference against `base`. Returns `None` for
/// empty, fragment-only and non-fetchable references, and for anything that
/// does not end up as an absolute http(s) URL.
pub fn resolve_reference(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }
    let url = base.join(trimmed).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// One image candidate of a `srcset` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetCandidate {
    pub url: String,
    pub descriptor: Option<String>,
}

/// Split a `srcset` value into candidates. URLs may contain commas, so a
/// comma only ends a candidate when it trails the URL or follows the
/// descriptor.
pub fn parse_srcset(value: &str) -> Vec<SrcsetCandidate> {
    let mut candidates = Vec::new();
    let mut rest = value;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (raw_url, after) = rest.split_at(url_end);
        let url = raw_url.trim_end_matches(',');
        if url.len() < raw_url.len() {
            // Trailing comma: the candidate has no descriptor.
            candidates.push(SrcsetCandidate {
                url: url.to_string(),
                descriptor: None,
            });
            rest = after;
            continue;
        }
        let descriptor_end = after.find(',').unwrap_or(after.len());
        let descriptor = after[..descriptor_end].trim();
        candidates.push(SrcsetCandidate {
            url: url.to_string(),
            descriptor: (!descriptor.is_empty()).then(|| descriptor.to_string()),
        });
        rest = &after[descriptor_end..];
    }
    candidates
}

/// Rebuild a `srcset` value, replacing each candidate URL for which `map`
/// returns a value.
pub fn rewrite_srcset(value: &str, map: impl Fn(&str) -> Option<String>) -> String {
    parse_srcset(value)
        .into_iter()
        .map(|candidate| {
            let url = map(&candidate.url).unwrap_or(candidate.url);
            match candidate.descriptor {
                Some(descriptor) => format!("{url} {descriptor}"),
                None => url,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `url(...)` references in a stylesheet fragment, in source order.
pub fn css_urls(css: &str) -> Vec<String> {
    let Some(regex) = CSS_URL.as_ref() else {
        return Vec::new();
    };
    regex
        .captures_iter(css)
        .filter_map(|caps| css_url_value(&caps).map(str::to_string))
        .collect()
}

/// Replace `url(...)` references for which `map` returns a value. The
/// replacement is always double-quoted.
pub fn rewrite_css_urls(css: &str, map: impl Fn(&str) -> Option<String>) -> String {
    let Some(regex) = CSS_URL.as_ref() else {
        return css.to_string();
    };
    regex
        .replace_all(css, |caps: &Captures| {
            match css_url_value(caps).and_then(&map) {
                Some(replacement) => format!("url(\"{}\")", replacement.replace('"', "%22")),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn css_url_value<'a>(caps: &Captures<'a>) -> Option<&'a str> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}
