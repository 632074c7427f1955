use std::collections::HashMap;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};

use capture_core::normalize_url_for_dedupe;
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, text, HtmlRewriter, Settings};
use url::Url;

use crate::extract::link_kind;
use crate::urls::{resolve_reference, rewrite_css_urls, rewrite_srcset};

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("html rewrite failed: {0}")]
    Rewriting(String),
    #[error("rewritten html is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenHtml {
    pub html: String,
    /// References pointed at a local archive path.
    pub localized: usize,
}

/// Rewrite resource references in `html` for offline use.
///
/// `local_paths` maps normalized absolute URLs of downloaded resources to
/// archive-relative paths. Mapped references become local; other resource
/// references and `<a href>` links become absolute so they keep pointing at
/// the live site once `<base>` is removed. Charset declarations are set to
/// UTF-8 because the output is UTF-8.
pub fn rewrite_html(
    html: &str,
    base_url: &Url,
    local_paths: &HashMap<String, String>,
) -> Result<RewrittenHtml, RewriteError> {
    let ctx = RewriteContext {
        base_url,
        local_paths,
        localized: AtomicUsize::new(0),
    };
    let mut output = Vec::with_capacity(html.len());
    let mut style_text = String::new();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("base", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("meta[charset]", |el| {
                    el.set_attribute("charset", "utf-8")?;
                    Ok(())
                }),
                element!("meta[http-equiv]", |el| {
                    let is_content_type = el
                        .get_attribute("http-equiv")
                        .is_some_and(|v| v.trim().eq_ignore_ascii_case("content-type"));
                    if is_content_type {
                        el.set_attribute("content", "text/html; charset=utf-8")?;
                    }
                    Ok(())
                }),
                element!("img[src]", |el| ctx.rewrite_attr(el, "src")),
                element!("img[srcset]", |el| ctx.rewrite_srcset_attr(el)),
                element!("source[srcset]", |el| ctx.rewrite_srcset_attr(el)),
                element!("input[src]", |el| ctx.rewrite_attr(el, "src")),
                element!("script[src]", |el| ctx.rewrite_attr(el, "src")),
                element!("video[poster]", |el| ctx.rewrite_attr(el, "poster")),
                element!("link[href]", |el| {
                    let rel = el.get_attribute("rel").unwrap_or_default();
                    if link_kind(&rel).is_some() {
                        ctx.rewrite_attr(el, "href")
                    } else {
                        ctx.absolutize_attr(el, "href")
                    }
                }),
                element!("a[href]", |el| ctx.absolutize_attr(el, "href")),
                element!("area[href]", |el| ctx.absolutize_attr(el, "href")),
                element!("[style]", |el| {
                    if let Some(style) = el.get_attribute("style") {
                        let rewritten = rewrite_css_urls(&style, |r| ctx.map_resource(r));
                        if rewritten != style {
                            el.set_attribute("style", &rewritten)?;
                        }
                    }
                    Ok(())
                }),
                text!("style", |chunk| {
                    // Text arrives in chunks; rewrite once the node is complete.
                    style_text.push_str(chunk.as_str());
                    if chunk.last_in_text_node() {
                        let rewritten = rewrite_css_urls(&style_text, |r| ctx.map_resource(r));
                        chunk.replace(&rewritten, ContentType::Html);
                        style_text.clear();
                    } else {
                        chunk.remove();
                    }
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| RewriteError::Rewriting(e.to_string()))?;
    rewriter
        .end()
        .map_err(|e| RewriteError::Rewriting(e.to_string()))?;

    let localized = ctx.localized.load(Ordering::Relaxed);
    Ok(RewrittenHtml {
        html: String::from_utf8(output)?,
        localized,
    })
}

/// Rewrite `url(...)` references inside a stored stylesheet. References to
/// downloaded resources become paths relative to the stylesheet's archive
/// directory; everything else is made absolute against `sheet_url`.
pub fn rewrite_stylesheet(
    css: &str,
    sheet_url: &Url,
    local_paths: &HashMap<String, String>,
) -> String {
    rewrite_css_urls(css, |reference| {
        let absolute = resolve_reference(reference, sheet_url)?;
        let key = normalize_url_for_dedupe(absolute.as_str())?;
        Some(match local_paths.get(&key) {
            Some(local) => format!("../{local}"),
            None => absolute.into(),
        })
    })
}

struct RewriteContext<'a> {
    base_url: &'a Url,
    local_paths: &'a HashMap<String, String>,
    localized: AtomicUsize,
}

impl RewriteContext<'_> {
    /// Local path for a downloaded resource, otherwise its absolute URL.
    /// `None` leaves the reference untouched.
    fn map_resource(&self, reference: &str) -> Option<String> {
        let absolute = resolve_reference(reference, self.base_url)?;
        let key = normalize_url_for_dedupe(absolute.as_str())?;
        match self.local_paths.get(&key) {
            Some(local) => {
                self.localized.fetch_add(1, Ordering::Relaxed);
                Some(local.clone())
            }
            None => Some(absolute.into()),
        }
    }

    fn rewrite_attr(&self, el: &mut Element<'_, '_>, attr: &str) -> HandlerResult {
        if let Some(value) = el.get_attribute(attr) {
            if let Some(mapped) = self.map_resource(&value) {
                el.set_attribute(attr, &mapped)?;
            }
        }
        Ok(())
    }

    fn rewrite_srcset_attr(&self, el: &mut Element<'_, '_>) -> HandlerResult {
        if let Some(value) = el.get_attribute("srcset") {
            let rewritten = rewrite_srcset(&value, |r| self.map_resource(r));
            el.set_attribute("srcset", &rewritten)?;
        }
        Ok(())
    }

    fn absolutize_attr(&self, el: &mut Element<'_, '_>, attr: &str) -> HandlerResult {
        if let Some(value) = el.get_attribute(attr) {
            if let Some(absolute) = resolve_reference(&value, self.base_url) {
                el.set_attribute(attr, absolute.as_str())?;
            }
        }
        Ok(())
    }
}
