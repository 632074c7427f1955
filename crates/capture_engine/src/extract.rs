use std::collections::HashSet;

use capture_core::{normalize_url_for_dedupe, CaptureOptions, ResourceKind};
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::urls::{css_urls, parse_srcset, resolve_reference};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    /// Normalized absolute URL; also the dedupe key.
    pub url: String,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Base every reference was resolved against (`<base href>` or the page URL).
    pub base_url: Url,
    /// Discovery order, deduplicated, at most `max_files` long.
    pub resources: Vec<DiscoveredResource>,
    /// Unique candidates dropped because the cap was reached.
    pub truncated: usize,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, page_url: &Url, options: &CaptureOptions) -> Extraction;
}

/// Structural extractor over the parsed DOM:
/// - images: `img[src|srcset]`, `source[srcset]`, `input[type=image]`,
///   `video[poster]`, icon links, and `url(...)` in `<style>` / `style=""`
/// - stylesheets: `link[rel~=stylesheet]`
/// - scripts: `script[src]`
/// - fonts: `url(...)` in inline CSS with a font extension, gated by
///   `include_styles`
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlResourceExtractor;

impl Extractor for HtmlResourceExtractor {
    fn extract(&self, html: &str, page_url: &Url, options: &CaptureOptions) -> Extraction {
        let document = Html::parse_document(html);
        let base_url = document_base(&document, page_url);
        let mut collector = Collector::new(base_url.clone(), options);

        if !options.captures_nothing() {
            for node in document.root_element().descendants() {
                visit_node(node, &mut collector);
            }
        }

        Extraction {
            base_url,
            resources: collector.resources,
            truncated: collector.truncated,
        }
    }
}

/// First `<base href>` resolved against the page URL, or the page URL itself.
pub fn document_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };
    document
        .select(&selector)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or_else(|| page_url.clone())
}

fn visit_node(node: NodeRef<'_, Node>, collector: &mut Collector) {
    let Some(element) = ElementRef::wrap(node) else {
        return;
    };
    let value = element.value();

    if let Some(style) = value.attr("style") {
        collector.add_css(style);
    }

    match value.name() {
        "img" => {
            if collector.options.include_images {
                if let Some(src) = value.attr("src") {
                    collector.add(src, ResourceKind::Image);
                }
                if let Some(srcset) = value.attr("srcset") {
                    collector.add_srcset(srcset);
                }
            }
        }
        "source" => {
            if collector.options.include_images {
                if let Some(srcset) = value.attr("srcset") {
                    collector.add_srcset(srcset);
                }
            }
        }
        "input" => {
            let is_image = value
                .attr("type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("image"));
            if collector.options.include_images && is_image {
                if let Some(src) = value.attr("src") {
                    collector.add(src, ResourceKind::Image);
                }
            }
        }
        "video" => {
            if collector.options.include_images {
                if let Some(poster) = value.attr("poster") {
                    collector.add(poster, ResourceKind::Image);
                }
            }
        }
        "link" => {
            let Some(href) = value.attr("href") else {
                return;
            };
            match link_kind(value.attr("rel").unwrap_or_default()) {
                Some(ResourceKind::Stylesheet) if collector.options.include_styles => {
                    collector.add(href, ResourceKind::Stylesheet);
                }
                Some(ResourceKind::Image) if collector.options.include_images => {
                    collector.add(href, ResourceKind::Image);
                }
                _ => {}
            }
        }
        "script" => {
            if collector.options.include_scripts {
                if let Some(src) = value.attr("src") {
                    collector.add(src, ResourceKind::Script);
                }
            }
        }
        "style" => {
            let css: String = element.text().collect();
            collector.add_css(&css);
        }
        _ => {}
    }
}

/// Resource kind implied by a `<link rel>` value, if any.
pub fn link_kind(rel: &str) -> Option<ResourceKind> {
    let mut kind = None;
    for token in rel.split_ascii_whitespace() {
        let token = token.to_ascii_lowercase();
        match token.as_str() {
            "stylesheet" => return Some(ResourceKind::Stylesheet),
            "icon" | "apple-touch-icon" | "apple-touch-icon-precomposed" | "mask-icon" => {
                kind = Some(ResourceKind::Image)
            }
            _ => {}
        }
    }
    kind
}

const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];

/// Kind of a `url(...)` reference found in CSS: fonts by extension, images
/// otherwise.
pub fn css_reference_kind(url: &Url) -> ResourceKind {
    let extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension {
        Some(ext) if FONT_EXTENSIONS.contains(&ext.as_str()) => ResourceKind::Font,
        _ => ResourceKind::Image,
    }
}

struct Collector<'a> {
    base_url: Url,
    options: &'a CaptureOptions,
    seen: HashSet<String>,
    resources: Vec<DiscoveredResource>,
    truncated: usize,
}

impl<'a> Collector<'a> {
    fn new(base_url: Url, options: &'a CaptureOptions) -> Self {
        Self {
            base_url,
            options,
            seen: HashSet::new(),
            resources: Vec::new(),
            truncated: 0,
        }
    }

    fn add(&mut self, reference: &str, kind: ResourceKind) {
        let Some(url) = resolve_reference(reference, &self.base_url) else {
            return;
        };
        self.push(url, kind);
    }

    fn add_css(&mut self, css: &str) {
        for reference in css_urls(css) {
            let Some(url) = resolve_reference(&reference, &self.base_url) else {
                continue;
            };
            let kind = css_reference_kind(&url);
            let wanted = match kind {
                ResourceKind::Font => self.options.include_styles,
                _ => self.options.include_images,
            };
            if wanted {
                self.push(url, kind);
            }
        }
    }

    fn push(&mut self, url: Url, kind: ResourceKind) {
        let Some(key) = normalize_url_for_dedupe(url.as_str()) else {
            return;
        };
        if !self.seen.insert(key.clone()) {
            return;
        }
        // Deterministic truncation: the first `max_files` unique URLs win.
        if self.resources.len() >= self.options.max_files {
            self.truncated += 1;
            return;
        }
        self.resources.push(DiscoveredResource { url: key, kind });
    }

    fn add_srcset(&mut self, srcset: &str) {
        for candidate in parse_srcset(srcset) {
            self.add(&candidate.url, ResourceKind::Image);
        }
    }
}
