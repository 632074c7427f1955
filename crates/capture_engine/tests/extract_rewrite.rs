use std::collections::HashMap;

use capture_core::{CaptureOptions, ResourceKind};
use capture_engine::{
    css_reference_kind, rewrite_html, rewrite_stylesheet, Extractor, HtmlResourceExtractor,
    LocalPathAllocator,
};
use pretty_assertions::assert_eq;
use url::Url;

const PAGE: &str = r##"<!DOCTYPE html>
<html><head>
<base href="https://cdn.example.com/assets/">
<meta charset="iso-8859-1">
<link rel="stylesheet" href="site.css">
<link rel="icon" href="/favicon.ico">
<link rel="canonical" href="/canonical">
<script src="app.js"></script>
<style>body { background: url('bg.png'); }</style>
</head><body>
<img src="logo.png" srcset="logo.png 1x, logo@2x.png 2x">
<img src="data:image/png;base64,AAAA">
<picture><source srcset="hero.webp"></picture>
<input type="image" src="go.gif">
<video poster="poster.jpg"></video>
<div style="background-image: url(tile.png)"></div>
<a href="page2.html">next</a>
<a href="#top">top</a>
<script>inline()</script>
<img src="logo.png#again">
</body></html>"##;

fn page_url() -> Url {
    Url::parse("https://www.example.com/blog/post").unwrap()
}

fn extract(options: &CaptureOptions) -> capture_engine::Extraction {
    HtmlResourceExtractor.extract(PAGE, &page_url(), options)
}

#[test]
fn discovers_every_reference_kind_in_document_order() {
    let extraction = extract(&CaptureOptions::default());

    assert_eq!(
        extraction.base_url.as_str(),
        "https://cdn.example.com/assets/"
    );
    let found: Vec<(&str, ResourceKind)> = extraction
        .resources
        .iter()
        .map(|r| (r.url.as_str(), r.kind))
        .collect();
    assert_eq!(
        found,
        vec![
            ("https://cdn.example.com/assets/site.css", ResourceKind::Stylesheet),
            ("https://cdn.example.com/favicon.ico", ResourceKind::Image),
            ("https://cdn.example.com/assets/app.js", ResourceKind::Script),
            ("https://cdn.example.com/assets/bg.png", ResourceKind::Image),
            ("https://cdn.example.com/assets/logo.png", ResourceKind::Image),
            ("https://cdn.example.com/assets/logo@2x.png", ResourceKind::Image),
            ("https://cdn.example.com/assets/hero.webp", ResourceKind::Image),
            ("https://cdn.example.com/assets/go.gif", ResourceKind::Image),
            ("https://cdn.example.com/assets/poster.jpg", ResourceKind::Image),
            ("https://cdn.example.com/assets/tile.png", ResourceKind::Image),
        ]
    );
    assert_eq!(extraction.truncated, 0);
}

#[test]
fn disabled_classes_are_not_discovered() {
    let options = CaptureOptions {
        include_images: false,
        ..CaptureOptions::default()
    };
    let kinds: Vec<ResourceKind> = extract(&options).resources.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![ResourceKind::Stylesheet, ResourceKind::Script]);

    let nothing = CaptureOptions {
        include_images: false,
        include_styles: false,
        include_scripts: false,
        ..CaptureOptions::default()
    };
    assert!(extract(&nothing).resources.is_empty());
}

#[test]
fn cap_keeps_the_first_unique_urls() {
    let options = CaptureOptions {
        max_files: 3,
        ..CaptureOptions::default()
    };
    let extraction = extract(&options);
    let urls: Vec<&str> = extraction.resources.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://cdn.example.com/assets/site.css",
            "https://cdn.example.com/favicon.ico",
            "https://cdn.example.com/assets/app.js",
        ]
    );
    assert_eq!(extraction.truncated, 7);
}

#[test]
fn rewrite_localizes_mapped_references_and_absolutizes_the_rest() {
    let extraction = extract(&CaptureOptions::default());
    let local_paths = HashMap::from([
        (
            "https://cdn.example.com/assets/site.css".to_string(),
            "css/site.css".to_string(),
        ),
        (
            "https://cdn.example.com/assets/logo.png".to_string(),
            "images/logo.png".to_string(),
        ),
    ]);

    let rewritten = rewrite_html(PAGE, &extraction.base_url, &local_paths).unwrap();
    let html = &rewritten.html;

    assert!(!html.contains("<base"), "{html}");
    assert!(html.contains(r#"<meta charset="utf-8">"#), "{html}");
    assert!(html.contains(r#"href="css/site.css""#), "{html}");
    assert!(html.contains(r#"src="images/logo.png""#), "{html}");
    assert!(
        html.contains(r#"srcset="images/logo.png 1x, https://cdn.example.com/assets/logo@2x.png 2x""#),
        "{html}"
    );
    assert!(html.contains(r#"href="https://cdn.example.com/favicon.ico""#), "{html}");
    assert!(html.contains(r#"src="https://cdn.example.com/assets/app.js""#), "{html}");
    assert!(html.contains(r#"url("https://cdn.example.com/assets/bg.png")"#), "{html}");
    assert!(html.contains(r#"href="https://cdn.example.com/assets/page2.html""#), "{html}");
    assert!(html.contains(r##"href="#top""##), "{html}");
    assert!(html.contains("data:image/png;base64,AAAA"), "{html}");
    assert!(html.contains("inline()"), "{html}");
    // src, srcset entry, the fragment duplicate and the stylesheet.
    assert_eq!(rewritten.localized, 4);
}

#[test]
fn every_discovered_resource_points_into_the_archive_after_rewrite() {
    let extraction = extract(&CaptureOptions::default());
    let mut paths = LocalPathAllocator::new();
    let local_paths: HashMap<String, String> = extraction
        .resources
        .iter()
        .map(|r| (r.url.clone(), paths.allocate(&r.url, r.kind)))
        .collect();

    let rewritten = rewrite_html(PAGE, &extraction.base_url, &local_paths).unwrap();

    for (url, local) in &local_paths {
        assert!(rewritten.html.contains(local.as_str()), "missing {local}");
        assert!(!rewritten.html.contains(url.as_str()), "still remote {url}");
    }
}

#[test]
fn page_without_base_resolves_against_page_url() {
    let html = r#"<img src="../img/a.png"><link rel="stylesheet" href="//static.example.com/s.css">"#;
    let extraction = HtmlResourceExtractor.extract(html, &page_url(), &CaptureOptions::default());
    let urls: Vec<&str> = extraction.resources.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://www.example.com/img/a.png",
            "https://static.example.com/s.css",
        ]
    );
}

#[test]
fn css_references_with_font_extensions_are_fonts() {
    let kind = |url: &str| css_reference_kind(&Url::parse(url).unwrap());
    assert_eq!(kind("https://e.com/f/Body.WOFF2"), ResourceKind::Font);
    assert_eq!(kind("https://e.com/f/body.ttf?v=2#iefix"), ResourceKind::Font);
    assert_eq!(kind("https://e.com/f/legacy.eot"), ResourceKind::Font);
    assert_eq!(kind("https://e.com/img/hand.cur"), ResourceKind::Image);
    assert_eq!(kind("https://e.com/img/bg"), ResourceKind::Image);
}

#[test]
fn stylesheet_references_resolve_against_the_stylesheet() {
    let sheet = Url::parse("https://example.com/static/css/site.css").unwrap();
    let local_paths = HashMap::from([(
        "https://example.com/static/img/logo.png".to_string(),
        "images/logo--0a1b2c3d.png".to_string(),
    )]);
    let css = r#"h1 { background: url(../img/logo.png); }
h2 { background: url('../img/other.png'); }
@font-face { src: url("/fonts/body.woff2"); }
i { background: url(data:image/gif;base64,R0lGOD); }"#;

    let rewritten = rewrite_stylesheet(css, &sheet, &local_paths);

    assert_eq!(
        rewritten,
        r#"h1 { background: url("../images/logo--0a1b2c3d.png"); }
h2 { background: url("https://example.com/static/img/other.png"); }
@font-face { src: url("https://example.com/fonts/body.woff2"); }
i { background: url(data:image/gif;base64,R0lGOD); }"#
    );
}
