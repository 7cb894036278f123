//! End-to-end acceptance over the public API: tree repair, URL and image
//! collection, limits, and determinism.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use html::{
    DocumentFlags, ExceptionKind, ImageFlags, ProcessOptions, TagId, process_part,
    process_part_simple, tag_id_by_name, tag_name_by_id,
};
use urlscan::{UrlFlags, UrlSet};

fn dump(input: &str) -> String {
    process_part_simple(input.as_bytes()).debug_structure()
}

#[test]
fn tree_repair_scenarios() {
    let cases = [
        ("<html><!DOCTYPE html><body>", "+html;++body;"),
        ("<html><div><div></div></div></html>", "+html;++div;+++div;"),
        ("<html><div><div></div></html>", "+html;++div;+++div;"),
        ("<html><div><div></div></html></div>", "+html;++div;+++div;"),
        ("<p><p><a></p></a></a>", "+p;++p;+++a;"),
        ("<div><a href=\"http://example.com\"></div></a>", "+div;++a;"),
        (
            "<html><!DOCTYPE html><body><head><body></body></html></body></html>",
            "+html;++body;+++head;++++body;",
        ),
    ];
    for (input, expected) in cases {
        assert_eq!(dump(input), expected, "dump mismatch for {input:?}");
    }
}

#[test]
fn unmatched_anchor_close_sets_unbalanced() {
    let doc = process_part_simple(b"<p><p><a></p></a></a>");
    assert!(doc.flags.contains(DocumentFlags::UNBALANCED));
}

#[test]
fn anchor_href_is_collected_exactly_once() {
    let mut set = UrlSet::new();
    let mut urls = Vec::new();
    let doc = process_part(
        b"<div><a href=\"http://example.com\"></div></a>",
        ProcessOptions {
            url_set: Some(&mut set),
            part_urls: Some(&mut urls),
            ..ProcessOptions::default()
        },
    );
    assert_eq!(doc.debug_structure(), "+div;++a;");
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].as_str(), "http://example.com");
}

#[test]
fn too_many_tags_is_flagged_and_parse_survives() {
    let mut input = String::new();
    for _ in 0..8193 {
        input.push_str("<div>");
    }
    input.push_str("tail");

    let doc = process_part_simple(input.as_bytes());
    assert!(doc.flags.contains(DocumentFlags::TOO_MANY_TAGS));
    assert_eq!(doc.total_tags(), html::MAX_TAGS);
    assert_eq!(String::from_utf8_lossy(doc.parsed_content()), "tail");
}

#[test]
fn parse_twice_is_byte_identical() {
    let input: &[u8] = b"<html><!DOCTYPE html><head><title>t</title></head>\
        <body>Hi &amp; welcome<br><div><a href=\"http://example.com/a?x=1\">go</a></div>\
        <img src=\"cid:pic@mail\" alt=\"pic\"></body></html>";

    let run = || {
        let mut set = UrlSet::new();
        let mut urls = Vec::new();
        let doc = process_part(
            input,
            ProcessOptions {
                allow_css: true,
                url_set: Some(&mut set),
                part_urls: Some(&mut urls),
                ..ProcessOptions::default()
            },
        );
        let url_strings: Vec<String> = urls.iter().map(|u| u.as_str().to_string()).collect();
        (
            doc.parsed_content().to_vec(),
            doc.flags,
            doc.debug_structure(),
            url_strings,
        )
    };

    assert_eq!(run(), run());
}

#[test]
fn collapsed_whitespace_never_doubles() {
    let inputs = [
        "<div>  a  \t b\r\n\r\n c  </div>",
        "<p> x </p> <p>\t\ty</p>",
        "text   with <b>  tags </b> everywhere",
        "<div>a<!-- c --> \t <span> b </span></div>",
    ];
    for input in inputs {
        let doc = process_part_simple(input.as_bytes());
        let parsed = doc.parsed_content();
        assert!(
            !parsed.windows(2).any(|w| w == b"  "),
            "double space in {:?} from {input:?}",
            String::from_utf8_lossy(parsed)
        );
    }
}

#[test]
fn base_url_rewrites_relative_hrefs() {
    let mut set = UrlSet::new();
    let mut urls = Vec::new();
    process_part(
        b"<html><base href=\"http://base.example\">\
          <a href=\"page.html\">x</a><a href=\"/root.html\">y</a></html>",
        ProcessOptions {
            url_set: Some(&mut set),
            part_urls: Some(&mut urls),
            ..ProcessOptions::default()
        },
    );
    let strings: Vec<&str> = urls.iter().map(|u| u.as_str()).collect();
    assert!(strings.contains(&"http://base.example/page.html"), "{strings:?}");
    assert!(strings.contains(&"http://base.example/root.html"), "{strings:?}");
}

#[test]
fn base_with_path_appends_without_slash() {
    let mut set = UrlSet::new();
    let mut urls = Vec::new();
    process_part(
        b"<html><base href=\"http://base.example/dir/\">\
          <a href=\"page.html\">x</a></html>",
        ProcessOptions {
            url_set: Some(&mut set),
            part_urls: Some(&mut urls),
            ..ProcessOptions::default()
        },
    );
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].as_str(), "http://base.example/dir/page.html");
}

#[test]
fn data_hrefs_are_never_rewritten_or_collected() {
    let mut set = UrlSet::new();
    let mut urls = Vec::new();
    process_part(
        b"<html><base href=\"http://base.example\">\
          <a href=\"data:text/plain;base64,aGk=\">x</a></html>",
        ProcessOptions {
            url_set: Some(&mut set),
            part_urls: Some(&mut urls),
            ..ProcessOptions::default()
        },
    );
    assert!(urls.is_empty(), "{:?}", urls.iter().map(|u| u.as_str()).collect::<Vec<_>>());
}

#[test]
fn query_string_urls_are_discovered() {
    let mut set = UrlSet::new();
    let mut urls = Vec::new();
    process_part(
        b"<div><a href=\"http://r.example/redirect?to=http://target.example/login\">x</a></div>",
        ProcessOptions {
            url_set: Some(&mut set),
            part_urls: Some(&mut urls),
            ..ProcessOptions::default()
        },
    );
    assert_eq!(urls.len(), 2);
    let query_url = urls
        .iter()
        .find(|u| u.flags.contains(UrlFlags::QUERY))
        .expect("query url should be found");
    assert_eq!(query_url.as_str(), "http://target.example/login");
}

#[test]
fn repeated_hrefs_dedup_through_the_set() {
    let mut set = UrlSet::new();
    let mut urls = Vec::new();
    process_part(
        b"<div><a href=\"http://example.com/x\">a</a>\
          <a href=\"http://example.com/x\">b</a></div>",
        ProcessOptions {
            url_set: Some(&mut set),
            part_urls: Some(&mut urls),
            ..ProcessOptions::default()
        },
    );
    assert_eq!(urls.len(), 1);
    assert_eq!(set.len(), 1);
}

#[test]
fn data_url_images_are_sniffed() {
    let mut gif = b"GIF89a".to_vec();
    gif.extend_from_slice(&4u16.to_le_bytes());
    gif.extend_from_slice(&2u16.to_le_bytes());
    gif.push(0);
    let input = format!(
        "<html><img src=\"data:image/gif;base64,{}\"></html>",
        BASE64.encode(&gif)
    );

    let doc = process_part_simple(input.as_bytes());
    assert!(doc.flags.contains(DocumentFlags::HAS_DATA_URLS));
    let img = &doc.images()[0];
    assert!(img.flags.contains(ImageFlags::EMBEDDED | ImageFlags::DATA));
    assert_eq!((img.width, img.height), (4, 2));
    assert_eq!(img.embedded.map(|i| i.format), Some(imginfo::ImageFormat::Gif));
}

#[test]
fn cid_images_resolve_by_content_id() {
    let doc = process_part_simple(b"<html><img src=\"cid:logo@mail\" width=\"10\"></html>");
    let img = doc
        .find_embedded_image_by_cid("logo@mail")
        .expect("cid lookup should succeed");
    assert_eq!(img.src, "cid:logo@mail");
    assert_eq!(img.width, 10);
    assert!(doc.find_embedded_image_by_cid("cid:logo@mail").is_some());
    assert!(doc.find_embedded_image_by_cid("other@mail").is_none());
}

#[test]
fn img_dimensions_fall_back_to_style() {
    let doc = process_part_simple(
        b"<html><img src=\"http://example.com/i.png\" style=\"width: 600px; height:1\"></html>",
    );
    let img = &doc.images()[0];
    assert_eq!((img.width, img.height), (600, 1));
    assert!(img.flags.contains(ImageFlags::EXTERNAL));
}

#[test]
fn link_rel_icon_counts_as_image() {
    let doc = process_part_simple(
        b"<html><body><link rel=\"icon\" href=\"http://example.com/favicon.ico\"></body></html>",
    );
    assert_eq!(doc.images().len(), 1);
    assert!(doc.images()[0].flags.contains(ImageFlags::EXTERNAL));
}

#[test]
fn invisible_text_is_reported_via_exceptions() {
    let mut exceptions = Vec::new();
    let doc = process_part(
        b"<html><body><div>visible</div>\
          <div style=\"display:none\">SECRET</div></body></html>",
        ProcessOptions {
            allow_css: true,
            exceptions: Some(&mut exceptions),
            ..ProcessOptions::default()
        },
    );
    let ex = exceptions
        .iter()
        .find(|e| e.kind == ExceptionKind::Invisible)
        .expect("invisible range expected");
    assert_eq!(
        String::from_utf8_lossy(&doc.parsed_content()[ex.pos..ex.pos + ex.len]),
        "SECRET"
    );
}

#[test]
fn tag_lookups_and_seen_queries() {
    let doc = process_part_simple(b"<html><!DOCTYPE html><body>");
    assert!(doc.tag_seen("html"));
    assert!(doc.tag_seen("BODY"));
    assert!(!doc.tag_seen("div"));
    assert!(!doc.tag_seen("no-such-tag"));

    assert_eq!(tag_id_by_name("div"), Some(TagId::Div));
    assert_eq!(tag_name_by_id(TagId::Div), "div");
    assert_eq!(tag_id_by_name("marquee"), None);
}

#[test]
fn duplicate_unique_elements_are_flagged() {
    let doc = process_part_simple(b"<html><body></body><body></body></html>");
    assert!(doc.flags.contains(DocumentFlags::DUPLICATE_ELEMENTS));

    let doc = process_part_simple(b"<html><body></body></html>");
    assert!(!doc.flags.contains(DocumentFlags::DUPLICATE_ELEMENTS));
}

#[test]
fn nested_anchor_text_is_checked_against_previous_target() {
    let mut set = UrlSet::new();
    let mut urls = Vec::new();
    let mut exceptions = Vec::new();
    process_part(
        b"<div><a href=\"http://evil.example/x\">http://bank.example/login\
          <a href=\"http://evil.example/y\">more</a></a></div>",
        ProcessOptions {
            url_set: Some(&mut set),
            part_urls: Some(&mut urls),
            exceptions: Some(&mut exceptions),
            ..ProcessOptions::default()
        },
    );
    let phished = urls.iter().find(|u| u.flags.contains(UrlFlags::PHISHED));
    assert!(phished.is_some(), "target shown under a foreign host should be phished");
    assert!(
        exceptions.iter().any(|e| e.kind == ExceptionKind::DisplayedUrl),
        "displayed-url range expected"
    );
}
