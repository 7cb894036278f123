//! Per-tag processing: URL resolution against the base URL, image records
//! (external, `cid:`, `data:`), link icons, block colors, query-string URL
//! discovery, and the displayed-text check on anchors.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use memchr::memchr;

use crate::attr::Component;
use crate::document::{Document, ExceptionKind, Image, TagExtra, TagIdx, TextException};
use crate::types::{DocumentFlags, ImageFlags, TagFlags};
use urlscan::{Url, UrlFlags, UrlSet};

/// Resolves the tag's href/src/action into a URL, applying base-URL
/// rewriting for relative values, and stores it in the tag's `extra` when
/// that slot is still free.
pub(crate) fn process_url_tag(doc: &mut Document, tag: TagIdx) -> Option<Url> {
    let mut href = doc.tags[tag].find_component(Component::Href)?.to_string();

    if let Some(base) = doc.base_url.as_ref()
        && href.len() > 2
        && !href.contains("://")
    {
        // a relative value cannot be a schemeful or data URL
        if href.as_bytes()[..5.min(href.len())].eq_ignore_ascii_case(b"data:") {
            return None;
        }
        if href.starts_with('/') && !href.starts_with("//") {
            // relative to the base host
            if let Some(host) = base.host_str() {
                href = format!("{}://{}{}", base.scheme(), host, href);
            }
        } else {
            // relative to the base itself; a bare-host base needs a slash
            let slash = if base.data_len() == 0 { "/" } else { "" };
            href = format!("{}{}{}", base.as_str(), slash, href);
        }
    }

    let url = urlscan::parse_url(&href)?;
    if matches!(doc.tags[tag].extra, TagExtra::None) {
        doc.tags[tag].extra = TagExtra::Url(url.clone());
    }
    Some(url)
}

/// Runs the URL finder over `url`'s query string; discovered URLs are
/// flagged as query URLs and deduped into the set. Finally records `url`
/// itself as one of this part's URLs.
pub(crate) fn process_query_url(
    url: &Url,
    url_set: &mut UrlSet,
    mut part_urls: Option<&mut Vec<Url>>,
) {
    if let Some(query) = url.query() {
        let query = query.to_string();
        urlscan::find_urls(&query, &mut |mut found, _start, _end| {
            if found.is_mailto() && found.username().is_empty() {
                return false;
            }
            log::debug!("found url {} in query of {}", found.as_str(), url.as_str());
            found.flags.insert(UrlFlags::QUERY);
            if url_set.add_or_increase(&found)
                && let Some(part_urls) = part_urls.as_deref_mut()
            {
                part_urls.push(found);
            }
            true
        });
    }

    if let Some(part_urls) = part_urls {
        part_urls.push(url.clone());
    }
}

/// Builds the image record for an `<img>` (or icon `<link>`) tag.
pub(crate) fn process_img_tag(
    doc: &mut Document,
    tag: TagIdx,
    mut url_set: Option<&mut UrlSet>,
    mut part_urls: Option<&mut Vec<Url>>,
) {
    doc.tags[tag].flags.insert(TagFlags::IMAGE);
    let mut img = Image {
        src: String::new(),
        url: None,
        width: 0,
        height: 0,
        flags: ImageFlags::default(),
        tag,
        embedded: None,
    };

    let params = doc.tags[tag].params.clone();
    for (component, value) in &params {
        match component {
            Component::Href if !value.is_empty() => {
                img.src = value.clone();

                if value.len() > 4 && value.as_bytes().starts_with(b"cid:") {
                    img.flags.insert(ImageFlags::EMBEDDED);
                } else if value.len() > 5 && value.as_bytes().starts_with(b"data:") {
                    img.flags.insert(ImageFlags::EMBEDDED | ImageFlags::DATA);
                    process_data_image(&mut img, value);
                    doc.flags.insert(DocumentFlags::HAS_DATA_URLS);
                } else {
                    img.flags.insert(ImageFlags::EXTERNAL);
                    if let Some(mut url) = urlscan::parse_url(value) {
                        url.flags.insert(UrlFlags::IMAGE);
                        match url_set.as_deref_mut() {
                            Some(set) => match set.add_or_return(&url) {
                                Some(existing) => {
                                    // seen elsewhere already; keep that entry
                                    // but let it know it is also an image
                                    existing.flags.insert(url.flags);
                                    existing.count += 1;
                                }
                                None => {
                                    if let Some(part_urls) = part_urls.as_deref_mut() {
                                        part_urls.push(url.clone());
                                    }
                                }
                            },
                            None => {
                                if let Some(part_urls) = part_urls.as_deref_mut() {
                                    part_urls.push(url.clone());
                                }
                            }
                        }
                        img.url = Some(url);
                    }
                }
            }
            Component::Height => img.height = dec_prefix(value),
            Component::Width => img.width = dec_prefix(value),
            Component::Style => {
                if img.height == 0 {
                    img.height = style_dimension(value, "height");
                }
                if img.width == 0 {
                    img.width = style_dimension(value, "width");
                }
            }
            Component::Alt => {
                // alt text joins the rendered buffer, space-separated
                if doc.parsed.last().is_some_and(|b| !b.is_ascii_whitespace()) {
                    doc.parsed.push(b' ');
                }
                doc.parsed.extend_from_slice(value.as_bytes());
                if doc.parsed.last().is_some_and(|b| !b.is_ascii_whitespace()) {
                    doc.parsed.push(b' ');
                }
            }
            _ => {}
        }
    }

    if let Some(embedded) = img.embedded {
        if img.height == 0 {
            img.height = embedded.height;
        }
        if img.width == 0 {
            img.width = embedded.width;
        }
    }

    doc.images.push(img);
    doc.tags[tag].extra = TagExtra::Image(doc.images.len() - 1);
}

/// `<link rel="icon">` is treated as an image reference.
pub(crate) fn process_link_tag(
    doc: &mut Document,
    tag: TagIdx,
    url_set: Option<&mut UrlSet>,
    part_urls: Option<&mut Vec<Url>>,
) {
    if doc.tags[tag].find_component(Component::Rel) == Some("icon") {
        process_img_tag(doc, tag, url_set, part_urls);
    }
}

/// Colors and inline style on block tags.
pub(crate) fn process_block_tag(doc: &mut Document, tag: TagIdx) {
    let mut fg = None;
    let mut bg = None;

    let params = doc.tags[tag].params.clone();
    for (component, value) in &params {
        match component {
            Component::Color => fg = css::maybe_color_from_string(value),
            Component::BgColor => bg = css::maybe_color_from_string(value),
            Component::Style => doc.tags[tag].block = css::parse_declaration_block(value),
            _ => {}
        }
    }

    let block = doc.tags[tag]
        .block
        .get_or_insert_with(css::StyleBlock::undefined);
    if let Some(c) = fg {
        block.set_fgcolor(c);
    }
    if let Some(c) = bg {
        block.set_bgcolor(c);
    }
}

// `data:<mime>;base64,<payload>`: decode the payload and sniff it. Only
// base64 data URLs are examined; everything else stays an opaque src.
fn process_data_image(img: &mut Image, value: &str) {
    let bytes = value.as_bytes();
    let Some(semi) = memchr(b';', bytes) else {
        return;
    };
    let rest = &bytes[semi + 1..];
    const MARKER: &[u8] = b"base64,";
    if rest.len() <= MARKER.len() || !rest.starts_with(MARKER) {
        return;
    }
    let payload = &rest[MARKER.len()..];

    // mail bodies fold long data URLs; strip the whitespace before decoding
    // and tolerate a truncated final quantum
    let cleaned: Vec<u8> = payload
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let decoded = match BASE64.decode(&cleaned) {
        Ok(d) => d,
        Err(_) => {
            let whole = cleaned.len() / 4 * 4;
            match BASE64.decode(&cleaned[..whole]) {
                Ok(d) => d,
                Err(_) => return,
            }
        }
    };

    if let Some(info) = imginfo::probe(&decoded) {
        log::debug!(
            "detected {} image of size {} x {} in data url",
            info.format.as_str(),
            info.width,
            info.height
        );
        img.embedded = Some(info);
    }
}

// Leading decimal digits of an attribute value; anything else yields zero.
fn dec_prefix(value: &str) -> u32 {
    let digits: &str = {
        let end = value
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(value.len());
        &value[..end]
    };
    digits.parse().unwrap_or(0)
}

// Digs a dimension out of a style string: the keyword, then any mix of
// '=', ':' and spaces, then a digit run. Stops at anything else.
fn style_dimension(style: &str, keyword: &str) -> u32 {
    let lower = style.to_ascii_lowercase();
    let Some(pos) = lower.find(keyword) else {
        return 0;
    };
    let tail = &style.as_bytes()[pos + keyword.len()..];
    for (i, &b) in tail.iter().enumerate() {
        if b.is_ascii_digit() {
            let end = tail[i..]
                .iter()
                .position(|b| !b.is_ascii_digit())
                .map_or(tail.len(), |rel| i + rel);
            return std::str::from_utf8(&tail[i..end])
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
        }
        if !b.is_ascii_whitespace() && b != b'=' && b != b':' {
            break;
        }
    }
    0
}

/// Compares an anchor's displayed text with its target. Text that itself
/// parses as a URL is recorded as a displayed URL; a host mismatch marks
/// the target as phished. The displayed range is reported through the
/// exceptions sink.
pub(crate) fn check_displayed_url(
    mut exceptions: Option<&mut Vec<TextException>>,
    mut url_set: Option<&mut UrlSet>,
    mut part_urls: Option<&mut Vec<Url>>,
    displayed: &[u8],
    offset: usize,
    target: &mut Url,
) {
    let text = String::from_utf8_lossy(displayed);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }

    let mut shown: Option<Url> = None;
    urlscan::find_urls(trimmed, &mut |url, _start, _end| {
        if shown.is_none() {
            shown = Some(url);
        }
        true
    });
    let Some(mut shown) = shown else {
        return;
    };

    shown.flags.insert(UrlFlags::DISPLAYED);

    let hosts_differ = match (shown.host_str(), target.host_str()) {
        (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
        _ => false,
    };
    if hosts_differ {
        log::debug!(
            "displayed url {} does not match target {}",
            shown.as_str(),
            target.as_str()
        );
        target.flags.insert(UrlFlags::PHISHED);
        if let Some(set) = url_set.as_deref_mut() {
            set.merge_flags(target, UrlFlags::PHISHED);
        }
        if let Some(part_urls) = part_urls.as_deref_mut() {
            if let Some(entry) = part_urls
                .iter_mut()
                .rev()
                .find(|u| u.normalized() == target.normalized())
            {
                entry.flags.insert(UrlFlags::PHISHED);
            }
        }
    }

    if let Some(set) = url_set.as_deref_mut()
        && set.add_or_increase(&shown)
        && let Some(part_urls) = part_urls.as_deref_mut()
    {
        part_urls.push(shown.clone());
    }

    if let Some(exceptions) = exceptions.as_deref_mut() {
        exceptions.push(TextException {
            pos: offset,
            len: displayed.len(),
            kind: ExceptionKind::DisplayedUrl,
            tag: None,
        });
    }
}
