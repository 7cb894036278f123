//! URL handling for untrusted mail content: a lenient parser on top of the
//! `url` crate, a finder that digs URLs out of arbitrary text (query
//! strings, redirect parameters), and a dedup set that merges flags and
//! occurrence counts.
//!
//! Leniency here means accepting what mail clients emit (hrefs split
//! across lines, schemeless `www.` hosts, stray surrounding whitespace)
//! while still rejecting strings that are not URLs at all.

use memchr::memmem;
use std::collections::HashMap;
use url::Url as RawUrl;

/// Scanner-level flags attached to a discovered URL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UrlFlags(u32);

impl UrlFlags {
    /// Found inside another URL's query string.
    pub const QUERY: UrlFlags = UrlFlags(1 << 0);
    /// Referenced from an image tag.
    pub const IMAGE: UrlFlags = UrlFlags(1 << 1);
    /// Shown as anchor text rather than used as a target.
    pub const DISPLAYED: UrlFlags = UrlFlags(1 << 2);
    /// Anchor text shows a different host than the actual target.
    pub const PHISHED: UrlFlags = UrlFlags(1 << 3);

    pub fn contains(self, other: UrlFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: UrlFlags) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for UrlFlags {
    type Output = UrlFlags;
    fn bitor(self, rhs: UrlFlags) -> UrlFlags {
        UrlFlags(self.0 | rhs.0)
    }
}

/// A URL discovered in mail content.
///
/// `as_str` reports the text as written (modulo whitespace repair), not the
/// normalized form; downstream rules match on what the recipient saw.
#[derive(Clone, Debug)]
pub struct Url {
    inner: RawUrl,
    text: String,
    pub flags: UrlFlags,
    pub count: u32,
}

impl Url {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Normalized form used as the dedup identity.
    pub fn normalized(&self) -> &str {
        self.inner.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.inner.scheme()
    }

    pub fn host_str(&self) -> Option<&str> {
        self.inner.host_str()
    }

    pub fn query(&self) -> Option<&str> {
        self.inner.query()
    }

    pub fn username(&self) -> &str {
        self.inner.username()
    }

    pub fn is_mailto(&self) -> bool {
        self.inner.scheme() == "mailto"
    }

    /// Length of everything after `scheme://host` in the written form; zero
    /// means the URL names a bare host with no path, query, or fragment.
    pub fn data_len(&self) -> usize {
        let Some(host) = self.inner.host_str() else {
            return 0;
        };
        let lower = self.text.to_ascii_lowercase();
        match memmem::find(lower.as_bytes(), host.to_ascii_lowercase().as_bytes()) {
            Some(pos) => self.text.len().saturating_sub(pos + host.len()),
            None => 0,
        }
    }
}

const ACCEPTED_SCHEMES: &[&str] = &[
    "file", "ftp", "ftps", "http", "https", "mailto", "tel",
];

/// Parses one URL leniently.
///
/// Repairs applied before parsing: surrounding whitespace is trimmed and
/// interior `\r`, `\n`, `\t` are removed (hrefs folded across mail lines).
/// Schemeless input that looks like a hostname is retried as `http://...`,
/// and the reported text then carries the added scheme. Schemes outside the
/// accepted set (`javascript:` and friends) are rejected.
pub fn parse_url(input: &str) -> Option<Url> {
    let mut text: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .collect();
    if text.is_empty() {
        return None;
    }

    let mut inner = match RawUrl::parse(&text) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            if !looks_like_host(&text) {
                return None;
            }
            text.insert_str(0, "http://");
            RawUrl::parse(&text).ok()?
        }
        Err(_) => return None,
    };

    if !ACCEPTED_SCHEMES.contains(&inner.scheme()) {
        return None;
    }
    if matches!(inner.scheme(), "http" | "https" | "ftp" | "ftps") && inner.host_str().is_none() {
        return None;
    }
    // Fragments never travel on the wire and only split otherwise-equal URLs.
    inner.set_fragment(None);

    Some(Url {
        inner,
        text,
        flags: UrlFlags::default(),
        count: 1,
    })
}

fn looks_like_host(s: &str) -> bool {
    let head = s.split(['/', '?']).next().unwrap_or("");
    head.contains('.')
        && !head.contains(|c: char| c.is_ascii_whitespace())
        && head
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
        && !head.ends_with('.')
}

// Bytes that terminate a URL candidate inside free text. `&` separates
// query parameters in the strings this finder is pointed at, so a nested
// URL's own query is cut there rather than swallowing its neighbors.
fn is_url_end(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(
            b,
            b'"' | b'\'' | b'<' | b'>' | b'`' | b'{' | b'}' | b'|' | b'\\' | b'^' | b'&'
        )
}

/// Finds URLs embedded in arbitrary text and hands each to `callback` with
/// its byte range. The callback's return value marks acceptance but never
/// stops the scan, so one rejected candidate does not hide later ones.
///
/// Three candidate shapes are probed: `scheme://...`, schemeless `www....`,
/// and `mailto:...`.
pub fn find_urls(text: &str, callback: &mut dyn FnMut(Url, usize, usize) -> bool) {
    let bytes = text.as_bytes();
    let lower = bytes.to_ascii_lowercase();
    let mut last_end = 0usize;

    let mut starts: Vec<usize> = Vec::new();
    for pos in memmem::find_iter(bytes, b"://") {
        let mut start = pos;
        while start > 0 && is_scheme_byte(bytes[start - 1]) {
            start -= 1;
        }
        while start < pos && !bytes[start].is_ascii_alphabetic() {
            start += 1;
        }
        if start < pos {
            starts.push(start);
        }
    }
    for pos in memmem::find_iter(&lower, b"www.") {
        if pos == 0 || is_url_end(bytes[pos - 1]) || bytes[pos - 1] == b'=' {
            starts.push(pos);
        }
    }
    for pos in memmem::find_iter(&lower, b"mailto:") {
        starts.push(pos);
    }
    starts.sort_unstable();
    starts.dedup();

    for start in starts {
        if start < last_end {
            continue;
        }
        let mut end = start;
        while end < bytes.len() && !is_url_end(bytes[end]) {
            end += 1;
        }
        // strip trailing punctuation that belongs to the surrounding text
        while end > start && matches!(bytes[end - 1], b'.' | b',' | b';' | b':' | b'!' | b'?' | b')' | b']') {
            end -= 1;
        }
        if end <= start {
            continue;
        }
        let Ok(candidate) = std::str::from_utf8(&bytes[start..end]) else {
            continue;
        };
        if let Some(url) = parse_url(candidate) {
            last_end = end;
            callback(url, start, end);
        }
    }
}

fn is_scheme_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')
}

/// Deduplicating URL store keyed by the normalized form.
///
/// The set owns the canonical entry for each URL; repeated sightings merge
/// their flags into it and bump its count.
#[derive(Debug, Default)]
pub struct UrlSet {
    entries: HashMap<String, Url>,
}

impl UrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the already-present entry for `url`, or stores `url` and
    /// returns `None` when it is new.
    pub fn add_or_return(&mut self, url: &Url) -> Option<&mut Url> {
        let key = url.normalized().to_string();
        if self.entries.contains_key(&key) {
            return self.entries.get_mut(&key);
        }
        self.entries.insert(key, url.clone());
        None
    }

    /// Stores `url` if new (returning `true`); otherwise merges flags into
    /// the existing entry, bumps its count, and returns `false`.
    pub fn add_or_increase(&mut self, url: &Url) -> bool {
        match self.entries.get_mut(url.normalized()) {
            Some(existing) => {
                existing.flags.insert(url.flags);
                existing.count += 1;
                false
            }
            None => {
                self.entries.insert(url.normalized().to_string(), url.clone());
                true
            }
        }
    }

    /// Applies `flags` to the stored entry for `url`, if any.
    pub fn merge_flags(&mut self, url: &Url, flags: UrlFlags) {
        if let Some(existing) = self.entries.get_mut(url.normalized()) {
            existing.flags.insert(flags);
        }
    }

    pub fn get(&self, url: &Url) -> Option<&Url> {
        self.entries.get(url.normalized())
    }
}
