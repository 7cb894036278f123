//! The outer document scanner: a byte-at-a-time state machine over the raw
//! input that tokenizes tags, comments, SGML/XML noise, and content runs,
//! and drives the tree builder plus the per-tag handlers.
//!
//! The scanner never fails. Malformed constructs set document flags and the
//! machine falls into a state that resynchronizes on the next `<`.

use crate::attr::AttrParser;
use crate::document::{Document, Tag, TagExtra, TagIdx, TextException};
use crate::tags::TagId;
use crate::types::{DocumentFlags, TagFlags};
use crate::{entities, handlers, tree, visibility};
use memchr::memmem;
use urlscan::{Url, UrlSet};

pub(crate) fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

/// Sinks and switches for one `process_part` call.
#[derive(Default)]
pub struct ProcessOptions<'a> {
    /// Feed `<style>` interiors to the CSS parser and run the stylesheet
    /// match during the visibility pass.
    pub allow_css: bool,
    /// Cross-part URL dedup set; without it query URLs are not extracted.
    pub url_set: Option<&'a mut UrlSet>,
    /// Receives this part's URLs in discovery order.
    pub part_urls: Option<&'a mut Vec<Url>>,
    /// Receives invisible-text and displayed-URL ranges.
    pub exceptions: Option<&'a mut Vec<TextException>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    ParseStart,
    TagBegin,
    SgmlTag,
    XmlTag,
    XmlTagEnd,
    CompoundTag,
    CommentTag,
    CommentContent,
    SgmlContent,
    TagContent,
    TagEnd,
    ContentIgnore,
    ContentWrite,
    ContentStyle,
    ContentIgnoreSp,
}

// Appends a content run to the rendered text, decoding entities in place
// when the run contained '&', and keeps the accumulating tag's offsets in
// step.
fn flush_content(doc: &mut Document, content_tag: Option<TagIdx>, bytes: &[u8], need_decode: bool) {
    if bytes.is_empty() {
        return;
    }
    let old = doc.parsed.len();
    doc.parsed.extend_from_slice(bytes);
    let added = if need_decode {
        let new_len = entities::decode_in_place(&mut doc.parsed[old..], bytes.len());
        doc.parsed.truncate(old + new_len);
        new_len
    } else {
        bytes.len()
    };
    if let Some(ct) = content_tag {
        let tag = &mut doc.tags[ct];
        if tag.content_length == 0 {
            tag.content_offset = old;
        }
        tag.content_length += added;
    }
}

// One collapsed space between runs, only when the buffer does not already
// end in whitespace.
fn append_space(doc: &mut Document, content_tag: Option<TagIdx>) {
    if doc.parsed.last().is_none_or(|b| is_space(*b)) {
        return;
    }
    doc.parsed.push(b' ');
    let len_after = doc.parsed.len();
    if let Some(ct) = content_tag {
        let tag = &mut doc.tags[ct];
        if tag.content_length == 0 {
            // no content yet: the space belongs to nobody, start after it
            tag.content_offset = len_after;
        } else {
            tag.content_length += 1;
        }
    }
}

// Synthesized line break for br/hr and closing p/tr/div.
fn append_line_break(doc: &mut Document, content_tag: Option<TagIdx>) {
    if doc.parsed.last().is_none_or(|b| *b == b'\n') {
        return;
    }
    doc.parsed.extend_from_slice(b"\r\n");
    let len_after = doc.parsed.len();
    if let Some(ct) = content_tag {
        let tag = &mut doc.tags[ct];
        if tag.content_length == 0 {
            tag.content_offset = len_after;
        } else {
            tag.content_length += 2;
        }
    }
}

pub(crate) fn process_input(input: &[u8], opts: ProcessOptions<'_>) -> Document {
    let ProcessOptions {
        allow_css,
        mut url_set,
        mut part_urls,
        mut exceptions,
    } = opts;

    let mut doc = Document::new();
    let end = input.len();

    let mut state = State::ParseStart;
    let mut p = 0usize;
    let mut c = 0usize;

    let mut closing = false;
    let mut need_decode = false;
    let mut save_space = false;
    let mut obrace = 0u32;
    let mut ebrace = 0u32;

    let mut cur_tag: Option<TagIdx> = None;
    let mut content_tag: Option<TagIdx> = None;
    let mut anchor_url: Option<Url> = None;
    let mut href_offset: Option<usize> = None;

    let mut stack: Vec<TagIdx> = Vec::new();
    let mut attr = AttrParser::new();

    while p < end {
        let t = input[p];

        match state {
            State::ParseStart => {
                if t == b'<' {
                    state = State::TagBegin;
                } else {
                    // no opening tag: the whole thing is content
                    doc.flags.insert(DocumentFlags::BAD_START);
                    state = State::ContentWrite;
                }
            }

            State::TagBegin => match t {
                b'<' => {
                    p += 1;
                    closing = false;
                }
                b'!' => {
                    state = State::SgmlTag;
                    p += 1;
                }
                b'?' => {
                    state = State::XmlTag;
                    doc.flags.insert(DocumentFlags::XML);
                    p += 1;
                }
                b'/' => {
                    closing = true;
                    p += 1;
                }
                b'>' => {
                    // empty tag
                    doc.flags.insert(DocumentFlags::BAD_ELEMENTS);
                    state = State::TagEnd;
                }
                _ => {
                    state = State::TagContent;
                    attr.reset();
                    doc.tags.push(Tag::default());
                    cur_tag = Some(doc.tags.len() - 1);
                }
            },

            State::SgmlTag => match t {
                b'[' => {
                    state = State::CompoundTag;
                    obrace = 1;
                    ebrace = 0;
                    p += 1;
                }
                b'-' => {
                    state = State::CommentTag;
                    p += 1;
                }
                _ => {
                    state = State::SgmlContent;
                }
            },

            State::XmlTag => {
                if t == b'?' {
                    state = State::XmlTagEnd;
                    p += 1;
                } else if t == b'>' {
                    // misformed xml tag
                    doc.flags.insert(DocumentFlags::BAD_ELEMENTS);
                    state = State::TagEnd;
                } else {
                    p += 1;
                }
            }

            State::XmlTagEnd => {
                if t == b'>' {
                    state = State::TagEnd;
                } else {
                    doc.flags.insert(DocumentFlags::BAD_ELEMENTS);
                    p += 1;
                }
            }

            State::CompoundTag => {
                if t == b'[' {
                    obrace += 1;
                } else if t == b']' {
                    ebrace += 1;
                } else if t == b'>' && obrace == ebrace {
                    state = State::TagEnd;
                    continue;
                }
                p += 1;
            }

            State::CommentTag => {
                if t != b'-' {
                    doc.flags.insert(DocumentFlags::BAD_ELEMENTS);
                    state = State::TagEnd;
                } else {
                    p += 1;
                    ebrace = 0;
                    // HTML5: comment text must not start with '>' or '->',
                    // contain '--', or end with '-'
                    if p < end && input[p] == b'-' && p + 1 < end && input[p + 1] == b'>' {
                        doc.flags.insert(DocumentFlags::BAD_ELEMENTS);
                        p += 1;
                        state = State::TagEnd;
                    } else if p < end && input[p] == b'>' {
                        doc.flags.insert(DocumentFlags::BAD_ELEMENTS);
                        state = State::TagEnd;
                    } else {
                        state = State::CommentContent;
                    }
                }
            }

            State::CommentContent => {
                if t == b'-' {
                    ebrace += 1;
                } else if t == b'>' && ebrace >= 2 {
                    state = State::TagEnd;
                    continue;
                } else {
                    ebrace = 0;
                }
                p += 1;
            }

            State::ContentIgnore => {
                if t != b'<' {
                    p += 1;
                } else {
                    state = State::TagBegin;
                }
            }

            State::ContentWrite => {
                if t != b'<' {
                    if t == b'&' {
                        need_decode = true;
                    } else if is_space(t) {
                        save_space = true;
                        if p > c {
                            flush_content(&mut doc, content_tag, &input[c..p], need_decode);
                        }
                        c = p;
                        state = State::ContentIgnoreSp;
                    } else if save_space {
                        append_space(&mut doc, content_tag);
                        save_space = false;
                    }
                    p += 1;
                } else {
                    if c != p {
                        flush_content(&mut doc, content_tag, &input[c..p], need_decode);
                    }
                    content_tag = None;
                    state = State::TagBegin;
                }
            }

            State::ContentIgnoreSp => {
                if !is_space(t) {
                    c = p;
                    state = State::ContentWrite;
                    continue;
                }
                p += 1;
            }

            State::ContentStyle => {
                // hand everything up to the next "</s" to the CSS parser
                match memmem::find(&input[p..end], b"</") {
                    Some(rel)
                        if p + rel + 2 < end && input[p + rel + 2].to_ascii_lowercase() == b's' =>
                    {
                        if allow_css {
                            let css_text = String::from_utf8_lossy(&input[p..p + rel]);
                            let prior = doc.styles.take();
                            match css::parse_stylesheet(&css_text, prior.clone()) {
                                Ok(sheet) => doc.styles = Some(sheet),
                                Err(err) => {
                                    log::info!("cannot parse css: {err}");
                                    doc.styles = prior;
                                }
                            }
                        }
                        p += rel;
                        state = State::TagBegin;
                    }
                    _ => {
                        // unterminated style block
                        state = State::ContentIgnore;
                    }
                }
            }

            State::SgmlContent => {
                // DOCTYPE and friends carry nothing we score on
                if t == b'>' {
                    state = State::TagEnd;
                    cur_tag = None;
                    continue;
                }
                p += 1;
            }

            State::TagContent => {
                if let Some(cur) = cur_tag {
                    let Document { tags, flags, .. } = &mut doc;
                    attr.step(&mut tags[cur], flags, input, p);
                }
                if t == b'>' {
                    if closing {
                        if let Some(cur) = cur_tag {
                            if doc.tags[cur].flags.contains(TagFlags::CLOSED) {
                                // bad mix of closed and closing
                                doc.flags.insert(DocumentFlags::BAD_ELEMENTS);
                            }
                            doc.tags[cur].flags.insert(TagFlags::CLOSING);
                        }
                        closing = false;
                    }
                    state = State::TagEnd;
                } else {
                    p += 1;
                }
            }

            State::TagEnd => {
                attr.reset();

                if let Some(cur) = cur_tag {
                    if tree::process_tag(&mut doc, cur, &mut stack) {
                        state = State::ContentWrite;
                        need_decode = false;
                    } else if doc.tags[cur].id == Some(TagId::Style) {
                        state = State::ContentStyle;
                    } else {
                        state = State::ContentIgnore;
                    }

                    let cur_flags = doc.tags[cur].flags;
                    let cur_id = doc.tags[cur].id;

                    if !cur_flags.intersects(TagFlags::CLOSED | TagFlags::CLOSING) {
                        content_tag = Some(cur);
                    }

                    // synthesized line breaks
                    if matches!(cur_id, Some(TagId::Br) | Some(TagId::Hr)) {
                        append_line_break(&mut doc, content_tag);
                        save_space = false;
                    }
                    if matches!(cur_id, Some(TagId::P) | Some(TagId::Tr) | Some(TagId::Div))
                        && cur_flags.contains(TagFlags::CLOSING)
                    {
                        append_line_break(&mut doc, content_tag);
                        save_space = false;
                    }

                    if cur_flags.contains(TagFlags::HREF) {
                        let prev_href_offset = href_offset;

                        if !cur_flags.contains(TagFlags::CLOSING)
                            && let Some(url) = handlers::process_url_tag(&mut doc, cur)
                        {
                            let mut url = url;
                            if let Some(set) = url_set.as_deref_mut() {
                                match set.add_or_return(&url) {
                                    Some(existing) => {
                                        existing.count += 1;
                                        url = existing.clone();
                                    }
                                    None => handlers::process_query_url(
                                        &url,
                                        set,
                                        part_urls.as_deref_mut(),
                                    ),
                                }
                            }
                            anchor_url = Some(url);
                            href_offset = Some(doc.parsed.len());
                        }

                        if cur_id == Some(TagId::A) {
                            // an <a> opening inside an open anchor settles the
                            // previous anchor's displayed text
                            if stack.len() >= 2 {
                                let prev_idx = stack[stack.len() - 2];
                                if doc.tags[prev_idx].id == Some(TagId::A)
                                    && !doc.tags[prev_idx].flags.contains(TagFlags::CLOSING)
                                    && let TagExtra::Url(prev_url) = &doc.tags[prev_idx].extra
                                    && let Some(off) = prev_href_offset
                                    && doc.parsed.len() >= off
                                {
                                    let mut prev_url = prev_url.clone();
                                    let displayed = doc.parsed[off..].to_vec();
                                    handlers::check_displayed_url(
                                        exceptions.as_deref_mut(),
                                        url_set.as_deref_mut(),
                                        part_urls.as_deref_mut(),
                                        &displayed,
                                        off,
                                        &mut prev_url,
                                    );
                                }
                            }

                            if cur_flags.contains(TagFlags::CLOSING) {
                                if let Some(mut url) = anchor_url.take()
                                    && let Some(off) = href_offset
                                    && doc.parsed.len() > off
                                {
                                    let displayed = doc.parsed[off..].to_vec();
                                    handlers::check_displayed_url(
                                        exceptions.as_deref_mut(),
                                        url_set.as_deref_mut(),
                                        part_urls.as_deref_mut(),
                                        &displayed,
                                        off,
                                        &mut url,
                                    );
                                }
                                href_offset = None;
                                anchor_url = None;
                            }
                        }
                    } else if cur_id == Some(TagId::Base)
                        && !cur_flags.contains(TagFlags::CLOSING)
                        && doc.base_url.is_none()
                    {
                        // base is only allowed in head, but mail HTML puts it
                        // anywhere; first one wins
                        match handlers::process_url_tag(&mut doc, cur) {
                            Some(url) => {
                                log::debug!("got valid base tag: {}", url.as_str());
                                doc.base_url = Some(url.clone());
                                doc.tags[cur].extra = TagExtra::Url(url);
                                doc.tags[cur].flags.insert(TagFlags::HREF);
                            }
                            None => log::debug!("got invalid base tag"),
                        }
                    }

                    if cur_id == Some(TagId::Img) && !cur_flags.contains(TagFlags::CLOSING) {
                        handlers::process_img_tag(
                            &mut doc,
                            cur,
                            url_set.as_deref_mut(),
                            part_urls.as_deref_mut(),
                        );
                    } else if cur_id == Some(TagId::Link) && !cur_flags.contains(TagFlags::CLOSING)
                    {
                        handlers::process_link_tag(
                            &mut doc,
                            cur,
                            url_set.as_deref_mut(),
                            part_urls.as_deref_mut(),
                        );
                    }

                    if cur_flags.contains(TagFlags::BLOCK) && !cur_flags.contains(TagFlags::CLOSING)
                    {
                        handlers::process_block_tag(&mut doc, cur);
                    }
                } else {
                    state = State::ContentWrite;
                }

                p += 1;
                c = p;
                cur_tag = None;
            }
        }
    }

    // text after the last tag still belongs to the rendering
    if state == State::ContentWrite && end > c {
        flush_content(&mut doc, content_tag, &input[c..end], need_decode);
    }

    visibility::run(&mut doc, exceptions.as_deref_mut());

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process_part_simple;

    fn parsed_str(input: &str) -> String {
        let doc = process_part_simple(input.as_bytes());
        String::from_utf8_lossy(doc.parsed_content()).into_owned()
    }

    #[test]
    fn empty_input_is_empty_document() {
        let doc = process_part_simple(b"");
        assert!(doc.parsed_content().is_empty());
        assert!(doc.flags.is_empty());
        assert!(doc.root().is_none());
    }

    #[test]
    fn missing_angle_start_sets_bad_start() {
        let doc = process_part_simple(b"hello <b>world</b>");
        assert!(doc.flags.contains(DocumentFlags::BAD_START));
        assert_eq!(
            String::from_utf8_lossy(doc.parsed_content()),
            "hello world"
        );
    }

    #[test]
    fn whitespace_runs_collapse_to_single_spaces() {
        assert_eq!(parsed_str("<p>a   b\t\t\nc</p>"), "a b c\r\n");
        let out = parsed_str("<div>  lots\n\n of \t space </div>");
        assert!(!out.contains("  "), "double space in {out:?}");
    }

    #[test]
    fn entities_in_content_are_decoded() {
        assert_eq!(parsed_str("<p>a &amp; b</p>"), "a & b\r\n");
        assert_eq!(parsed_str("<p>&lt;x&gt;</p>"), "<x>\r\n");
    }

    #[test]
    fn br_and_hr_insert_line_breaks() {
        assert_eq!(parsed_str("<div>a<br>b</div>"), "a\r\nb\r\n");
        // no break when the buffer already ends in a newline
        assert_eq!(parsed_str("<div>a<br><br>b</div>"), "a\r\nb\r\n");
        // nothing to break at the very start
        assert_eq!(parsed_str("<div><hr>a</div>"), "a\r\n");
    }

    #[test]
    fn closing_p_tr_div_insert_line_breaks() {
        assert_eq!(parsed_str("<p>one</p><p>two</p>"), "one\r\ntwo\r\n");
        assert_eq!(parsed_str("<div>x</div>y"), "x\r\ny");
    }

    #[test]
    fn head_and_script_content_is_invisible() {
        let out = parsed_str(
            "<html><head><title>T</title></head><body>seen<script>var x;</script></body></html>",
        );
        assert_eq!(out, "seen");
    }

    #[test]
    fn comments_are_skipped_and_bogus_comments_flagged() {
        assert_eq!(parsed_str("<div>a <!-- hidden --> b</div>"), "a b\r\n");
        let doc = process_part_simple(b"<div><!-->a</div>");
        assert!(doc.flags.contains(DocumentFlags::BAD_ELEMENTS));
    }

    #[test]
    fn comment_needs_double_dash_to_close() {
        // "->" does not close a comment; everything to "-->" is swallowed
        assert_eq!(parsed_str("<p>a<!-- x -> y -->b</p>"), "ab\r\n");
    }

    #[test]
    fn xml_prolog_sets_flag_and_is_skipped() {
        let doc = process_part_simple(b"<?xml version=\"1.0\"?><div>x</div>");
        assert!(doc.flags.contains(DocumentFlags::XML));
        assert_eq!(String::from_utf8_lossy(doc.parsed_content()), "x\r\n");
    }

    #[test]
    fn compound_sgml_sections_balance_brackets() {
        let doc = process_part_simple(b"<![CDATA[ <b>not parsed</b> ]]><div>x</div>");
        assert_eq!(String::from_utf8_lossy(doc.parsed_content()), "x\r\n");
    }

    #[test]
    fn empty_tag_is_flagged() {
        let doc = process_part_simple(b"<><div>x</div>");
        assert!(doc.flags.contains(DocumentFlags::BAD_ELEMENTS));
    }

    #[test]
    fn mixed_closed_and_closing_is_flagged() {
        let doc = process_part_simple(b"<div></div/>");
        assert!(doc.flags.contains(DocumentFlags::BAD_ELEMENTS));
    }

    #[test]
    fn unterminated_style_block_is_ignored() {
        let doc = process_part_simple(b"<html><style>p { color: red }");
        assert!(doc.styles().is_none());
        assert!(doc.parsed_content().is_empty());
    }

    #[test]
    fn style_block_requires_css_opt_in() {
        let input = b"<html><style>p { color: red }</style><p>x</p></html>";
        let doc = process_part_simple(input);
        assert!(doc.styles().is_none());

        let doc = crate::process_part(
            input,
            ProcessOptions {
                allow_css: true,
                ..ProcessOptions::default()
            },
        );
        assert_eq!(doc.styles().map(|s| s.rules().len()), Some(1));
    }

    #[test]
    fn bad_css_is_dropped_not_fatal() {
        let doc = crate::process_part(
            b"<html><style>p { broken</style><p>x</p></html>",
            ProcessOptions {
                allow_css: true,
                ..ProcessOptions::default()
            },
        );
        assert!(doc.styles().is_none());
        assert_eq!(String::from_utf8_lossy(doc.parsed_content()), "x\r\n");
    }

    #[test]
    fn img_alt_text_joins_rendered_output() {
        let out = parsed_str("<div>before<img src=\"x.png\" alt=\"logo\">after</div>");
        assert_eq!(out, "before logo after\r\n");
    }

    #[test]
    fn content_offsets_stay_inside_parsed() {
        let doc = process_part_simple(
            b"<html><div>first</div><div>second <b>bold</b></div><p>tail</p></html>",
        );
        let len = doc.parsed_content().len();
        for tag in doc.tags() {
            assert!(
                tag.content_offset <= len && tag.content_offset + tag.content_length <= len,
                "tag {} range {}+{} outside parsed len {}",
                tag.name,
                tag.content_offset,
                tag.content_length,
                len
            );
        }
    }

    #[test]
    fn parse_is_deterministic() {
        let input = b"<html><body><div>a<br>b</div><a href=\"http://example.com\">x</a></body>";
        let a = process_part_simple(input);
        let b = process_part_simple(input);
        assert_eq!(a.parsed_content(), b.parsed_content());
        assert_eq!(a.flags, b.flags);
        assert_eq!(a.debug_structure(), b.debug_structure());
    }
}
