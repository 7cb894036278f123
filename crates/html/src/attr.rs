//! Tag-interior parsing: the attribute component map and the
//! byte-at-a-time sub-automaton the scanner delegates to while it is inside
//! `<...>`.
//!
//! The automaton's state persists across invocations: the outer scanner
//! feeds it one byte per call and the `{state, saved, component}` triple
//! carries the progress. Mail HTML breaks in predictable ways (quotes open
//! and never close, `=` goes missing, names run into values), and each such
//! shape lands in a state that either repairs or discards without ever
//! failing.

use crate::document::Tag;
use crate::entities;
use crate::parser::is_space;
use crate::tags;
use crate::types::{DocumentFlags, TagFlags};

/// The normalized kind of an attribute; the closed set of attributes the
/// analyzer cares about. `href`, `src`, and `action` all fold onto `Href`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    Name,
    Href,
    Color,
    BgColor,
    Style,
    Class,
    Width,
    Height,
    Size,
    Rel,
    Alt,
    Id,
}

fn component_from_name(name: &[u8]) -> Option<Component> {
    match name {
        b"name" => Some(Component::Name),
        b"href" | b"src" | b"action" => Some(Component::Href),
        b"color" => Some(Component::Color),
        b"bgcolor" => Some(Component::BgColor),
        b"style" => Some(Component::Style),
        b"class" => Some(Component::Class),
        b"width" => Some(Component::Width),
        b"height" => Some(Component::Height),
        b"size" => Some(Component::Size),
        b"rel" => Some(Component::Rel),
        b"alt" => Some(Component::Alt),
        b"id" => Some(Component::Id),
        _ => None,
    }
}

// Lookup over a fresh entity-decoded, lowercased copy of the raw slice.
fn find_component_name(raw: &[u8]) -> Option<Component> {
    if raw.is_empty() {
        return None;
    }
    let mut buf = raw.to_vec();
    let len = buf.len();
    let new_len = entities::decode_in_place(&mut buf, len);
    buf.truncate(new_len);
    buf.make_ascii_lowercase();
    component_from_name(&buf)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum AttrState {
    #[default]
    Start,
    Name,
    AttrName,
    Equal,
    StartDquote,
    DqValue,
    EndDquote,
    StartSquote,
    SqValue,
    EndSquote,
    Value,
    SpacesAfterName,
    SpacesBeforeEq,
    SpacesAfterEq,
    SpacesAfterParam,
    IgnoreBadTag,
}

/// Persistent tag-interior parser state, reset per tag by the scanner.
#[derive(Debug, Default)]
pub(crate) struct AttrParser {
    state: AttrState,
    saved: Option<usize>,
    component: Option<Component>,
    name_start: Option<usize>,
}

impl AttrParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    // Records the pending component value, entity-decoded, and clears the
    // slice bookkeeping. Empty slices and unknown components store nothing.
    fn store_component(&mut self, tag: &mut Tag, input: &[u8], p: usize) {
        if let Some(saved) = self.saved
            && let Some(component) = self.component
            && p > saved
        {
            let mut buf = input[saved..p].to_vec();
            let len = buf.len();
            let new_len = entities::decode_in_place(&mut buf, len);
            buf.truncate(new_len);
            tag.params
                .push((component, String::from_utf8_lossy(&buf).into_owned()));
        }
        self.saved = None;
        self.component = None;
    }

    /// Consumes `input[p]`. The scanner calls this for every byte between
    /// the tag-opening `<` and the closing `>`, including the `>` itself.
    pub(crate) fn step(
        &mut self,
        tag: &mut Tag,
        doc_flags: &mut DocumentFlags,
        input: &[u8],
        p: usize,
    ) {
        let b = input[p];
        let mut store = false;

        match self.state {
            AttrState::Start => {
                if !b.is_ascii_alphabetic() && !is_space(b) {
                    doc_flags.insert(DocumentFlags::BAD_ELEMENTS);
                    self.state = AttrState::IgnoreBadTag;
                    tag.id = None;
                    tag.flags.insert(TagFlags::BROKEN);
                } else if b.is_ascii_alphabetic() {
                    self.state = AttrState::Name;
                    self.name_start = Some(p);
                }
            }

            AttrState::Name => {
                if is_space(b) || b == b'>' || b == b'/' {
                    if b == b'/' {
                        tag.flags.insert(TagFlags::CLOSED);
                    }
                    let start = self.name_start.unwrap_or(p);
                    let raw = &input[start..p];
                    if raw.is_empty() {
                        doc_flags.insert(DocumentFlags::BAD_ELEMENTS);
                        tag.id = None;
                        tag.flags.insert(TagFlags::BROKEN);
                        self.state = AttrState::IgnoreBadTag;
                    } else {
                        let mut buf = raw.to_vec();
                        let len = buf.len();
                        let new_len = entities::decode_in_place(&mut buf, len);
                        buf.truncate(new_len);
                        buf.make_ascii_lowercase();
                        tag.name = String::from_utf8_lossy(&buf).into_owned();

                        match tags::by_name(&tag.name) {
                            Some(def) => {
                                tag.id = Some(def.id);
                                // dictionary defaults, keeping what the markup
                                // already established about this instance
                                let sticky = tag.flags.intersection(
                                    TagFlags::CLOSED
                                        | TagFlags::CLOSING
                                        | TagFlags::BROKEN
                                        | TagFlags::IGNORE,
                                );
                                tag.flags = def.flags.union(sticky);
                            }
                            None => {
                                doc_flags.insert(DocumentFlags::UNKNOWN_ELEMENTS);
                                tag.id = None;
                            }
                        }
                        self.state = AttrState::SpacesAfterName;
                    }
                }
            }

            AttrState::AttrName => {
                let Some(saved) = self.saved else {
                    self.state = AttrState::IgnoreBadTag;
                    return;
                };
                let mut attr_name_end = p;
                if b == b'=' {
                    self.state = AttrState::Equal;
                } else if b == b'"' {
                    // quote without '=': the name implicitly ended at the
                    // last alphanumeric
                    self.state = AttrState::StartDquote;
                    attr_name_end = walk_back_alnum(input, p, saved);
                } else if is_space(b) {
                    self.state = AttrState::SpacesBeforeEq;
                } else if b == b'/' {
                    tag.flags.insert(TagFlags::CLOSED);
                } else if !b.is_ascii_graphic() {
                    self.state = AttrState::Value;
                    attr_name_end = walk_back_alnum(input, p, saved);
                } else {
                    return;
                }

                self.component = find_component_name(&input[saved..attr_name_end]);
                if self.component.is_none() {
                    // unknown attributes are dropped wholesale
                    self.saved = None;
                } else if self.state == AttrState::Value {
                    self.saved = Some(p + 1);
                }
            }

            AttrState::SpacesAfterName => {
                if !is_space(b) {
                    self.saved = Some(p);
                    if b == b'/' {
                        tag.flags.insert(TagFlags::CLOSED);
                    } else if b != b'>' {
                        self.state = AttrState::AttrName;
                    }
                }
            }

            AttrState::SpacesBeforeEq => {
                if b == b'=' {
                    self.state = AttrState::Equal;
                } else if !is_space(b) {
                    if b == b'>' {
                        // bare attribute at end of tag: accepted, discarded
                    } else if b == b'"' || b == b'\'' {
                        // a quote with no '=' in sight is past repairing
                        doc_flags.insert(DocumentFlags::BAD_ELEMENTS);
                        tag.flags.insert(TagFlags::BROKEN);
                        self.state = AttrState::IgnoreBadTag;
                    } else {
                        self.state = AttrState::AttrName;
                        self.saved = Some(p);
                    }
                }
            }

            AttrState::SpacesAfterEq => {
                if b == b'"' {
                    self.state = AttrState::StartDquote;
                } else if b == b'\'' {
                    self.state = AttrState::StartSquote;
                } else if !is_space(b) {
                    if self.saved.is_some() {
                        self.saved = Some(p);
                    }
                    self.state = AttrState::Value;
                }
            }

            AttrState::Equal => {
                if is_space(b) {
                    self.state = AttrState::SpacesAfterEq;
                } else if b == b'"' {
                    self.state = AttrState::StartDquote;
                } else if b == b'\'' {
                    self.state = AttrState::StartSquote;
                } else {
                    if self.saved.is_some() {
                        self.saved = Some(p);
                    }
                    self.state = AttrState::Value;
                }
            }

            AttrState::StartDquote => {
                if b == b'"' {
                    // empty quoted value: dropped
                    self.saved = None;
                    self.state = AttrState::SpacesAfterParam;
                } else {
                    if self.saved.is_some() {
                        self.saved = Some(p);
                    }
                    self.state = AttrState::DqValue;
                }
            }

            AttrState::StartSquote => {
                if b == b'\'' {
                    self.saved = None;
                    self.state = AttrState::SpacesAfterParam;
                } else {
                    if self.saved.is_some() {
                        self.saved = Some(p);
                    }
                    self.state = AttrState::SqValue;
                }
            }

            AttrState::DqValue => {
                if b == b'"' {
                    store = true;
                    self.state = AttrState::EndDquote;
                }
                if store {
                    self.store_component(tag, input, p);
                }
            }

            AttrState::SqValue => {
                if b == b'\'' {
                    store = true;
                    self.state = AttrState::EndSquote;
                }
                if store {
                    self.store_component(tag, input, p);
                }
            }

            AttrState::Value => {
                if b == b'/' && input.get(p + 1) == Some(&b'>') {
                    tag.flags.insert(TagFlags::CLOSED);
                    store = true;
                } else if is_space(b) || b == b'>' || b == b'"' {
                    store = true;
                    self.state = AttrState::SpacesAfterParam;
                }
                if store {
                    self.store_component(tag, input, p);
                }
            }

            AttrState::EndDquote | AttrState::EndSquote => {
                if is_space(b) {
                    self.state = AttrState::SpacesAfterParam;
                } else if b == b'/' && input.get(p + 1) == Some(&b'>') {
                    tag.flags.insert(TagFlags::CLOSED);
                } else {
                    // no separating space; the next attribute starts here
                    self.state = AttrState::AttrName;
                    self.saved = Some(p);
                }
            }

            AttrState::SpacesAfterParam => {
                if !is_space(b) {
                    if b == b'/' && input.get(p + 1) == Some(&b'>') {
                        tag.flags.insert(TagFlags::CLOSED);
                    }
                    self.state = AttrState::AttrName;
                    self.saved = Some(p);
                }
            }

            AttrState::IgnoreBadTag => {}
        }
    }
}

// The name slice's implicit end: one past the last alphanumeric byte at or
// after `saved`.
fn walk_back_alnum(input: &[u8], p: usize, saved: usize) -> usize {
    let mut e = p.saturating_sub(1).max(saved);
    while e > saved && !input[e].is_ascii_alphanumeric() {
        e -= 1;
    }
    e + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Tag;
    use crate::tags::TagId;

    // Drives the automaton over a tag interior the way the scanner does:
    // one byte at a time, including the final '>'.
    fn parse_interior(interior: &str) -> (Tag, DocumentFlags) {
        let mut tag = Tag::default();
        let mut flags = DocumentFlags::default();
        let mut parser = AttrParser::new();
        let bytes = interior.as_bytes();
        for p in 0..bytes.len() {
            parser.step(&mut tag, &mut flags, bytes, p);
        }
        (tag, flags)
    }

    fn first(tag: &Tag, c: Component) -> Option<String> {
        tag.find_component(c).map(str::to_string)
    }

    #[test]
    fn parses_name_and_double_quoted_value() {
        let (tag, _) = parse_interior("a href=\"http://example.com\">");
        assert_eq!(tag.id, Some(TagId::A));
        assert_eq!(tag.name, "a");
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("http://example.com"));
    }

    #[test]
    fn parses_single_quoted_and_unquoted_values() {
        let (tag, _) = parse_interior("img src='x.png' width=40 alt=banner>");
        assert_eq!(tag.id, Some(TagId::Img));
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("x.png"));
        assert_eq!(first(&tag, Component::Width).as_deref(), Some("40"));
        assert_eq!(first(&tag, Component::Alt).as_deref(), Some("banner"));
    }

    #[test]
    fn tag_name_is_lowercased_and_entity_decoded() {
        let (tag, _) = parse_interior("DiV class=\"x\">");
        assert_eq!(tag.name, "div");
        assert_eq!(tag.id, Some(TagId::Div));
    }

    #[test]
    fn unknown_tag_sets_flag_and_clears_id() {
        let (tag, flags) = parse_interior("blink>");
        assert_eq!(tag.id, None);
        assert!(flags.contains(DocumentFlags::UNKNOWN_ELEMENTS));
        assert_eq!(tag.name, "blink");
    }

    #[test]
    fn bad_first_byte_marks_broken() {
        let (tag, flags) = parse_interior("%junk>");
        assert_eq!(tag.id, None);
        assert!(tag.flags.contains(TagFlags::BROKEN));
        assert!(flags.contains(DocumentFlags::BAD_ELEMENTS));
    }

    #[test]
    fn self_closing_slash_survives_dictionary_flags() {
        let (tag, _) = parse_interior("br/>");
        assert_eq!(tag.id, Some(TagId::Br));
        assert!(tag.flags.contains(TagFlags::CLOSED));

        let (tag, _) = parse_interior("div/>");
        assert!(tag.flags.contains(TagFlags::CLOSED));
    }

    #[test]
    fn self_closing_after_value() {
        let (tag, _) = parse_interior("img src=x.png/>");
        assert!(tag.flags.contains(TagFlags::CLOSED));
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("x.png"));
    }

    #[test]
    fn unknown_attributes_are_dropped() {
        let (tag, _) = parse_interior("div data-x=\"1\" class=\"keep\">");
        assert_eq!(tag.params.len(), 1);
        assert_eq!(first(&tag, Component::Class).as_deref(), Some("keep"));
    }

    #[test]
    fn repeated_attributes_keep_order_first_wins() {
        let (tag, _) = parse_interior("a href=\"first\" href=\"second\">");
        assert_eq!(tag.params.len(), 2);
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("first"));
        assert_eq!(tag.params[1].1, "second");
    }

    #[test]
    fn empty_quoted_value_is_dropped() {
        let (tag, _) = parse_interior("a href=\"\">");
        assert!(tag.params.is_empty());
    }

    #[test]
    fn bare_attribute_before_gt_is_discarded() {
        let (tag, flags) = parse_interior("input disabled >");
        assert_eq!(tag.id, Some(TagId::Input));
        assert!(tag.params.is_empty());
        assert!(!flags.contains(DocumentFlags::BAD_ELEMENTS));
    }

    #[test]
    fn quote_without_equal_is_broken() {
        let (tag, flags) = parse_interior("a href \"x\">");
        assert!(tag.flags.contains(TagFlags::BROKEN));
        assert!(flags.contains(DocumentFlags::BAD_ELEMENTS));
    }

    #[test]
    fn quote_right_after_name_terminates_it_at_last_alnum() {
        let (tag, _) = parse_interior("a href\"x\">");
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("x"));
    }

    #[test]
    fn spaces_around_equal_are_tolerated() {
        let (tag, _) = parse_interior("a href = \"x\">");
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("x"));
    }

    #[test]
    fn values_are_entity_decoded() {
        let (tag, _) = parse_interior("a href=\"p?a=1&amp;b=2\">");
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("p?a=1&b=2"));
    }

    #[test]
    fn adjacent_attributes_without_space_after_quote() {
        let (tag, _) = parse_interior("a href=\"x\"class=\"y\">");
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("x"));
        assert_eq!(first(&tag, Component::Class).as_deref(), Some("y"));
    }

    #[test]
    fn unquoted_value_ends_at_quote() {
        let (tag, _) = parse_interior("a href=x\"y\">");
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("x"));
    }

    #[test]
    fn closing_slash_gt_after_quoted_value() {
        let (tag, _) = parse_interior("img src=\"x\"/>");
        assert!(tag.flags.contains(TagFlags::CLOSED));
        assert_eq!(first(&tag, Component::Href).as_deref(), Some("x"));
    }
}
