//! The tag dictionary: known HTML element names with their ids and default
//! content-model flags. Process-wide immutable; lookups expect names that
//! are already entity-decoded and lowercased.

use crate::types::TagFlags;

/// Identifier of a known tag. Discriminants index `tags_seen` and mirror the
/// dictionary order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagId {
    A,
    Abbr,
    Address,
    Area,
    B,
    Base,
    Bdo,
    Big,
    Blockquote,
    Body,
    Br,
    Button,
    Caption,
    Center,
    Cite,
    Code,
    Col,
    Colgroup,
    Dd,
    Del,
    Dfn,
    Dir,
    Div,
    Dl,
    Dt,
    Em,
    Embed,
    Fieldset,
    Font,
    Footer,
    Form,
    Frame,
    Frameset,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Head,
    Header,
    Hr,
    Html,
    I,
    Iframe,
    Img,
    Input,
    Ins,
    Kbd,
    Label,
    Legend,
    Li,
    Link,
    Main,
    Map,
    Menu,
    Meta,
    Nav,
    Noframes,
    Noscript,
    Object,
    Ol,
    Optgroup,
    Option,
    P,
    Param,
    Pre,
    Q,
    S,
    Samp,
    Script,
    Section,
    Select,
    Small,
    Span,
    Strike,
    Strong,
    Style,
    Sub,
    Sup,
    Table,
    Tbody,
    Td,
    Textarea,
    Tfoot,
    Th,
    Thead,
    Title,
    Tr,
    Tt,
    U,
    Ul,
    Var,
    Wbr,
}

impl TagId {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One dictionary entry.
#[derive(Debug)]
pub struct TagDef {
    pub id: TagId,
    pub name: &'static str,
    pub flags: TagFlags,
}

const NONE: TagFlags = TagFlags::empty();
const INLINE: TagFlags = TagFlags::INLINE;
const EMPTY: TagFlags = TagFlags::EMPTY;
const HEAD: TagFlags = TagFlags::HEAD;
const UNIQUE: TagFlags = TagFlags::UNIQUE;
const BLOCK: TagFlags = TagFlags::BLOCK;
const HREF: TagFlags = TagFlags::HREF;

// Sorted by name; a test guards both the ordering and the id mapping.
const TAG_DEFS: &[TagDef] = &[
    TagDef { id: TagId::A, name: "a", flags: HREF },
    TagDef { id: TagId::Abbr, name: "abbr", flags: INLINE },
    TagDef { id: TagId::Address, name: "address", flags: BLOCK },
    TagDef { id: TagId::Area, name: "area", flags: EMPTY.union(HREF) },
    TagDef { id: TagId::B, name: "b", flags: INLINE },
    TagDef { id: TagId::Base, name: "base", flags: EMPTY.union(HEAD) },
    TagDef { id: TagId::Bdo, name: "bdo", flags: INLINE },
    TagDef { id: TagId::Big, name: "big", flags: INLINE },
    TagDef { id: TagId::Blockquote, name: "blockquote", flags: BLOCK },
    TagDef { id: TagId::Body, name: "body", flags: BLOCK.union(UNIQUE) },
    TagDef { id: TagId::Br, name: "br", flags: INLINE.union(EMPTY) },
    TagDef { id: TagId::Button, name: "button", flags: INLINE },
    TagDef { id: TagId::Caption, name: "caption", flags: BLOCK },
    TagDef { id: TagId::Center, name: "center", flags: BLOCK },
    TagDef { id: TagId::Cite, name: "cite", flags: INLINE },
    TagDef { id: TagId::Code, name: "code", flags: INLINE },
    TagDef { id: TagId::Col, name: "col", flags: EMPTY },
    TagDef { id: TagId::Colgroup, name: "colgroup", flags: NONE },
    TagDef { id: TagId::Dd, name: "dd", flags: BLOCK },
    TagDef { id: TagId::Del, name: "del", flags: INLINE },
    TagDef { id: TagId::Dfn, name: "dfn", flags: INLINE },
    TagDef { id: TagId::Dir, name: "dir", flags: BLOCK },
    TagDef { id: TagId::Div, name: "div", flags: BLOCK },
    TagDef { id: TagId::Dl, name: "dl", flags: BLOCK },
    TagDef { id: TagId::Dt, name: "dt", flags: BLOCK },
    TagDef { id: TagId::Em, name: "em", flags: INLINE },
    TagDef { id: TagId::Embed, name: "embed", flags: EMPTY },
    TagDef { id: TagId::Fieldset, name: "fieldset", flags: BLOCK },
    TagDef { id: TagId::Font, name: "font", flags: BLOCK },
    TagDef { id: TagId::Footer, name: "footer", flags: BLOCK },
    TagDef { id: TagId::Form, name: "form", flags: BLOCK.union(HREF) },
    TagDef { id: TagId::Frame, name: "frame", flags: EMPTY },
    TagDef { id: TagId::Frameset, name: "frameset", flags: NONE },
    TagDef { id: TagId::H1, name: "h1", flags: BLOCK },
    TagDef { id: TagId::H2, name: "h2", flags: BLOCK },
    TagDef { id: TagId::H3, name: "h3", flags: BLOCK },
    TagDef { id: TagId::H4, name: "h4", flags: BLOCK },
    TagDef { id: TagId::H5, name: "h5", flags: BLOCK },
    TagDef { id: TagId::H6, name: "h6", flags: BLOCK },
    TagDef { id: TagId::Head, name: "head", flags: HEAD.union(UNIQUE) },
    TagDef { id: TagId::Header, name: "header", flags: BLOCK },
    TagDef { id: TagId::Hr, name: "hr", flags: EMPTY.union(BLOCK) },
    TagDef { id: TagId::Html, name: "html", flags: BLOCK.union(UNIQUE) },
    TagDef { id: TagId::I, name: "i", flags: INLINE },
    TagDef { id: TagId::Iframe, name: "iframe", flags: NONE },
    TagDef { id: TagId::Img, name: "img", flags: INLINE.union(EMPTY) },
    TagDef { id: TagId::Input, name: "input", flags: INLINE.union(EMPTY) },
    TagDef { id: TagId::Ins, name: "ins", flags: INLINE },
    TagDef { id: TagId::Kbd, name: "kbd", flags: INLINE },
    TagDef { id: TagId::Label, name: "label", flags: INLINE },
    TagDef { id: TagId::Legend, name: "legend", flags: BLOCK },
    TagDef { id: TagId::Li, name: "li", flags: BLOCK },
    TagDef { id: TagId::Link, name: "link", flags: EMPTY.union(HEAD) },
    TagDef { id: TagId::Main, name: "main", flags: BLOCK },
    TagDef { id: TagId::Map, name: "map", flags: NONE },
    TagDef { id: TagId::Menu, name: "menu", flags: BLOCK },
    TagDef { id: TagId::Meta, name: "meta", flags: EMPTY.union(HEAD) },
    TagDef { id: TagId::Nav, name: "nav", flags: BLOCK },
    TagDef { id: TagId::Noframes, name: "noframes", flags: BLOCK },
    TagDef { id: TagId::Noscript, name: "noscript", flags: BLOCK },
    TagDef { id: TagId::Object, name: "object", flags: NONE },
    TagDef { id: TagId::Ol, name: "ol", flags: BLOCK },
    TagDef { id: TagId::Optgroup, name: "optgroup", flags: INLINE },
    TagDef { id: TagId::Option, name: "option", flags: INLINE },
    TagDef { id: TagId::P, name: "p", flags: BLOCK },
    TagDef { id: TagId::Param, name: "param", flags: EMPTY },
    TagDef { id: TagId::Pre, name: "pre", flags: BLOCK },
    TagDef { id: TagId::Q, name: "q", flags: INLINE },
    TagDef { id: TagId::S, name: "s", flags: INLINE },
    TagDef { id: TagId::Samp, name: "samp", flags: INLINE },
    TagDef { id: TagId::Script, name: "script", flags: HEAD },
    TagDef { id: TagId::Section, name: "section", flags: BLOCK },
    TagDef { id: TagId::Select, name: "select", flags: INLINE },
    TagDef { id: TagId::Small, name: "small", flags: INLINE },
    TagDef { id: TagId::Span, name: "span", flags: INLINE },
    TagDef { id: TagId::Strike, name: "strike", flags: INLINE },
    TagDef { id: TagId::Strong, name: "strong", flags: INLINE },
    TagDef { id: TagId::Style, name: "style", flags: HEAD },
    TagDef { id: TagId::Sub, name: "sub", flags: INLINE },
    TagDef { id: TagId::Sup, name: "sup", flags: INLINE },
    TagDef { id: TagId::Table, name: "table", flags: BLOCK },
    TagDef { id: TagId::Tbody, name: "tbody", flags: BLOCK },
    TagDef { id: TagId::Td, name: "td", flags: BLOCK },
    TagDef { id: TagId::Textarea, name: "textarea", flags: INLINE },
    TagDef { id: TagId::Tfoot, name: "tfoot", flags: BLOCK },
    TagDef { id: TagId::Th, name: "th", flags: BLOCK },
    TagDef { id: TagId::Thead, name: "thead", flags: BLOCK },
    TagDef { id: TagId::Title, name: "title", flags: HEAD.union(UNIQUE) },
    TagDef { id: TagId::Tr, name: "tr", flags: BLOCK },
    TagDef { id: TagId::Tt, name: "tt", flags: INLINE },
    TagDef { id: TagId::U, name: "u", flags: INLINE },
    TagDef { id: TagId::Ul, name: "ul", flags: BLOCK },
    TagDef { id: TagId::Var, name: "var", flags: INLINE },
    TagDef { id: TagId::Wbr, name: "wbr", flags: INLINE.union(EMPTY) },
];

/// Number of known tags; sizes the per-document `tags_seen` bitmap.
pub const N_TAGS: usize = TAG_DEFS.len();

/// Dictionary lookup by lowercase name.
pub fn by_name(name: &str) -> Option<&'static TagDef> {
    TAG_DEFS
        .binary_search_by(|def| def.name.cmp(name))
        .ok()
        .map(|i| &TAG_DEFS[i])
}

/// Reverse lookup.
pub fn by_id(id: TagId) -> &'static TagDef {
    &TAG_DEFS[id.index()]
}

/// Public name → id lookup, `None` for unknown names (any case accepted).
pub fn tag_id_by_name(name: &str) -> Option<TagId> {
    if name.bytes().any(|b| b.is_ascii_uppercase()) {
        return by_name(&name.to_ascii_lowercase()).map(|d| d.id);
    }
    by_name(name).map(|d| d.id)
}

/// Public id → name lookup.
pub fn tag_name_by_id(id: TagId) -> &'static str {
    by_id(id).name
}
