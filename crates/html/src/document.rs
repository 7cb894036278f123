//! The parsed document: an index arena of tags, the rendered text buffer,
//! and the queries exposed to the rest of the pipeline.
//!
//! Tags live in one append-only `Vec`; `parent`/`children` are indices into
//! it. Nothing is ever deleted during a parse, so indices stay stable and
//! the whole document frees in one drop.

use crate::attr::Component;
use crate::tags::{self, N_TAGS, TagId};
use crate::types::{DocumentFlags, ImageFlags, TagFlags};
use css::{StyleBlock, Stylesheet};
use urlscan::Url;

pub type TagIdx = usize;
pub type ImageIdx = usize;

/// Per-tag payload for tags that resolve to something richer than markup.
#[derive(Clone, Debug, Default)]
pub enum TagExtra {
    #[default]
    None,
    Url(Url),
    Image(ImageIdx),
}

/// One parsed tag.
#[derive(Debug, Default)]
pub struct Tag {
    /// Lowercased, entity-decoded name as written in the markup.
    pub name: String,
    /// Dictionary id; `None` for names outside the dictionary.
    pub id: Option<TagId>,
    pub flags: TagFlags,
    /// Attribute components in source order. Duplicates are kept; lookups
    /// take the first of each kind.
    pub params: Vec<(Component, String)>,
    pub parent: Option<TagIdx>,
    pub children: Vec<TagIdx>,
    /// Start of this tag's rendered text inside `Document::parsed_content`.
    pub content_offset: usize,
    /// Rendered byte count; after the closing pass it includes descendants.
    pub content_length: usize,
    pub extra: TagExtra,
    pub block: Option<StyleBlock>,
}

impl Tag {
    /// First value stored for `component`, if any.
    pub fn find_component(&self, component: Component) -> Option<&str> {
        self.params
            .iter()
            .find(|(c, _)| *c == component)
            .map(|(_, v)| v.as_str())
    }
}

/// One image reference discovered in the document.
#[derive(Debug)]
pub struct Image {
    /// The raw `src` value, exactly as written (including `cid:`/`data:`).
    pub src: String,
    /// Parsed URL for external images.
    pub url: Option<Url>,
    pub width: u32,
    pub height: u32,
    pub flags: ImageFlags,
    /// The `<img>`/`<link>` tag that produced this record.
    pub tag: TagIdx,
    /// Sniffed metadata for decoded `data:` payloads.
    pub embedded: Option<imginfo::ImageInfo>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionKind {
    /// The range renders but is invisible to the reader.
    Invisible,
    /// The range is anchor text displayed in place of a link target.
    DisplayedUrl,
}

/// A range of the rendered text that downstream scoring must treat
/// specially.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextException {
    pub pos: usize,
    pub len: usize,
    pub kind: ExceptionKind,
    pub tag: Option<TagIdx>,
}

/// A fully parsed HTML part.
#[derive(Debug)]
pub struct Document {
    pub(crate) tags: Vec<Tag>,
    pub(crate) root: Option<TagIdx>,
    pub(crate) parsed: Vec<u8>,
    pub(crate) tags_seen: [bool; N_TAGS],
    pub flags: DocumentFlags,
    pub(crate) base_url: Option<Url>,
    pub(crate) styles: Option<Stylesheet>,
    pub(crate) images: Vec<Image>,
    pub(crate) total_tags: u32,
}

impl Document {
    pub(crate) fn new() -> Self {
        Self {
            tags: Vec::new(),
            root: None,
            parsed: Vec::new(),
            tags_seen: [false; N_TAGS],
            flags: DocumentFlags::default(),
            base_url: None,
            styles: None,
            images: Vec::new(),
            total_tags: 0,
        }
    }

    /// All tags in allocation order, including rejected ones.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, idx: TagIdx) -> &Tag {
        &self.tags[idx]
    }

    /// The first root-level block tag, if the document produced a tree.
    pub fn root(&self) -> Option<&Tag> {
        self.root.map(|idx| &self.tags[idx])
    }

    pub(crate) fn root_idx(&self) -> Option<TagIdx> {
        self.root
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn styles(&self) -> Option<&Stylesheet> {
        self.styles.as_ref()
    }

    pub fn total_tags(&self) -> u32 {
        self.total_tags
    }

    /// The rendered text: entity-decoded, whitespace-collapsed,
    /// newline-synthesized visible content. Valid until the document drops.
    pub fn parsed_content(&self) -> &[u8] {
        &self.parsed
    }

    /// Whether at least one tag with this name made it into the tree.
    pub fn tag_seen(&self, name: &str) -> bool {
        match tags::tag_id_by_name(name) {
            Some(id) => self.tags_seen[id.index()],
            None => false,
        }
    }

    pub fn tag_seen_by_id(&self, id: TagId) -> bool {
        self.tags_seen[id.index()]
    }

    /// Looks up an embedded image by its Content-ID. The stored `src` keeps
    /// the `cid:` prefix, the caller's cid usually does not; both match.
    pub fn find_embedded_image_by_cid(&self, cid: &str) -> Option<&Image> {
        self.images.iter().find(|img| {
            img.flags.contains(ImageFlags::EMBEDDED)
                && !img.src.is_empty()
                && (img.src == cid || img.src.strip_prefix("cid:") == Some(cid))
        })
    }

    /// Deterministic pre-order dump: every tag contributes
    /// `"+" * depth ++ name ++ ";"`. Used by tests and debug tooling.
    pub fn debug_structure(&self) -> String {
        let mut out = String::new();
        let Some(root) = self.root else {
            return out;
        };
        let mut stack: Vec<(TagIdx, usize)> = vec![(root, 1)];
        while let Some((idx, depth)) = stack.pop() {
            let tag = &self.tags[idx];
            for _ in 0..depth {
                out.push('+');
            }
            out.push_str(&tag.name);
            out.push(';');
            for &child in tag.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    /// Pre-order walk over non-inline tags reachable from the root.
    pub(crate) fn block_tags_preorder(&self) -> Vec<TagIdx> {
        let mut out = Vec::new();
        let Some(root) = self.root else {
            return out;
        };
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if !self.tags[idx].flags.contains(TagFlags::INLINE) {
                out.push(idx);
            }
            for &child in self.tags[idx].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}
