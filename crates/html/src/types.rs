//! Flag sets shared across the parser.
//!
//! Both sets are plain bitmasks: they travel on every tag, and downstream
//! rules match on their stable names.

/// Document-level parse anomalies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DocumentFlags(u32);

impl DocumentFlags {
    /// Input did not start with `<`.
    pub const BAD_START: DocumentFlags = DocumentFlags(1 << 0);
    /// An `<?...?>` processing instruction was seen.
    pub const XML: DocumentFlags = DocumentFlags(1 << 1);
    /// Structurally broken markup (bogus comments, empty tags, bad names).
    pub const BAD_ELEMENTS: DocumentFlags = DocumentFlags(1 << 2);
    /// At least one tag name missing from the dictionary.
    pub const UNKNOWN_ELEMENTS: DocumentFlags = DocumentFlags(1 << 3);
    /// A unique tag (html, head, body, title) appeared more than once.
    pub const DUPLICATE_ELEMENTS: DocumentFlags = DocumentFlags(1 << 4);
    /// Closing tags could not be paired with openings.
    pub const UNBALANCED: DocumentFlags = DocumentFlags(1 << 5);
    /// The tag cap was hit; the tree is truncated.
    pub const TOO_MANY_TAGS: DocumentFlags = DocumentFlags(1 << 6);
    /// At least one `data:` URL was encountered.
    pub const HAS_DATA_URLS: DocumentFlags = DocumentFlags(1 << 7);

    pub fn contains(self, other: DocumentFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: DocumentFlags) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for DocumentFlags {
    type Output = DocumentFlags;
    fn bitor(self, rhs: DocumentFlags) -> DocumentFlags {
        DocumentFlags(self.0 | rhs.0)
    }
}

/// Per-tag flags: the content-model half comes from the dictionary, the
/// `CLOSED`/`CLOSING`/... half is set while parsing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TagFlags(u32);

impl TagFlags {
    pub const fn empty() -> TagFlags {
        TagFlags(0)
    }

    /// Content model: attached to the parent, never pushed on the stack.
    pub const INLINE: TagFlags = TagFlags(1 << 0);
    /// Content model: void element, takes no content.
    pub const EMPTY: TagFlags = TagFlags(1 << 1);
    /// Content model: head metadata; its subtree renders nothing.
    pub const HEAD: TagFlags = TagFlags(1 << 2);
    /// Content model: reserved for names outside the dictionary.
    pub const UNKNOWN: TagFlags = TagFlags(1 << 3);
    /// Content model: at most one instance is expected per document.
    pub const UNIQUE: TagFlags = TagFlags(1 << 4);
    /// Block-level element; carries color/style processing.
    pub const BLOCK: TagFlags = TagFlags(1 << 5);
    /// Element whose href/src/action names a link target.
    pub const HREF: TagFlags = TagFlags(1 << 6);
    /// Self-closed (`<br/>`).
    pub const CLOSED: TagFlags = TagFlags(1 << 7);
    /// A closing tag (`</div>`).
    pub const CLOSING: TagFlags = TagFlags(1 << 8);
    /// Subtree produces no rendered content.
    pub const IGNORE: TagFlags = TagFlags(1 << 9);
    /// The tag's markup itself was malformed.
    pub const BROKEN: TagFlags = TagFlags(1 << 10);
    /// Carries an image payload.
    pub const IMAGE: TagFlags = TagFlags(1 << 11);

    pub const fn union(self, other: TagFlags) -> TagFlags {
        TagFlags(self.0 | other.0)
    }

    pub const fn intersection(self, other: TagFlags) -> TagFlags {
        TagFlags(self.0 & other.0)
    }

    pub fn contains(self, other: TagFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: TagFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: TagFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for TagFlags {
    type Output = TagFlags;
    fn bitor(self, rhs: TagFlags) -> TagFlags {
        self.union(rhs)
    }
}

/// Flags on an [`crate::Image`] record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageFlags(u32);

impl ImageFlags {
    /// References mail-internal content (`cid:` or decoded `data:`).
    pub const EMBEDDED: ImageFlags = ImageFlags(1 << 0);
    /// References an external resource.
    pub const EXTERNAL: ImageFlags = ImageFlags(1 << 1);
    /// Carried inline as a `data:` URI.
    pub const DATA: ImageFlags = ImageFlags(1 << 2);

    pub fn contains(self, other: ImageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ImageFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for ImageFlags {
    type Output = ImageFlags;
    fn bitor(self, rhs: ImageFlags) -> ImageFlags {
        ImageFlags(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_set_operations() {
        let mut f = DocumentFlags::default();
        assert!(f.is_empty());
        f.insert(DocumentFlags::XML);
        f.insert(DocumentFlags::UNBALANCED);
        assert!(f.contains(DocumentFlags::XML));
        assert!(!f.contains(DocumentFlags::BAD_START));
        assert!(f.contains(DocumentFlags::XML | DocumentFlags::UNBALANCED));
    }

    #[test]
    fn tag_flags_intersect() {
        let f = TagFlags::HEAD | TagFlags::UNIQUE;
        assert!(f.intersects(TagFlags::HEAD | TagFlags::UNKNOWN | TagFlags::IGNORE));
        assert!(!f.intersects(TagFlags::INLINE | TagFlags::EMPTY));
        assert!(f.contains(TagFlags::HEAD));
        assert!(!f.contains(TagFlags::HEAD | TagFlags::INLINE));
    }
}
