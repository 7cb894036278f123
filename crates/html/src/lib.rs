//! Lenient HTML parsing and DOM normalization for untrusted mail bodies.
//!
//! The parser never rejects input: adversarial and broken markup degrades
//! into document flags and per-tag annotations while still producing
//!
//! - a tree of parsed tags with attributes,
//! - a normalized plain-text rendering of the visible content,
//! - discovered URLs (hrefs, image sources, query-string payloads),
//! - image records, including sniffed `data:` URIs,
//! - exception ranges marking invisible text in the rendering.
//!
//! # Examples
//!
//! ```
//! let doc = html::process_part_simple(b"<html><body><p>Hello</p></body></html>");
//! assert_eq!(doc.parsed_content(), b"Hello\r\n");
//! assert!(doc.tag_seen("body"));
//! ```

mod attr;
mod document;
pub mod entities;
mod handlers;
mod parser;
pub mod tags;
mod tree;
pub mod types;
mod visibility;

pub use crate::attr::Component;
pub use crate::document::{
    Document, ExceptionKind, Image, ImageIdx, Tag, TagExtra, TagIdx, TextException,
};
pub use crate::parser::ProcessOptions;
pub use crate::tags::{N_TAGS, TagId, tag_id_by_name, tag_name_by_id};
pub use crate::tree::MAX_TAGS;
pub use crate::types::{DocumentFlags, ImageFlags, TagFlags};

/// Parses one HTML part with the given sinks and switches.
pub fn process_part(input: &[u8], opts: ProcessOptions<'_>) -> Document {
    parser::process_input(input, opts)
}

/// Parses one HTML part with no URL sinks, no exception list, and CSS
/// processing disabled.
pub fn process_part_simple(input: &[u8]) -> Document {
    parser::process_input(input, ProcessOptions::default())
}
