//! Tree building: attaching each scanned tag to the document and repairing
//! the kind of unbalanced nesting mail HTML is full of.
//!
//! Balance repair is deliberately swap-and-pop, not an HTML5
//! adoption-agency rebuild: find the matching unclosed opener anywhere on
//! the stack, mark it closed, swap it to the top and pop. The stack stays
//! small and the whole parse stays O(n).

use crate::document::{Document, TagIdx};
use crate::types::{DocumentFlags, TagFlags};

/// Hard cap on tree mutations; the byte stream is still consumed past it.
pub const MAX_TAGS: u32 = 8192;

// The counter saturates at the cap, so `total_tags <= MAX_TAGS` holds even
// for floods of unknown tags.
fn bump_total(doc: &mut Document) {
    doc.total_tags = (doc.total_tags + 1).min(MAX_TAGS);
}

// Marks a tag as materialized in the tree: updates tags_seen and flags
// duplicate unique tags.
fn mark_added(doc: &mut Document, tag: TagIdx) {
    let (id, flags) = (doc.tags[tag].id, doc.tags[tag].flags);
    if let Some(id) = id {
        if flags.contains(TagFlags::UNIQUE)
            && !flags.contains(TagFlags::CLOSING)
            && doc.tags_seen[id.index()]
        {
            doc.flags.insert(DocumentFlags::DUPLICATE_ELEMENTS);
        }
        doc.tags_seen[id.index()] = true;
    }
}

fn attach(doc: &mut Document, parent: TagIdx, child: TagIdx) {
    doc.tags[parent].children.push(child);
    mark_added(doc, child);
}

// Finds the nearest unclosed opener with the same id, marks it closed, and
// removes it from the stack via swap-and-pop. False means unpaired.
fn check_balance(doc: &mut Document, cur: TagIdx, stack: &mut Vec<TagIdx>) -> bool {
    let id = doc.tags[cur].id;
    let found = stack.iter().rposition(|&idx| {
        let t = &doc.tags[idx];
        !t.flags.contains(TagFlags::CLOSED) && t.id == id
    });
    let Some(pos) = found else {
        return false;
    };
    doc.tags[stack[pos]].flags.insert(TagFlags::CLOSED);
    let last = stack.len() - 1;
    stack.swap(pos, last);
    stack.pop();
    true
}

/// Processes one completed tag against the open-tag stack.
///
/// Returns whether the scanner should write content under this tag; `false`
/// routes it to `content_ignore` (or CSS capture for `<style>`).
pub(crate) fn process_tag(doc: &mut Document, cur: TagIdx, stack: &mut Vec<TagIdx>) -> bool {
    if doc.total_tags >= MAX_TAGS {
        doc.flags.insert(DocumentFlags::TOO_MANY_TAGS);
    }

    if doc.tags[cur].id.is_none() {
        bump_total(doc);
        return false;
    }

    let parent = stack.last().copied().or_else(|| doc.root_idx());
    doc.tags[cur].parent = parent;

    let flags = doc.tags[cur].flags;
    if !flags.intersects(TagFlags::INLINE | TagFlags::EMPTY) {
        // stack-participating tag
        if flags.contains(TagFlags::CLOSING) {
            let Some(_parent) = parent else {
                log::debug!("closing tag {} with no parent", doc.tags[cur].name);
                return false;
            };
            if doc.total_tags < MAX_TAGS {
                if !check_balance(doc, cur, stack) {
                    log::debug!("unpaired closing tag {}", doc.tags[cur].name);
                    doc.flags.insert(DocumentFlags::UNBALANCED);
                }
                bump_total(doc);
            }
        } else if let Some(parent_idx) = parent {
            let parent_flags = doc.tags[parent_idx].flags;
            if parent_flags.contains(TagFlags::IGNORE) {
                doc.tags[cur].flags.insert(TagFlags::IGNORE);
            }

            if !flags.contains(TagFlags::CLOSED)
                && !parent_flags.contains(TagFlags::BLOCK)
                && doc.tags[parent_idx].id == doc.tags[cur].id
            {
                // something like <a>bla<a>foo: the reopen becomes a sibling
                // under the grandparent
                doc.flags.insert(DocumentFlags::UNBALANCED);
                let grandparent = doc.tags[parent_idx].parent;
                doc.tags[cur].parent = grandparent;
                if doc.total_tags < MAX_TAGS {
                    match grandparent {
                        Some(gp) => attach(doc, gp, cur),
                        None => {
                            if doc.root_idx().is_none() {
                                doc.root = Some(cur);
                            }
                            mark_added(doc, cur);
                        }
                    }
                    stack.push(cur);
                    bump_total(doc);
                }
                return true;
            }

            if doc.total_tags < MAX_TAGS {
                attach(doc, parent_idx, cur);
                if !doc.tags[cur].flags.contains(TagFlags::CLOSED) {
                    stack.push(cur);
                }
                bump_total(doc);
            }

            if ignores_content(doc.tags[cur].flags) {
                doc.tags[cur].flags.insert(TagFlags::IGNORE);
                return false;
            }
        } else {
            // first stack tag of the document becomes the root slot
            if doc.total_tags < MAX_TAGS {
                doc.root = Some(cur);
                mark_added(doc, cur);
                bump_total(doc);
            }

            if ignores_content(doc.tags[cur].flags) {
                doc.tags[cur].flags.insert(TagFlags::IGNORE);
                return false;
            }
        }
    } else {
        // inline or void: attached, never pushed
        if let Some(parent_idx) = parent {
            if doc.total_tags < MAX_TAGS {
                attach(doc, parent_idx, cur);
                bump_total(doc);
            }
            if doc.tags[parent_idx]
                .flags
                .intersects(TagFlags::HEAD | TagFlags::UNKNOWN | TagFlags::IGNORE)
            {
                doc.tags[cur].flags.insert(TagFlags::IGNORE);
                return false;
            }
        }
    }

    true
}

fn ignores_content(flags: TagFlags) -> bool {
    flags.intersects(TagFlags::HEAD | TagFlags::UNKNOWN | TagFlags::IGNORE)
}
