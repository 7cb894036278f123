//! The closing passes over the finished tree: content-length roll-up, style
//! propagation, visibility computation, and maintenance of the
//! invisible-text exception list.
//!
//! Both passes walk block tags only; inline tags carry no blocks.

use crate::attr::Component;
use crate::document::{Document, ExceptionKind, TextException};
use crate::types::TagFlags;

pub(crate) fn run(doc: &mut Document, mut exceptions: Option<&mut Vec<TextException>>) {
    let order = doc.block_tags_preorder();

    // post-order: children's rendered lengths roll up into their parents.
    // A reversed pre-order visits every child before its parent.
    for &idx in order.iter().rev() {
        let mut sum = 0;
        for &child in &doc.tags[idx].children {
            sum += doc.tags[child].content_length;
        }
        doc.tags[idx].content_length += sum;
    }

    // pre-order: match the stylesheet, settle visibility, record exceptions,
    // and push the merged block down to the children.
    let mut last_invisible: Option<usize> = None;
    for &idx in &order {
        let css_block = doc.styles.as_ref().and_then(|sheet| {
            let tag = &doc.tags[idx];
            sheet.match_element(
                &tag.name,
                tag.find_component(Component::Id),
                tag.find_component(Component::Class),
            )
        });
        if let Some(css_block) = css_block {
            if let Some(block) = doc.tags[idx].block.as_mut() {
                block.propagate_from(&css_block);
            } else {
                doc.tags[idx].block = Some(css_block);
            }
        }

        let Some(mut block) = doc.tags[idx].block.take() else {
            continue;
        };
        block.compute_visibility();
        let visible = block.is_visible();
        doc.tags[idx].block = Some(block);

        if let Some(exceptions) = exceptions.as_deref_mut() {
            maintain_exceptions(doc, idx, visible, exceptions, &mut last_invisible);
        }

        let parent_block = doc.tags[idx].block.clone().unwrap_or_default();
        let children = doc.tags[idx].children.clone();
        for child in children {
            if let Some(block) = doc.tags[child].block.as_mut() {
                block.propagate_from(&parent_block);
            } else {
                doc.tags[child].block = Some(parent_block.clone());
            }
        }
    }
}

// Exception bookkeeping, driven by the pre-order walk:
// - the first invisible tag under a visible parent opens a new exception;
// - a visible child inside the most recent invisible exception trims it
//   from the tail, from the head, or splits it in two.
fn maintain_exceptions(
    doc: &Document,
    idx: usize,
    visible: bool,
    exceptions: &mut Vec<TextException>,
    last_invisible: &mut Option<usize>,
) {
    let tag = &doc.tags[idx];

    if !visible {
        let parent_is_visible = match tag.parent {
            None => true,
            Some(parent) => doc.tags[parent]
                .block
                .as_ref()
                .is_some_and(|b| b.is_visible()),
        };
        if parent_is_visible {
            exceptions.push(TextException {
                pos: tag.content_offset,
                len: tag.content_length,
                kind: ExceptionKind::Invisible,
                tag: Some(idx),
            });
            *last_invisible = Some(exceptions.len() - 1);
        }
        return;
    }

    let Some(last) = *last_invisible else {
        return;
    };
    let Some(parent) = tag.parent else {
        return;
    };
    if exceptions[last].tag != Some(parent) {
        return;
    }

    let parent_tag = &doc.tags[parent];
    let ex_pos = exceptions[last].pos;
    let ex_len = exceptions[last].len;

    if tag.content_offset + tag.content_length == parent_tag.content_offset + parent_tag.content_length
    {
        // visible tail: the exception stops before it
        exceptions[last].len = ex_len.saturating_sub(tag.content_length);
    } else if tag.content_offset == parent_tag.content_offset {
        // visible head: the exception starts after it
        exceptions[last].pos = ex_pos + tag.content_length;
        exceptions[last].len = ex_len.saturating_sub(tag.content_length);
    } else if tag.content_offset > ex_pos {
        // visible middle: split into two invisible ranges
        let start_len = tag.content_offset - ex_pos;
        let end_len = ex_len.saturating_sub(start_len + tag.content_length);
        exceptions[last].len = start_len;
        exceptions.push(TextException {
            pos: tag.content_offset + tag.content_length,
            len: end_len,
            kind: ExceptionKind::Invisible,
            tag: Some(parent),
        });
        *last_invisible = Some(exceptions.len() - 1);
    }
}
