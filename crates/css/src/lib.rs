//! Just enough CSS for mail analysis: `<style>` sheets reduced to
//! simple-selector rules, inline declaration blocks, and color values.
//!
//! This is intentionally not a conforming CSS parser. Mail bodies use a
//! narrow, old dialect (type/class/id selectors, colors, display and
//! visibility toggles), and anything more exotic is skipped rather than
//! misread.

mod block;
mod values;

use std::fmt;

pub use crate::block::{StyleBlock, parse_declaration_block};
pub use crate::values::{Color, maybe_color_from_string};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Universal,
    Type(String),
    Class(String),
    Id(String),
}

impl Selector {
    // (id, class, type): enough ordering for the merge in `match_element`.
    fn specificity(&self) -> (u8, u8, u8) {
        match self {
            Selector::Universal => (0, 0, 0),
            Selector::Type(_) => (0, 0, 1),
            Selector::Class(_) => (0, 1, 0),
            Selector::Id(_) => (1, 0, 0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub selectors: Vec<Selector>,
    pub block: StyleBlock,
}

/// An accumulated stylesheet; successive `<style>` blocks append rules.
#[derive(Clone, Debug, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CssError {
    /// A `{` without a matching `}` (or the reverse) before end of input.
    UnbalancedBraces,
}

impl fmt::Display for CssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CssError::UnbalancedBraces => write!(f, "unbalanced braces in stylesheet"),
        }
    }
}

impl std::error::Error for CssError {}

impl Stylesheet {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Merges every rule matching the element into one block, lowest
    /// specificity first so higher-specificity properties win; rule order
    /// breaks ties. Returns `None` when nothing matches.
    pub fn match_element(
        &self,
        name: &str,
        id: Option<&str>,
        class: Option<&str>,
    ) -> Option<StyleBlock> {
        let mut matched: Vec<((u8, u8, u8), usize)> = Vec::new();
        for (order, rule) in self.rules.iter().enumerate() {
            let best = rule
                .selectors
                .iter()
                .filter(|s| selector_matches(s, name, id, class))
                .map(Selector::specificity)
                .max();
            if let Some(spec) = best {
                matched.push((spec, order));
            }
        }
        if matched.is_empty() {
            return None;
        }
        matched.sort();

        let mut out = StyleBlock::default();
        for (_, order) in matched {
            out.apply(&self.rules[order].block);
        }
        Some(out)
    }
}

fn selector_matches(sel: &Selector, name: &str, id: Option<&str>, class: Option<&str>) -> bool {
    match sel {
        Selector::Universal => true,
        Selector::Type(t) => t.eq_ignore_ascii_case(name),
        Selector::Id(want) => id.is_some_and(|v| v == want),
        Selector::Class(want) => {
            class.is_some_and(|list| list.split_ascii_whitespace().any(|c| c == want))
        }
    }
}

/// Parses a `<style>` interior into a stylesheet, appending onto `prior`
/// when given (successive style blocks accumulate).
///
/// Rules with selectors or declarations this dialect does not understand are
/// skipped silently; at-rules are consumed including their nested braces.
///
/// # Errors
///
/// `CssError::UnbalancedBraces` when the brace structure never closes, which
/// is the usual shape of truncated or adversarial style blocks.
pub fn parse_stylesheet(input: &str, prior: Option<Stylesheet>) -> Result<Stylesheet, CssError> {
    let mut sheet = prior.unwrap_or_default();
    let src = strip_comments(input);

    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        // selector text runs to the next top-level '{'
        let Some(open_rel) = src[i..].find('{') else {
            if src[i..].contains('}') {
                return Err(CssError::UnbalancedBraces);
            }
            break;
        };
        let open = i + open_rel;
        let selector_text = src[i..open].trim();
        if selector_text.contains('}') {
            return Err(CssError::UnbalancedBraces);
        }

        let Some(close) = find_matching_brace(bytes, open) else {
            return Err(CssError::UnbalancedBraces);
        };

        // at-rules (@media, @font-face, ...) are skipped wholesale
        if !selector_text.starts_with('@') {
            let selectors: Vec<Selector> = selector_text
                .split(',')
                .filter_map(parse_selector)
                .collect();
            if !selectors.is_empty()
                && let Some(block) = parse_declaration_block(&src[open + 1..close])
            {
                sheet.rules.push(Rule { selectors, block });
            }
        }

        i = close + 1;
    }

    Ok(sheet)
}

fn find_matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_selector(s: &str) -> Option<Selector> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s == "*" {
        return Some(Selector::Universal);
    }
    // Combinators, pseudo-classes and attribute selectors are out of dialect.
    if s.contains(|c: char| c.is_ascii_whitespace() || matches!(c, '>' | '+' | '~' | ':' | '[')) {
        return None;
    }
    if let Some(id) = s.strip_prefix('#') {
        return Some(Selector::Id(id.to_string()));
    }
    if let Some(class) = s.strip_prefix('.') {
        return Some(Selector::Class(class.to_string()));
    }
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        .then(|| Selector::Type(s.to_ascii_lowercase()))
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(input: &str) -> Stylesheet {
        parse_stylesheet(input, None).expect("stylesheet should parse")
    }

    #[test]
    fn parses_type_class_and_id_rules() {
        let s = sheet("div { color: red } .hidden { display: none } #x { color: blue }");
        assert_eq!(s.rules().len(), 3);

        let div = s.match_element("div", None, None).unwrap();
        assert_eq!(div.fg_color, Some(Color::rgb(255, 0, 0)));

        let hid = s.match_element("span", None, Some("hidden other")).unwrap();
        assert_eq!(hid.display, Some(false));

        let id = s.match_element("p", Some("x"), None).unwrap();
        assert_eq!(id.fg_color, Some(Color::rgb(0, 0, 255)));
    }

    #[test]
    fn higher_specificity_wins() {
        let s = sheet("* { color: green } p { color: red } #only { color: blue }");
        let merged = s.match_element("p", Some("only"), None).unwrap();
        assert_eq!(merged.fg_color, Some(Color::rgb(0, 0, 255)));
    }

    #[test]
    fn later_rule_wins_at_equal_specificity() {
        let s = sheet("p { color: red } p { color: blue }");
        let merged = s.match_element("p", None, None).unwrap();
        assert_eq!(merged.fg_color, Some(Color::rgb(0, 0, 255)));
    }

    #[test]
    fn no_match_returns_none() {
        let s = sheet("div { color: red }");
        assert!(s.match_element("span", None, None).is_none());
    }

    #[test]
    fn prior_sheet_accumulates() {
        let first = sheet("div { color: red }");
        let merged = parse_stylesheet(".x { display: none }", Some(first)).unwrap();
        assert_eq!(merged.rules().len(), 2);
    }

    #[test]
    fn at_rules_and_complex_selectors_are_skipped() {
        let s = sheet(
            "@media screen { div { color: red } } \
             p > span { color: red } \
             a:hover { color: red } \
             b { color: red }",
        );
        assert_eq!(s.rules().len(), 1);
        assert!(s.match_element("b", None, None).is_some());
    }

    #[test]
    fn unbalanced_braces_error() {
        assert_eq!(
            parse_stylesheet("div { color: red", None).unwrap_err(),
            CssError::UnbalancedBraces
        );
        assert_eq!(
            parse_stylesheet("} div {}", None).unwrap_err(),
            CssError::UnbalancedBraces
        );
    }

    #[test]
    fn comments_are_stripped() {
        let s = sheet("/* hide */ .x { /* inner */ display: none }");
        assert_eq!(s.rules().len(), 1);
    }
}
