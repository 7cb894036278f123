//! Per-element style blocks: the handful of properties a mail analyzer
//! actually needs to decide whether text is visible, plus fg/bg colors.

use crate::values::{Color, maybe_color_from_string};

/// Style state attached to one element.
///
/// `None` fields are "not specified here"; propagation fills them from the
/// parent. Visibility is recomputed after every merge via
/// [`StyleBlock::compute_visibility`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleBlock {
    pub fg_color: Option<Color>,
    pub bg_color: Option<Color>,
    /// `Some(false)` for `display: none` or `visibility: hidden`.
    pub display: Option<bool>,
    pub font_size: Option<f32>,
    pub opacity: Option<f32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    visible: Option<bool>,
}

impl StyleBlock {
    /// The sentinel attached to block tags that carry no style of their own.
    pub fn undefined() -> Self {
        Self::default()
    }

    pub fn set_fgcolor(&mut self, c: Color) {
        self.fg_color = Some(c);
    }

    pub fn set_bgcolor(&mut self, c: Color) {
        self.bg_color = Some(c);
    }

    pub fn is_defined(&self) -> bool {
        *self != Self::default()
    }

    /// Fills unset properties from `parent`. Invisibility cascades: a child
    /// inside a `display: none` subtree stays hidden whatever it declares.
    pub fn propagate_from(&mut self, parent: &StyleBlock) {
        if parent.display == Some(false) {
            self.display = Some(false);
        } else if self.display.is_none() {
            self.display = parent.display;
        }
        if self.fg_color.is_none() {
            self.fg_color = parent.fg_color;
        }
        if self.bg_color.is_none() {
            self.bg_color = parent.bg_color;
        }
        if self.font_size.is_none() {
            self.font_size = parent.font_size;
        }
        if self.opacity.is_none() {
            self.opacity = parent.opacity;
        }
    }

    /// Decides visibility from the merged properties. Text is treated as
    /// invisible when it is not displayed, effectively zero-sized, fully
    /// transparent, or painted in (almost) the background color.
    pub fn compute_visibility(&mut self) {
        let hidden = self.display == Some(false)
            || self.font_size.is_some_and(|s| s < 1.0)
            || self.opacity.is_some_and(|o| o < 0.1)
            || self.fg_color.is_some_and(Color::is_transparent)
            || match (self.fg_color, self.bg_color) {
                (Some(fg), Some(bg)) => fg.near(bg),
                _ => false,
            };
        self.visible = Some(!hidden);
    }

    /// Visibility as last computed; blocks never examined are visible.
    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(true)
    }

    /// Overlays every property `other` specifies onto `self`.
    pub fn apply(&mut self, other: &StyleBlock) {
        if other.fg_color.is_some() {
            self.fg_color = other.fg_color;
        }
        if other.bg_color.is_some() {
            self.bg_color = other.bg_color;
        }
        if other.display.is_some() {
            self.display = other.display;
        }
        if other.font_size.is_some() {
            self.font_size = other.font_size;
        }
        if other.opacity.is_some() {
            self.opacity = other.opacity;
        }
        if other.width.is_some() {
            self.width = other.width;
        }
        if other.height.is_some() {
            self.height = other.height;
        }
    }
}

/// Parses an inline `style="..."` declaration list into a block.
///
/// Returns `None` when no recognized property survives, matching the
/// caller's "no block" path for junk styles.
pub fn parse_declaration_block(input: &str) -> Option<StyleBlock> {
    let mut block = StyleBlock::default();
    for (name, value) in declarations(input) {
        apply_declaration(&mut block, &name, value);
    }
    block.is_defined().then_some(block)
}

/// Splits `"color: red; display:none"` into lowercase name / raw value pairs.
pub(crate) fn declarations(input: &str) -> impl Iterator<Item = (String, &str)> {
    input.split(';').filter_map(|pair| {
        let (n, v) = pair.split_once(':')?;
        let name = n.trim().to_ascii_lowercase();
        let value = v.trim();
        (!name.is_empty() && !value.is_empty()).then_some((name, value))
    })
}

pub(crate) fn apply_declaration(block: &mut StyleBlock, name: &str, value: &str) {
    match name {
        "color" => {
            if let Some(c) = maybe_color_from_string(value) {
                block.fg_color = Some(c);
            }
        }
        "background-color" | "background" => {
            // `background` shorthand: take the first token that parses as a color.
            for token in value.split_ascii_whitespace() {
                if let Some(c) = maybe_color_from_string(token) {
                    block.bg_color = Some(c);
                    break;
                }
            }
        }
        "display" => {
            block.display = Some(!value.eq_ignore_ascii_case("none"));
        }
        "visibility" => {
            if value.eq_ignore_ascii_case("hidden") || value.eq_ignore_ascii_case("collapse") {
                block.display = Some(false);
            }
        }
        "opacity" => {
            if let Ok(v) = value.parse::<f32>() {
                block.opacity = Some(v.clamp(0.0, 1.0));
            }
        }
        "font-size" => {
            block.font_size = parse_size(value);
        }
        "width" => {
            block.width = parse_dimension(value);
        }
        "height" => {
            block.height = parse_dimension(value);
        }
        _ => {}
    }
}

fn parse_size(value: &str) -> Option<f32> {
    let digits: String = value
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse::<f32>().ok()
}

fn parse_dimension(value: &str) -> Option<u32> {
    let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
    digits.parse::<u32>().ok()
}
