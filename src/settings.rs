use anyhow::bail;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";
pub const DEFAULT_OPACITY: f64 = 0.9;
pub const DEFAULT_FONT_SIZE: u32 = 14;
const MIN_FONT_SIZE: u32 = 8;
const MAX_FONT_SIZE: u32 = 72;

/// Display preferences for the widget window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub background_color: String,
    pub opacity: f64,
    pub font_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            opacity: DEFAULT_OPACITY,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl Settings {
    /// A loaded document that fails this check is treated as malformed.
    pub fn is_valid(&self) -> bool {
        parse_hex_color(&self.background_color).is_some()
            && self.opacity.is_finite()
            && (0.0..=1.0).contains(&self.opacity)
            && self.font_size > 0
    }

    pub fn set_background_color(&mut self, color: &str) -> anyhow::Result<()> {
        let color = color.trim();
        if parse_hex_color(color).is_none() {
            bail!("background color must be a #rrggbb hex value, got '{color}'");
        }
        self.background_color = color.to_ascii_lowercase();
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            DEFAULT_OPACITY
        };
    }

    pub fn set_font_size(&mut self, font_size: u32) {
        self.font_size = font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
    }

    /// CSS-style `rgba(...)` for the window background.
    pub fn background_rgba(&self) -> String {
        let (r, g, b) = parse_hex_color(&self.background_color).unwrap_or((255, 255, 255));
        format!("rgba({r}, {g}, {b}, {})", self.opacity)
    }
}

fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
