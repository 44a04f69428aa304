//! Hierarchy classification
//!
//! Source workbooks encode nesting inconsistently: sometimes with a marker
//! column, sometimes by filling main-item rows green, sometimes by indenting
//! the name, and sometimes not at all. [`classify`] combines these weak
//! signals with a fixed precedence and always yields a level.
//!
//! | Order | Signal | Result |
//! |-------|--------|--------|
//! | 1 | Marker text in the known vocabulary | vocabulary level |
//! | 2 | Marker is a small positive integer `n` | `n - 1` |
//! | 3 | Qualifying green fill | 0 |
//! | 4 | Leading whitespace on the name | 1 |
//! | 5 | No owner and no plan dates | 0, else 1 |

use crate::fields::{is_plain_numeral, CellValue};
use crate::Level;

/// Largest integer marker accepted as an explicit depth
pub const MAX_NUMERIC_MARKER: i64 = 9;

/// A main-item green channel must exceed this value
pub const GREEN_BRIGHTNESS_FLOOR: u8 = 0x80;

const MAIN_MARKERS: &[&str] = &["主", "主項", "主項目", "大項", "main", "m", "l1", "level1", "level 1"];
const SUB_MARKERS: &[&str] = &["子", "子項", "子項目", "中項", "sub", "s", "l2", "level2", "level 2"];
const SUB_SUB_MARKERS: &[&str] = &[
    "孫", "孫項", "孫項目", "細項", "小項", "sub-sub", "subsub", "sub sub", "ss", "l3", "level3", "level 3",
];

// ============================================================================
// Colour
// ============================================================================

/// Solid fill colour of a cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB` or `AARRGGBB` hex, optionally prefixed with `#`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let rgb = match hex.len() {
            6 => hex,
            8 => &hex[2..],
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(rgb.get(i..i + 2)?, 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Green strictly dominates and is above the brightness floor
    pub fn is_main_green(self) -> bool {
        self.g > self.r && self.g > self.b && self.g > GREEN_BRIGHTNESS_FLOOR
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Everything the classifier looks at for one row
#[derive(Clone, Debug, Default)]
pub struct RowSignals<'a> {
    /// Marker column value
    pub marker: Option<&'a CellValue>,
    /// Name cell before trimming
    pub raw_name: &'a str,
    /// Fill colour of the name cell
    pub fill: Option<Rgb>,
    pub owner: &'a str,
    pub has_plan_dates: bool,
}

/// Look the marker text up in the level vocabulary
pub fn marker_vocabulary_level(marker: &str) -> Option<Level> {
    let lowered = marker.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    if MAIN_MARKERS.contains(&lowered.as_str()) {
        Some(Level::MAIN)
    } else if SUB_MARKERS.contains(&lowered.as_str()) {
        Some(Level::SUB)
    } else if SUB_SUB_MARKERS.contains(&lowered.as_str()) {
        Some(Level::SUB_SUB)
    } else {
        None
    }
}

/// Read a marker as a small positive integer
pub fn numeric_marker(marker: &CellValue) -> Option<i64> {
    let value = match marker {
        CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 => *n as i64,
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if !is_plain_numeral(trimmed) || trimmed.contains('.') {
                return None;
            }
            trimmed.parse::<i64>().ok()?
        }
        _ => return None,
    };
    (1..=MAX_NUMERIC_MARKER).contains(&value).then_some(value)
}

/// Explicit level from the marker column, if the marker is recognized
pub fn marker_level(marker: &CellValue) -> Option<Level> {
    if let CellValue::Text(text) = marker {
        if let Some(level) = marker_vocabulary_level(text) {
            return Some(level);
        }
    }
    numeric_marker(marker).map(|n| Level((n - 1) as u8))
}

/// Name starts with ASCII or full-width whitespace
pub fn has_leading_indent(raw_name: &str) -> bool {
    raw_name.chars().next().is_some_and(char::is_whitespace)
}

/// Classify a row's nesting level
pub fn classify(signals: &RowSignals<'_>) -> Level {
    if let Some(level) = signals.marker.and_then(marker_level) {
        return level;
    }
    if signals.fill.is_some_and(Rgb::is_main_green) {
        return Level::MAIN;
    }
    if has_leading_indent(signals.raw_name) {
        return Level::SUB;
    }
    if signals.owner.trim().is_empty() && !signals.has_plan_dates {
        Level::MAIN
    } else {
        Level::SUB
    }
}
