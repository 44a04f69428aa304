//! System schedule sheet: area / main item / sub item milestones
//!
//! Row order carries the nesting. Each row is classified on its own, then a
//! fold over the rows threads the nearest preceding area and main-item
//! headings into every milestone.

use schedboard_core::fields::{normalize_percent_column, parse_date, parse_number, parse_text, CellValue, PercentScale};
use schedboard_core::{ItemType, Milestone};
use tracing::debug;

use crate::config::IngestConfig;
use crate::grid::Grid;
use crate::schema::system::*;

#[derive(Clone, Debug, PartialEq)]
pub struct SystemSheet {
    pub milestones: Vec<Milestone>,
    /// Column the hierarchy markers were read from
    pub hierarchy_col: u32,
    pub completion_scale: PercentScale,
}

/// Headings carried from one row to the next
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FoldState {
    pub current_area: String,
    pub current_main: String,
}

impl FoldState {
    /// Advance past one row and return its `(area, main_item)`
    pub fn step(&mut self, name: &str, item_type: ItemType) -> (String, String) {
        match item_type {
            ItemType::Area => {
                self.current_area = name.to_string();
                self.current_main.clear();
                (self.current_area.clone(), String::new())
            }
            ItemType::Main => {
                self.current_main = name.to_string();
                (self.current_area.clone(), self.current_main.clone())
            }
            ItemType::Sub => (self.current_area.clone(), self.current_main.clone()),
        }
    }
}

/// Classify one row from its name and hierarchy-column value
pub fn classify_item(name: &str, hierarchy: &str, config: &IngestConfig) -> ItemType {
    let hierarchy = hierarchy.trim();
    let area_marker = config.area_marker.as_str();
    let is_area = !area_marker.is_empty() && (hierarchy.contains(area_marker) || name.contains(area_marker));
    if is_area || hierarchy.eq_ignore_ascii_case("area") {
        return ItemType::Area;
    }
    let lowered = hierarchy.to_lowercase();
    if !lowered.is_empty()
        && config
            .main_markers
            .iter()
            .any(|m| !m.is_empty() && lowered.contains(&m.to_lowercase()))
    {
        return ItemType::Main;
    }
    ItemType::Sub
}

/// First header cell containing the hierarchy label, else the fallback column
pub fn detect_hierarchy_col(grid: &Grid, config: &IngestConfig) -> u32 {
    if config.hierarchy_label.is_empty() {
        return FALLBACK_HIERARCHY_COL;
    }
    grid.row(HEADER_ROW)
        .iter()
        .position(|cell| matches!(cell, CellValue::Text(t) if t.contains(&config.hierarchy_label)))
        .map_or(FALLBACK_HIERARCHY_COL, |col| col as u32)
}

fn is_header_row(grid: &Grid, row: u32) -> bool {
    match grid.cell(row, COL_COMPLETION) {
        CellValue::Text(text) => HEADER_PHRASES.iter().any(|p| text.contains(p)),
        _ => false,
    }
}

pub fn parse_system(grid: &Grid, config: &IngestConfig) -> SystemSheet {
    let hierarchy_col = detect_hierarchy_col(grid, config);
    debug!(hierarchy_col, "system sheet hierarchy column");

    let mut state = FoldState::default();
    let mut milestones = Vec::new();
    for row in FIRST_ITEM_ROW..grid.height() {
        let name = parse_text(grid.cell(row, COL_NAME));
        if name.is_empty() || is_header_row(grid, row) {
            continue;
        }
        let hierarchy = parse_text(grid.cell(row, hierarchy_col));
        let item_type = classify_item(&name, &hierarchy, config);
        let (area, main_item) = state.step(&name, item_type);
        milestones.push(Milestone {
            source_row: Some(row),
            area,
            main_item,
            name,
            item_type,
            completion_pct: parse_number(grid.cell(row, COL_COMPLETION), 0.0),
            target_date: parse_date(grid.cell(row, COL_TARGET_DATE)),
            notes: parse_text(grid.cell(row, COL_NOTES)),
        });
    }

    let mut values: Vec<f64> = milestones.iter().map(|m| m.completion_pct).collect();
    let completion_scale = normalize_percent_column(&mut values);
    for (milestone, value) in milestones.iter_mut().zip(values) {
        milestone.completion_pct = value;
    }

    SystemSheet {
        milestones,
        hierarchy_col,
        completion_scale,
    }
}
