//! # schedboard-ingest
//!
//! Reads an installation-schedule workbook into the normalized
//! [`ScheduleData`] model.
//!
//! Sheets are resolved by name:
//!
//! | Sheet | Match | Required |
//! |-------|-------|----------|
//! | software schedule | exact name | yes |
//! | system schedule | name contains | yes |
//! | engineering progress | name contains | no |
//! | equipment list | name contains | no |
//! | layout | exact name | no |
//!
//! Malformed cells never fail ingestion; they resolve to typed defaults in
//! `schedboard_core::fields`. A workbook that cannot be opened, or that lacks
//! a required sheet, fails as a whole and exposes no partial model.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use schedboard_ingest::{ingest_file, IngestOptions};
//!
//! let options = IngestOptions::new(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap());
//! let ingested = ingest_file("schedule.xlsx".as_ref(), &options)?;
//! println!("{} tasks", ingested.data.tasks.len());
//! # Ok::<(), schedboard_ingest::IngestError>(())
//! ```

pub mod config;
pub mod grid;
pub mod ooxml;
pub mod schema;
pub mod software;
pub mod system;

use std::io::Cursor;
use std::path::{Path, PathBuf};

use calamine::{Reader, Xlsx, XlsxError};
use chrono::NaiveDate;
use schedboard_core::fields::PercentScale;
use schedboard_core::ScheduleData;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use config::{ConfigError, IngestConfig};
pub use grid::Grid;
pub use ooxml::{LayoutImage, OoxmlError, Package};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot open workbook: {0}")]
    Open(#[from] XlsxError),

    #[error("required sheet '{0}' not found")]
    MissingSheet(String),

    #[error("cannot read sheet '{sheet}': {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: XlsxError,
    },

    #[error(transparent)]
    Package(#[from] OoxmlError),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ============================================================================
// Options and Output
// ============================================================================

#[derive(Clone, Debug)]
pub struct IngestOptions {
    pub config: IngestConfig,
    /// Reference date for status inference
    pub today: NaiveDate,
}

impl IngestOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            config: IngestConfig::default(),
            today,
        }
    }

    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }
}

/// An optional sheet kept as raw cells
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTable {
    /// Resolved sheet name; `None` when the sheet is absent
    pub sheet: Option<String>,
    pub grid: Grid,
}

impl RawTable {
    pub fn is_present(&self) -> bool {
        self.sheet.is_some()
    }
}

/// Facts about the ingestion that are not part of the model
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    pub software_sheet: String,
    pub system_sheet: String,
    /// Task rows dropped for carrying the unsupported marker
    pub unsupported_skipped: usize,
    pub header_rows_skipped: usize,
    pub progress_scale: PercentScale,
    pub target_scale: PercentScale,
    pub completion_scale: PercentScale,
    pub hierarchy_col: u32,
    /// Optional sheets that were not found
    pub missing_optional: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Ingested {
    pub data: ScheduleData,
    pub engineering: RawTable,
    pub eq_list: RawTable,
    pub layout_images: Vec<LayoutImage>,
    pub sheet_names: Vec<String>,
    pub diagnostics: Diagnostics,
    pub raw_software: Grid,
    pub raw_system: Grid,
}

// ============================================================================
// Ingestion
// ============================================================================

fn find_exact<'a>(names: &'a [String], wanted: &str) -> Option<&'a String> {
    names.iter().find(|n| n.as_str() == wanted)
}

fn find_containing<'a>(names: &'a [String], fragment: &str) -> Option<&'a String> {
    if fragment.is_empty() {
        return None;
    }
    names.iter().find(|n| n.contains(fragment))
}

fn read_grid<R>(workbook: &mut Xlsx<R>, sheet: &str) -> Result<Grid, IngestError>
where
    R: std::io::Read + std::io::Seek,
{
    let range = workbook.worksheet_range(sheet).map_err(|source| IngestError::Sheet {
        sheet: sheet.to_string(),
        source,
    })?;
    Ok(Grid::from_range(&range))
}

fn read_optional<R>(
    workbook: &mut Xlsx<R>,
    sheet: Option<&String>,
    label: &str,
    missing: &mut Vec<String>,
) -> Result<RawTable, IngestError>
where
    R: std::io::Read + std::io::Seek,
{
    match sheet {
        Some(name) => Ok(RawTable {
            sheet: Some(name.clone()),
            grid: read_grid(workbook, name)?,
        }),
        None => {
            debug!(sheet = label, "optional sheet not found");
            missing.push(label.to_string());
            Ok(RawTable::default())
        }
    }
}

/// Ingest a workbook held in memory
pub fn ingest_bytes(bytes: &[u8], options: &IngestOptions) -> Result<Ingested, IngestError> {
    let config = &options.config;
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    let sheet_names = workbook.sheet_names();

    let software_sheet = find_exact(&sheet_names, &config.software_sheet)
        .ok_or_else(|| IngestError::MissingSheet(config.software_sheet.clone()))?
        .clone();
    let system_sheet = find_containing(&sheet_names, &config.system_sheet)
        .ok_or_else(|| IngestError::MissingSheet(config.system_sheet.clone()))?
        .clone();
    debug!(software = %software_sheet, system = %system_sheet, "resolved required sheets");

    let raw_software = read_grid(&mut workbook, &software_sheet)?;
    let raw_system = read_grid(&mut workbook, &system_sheet)?;

    let mut missing_optional = Vec::new();
    let engineering = read_optional(
        &mut workbook,
        find_containing(&sheet_names, &config.engineering_sheet),
        &config.engineering_sheet,
        &mut missing_optional,
    )?;
    let eq_list = read_optional(
        &mut workbook,
        find_containing(&sheet_names, &config.eq_sheet),
        &config.eq_sheet,
        &mut missing_optional,
    )?;

    let mut package = Package::open(bytes)?;
    let sheets = package.sheets()?;
    let part_of = |name: &str| sheets.iter().find(|s| s.name == name).map(|s| s.path.clone());

    let fills = match part_of(software_sheet.as_str()) {
        Some(part) => package.fill_map(&part).unwrap_or_else(|err| {
            warn!(error = %err, "cannot read cell fills; hierarchy falls back to other signals");
            Default::default()
        }),
        None => Default::default(),
    };

    let layout_images = match find_exact(&sheet_names, &config.layout_sheet).and_then(|name| part_of(name.as_str())) {
        Some(part) => package.images(&part).unwrap_or_else(|err| {
            warn!(error = %err, "cannot read layout images");
            Vec::new()
        }),
        None => {
            missing_optional.push(config.layout_sheet.clone());
            Vec::new()
        }
    };

    let software = software::parse_software(&raw_software, &fills, config, options.today);
    let system = system::parse_system(&raw_system, config);

    info!(
        tasks = software.tasks.len(),
        milestones = system.milestones.len(),
        unsupported = software.unsupported_skipped,
        images = layout_images.len(),
        "workbook ingested"
    );

    Ok(Ingested {
        data: ScheduleData {
            project: software.project,
            tasks: software.tasks,
            milestones: system.milestones,
        },
        engineering,
        eq_list,
        layout_images,
        sheet_names,
        diagnostics: Diagnostics {
            software_sheet,
            system_sheet,
            unsupported_skipped: software.unsupported_skipped,
            header_rows_skipped: software.header_rows_skipped,
            progress_scale: software.progress_scale,
            target_scale: software.target_scale,
            completion_scale: system.completion_scale,
            hierarchy_col: system.hierarchy_col,
            missing_optional,
        },
        raw_software,
        raw_system,
    })
}

/// Read a workbook from disk and ingest it
pub fn ingest_file(path: &Path, options: &IngestOptions) -> Result<Ingested, IngestError> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ingest_bytes(&bytes, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_matching() {
        let names = vec!["軟體時程".to_string(), "系統時程_C".to_string(), "EQ 工作清單".to_string()];
        assert_eq!(find_exact(&names, "軟體時程"), Some(&names[0]));
        assert_eq!(find_exact(&names, "軟體"), None);
        assert_eq!(find_containing(&names, "系統時程"), Some(&names[1]));
        assert_eq!(find_containing(&names, "EQ"), Some(&names[2]));
        assert_eq!(find_containing(&names, ""), None);
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        let options = IngestOptions::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        let err = ingest_bytes(b"not a workbook", &options).unwrap_err();
        assert!(matches!(err, IngestError::Open(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let options = IngestOptions::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        let err = ingest_file(Path::new("/nonexistent/schedule.xlsx"), &options).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
