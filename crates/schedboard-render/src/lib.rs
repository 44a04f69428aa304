//! # schedboard-render
//!
//! Output backends for schedboard schedules.
//!
//! This crate provides:
//! - Round-trip export: edited data patched back into the original workbook
//!   with styles, formulas, images and unknown sheets preserved
//! - Blank schedule workbook generation (the positional template)
//! - Flat CSV and XLSX task tables
//! - JSON status summaries and markdown weekly reports
//!
//! ## Example
//!
//! ```rust,ignore
//! use schedboard_render::{output_filename, Renderer, TemplateGenerator, WorkbookWriter};
//!
//! // Round-trip an edited session back into the source workbook
//! let writer = WorkbookWriter::new(options);
//! let written = writer.write(&original_bytes, session.current(), today)?;
//! std::fs::write(output_filename("P-042", today, Some("schedule_v2.xlsx")), written.bytes)?;
//!
//! // Blank template for a new project
//! let bytes = TemplateGenerator::new().render(&ScheduleData::default())?;
//! ```

pub mod export;
pub mod report;
pub mod sheet_xml;
pub mod template;
pub mod writer;

pub use export::{output_filename, CsvExporter, SummaryExporter, XlsxExporter};
pub use report::WeeklyReportRenderer;
pub use template::TemplateGenerator;
pub use writer::{WorkbookWriter, WriteReport, WrittenWorkbook};

use schedboard_core::ScheduleData;
use schedboard_ingest::{IngestError, OoxmlError};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot re-read the original workbook: {0}")]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Package(#[from] OoxmlError),

    #[error("cannot write zip package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid XML in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("worksheet {0} has no sheetData element")]
    MalformedSheet(String),

    #[error("workbook has no worksheet named '{0}'")]
    MissingSheet(String),

    #[error("Excel generation failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV generation failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON generation failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub(crate) fn xml(part: &str, source: quick_xml::Error) -> Self {
        RenderError::Xml {
            part: part.to_string(),
            source,
        }
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// A backend that turns schedule data into one output document
pub trait Renderer {
    type Output;

    fn render(&self, data: &ScheduleData) -> Result<Self::Output, RenderError>;
}
