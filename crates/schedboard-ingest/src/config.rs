//! Ingestion configuration
//!
//! Sheet names and marker strings vary between sites, so they are read from
//! an optional TOML file. Every field has a default; an empty file yields the
//! standard workbook layout.
//!
//! ```toml
//! software_sheet = "軟體時程"
//! unsupported_marker = "不支援"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Exact name of the software schedule sheet
    pub software_sheet: String,
    /// Substring identifying the system schedule sheet
    pub system_sheet: String,
    /// Substring identifying the engineering progress sheet
    pub engineering_sheet: String,
    /// Substring identifying the equipment list sheet
    pub eq_sheet: String,
    /// Exact name of the sheet holding layout images
    pub layout_sheet: String,
    /// Notes containing this text exclude the row from the task table
    pub unsupported_marker: String,
    /// Header text that locates the hierarchy column in the system sheet
    pub hierarchy_label: String,
    /// Hierarchy value or name text marking an area heading
    pub area_marker: String,
    /// Hierarchy values marking a main-item heading
    pub main_markers: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            software_sheet: "軟體時程".to_string(),
            system_sheet: "系統時程".to_string(),
            engineering_sheet: "工作進度確認".to_string(),
            eq_sheet: "EQ".to_string(),
            layout_sheet: "Layout".to_string(),
            unsupported_marker: "不支援".to_string(),
            hierarchy_label: "層級".to_string(),
            area_marker: "區域".to_string(),
            main_markers: vec!["主項目".to_string(), "主".to_string(), "main".to_string()],
        }
    }
}

impl IngestConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Whether notes carry the unsupported marker. A blank marker disables
    /// filtering.
    pub fn is_unsupported(&self, notes: &str) -> bool {
        !self.unsupported_marker.is_empty() && notes.contains(&self.unsupported_marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(IngestConfig::from_toml_str("").unwrap(), IngestConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = IngestConfig::from_toml_str(
            r#"
            software_sheet = "Software"
            unsupported_marker = "N/S"
            "#,
        )
        .unwrap();
        assert_eq!(config.software_sheet, "Software");
        assert_eq!(config.unsupported_marker, "N/S");
        assert_eq!(config.system_sheet, "系統時程");
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = IngestConfig::from_toml_str("software_sheet = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "layout_sheet = \"配置圖\"").unwrap();
        let config = IngestConfig::load(file.path()).unwrap();
        assert_eq!(config.layout_sheet, "配置圖");

        let missing = IngestConfig::load(Path::new("/nonexistent/schedboard.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn unsupported_marker_matching() {
        let config = IngestConfig::default();
        assert!(config.is_unsupported("此功能不支援"));
        assert!(!config.is_unsupported("ok"));

        let disabled = IngestConfig {
            unsupported_marker: String::new(),
            ..IngestConfig::default()
        };
        assert!(!disabled.is_unsupported("不支援"));
    }
}
