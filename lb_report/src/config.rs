use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chart::{ChartFormat, ChartOptions};
use crate::display::Viewer;
use crate::ReportError;

pub const DEFAULT_INPUT: &str = "simulation_results.csv";
pub const DEFAULT_CONFIG_FILE: &str = "lb_report.toml";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Write charts without opening a viewer.
    pub headless: bool,
    pub format: ChartFormat,
    pub width: u32,
    pub height: u32,
    /// Reject time-series rows that appear after the summary block.
    pub strict_order: bool,
    /// Viewer command line; the chart path is appended as the last argument.
    pub viewer: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let chart = ChartOptions::default();
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output_dir: PathBuf::from("."),
            headless: false,
            format: chart.format,
            width: chart.width,
            height: chart.height,
            strict_order: false,
            viewer: None,
        }
    }
}

impl ReportConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ReportError> {
        let text = fs::read_to_string(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ReportConfig = toml::from_str(&text).map_err(|err| ReportError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// An explicit path must exist; otherwise `lb_report.toml` in the working directory is
    /// used when present, and defaults when not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ReportError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        let implicit = Path::new(DEFAULT_CONFIG_FILE);
        if implicit.is_file() {
            debug!("Using config file {}", implicit.display());
            return Self::load_from_file(implicit);
        }
        Ok(Self::default())
    }

    pub fn chart_options(&self) -> ChartOptions {
        ChartOptions {
            format: self.format,
            width: self.width,
            height: self.height,
        }
    }

    pub fn viewer(&self) -> Viewer {
        match self.viewer.as_deref() {
            Some(command) => Viewer::from_command_line(command),
            None => Viewer::platform_default(),
        }
    }

    /// Check chart size and viewer; `origin` names where the settings came from.
    pub fn validate(&self, origin: &Path) -> Result<(), ReportError> {
        if self.width == 0 || self.height == 0 {
            return Err(ReportError::Config {
                path: origin.to_path_buf(),
                message: format!("chart size must be non-zero, got {}x{}", self.width, self.height),
            });
        }
        if matches!(self.viewer.as_deref(), Some(cmd) if cmd.trim().is_empty()) {
            return Err(ReportError::Config {
                path: origin.to_path_buf(),
                message: "viewer command is empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "headless = true\nformat = \"svg\"\n");
        let config = ReportConfig::load_from_file(&path).unwrap();

        assert!(config.headless);
        assert_eq!(config.format, ChartFormat::Svg);
        assert_eq!(config.input, PathBuf::from(DEFAULT_INPUT));
        assert_eq!((config.width, config.height), (1000, 500));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "headles = true\n");
        let err = ReportConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ReportError::Config { .. }));
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "width = 0\n");
        assert!(matches!(
            ReportConfig::load_from_file(&path),
            Err(ReportError::Config { .. })
        ));
    }

    #[test]
    fn test_validate_merged_settings() {
        let origin = Path::new("command line");
        assert!(ReportConfig::default().validate(origin).is_ok());

        let zero_width = ReportConfig {
            width: 0,
            ..ReportConfig::default()
        };
        match zero_width.validate(origin).unwrap_err() {
            ReportError::Config { path, message } => {
                assert_eq!(path, PathBuf::from("command line"));
                assert!(message.contains("0x500"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let blank_viewer = ReportConfig {
            viewer: Some("  ".to_string()),
            ..ReportConfig::default()
        };
        assert!(matches!(
            blank_viewer.validate(origin),
            Err(ReportError::Config { .. })
        ));
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ReportConfig::load(Some(&missing)),
            Err(ReportError::Io { .. })
        ));
    }

    #[test]
    fn test_chart_options_follow_config() {
        let config = ReportConfig {
            format: ChartFormat::Svg,
            width: 640,
            height: 480,
            ..ReportConfig::default()
        };
        assert_eq!(
            config.chart_options(),
            ChartOptions {
                format: ChartFormat::Svg,
                width: 640,
                height: 480,
            }
        );
    }
}
