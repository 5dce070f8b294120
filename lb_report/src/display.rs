//! Interactive display of written charts through an external viewer process.

use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::ReportError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewer {
    program: String,
    args: Vec<String>,
}

impl Viewer {
    /// Split a command line on whitespace; the first word is the program.
    pub fn from_command_line(command: &str) -> Self {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_default();
        Self {
            program,
            args: words.collect(),
        }
    }

    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::from_command_line("open -W")
        } else if cfg!(target_os = "windows") {
            // `start` takes its first quoted argument as a window title.
            Self {
                program: "cmd".to_string(),
                args: ["/C", "start", "/WAIT", ""].map(String::from).to_vec(),
            }
        } else {
            Self::from_command_line("xdg-open")
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Open `path` and wait for the viewer command to exit.
    ///
    /// Launchers such as `xdg-open` return once the file is handed off, so this only blocks
    /// for as long as the configured command does.
    pub fn show(&self, path: &Path) -> Result<(), ReportError> {
        if self.program.is_empty() {
            return Err(ReportError::Display("no viewer command configured".to_string()));
        }
        info!("Opening {} with {}", path.display(), self.program);
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .map_err(|err| {
                ReportError::Display(format!("failed to start {}: {}", self.program, err))
            })?;
        debug!("Viewer {} exited with {}", self.program, status);
        if status.success() {
            Ok(())
        } else {
            Err(ReportError::Display(format!(
                "{} exited with {} for {}",
                self.program,
                status,
                path.display()
            )))
        }
    }
}
