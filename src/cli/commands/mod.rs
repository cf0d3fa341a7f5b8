//! Subcommand implementations

pub mod diagnostics;
pub mod managers;
pub mod pre_upgrade;
pub mod report;
pub mod scan;

use std::path::Path;

use crate::application::errors::ReportError;

/// Write rendered report output, creating parent directories as needed.
pub(crate) fn write_output(path: &Path, contents: &str) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
    }
    std::fs::write(path, contents).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })
}
