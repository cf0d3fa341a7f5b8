//! Local toolchain diagnostics
//!
//! Probes the package manager binaries the scanners correspond to, so a CI
//! job can tell "manager missing" apart from "manager broken" without
//! reading scan output.

use std::path::PathBuf;
use std::process::Command;

use serde::Serialize;

/// Probe result for one local tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    pub path: Option<String>,
    pub version: Option<String>,
    pub error: Option<String>,
}

impl ToolStatus {
    fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            path: None,
            version: None,
            error: None,
        }
    }
}

const TOOL_PROBES: &[(&str, &str)] = &[("cargo", "--version"), ("npm", "--version"), ("pip", "--version")];

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for directory in std::env::split_paths(&path_var) {
        let candidate = directory.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Probe a single tool by running its version flag.
pub fn probe_tool(name: &str, version_flag: &str) -> ToolStatus {
    let Some(path) = find_in_path(name) else {
        return ToolStatus::missing(name);
    };
    let display_path = path.display().to_string();
    match Command::new(&path).arg(version_flag).output() {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().map(|line| line.trim().to_string());
            ToolStatus {
                name: name.to_string(),
                available: true,
                path: Some(display_path),
                version,
                error: None,
            }
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            ToolStatus {
                name: name.to_string(),
                available: true,
                path: Some(display_path),
                version: None,
                error: Some(if stderr.is_empty() {
                    format!("exit code {:?}", output.status.code())
                } else {
                    stderr
                }),
            }
        }
        Err(error) => ToolStatus {
            name: name.to_string(),
            available: true,
            path: Some(display_path),
            version: None,
            error: Some(error.to_string()),
        },
    }
}

/// Probe every known manager binary.
pub fn collect_diagnostics() -> Vec<ToolStatus> {
    TOOL_PROBES
        .iter()
        .map(|(name, flag)| probe_tool(name, flag))
        .collect()
}
