//! Python requirements scanner

use std::path::Path;

use super::{read_manifest, ManifestScanner};
use crate::application::errors::ScanError;
use crate::domain::trust::{Dependency, Ecosystem};

/// Scans pinned `requirements.txt` files (`name==version` lines).
pub struct PypiScanner;

impl ManifestScanner for PypiScanner {
    fn manager(&self) -> &'static str {
        "pypi"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPI
    }

    fn manifests(&self) -> &'static [&'static str] {
        &["requirements.txt"]
    }

    fn scan(&self, root: &Path) -> Result<Vec<Dependency>, ScanError> {
        let path = root.join("requirements.txt");
        let raw = read_manifest(&path)?;

        let mut dependencies = Vec::new();
        for line in raw.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() || line.starts_with('-') {
                // Blank lines, comments, and pip options (-r, -e, --hash...).
                continue;
            }
            let Some((requirement, version)) = line.split_once("==") else {
                continue;
            };
            // Environment markers and extras don't change identity.
            let version = version.split(';').next().unwrap_or(version).trim();
            let name = requirement
                .split('[')
                .next()
                .unwrap_or(requirement)
                .trim();
            if name.is_empty() || version.is_empty() {
                continue;
            }
            dependencies.push(Dependency::new(
                Ecosystem::PyPI,
                name,
                version,
                path.clone(),
                true,
            ));
        }
        Ok(dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pinned_requirements() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("requirements.txt"),
            "# direct deps\nrequests==2.31.0\nurllib3[socks]==2.0.4  # transitively pinned\n\n-r dev.txt\nflask==3.0.0 ; python_version >= \"3.8\"\nunpinned>=1.0\n",
        )
        .expect("write");

        let deps = PypiScanner.scan(dir.path()).expect("scan");
        let names: Vec<_> = deps.iter().map(|d| (d.name.as_str(), d.version.as_str())).collect();
        assert_eq!(
            names,
            vec![
                ("requests", "2.31.0"),
                ("urllib3", "2.0.4"),
                ("flask", "3.0.0"),
            ]
        );
        assert!(deps.iter().all(|d| d.direct));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            PypiScanner.scan(dir.path()),
            Err(ScanError::Io { .. })
        ));
    }
}
