//! Manifest and lockfile scanners
//!
//! Scanners turn on-disk manifests into `Dependency` observations. They
//! never touch the network; everything network-facing happens in providers
//! after the working set is built.

pub mod cargo;
pub mod npm;
pub mod pypi;

use std::path::Path;

pub use cargo::CargoScanner;
pub use npm::NpmScanner;
pub use pypi::PypiScanner;

use crate::application::errors::ScanError;
use crate::domain::trust::{Dependency, Ecosystem};

/// One package manager's manifest scanner.
pub trait ManifestScanner: Send + Sync {
    /// Manager name used on the CLI (`--manager npm`).
    fn manager(&self) -> &'static str;

    fn ecosystem(&self) -> Ecosystem;

    /// Manifest filenames this scanner recognizes.
    fn manifests(&self) -> &'static [&'static str];

    /// Whether the project root contains any recognized manifest.
    fn matches(&self, root: &Path) -> bool {
        self.manifests().iter().any(|name| root.join(name).exists())
    }

    fn scan(&self, root: &Path) -> Result<Vec<Dependency>, ScanError>;
}

/// All built-in scanners, in manager-name order.
pub fn all_scanners() -> Vec<Box<dyn ManifestScanner>> {
    vec![
        Box::new(CargoScanner),
        Box::new(NpmScanner),
        Box::new(PypiScanner),
    ]
}

/// Resolve the scanners for a `--manager` selection; `None` selects all.
/// Unknown names are a user error reported before any scanning happens.
pub fn scanners_for(names: Option<&[String]>) -> Result<Vec<Box<dyn ManifestScanner>>, ScanError> {
    let all = all_scanners();
    let Some(names) = names else {
        return Ok(all);
    };

    let mut selected = Vec::new();
    let mut unknown = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for raw in names {
        let normalized = raw.to_ascii_lowercase();
        if !seen.insert(normalized.clone()) {
            continue;
        }
        match all_scanners()
            .into_iter()
            .find(|scanner| scanner.manager() == normalized)
        {
            Some(scanner) => selected.push(scanner),
            None => unknown.push(raw.clone()),
        }
    }
    if !unknown.is_empty() {
        return Err(ScanError::UnknownManagers(unknown.join(", ")));
    }
    Ok(selected)
}

pub(crate) fn read_manifest(path: &Path) -> Result<String, ScanError> {
    std::fs::read_to_string(path).map_err(|source| ScanError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_all_scanners_by_default() {
        let scanners = scanners_for(None).expect("scanners");
        let managers: Vec<_> = scanners.iter().map(|scanner| scanner.manager()).collect();
        assert_eq!(managers, vec!["cargo", "npm", "pypi"]);
    }

    #[test]
    fn unknown_managers_are_a_user_error() {
        let names = vec!["npm".to_string(), "bower".to_string()];
        let error = match scanners_for(Some(&names)) {
            Err(error) => error,
            Ok(_) => panic!("unknown manager"),
        };
        assert!(error.to_string().contains("bower"));
    }

    #[test]
    fn selection_is_case_insensitive_and_deduplicated() {
        let names = vec!["NPM".to_string(), "npm".to_string()];
        let scanners = scanners_for(Some(&names)).expect("scanners");
        assert_eq!(scanners.len(), 1);
    }
}
