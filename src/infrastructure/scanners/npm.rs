//! npm lockfile scanner

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;

use super::{read_manifest, ManifestScanner};
use crate::application::errors::ScanError;
use crate::domain::trust::{Dependency, Ecosystem};

#[derive(Debug, Deserialize)]
struct PackageLock {
    #[serde(default)]
    packages: HashMap<String, LockEntry>,
}

#[derive(Debug, Deserialize, Default)]
struct LockEntry {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    dependencies: Option<HashMap<String, serde_json::Value>>,
    #[serde(rename = "devDependencies", default)]
    dev_dependencies: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    link: bool,
}

/// Scans `package-lock.json` (lockfile v2/v3 `packages` map).
pub struct NpmScanner;

impl ManifestScanner for NpmScanner {
    fn manager(&self) -> &'static str {
        "npm"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    fn manifests(&self) -> &'static [&'static str] {
        &["package-lock.json"]
    }

    fn scan(&self, root: &Path) -> Result<Vec<Dependency>, ScanError> {
        let path = root.join("package-lock.json");
        let raw = read_manifest(&path)?;
        let lock: PackageLock = serde_json::from_str(&raw).map_err(|e| ScanError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        // The root entry ("") declares which installed packages are direct.
        let mut direct: BTreeSet<String> = BTreeSet::new();
        if let Some(root_entry) = lock.packages.get("") {
            for section in [&root_entry.dependencies, &root_entry.dev_dependencies] {
                if let Some(section) = section {
                    direct.extend(section.keys().cloned());
                }
            }
        }

        let mut dependencies = Vec::new();
        for (install_path, entry) in &lock.packages {
            if install_path.is_empty() || entry.link {
                continue;
            }
            let Some(name) = install_path.rsplit("node_modules/").next() else {
                continue;
            };
            let Some(version) = entry.version.as_deref() else {
                continue;
            };
            // Only top-level installs can be direct; nested copies are
            // transitive by construction.
            let top_level = *install_path == format!("node_modules/{name}");
            dependencies.push(Dependency::new(
                Ecosystem::Npm,
                name,
                version,
                path.clone(),
                top_level && direct.contains(name),
            ));
        }
        Ok(dependencies)
    }
}
