//! Cargo lockfile scanner

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use super::{read_manifest, ManifestScanner};
use crate::application::errors::ScanError;
use crate::domain::trust::{Dependency, Ecosystem};

#[derive(Debug, Deserialize)]
struct CargoLock {
    #[serde(rename = "package", default)]
    packages: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
    /// Path and workspace members carry no source registry.
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CargoManifest {
    #[serde(default)]
    dependencies: Option<toml::value::Table>,
    #[serde(rename = "dev-dependencies", default)]
    dev_dependencies: Option<toml::value::Table>,
    #[serde(rename = "build-dependencies", default)]
    build_dependencies: Option<toml::value::Table>,
}

/// Scans `Cargo.lock`, using `Cargo.toml` to mark direct dependencies.
pub struct CargoScanner;

impl ManifestScanner for CargoScanner {
    fn manager(&self) -> &'static str {
        "cargo"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }

    fn manifests(&self) -> &'static [&'static str] {
        &["Cargo.lock"]
    }

    fn scan(&self, root: &Path) -> Result<Vec<Dependency>, ScanError> {
        let lock_path = root.join("Cargo.lock");
        let raw = read_manifest(&lock_path)?;
        let lock: CargoLock = toml::from_str(&raw).map_err(|e| ScanError::Parse {
            path: lock_path.display().to_string(),
            message: e.to_string(),
        })?;

        let direct = direct_dependency_names(root);

        let mut dependencies = Vec::new();
        for package in lock.packages {
            if package.source.is_none() {
                // The workspace's own members.
                continue;
            }
            let is_direct = direct.contains(&package.name);
            dependencies.push(Dependency::new(
                Ecosystem::Cargo,
                package.name,
                package.version,
                lock_path.clone(),
                is_direct,
            ));
        }
        Ok(dependencies)
    }
}

fn direct_dependency_names(root: &Path) -> BTreeSet<String> {
    let Ok(raw) = std::fs::read_to_string(root.join("Cargo.toml")) else {
        return BTreeSet::new();
    };
    let Ok(manifest) = toml::from_str::<CargoManifest>(&raw) else {
        return BTreeSet::new();
    };
    let mut names = BTreeSet::new();
    for table in [
        manifest.dependencies,
        manifest.dev_dependencies,
        manifest.build_dependencies,
    ]
    .into_iter()
    .flatten()
    {
        for (name, value) in table {
            // `foo = { package = "bar" }` renames; the lockfile knows "bar".
            let actual = value
                .get("package")
                .and_then(|pkg| pkg.as_str())
                .map(String::from)
                .unwrap_or(name);
            names.insert(actual);
        }
    }
    names
}
