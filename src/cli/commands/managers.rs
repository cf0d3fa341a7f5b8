//! `rtx list-managers`

use colored::Colorize;

use crate::infrastructure::scanners::all_scanners;

pub fn execute() -> i32 {
    for scanner in all_scanners() {
        println!(
            "{}: {}",
            scanner.manager().bold(),
            scanner.manifests().join(", ")
        );
    }
    0
}
