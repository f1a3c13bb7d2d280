//! Project root discovery

use crate::project::ProjectType;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const CONFIG_FILE: &str = "maverick.yml";

/// Ancestors inspected before giving up
pub const MAX_TRAVERSALS: usize = 50;

const LERNA_MARKER: &str = "lerna.json";

/// Closest directory at or above `start` containing `file`
pub fn find_upwards(start: &Path, file: &str, max_depth: usize) -> Option<PathBuf> {
    start
        .ancestors()
        .take(max_depth)
        .find(|dir| dir.join(file).is_file())
        .map(Path::to_path_buf)
}

/// Directory holding `maverick.yml`
pub fn find_root(start: &Path) -> Option<PathBuf> {
    find_upwards(start, CONFIG_FILE, MAX_TRAVERSALS)
}

/// Monorepo tooling of the project at `root`. Nx is never detected.
pub fn detect_project_type(root: &Path) -> ProjectType {
    if find_upwards(root, LERNA_MARKER, MAX_TRAVERSALS).is_some() {
        ProjectType::Lerna
    } else {
        ProjectType::Unknown
    }
}
