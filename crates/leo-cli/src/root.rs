use std::path::{Path, PathBuf};

use leo_core::paths::LEO_DIR;

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `LEO_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from the cwd looking for `.leo/`
/// 3. Walk upward from the cwd looking for `.git/`
/// 4. Fall back to the cwd
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(explicit, &cwd)
}

fn resolve_from(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    find_upward(cwd, LEO_DIR)
        .or_else(|| find_upward(cwd, ".git"))
        .unwrap_or_else(|| cwd.to_path_buf())
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}
