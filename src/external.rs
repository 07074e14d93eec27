//! Locating external executables on the search path.

use std::path::{Path, PathBuf};

use nix::unistd::{eaccess, AccessFlags};

/// Resolves a command name against a colon-separated search path.
///
/// A name containing `/` is taken as a path and returned unchanged without
/// any existence check; `execv` reports the failure if it does not exist.
/// Otherwise each non-empty directory of `path_env` is probed in order and
/// the first entry that is a regular file executable by the effective user
/// wins.
pub fn resolve(name: &str, path_env: &str) -> Option<PathBuf> {
    if name.contains('/') {
        return Some(PathBuf::from(name));
    }
    path_env
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| is_executable(candidate))
}

/// True when `path` is a regular file the effective uid/gid may execute.
pub(crate) fn is_executable(path: &Path) -> bool {
    path.metadata().map(|meta| meta.is_file()).unwrap_or(false)
        && eaccess(path, AccessFlags::X_OK).is_ok()
}
