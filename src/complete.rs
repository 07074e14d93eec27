//! Command-name completion for the line editor.

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::builtin;
use crate::external;

/// Completion candidates for a command-name prefix.
///
/// Builtins come first, followed by executables found by scanning each
/// `PATH` directory, sorted and deduplicated. Unreadable directories are
/// skipped silently.
pub(crate) fn command_candidates(prefix: &str, path_env: &str) -> Vec<String> {
    let mut candidates: Vec<String> = builtin::names()
        .filter(|name| name.starts_with(prefix))
        .map(str::to_string)
        .collect();

    let mut externals = Vec::new();
    for dir in path_env.split(':').filter(|dir| !dir.is_empty()) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with(prefix) && external::is_executable(&entry.path()) {
                externals.push(name.to_string());
            }
        }
    }
    externals.sort();
    externals.dedup();

    candidates.extend(externals);
    candidates.dedup();
    candidates
}

/// rustyline helper that completes the first word of the line.
pub(crate) struct ShellHelper;

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let head = &line[..pos];
        if head.contains(' ') || head.contains('\t') {
            return Ok((pos, Vec::new()));
        }
        let path_env = std::env::var("PATH").unwrap_or_default();
        let pairs = command_candidates(head, &path_env)
            .into_iter()
            .map(|word| Pair {
                display: word.clone(),
                replacement: word,
            })
            .collect();
        Ok((0, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}
impl Validator for ShellHelper {}
impl Helper for ShellHelper {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn builtins_match_by_prefix() {
        let candidates = command_candidates("ec", "");
        assert_eq!(candidates, ["echo"]);
    }

    #[test]
    fn executables_from_path_are_included() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("echotool");
        File::create(&tool).unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let plain = dir.path().join("echodata");
        File::create(&plain).unwrap();
        fs::set_permissions(&plain, fs::Permissions::from_mode(0o644)).unwrap();

        let path_env = dir.path().display().to_string();
        let candidates = command_candidates("echo", &path_env);
        assert_eq!(candidates, ["echo", "echotool"]);
    }

    #[test]
    fn duplicate_names_collapse() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        for dir in [first.path(), second.path()] {
            let tool = dir.join("twice");
            File::create(&tool).unwrap();
            fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let path_env = format!("{}:{}", first.path().display(), second.path().display());
        let candidates = command_candidates("twice", &path_env);
        assert_eq!(candidates, ["twice"]);
    }

    #[test]
    fn no_matches_is_empty() {
        assert!(command_candidates("zzz-no-such", "").is_empty());
    }
}
