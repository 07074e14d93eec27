//! Descriptor-level redirection with guaranteed restoration.

use std::fs::OpenOptions;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;

use anyhow::{bail, Result};
use nix::unistd::{close, dup, dup2};

use crate::parser::{RedirMode, RedirStream, Redirection};

fn open_target(redir: &Redirection) -> std::io::Result<std::fs::File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).mode(0o644);
    match redir.mode {
        RedirMode::Append => opts.append(true),
        RedirMode::Truncate => opts.truncate(true),
    };
    opts.open(&redir.target)
}

fn open_error(redir: &Redirection) -> String {
    match redir.stream {
        RedirStream::Stdout => format!("Failed to open file for redirection: {}", redir.target),
        RedirStream::Stderr => format!(
            "Failed to open file for stderr redirection: {}",
            redir.target
        ),
    }
}

/// Holds duplicates of the shell's own descriptors while they are rewired.
///
/// Dropping the guard flushes both standard streams and puts descriptors 1
/// and 2 back onto the kernel objects they pointed at before, on success and
/// error paths alike.
pub struct RedirectionGuard {
    saved: Vec<(i32, i32)>,
}

impl Drop for RedirectionGuard {
    fn drop(&mut self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        while let Some((fd, saved)) = self.saved.pop() {
            let _ = dup2(saved, fd);
            let _ = close(saved);
        }
    }
}

/// Applies redirections in the shell process, for a builtin stage.
///
/// Each target descriptor is duplicated to a save slot before being
/// replaced. If a later redirection fails to open, the partially built
/// guard is dropped and everything applied so far is reverted before the
/// error is returned.
pub fn apply_scoped(redirs: &[&Redirection]) -> Result<RedirectionGuard> {
    let mut guard = RedirectionGuard { saved: Vec::new() };
    for redir in redirs {
        let file = match open_target(redir) {
            Ok(file) => file,
            Err(_) => bail!("{}", open_error(redir)),
        };
        let fd = redir.stream.fd();
        guard.saved.push((fd, dup(fd)?));
        dup2(file.as_raw_fd(), fd)?;
        // `file` drops here, closing the temporary descriptor.
    }
    Ok(guard)
}

/// Applies redirections in a forked child, where nothing is restored.
///
/// Returns the diagnostic to print when an open or dup fails; the caller
/// exits the child.
pub fn apply_in_child(redirs: &[&Redirection]) -> std::result::Result<(), String> {
    for redir in redirs {
        let file = open_target(redir).map_err(|_| open_error(redir))?;
        dup2(file.as_raw_fd(), redir.stream.fd()).map_err(|e| e.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::lock_process_state;
    use nix::sys::stat::fstat;
    use std::os::fd::BorrowedFd;

    fn redir(target: &str, stream: RedirStream, mode: RedirMode) -> Redirection {
        Redirection {
            stream,
            target: target.to_string(),
            mode,
        }
    }

    fn identity(fd: i32) -> (u64, u64) {
        let stat = fstat(fd).unwrap();
        (stat.st_dev as u64, stat.st_ino as u64)
    }

    fn write_raw(fd: i32, bytes: &[u8]) {
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        nix::unistd::write(borrowed, bytes).unwrap();
    }

    #[test]
    fn guard_restores_descriptors() {
        let _lock = lock_process_state();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out").display().to_string();

        let before_out = identity(1);
        let before_err = identity(2);

        let out = redir(&target, RedirStream::Stdout, RedirMode::Truncate);
        let err = redir(&target, RedirStream::Stderr, RedirMode::Append);
        let guard = apply_scoped(&[&out, &err]).unwrap();
        assert_ne!(identity(1), before_out);
        assert_ne!(identity(2), before_err);
        drop(guard);

        assert_eq!(identity(1), before_out);
        assert_eq!(identity(2), before_err);
    }

    #[test]
    fn truncate_and_append_semantics() {
        let _lock = lock_process_state();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out").display().to_string();

        let truncate = redir(&target, RedirStream::Stdout, RedirMode::Truncate);
        let guard = apply_scoped(&[&truncate]).unwrap();
        write_raw(1, b"hi\n");
        drop(guard);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hi\n");

        let append = redir(&target, RedirStream::Stdout, RedirMode::Append);
        let guard = apply_scoped(&[&append]).unwrap();
        write_raw(1, b"hi\n");
        drop(guard);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hi\nhi\n");

        let guard = apply_scoped(&[&truncate]).unwrap();
        write_raw(1, b"hi\n");
        drop(guard);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hi\n");
    }

    #[test]
    fn stderr_failure_reverts_stdout() {
        let _lock = lock_process_state();
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("out").display().to_string();
        let bad = dir.path().join("missing/err").display().to_string();

        let before_out = identity(1);
        let out = redir(&good, RedirStream::Stdout, RedirMode::Truncate);
        let err = redir(&bad, RedirStream::Stderr, RedirMode::Truncate);

        let result = apply_scoped(&[&out, &err]);
        let message = result.err().unwrap().to_string();
        assert_eq!(
            message,
            format!("Failed to open file for stderr redirection: {bad}")
        );
        assert_eq!(identity(1), before_out);
    }

    #[test]
    fn child_apply_reports_open_failures() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("missing/out").display().to_string();
        let out = redir(&bad, RedirStream::Stdout, RedirMode::Truncate);
        let err = apply_in_child(&[&out]).unwrap_err();
        assert_eq!(err, format!("Failed to open file for redirection: {bad}"));
    }
}
