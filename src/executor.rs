//! Spawns pipelines and single commands, and reaps their children.

use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execv, fork, pipe, ForkResult, Pid};

use crate::builtin;
use crate::env::Session;
use crate::external;
use crate::parser::{Pipeline, Stage};
use crate::redirect;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line
/// tools.
pub type ExitCode = i32;

/// Executes a parsed pipeline.
pub fn run(pipeline: &Pipeline, session: &mut Session) -> Result<ExitCode> {
    if pipeline.stages.len() == 1 {
        run_single(&pipeline.stages[0], session)
    } else {
        run_pipeline(&pipeline.stages, session)
    }
}

fn run_single(stage: &Stage, session: &mut Session) -> Result<ExitCode> {
    let Some(name) = stage.argv.first() else {
        eprintln!("missing command");
        return Ok(2);
    };
    if builtin::is_builtin(name) {
        run_builtin_in_process(stage, session)
    } else {
        run_external(stage, session)
    }
}

/// Runs a builtin in the shell process with its redirections applied.
///
/// The guard restores descriptors 1 and 2 unconditionally when it drops,
/// including when the handler itself errors out.
fn run_builtin_in_process(stage: &Stage, session: &mut Session) -> Result<ExitCode> {
    let _guard = match redirect::apply_scoped(&stage.effective_redirections()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{err}");
            return Ok(1);
        }
    };
    let handler = builtin::lookup(&stage.argv[0]).expect("dispatch checked the registry");
    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    handler(
        &stage.argv[1..],
        &mut stdout.lock(),
        &mut stderr.lock(),
        session,
    )
}

fn run_external(stage: &Stage, session: &mut Session) -> Result<ExitCode> {
    let _sigint = SigintGuard::install();
    match unsafe { fork() } {
        Ok(ForkResult::Child) => exec_external_child(stage, session),
        Ok(ForkResult::Parent { child }) => wait_for(child),
        Err(_) => bail!("Failed to fork"),
    }
}

fn run_pipeline(stages: &[Stage], session: &mut Session) -> Result<ExitCode> {
    let mut pipes: Vec<(OwnedFd, OwnedFd)> = Vec::with_capacity(stages.len() - 1);
    for _ in 0..stages.len() - 1 {
        match pipe() {
            Ok(pair) => pipes.push(pair),
            // Already-created pipes close when `pipes` drops.
            Err(_) => bail!("Failed to create pipe"),
        }
    }

    let _sigint = SigintGuard::install();
    let mut pids = Vec::with_capacity(stages.len());
    for (index, stage) in stages.iter().enumerate() {
        match unsafe { fork() } {
            Ok(ForkResult::Child) => run_stage_in_child(stage, index, stages.len(), &pipes, session),
            Ok(ForkResult::Parent { child }) => pids.push(child),
            Err(_) => {
                // Closing the pipes unblocks any children spawned so far.
                drop(pipes);
                for pid in pids {
                    let _ = waitpid(pid, None);
                }
                bail!("Failed to fork");
            }
        }
    }

    // Every pipe descriptor must be closed here before waiting, otherwise a
    // stage reading from its predecessor never sees end-of-file.
    drop(pipes);

    let mut status = 0;
    for pid in pids {
        status = wait_for(pid)?;
    }
    Ok(status)
}

/// Writes straight to a raw descriptor.
///
/// Forked children must not touch the process-global stdout/stderr handles:
/// another thread may have held their locks at fork time, which would
/// deadlock the child. Unbuffered writes also need no flush before `exit`.
struct FdWriter(RawFd);

impl Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let fd = unsafe { BorrowedFd::borrow_raw(self.0) };
        nix::unistd::write(fd, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn die_in_child(message: impl std::fmt::Display, status: ExitCode) -> ! {
    let _ = writeln!(FdWriter(2), "{message}");
    std::process::exit(status)
}

/// Child half of one pipeline stage. Never returns.
fn run_stage_in_child(
    stage: &Stage,
    index: usize,
    count: usize,
    pipes: &[(OwnedFd, OwnedFd)],
    session: &mut Session,
) -> ! {
    unsafe {
        let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
    }
    if index > 0 && dup2(pipes[index - 1].0.as_raw_fd(), 0).is_err() {
        std::process::exit(1);
    }
    if index < count - 1 && dup2(pipes[index].1.as_raw_fd(), 1).is_err() {
        std::process::exit(1);
    }
    for (read, write) in pipes {
        let _ = close(read.as_raw_fd());
        let _ = close(write.as_raw_fd());
    }

    // File redirections come after pipe wiring so they override the pipe.
    if let Err(err) = redirect::apply_in_child(&stage.effective_redirections()) {
        die_in_child(err, 1);
    }

    let Some(name) = stage.argv.first() else {
        die_in_child("missing command", 2);
    };
    if let Some(handler) = builtin::lookup_in_child(name) {
        let status = match handler(
            &stage.argv[1..],
            &mut FdWriter(1),
            &mut FdWriter(2),
            session,
        ) {
            Ok(code) => code,
            Err(_) => 1,
        };
        std::process::exit(status);
    }

    let path_env = session.env.get_var("PATH").unwrap_or_default();
    match external::resolve(name, &path_env) {
        Some(path) => exec_or_die(&path, &stage.argv),
        None => die_in_child(format_args!("{name}: command not found"), 1),
    }
}

/// Child half of a single external command. Never returns.
///
/// Resolution happens before redirection, so a "not found" diagnostic goes
/// to the shell's own stderr rather than a redirected one.
fn exec_external_child(stage: &Stage, session: &Session) -> ! {
    unsafe {
        let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
    }
    let name = &stage.argv[0];
    let path_env = session.env.get_var("PATH").unwrap_or_default();
    let Some(path) = external::resolve(name, &path_env) else {
        die_in_child(format_args!("{name}: command not found"), 1);
    };
    if let Err(err) = redirect::apply_in_child(&stage.effective_redirections()) {
        die_in_child(err, 1);
    }
    exec_or_die(&path, &stage.argv)
}

fn exec_or_die(path: &Path, argv: &[String]) -> ! {
    let prog = CString::new(path.as_os_str().as_bytes());
    let args: std::result::Result<Vec<CString>, _> = argv
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect();
    if let (Ok(prog), Ok(args)) = (prog, args) {
        let _ = execv(&prog, &args);
    }
    die_in_child(format_args!("Failed to execute {}", path.display()), 1)
}

fn wait_for(pid: Pid) -> Result<ExitCode> {
    match waitpid(pid, None).context("waitpid failed")? {
        WaitStatus::Exited(_, code) => Ok(code),
        WaitStatus::Signaled(_, sig, _) => Ok(128 + sig as ExitCode),
        _ => Ok(1),
    }
}

/// Ignores SIGINT in the shell while a foreground child runs.
///
/// Children reset the handler to the default before exec, so Ctrl-C still
/// reaches the foreground job while the shell survives it.
struct SigintGuard {
    previous: SigHandler,
}

impl SigintGuard {
    fn install() -> Option<Self> {
        let previous = unsafe { signal(Signal::SIGINT, SigHandler::SigIgn) }.ok()?;
        Some(Self { previous })
    }
}

impl Drop for SigintGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = signal(Signal::SIGINT, self.previous);
        }
    }
}
