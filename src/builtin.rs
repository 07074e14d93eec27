//! Built-in commands and their name-to-handler registry.

use std::io::Write;

use anyhow::Result;
use argh::{EarlyExit, FromArgs};

use crate::env::Session;
use crate::executor::ExitCode;
use crate::external;

/// Built-in commands known to the shell at compile time.
///
/// Builtins with an option surface are parsed using the [`argh`] crate
/// (`FromArgs`) and executed directly in-process; inside a pipeline they run
/// in the forked child instead.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "history".
    fn name() -> &'static str;

    /// Executes the command against the session.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for
    /// error. Diagnostics go to whichever stream the command's contract
    /// names; most go to `stderr`, but `type` reports misses on `stdout`.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode>;
}

pub(crate) type Handler =
    fn(&[String], &mut dyn Write, &mut dyn Write, &mut Session) -> Result<ExitCode>;

/// The registry: one entry per builtin, keyed by `argv[0]`.
const BUILTINS: &[(&str, Handler)] = &[
    ("cd", dispatch::<Cd>),
    ("echo", echo),
    ("exit", dispatch::<Exit>),
    ("history", dispatch::<History>),
    ("pwd", dispatch::<Pwd>),
    ("type", dispatch::<Type>),
];

pub(crate) fn lookup(name: &str) -> Option<Handler> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, handler)| *handler)
}

/// Builtins that make sense inside a forked pipeline stage.
///
/// `cd` and `exit` would only mutate the child, so inside a pipeline they
/// fall through to PATH resolution instead.
pub(crate) fn lookup_in_child(name: &str) -> Option<Handler> {
    match name {
        "echo" | "type" | "pwd" | "history" => lookup(name),
        _ => None,
    }
}

pub(crate) fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

pub(crate) fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(name, _)| *name)
}

fn dispatch<T: BuiltinCommand>(
    args: &[String],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    session: &mut Session,
) -> Result<ExitCode> {
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[T::name()], &arg_refs) {
        Ok(cmd) => cmd.execute(stdout, stderr, session),
        Err(EarlyExit { output, status }) => {
            if status.is_err() {
                writeln!(stderr, "{}", output.trim_end())?;
                Ok(2)
            } else {
                writeln!(stdout, "{}", output.trim_end())?;
                Ok(0)
            }
        }
    }
}

/// `echo` passes every argument through verbatim, so it skips argument
/// parsing entirely: the words are joined with single spaces and a newline.
fn echo(
    args: &[String],
    stdout: &mut dyn Write,
    _stderr: &mut dyn Write,
    _session: &mut Session,
) -> Result<ExitCode> {
    writeln!(stdout, "{}", args.join(" "))?;
    Ok(0)
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _session: &mut Session,
    ) -> Result<ExitCode> {
        match std::env::current_dir() {
            Ok(dir) => {
                writeln!(stdout, "{}", dir.display())?;
                Ok(0)
            }
            Err(_) => {
                writeln!(stderr, "pwd: error retrieving current directory")?;
                Ok(1)
            }
        }
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
struct Cd {
    /// directory to switch to; the literal `~` means $HOME
    #[argh(positional)]
    path: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        let Some(path) = self.path.filter(|p| !p.is_empty()) else {
            return Ok(0);
        };
        let target = if path == "~" {
            match session.env.get_var("HOME") {
                Some(home) => home,
                None => return Ok(0),
            }
        } else {
            path.clone()
        };
        if std::env::set_current_dir(&target).is_err() {
            writeln!(stderr, "cd: {path}: No such file or directory")?;
            return Ok(1);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Indicate how a command name would be resolved.
struct Type {
    /// the command name to look up
    #[argh(positional)]
    name: Option<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        let Some(name) = self.name else {
            writeln!(stdout, "type: missing argument")?;
            return Ok(0);
        };
        if is_builtin(&name) {
            writeln!(stdout, "{name} is a shell builtin")?;
            return Ok(0);
        }
        let path_env = session.env.get_var("PATH").unwrap_or_default();
        match external::resolve(&name, &path_env) {
            Some(path) => writeln!(stdout, "{name} is {}", path.display())?,
            None => writeln!(stdout, "{name}: not found")?,
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Terminate the shell, saving the command history first.
struct Exit {
    /// exit status to report; defaults to 0
    #[argh(positional)]
    code: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        let code = match &self.code {
            None => 0,
            Some(raw) => match raw.parse::<ExitCode>() {
                Ok(n) => n,
                Err(_) => {
                    writeln!(stderr, "exit: {raw}: numeric argument required")?;
                    2
                }
            },
        };
        if let Err(err) = session.persist_history() {
            writeln!(stderr, "exit: failed to save history: {err}")?;
        }
        stdout.flush()?;
        stderr.flush()?;
        std::process::exit(code)
    }
}

#[derive(FromArgs)]
/// Display the command history or persist it to a file.
struct History {
    /// read history entries from the file and add them to the list
    #[argh(option, short = 'r', arg_name = "file")]
    read: Option<String>,

    /// write the entire history list to the file
    #[argh(option, short = 'w', arg_name = "file")]
    write: Option<String>,

    /// append history entries not yet saved to the file
    #[argh(option, short = 'a', arg_name = "file")]
    append: Option<String>,

    /// print only that many trailing entries
    #[argh(positional)]
    count: Option<usize>,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        if let Some(file) = self.read {
            return match session.history.load(file.as_ref()) {
                Ok(_) => Ok(0),
                Err(err) => {
                    writeln!(stderr, "history: {file}: {err}")?;
                    Ok(1)
                }
            };
        }
        if let Some(file) = self.write {
            return match session.history.write_to(file.as_ref()) {
                Ok(()) => Ok(0),
                Err(err) => {
                    writeln!(stderr, "history: {file}: {err}")?;
                    Ok(1)
                }
            };
        }
        if let Some(file) = self.append {
            return match session.history.append_to(file.as_ref()) {
                Ok(()) => Ok(0),
                Err(err) => {
                    writeln!(stderr, "history: {file}: {err}")?;
                    Ok(1)
                }
            };
        }

        let entries = session.history.entries();
        let start = match self.count {
            Some(n) if n < entries.len() => entries.len() - n,
            _ => 0,
        };
        for (index, entry) in entries.iter().enumerate().skip(start) {
            writeln!(stdout, "    {}  {entry}", index + 1)?;
        }
        Ok(0)
    }
}
