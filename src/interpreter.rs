//! The interactive read-eval loop.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

use crate::complete::ShellHelper;
use crate::env::Session;
use crate::executor::{self, ExitCode};
use crate::parser;

/// Parses, records, and executes one typed line.
///
/// Parsing happens before recording: a line that fails to parse is reported
/// and never enters the history buffer, so it cannot leak into `history`,
/// `history -w`/`-a`, or exit-time persistence. Only the line editor keeps
/// its own echo of it.
fn eval_line(line: &str, session: &mut Session) -> Result<ExitCode> {
    let pipeline = parser::parse_line(line)?;
    session.history.record(line);
    executor::run(&pipeline, session)
}

/// The interactive shell: session state plus the line-editor loop.
///
/// Reads lines at a `$ ` prompt, records non-blank ones in the history, and
/// hands each line to the executor. Errors from a command are reported and
/// the prompt comes straight back; only end-of-input or the `exit` builtin
/// ends the session.
pub struct Interpreter {
    session: Session,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            session: Session::new(),
        }
    }

    /// Runs the loop until end-of-input and returns the shell's exit code.
    pub fn repl(&mut self) -> Result<ExitCode> {
        let mut editor: Editor<ShellHelper, DefaultHistory> = Editor::new()?;
        editor.set_helper(Some(ShellHelper));
        for entry in self.session.history.entries() {
            let _ = editor.add_history_entry(entry);
        }

        let code = loop {
            match editor.readline("$ ") {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(line.as_str());
                    if let Err(err) = eval_line(&line, &mut self.session) {
                        eprintln!("{err}");
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break 0,
                Err(err) => {
                    eprintln!("{err}");
                    break 1;
                }
            }
        };

        if let Err(err) = self.session.persist_history() {
            eprintln!("failed to save history: {err}");
        }
        Ok(code)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
