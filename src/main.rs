use std::process::ExitCode;

use rsh::Interpreter;

fn main() -> ExitCode {
    let mut shell = Interpreter::new();
    match shell.repl() {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("rsh: {err}");
            ExitCode::FAILURE
        }
    }
}
