//! Turns a raw line into a pipeline of stages with their redirections.

use std::fmt;

use crate::lexer::{self, LexError};

/// Which standard stream a redirection rewires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirStream {
    Stdout,
    Stderr,
}

impl RedirStream {
    /// The raw descriptor number the stream occupies.
    pub fn fd(self) -> i32 {
        match self {
            RedirStream::Stdout => 1,
            RedirStream::Stderr => 2,
        }
    }
}

/// Whether the target file is truncated or appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirMode {
    Truncate,
    Append,
}

/// One `fd > file` style redirection attached to a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub stream: RedirStream,
    pub target: String,
    pub mode: RedirMode,
}

/// One command of a pipeline: its argument vector and redirections.
///
/// `argv` may be empty when a stage consists only of redirections; that is
/// rejected at execution time rather than during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub argv: Vec<String>,
    pub redirs: Vec<Redirection>,
}

impl Stage {
    /// The redirections that actually take effect.
    ///
    /// When several redirections name the same stream, the textually last
    /// one wins and the earlier ones are skipped without being opened, so
    /// their targets are never touched.
    pub fn effective_redirections(&self) -> Vec<&Redirection> {
        let mut stdout = None;
        let mut stderr = None;
        for redir in &self.redirs {
            match redir.stream {
                RedirStream::Stdout => stdout = Some(redir),
                RedirStream::Stderr => stderr = Some(redir),
            }
        }
        [stdout, stderr].into_iter().flatten().collect()
    }
}

/// An ordered, non-empty sequence of stages connected by anonymous pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

/// Errors produced while parsing one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    Lex(LexError),
    /// A pipe at the start or end of the line, or two in a row.
    EmptyStage,
    /// A redirection operator with nothing after it.
    MissingRedirectTarget,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(e) => e.fmt(f),
            ParseError::EmptyStage => write!(f, "syntax error near unexpected token `|'"),
            ParseError::MissingRedirectTarget => {
                write!(f, "syntax error near unexpected token `newline'")
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::Lex(e)
    }
}

/// Recognizes a word as a redirection operator.
///
/// Operators are matched on the whole word only; `foo>bar` is an ordinary
/// argument.
fn redirect_operator(word: &str) -> Option<(RedirStream, RedirMode)> {
    match word {
        ">" | "1>" => Some((RedirStream::Stdout, RedirMode::Truncate)),
        ">>" | "1>>" => Some((RedirStream::Stdout, RedirMode::Append)),
        "2>" => Some((RedirStream::Stderr, RedirMode::Truncate)),
        "2>>" => Some((RedirStream::Stderr, RedirMode::Append)),
        _ => None,
    }
}

fn parse_stage(words: Vec<String>) -> Result<Stage, ParseError> {
    let mut argv = Vec::new();
    let mut redirs = Vec::new();

    let mut iter = words.into_iter();
    while let Some(word) = iter.next() {
        match redirect_operator(&word) {
            Some((stream, mode)) => match iter.next() {
                Some(target) => redirs.push(Redirection {
                    stream,
                    target,
                    mode,
                }),
                None => return Err(ParseError::MissingRedirectTarget),
            },
            None => argv.push(word),
        }
    }

    Ok(Stage { argv, redirs })
}

/// Parses one input line into a [`Pipeline`].
pub fn parse_line(line: &str) -> Result<Pipeline, ParseError> {
    let mut stages = Vec::new();
    for raw in lexer::split_stages(line)? {
        let words = lexer::tokenize(&raw)?;
        if words.is_empty() {
            return Err(ParseError::EmptyStage);
        }
        stages.push(parse_stage(words)?);
    }
    Ok(Pipeline { stages })
}
