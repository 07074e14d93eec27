//! Lexical analysis for command lines.
//!
//! Two passes share the same three-state quote machine: [`split_stages`] cuts
//! a raw line at unquoted `|` characters, and [`tokenize`] turns one stage
//! into argument words with quoting and escape rules resolved. Lexing never
//! consults the environment; the output is determined solely by the input.

use std::fmt;

/// Errors produced while scanning a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    /// A closing quote (single or double) was not found before end of line.
    UnclosedQuote(char),
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnclosedQuote(q) => write!(f, "unclosed quote: {q}"),
        }
    }
}

impl std::error::Error for LexError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InSingleQuote,
    InDoubleQuote,
}

/// Splits a raw line into pipeline stage substrings at unquoted `|`.
///
/// Quotes and escapes are left in place for [`tokenize`] to resolve per
/// stage; a `|` inside quotes or escaped with a backslash never separates
/// stages. Empty stages (leading, trailing, or doubled `|`) are preserved so
/// the parser can reject them.
pub fn split_stages(line: &str) -> Result<Vec<String>, LexError> {
    let mut stages = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;

    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        match state {
            State::Normal => match ch {
                '|' => stages.push(std::mem::take(&mut current)),
                '\'' => {
                    state = State::InSingleQuote;
                    current.push(ch);
                }
                '"' => {
                    state = State::InDoubleQuote;
                    current.push(ch);
                }
                '\\' => {
                    current.push(ch);
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                c => current.push(c),
            },
            State::InSingleQuote => {
                if ch == '\'' {
                    state = State::Normal;
                }
                current.push(ch);
            }
            State::InDoubleQuote => match ch {
                '"' => {
                    state = State::Normal;
                    current.push(ch);
                }
                '\\' => {
                    // Consume the escaped character so an escaped quote
                    // cannot be mistaken for the closing one.
                    current.push(ch);
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                c => current.push(c),
            },
        }
    }

    match state {
        State::Normal => {
            stages.push(current);
            Ok(stages)
        }
        State::InSingleQuote => Err(LexError::UnclosedQuote('\'')),
        State::InDoubleQuote => Err(LexError::UnclosedQuote('"')),
    }
}

/// Scans one stage into argument words.
///
/// Rules, scanned left to right:
/// - unquoted space or tab terminates the current word; empty words are
///   discarded
/// - `'...'` preserves every character literally, including backslashes
/// - `"..."` preserves characters, except that `\` escapes `"`, `\`, `$`
///   and newline; before any other character the backslash stays literal
/// - an unquoted `\` appends the following character literally; a trailing
///   `\` at end of line stays literal
///
/// An unterminated quote is an error and the line is discarded.
pub fn tokenize(input: &str) -> Result<Vec<String>, LexError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;

    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match state {
            State::Normal => match ch {
                '\'' => state = State::InSingleQuote,
                '"' => state = State::InDoubleQuote,
                '\\' => match chars.next() {
                    Some(next) => current.push(next),
                    None => current.push('\\'),
                },
                ' ' | '\t' => {
                    if !current.is_empty() {
                        words.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
            State::InSingleQuote => {
                if ch == '\'' {
                    state = State::Normal;
                } else {
                    current.push(ch);
                }
            }
            State::InDoubleQuote => match ch {
                '"' => state = State::Normal,
                '\\' => match chars.peek().copied() {
                    Some(next) if matches!(next, '"' | '\\' | '$' | '\n') => {
                        chars.next();
                        current.push(next);
                    }
                    _ => current.push('\\'),
                },
                c => current.push(c),
            },
        }
    }

    match state {
        State::Normal => {
            if !current.is_empty() {
                words.push(current);
            }
            Ok(words)
        }
        State::InSingleQuote => Err(LexError::UnclosedQuote('\'')),
        State::InDoubleQuote => Err(LexError::UnclosedQuote('"')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(input: &str) -> Vec<String> {
        tokenize(input).unwrap()
    }

    #[test]
    fn splits_on_runs_of_spaces_and_tabs() {
        assert_eq!(words("echo  hello\tworld "), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn matches_whitespace_split_without_quotes() {
        for input in ["ls -la /tmp", "a  b\t\tc", "  x  ", "one"] {
            let plain: Vec<String> = input
                .split([' ', '\t'])
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect();
            assert_eq!(words(input), plain, "input: {input:?}");
        }
    }

    #[test]
    fn single_quotes_preserve_content() {
        assert_eq!(
            words(r#"echo 'a b'  "c  d""#),
            vec!["echo", "a b", "c  d"]
        );
    }

    #[test]
    fn single_quotes_keep_backslashes() {
        assert_eq!(words(r"'a\b'"), vec![r"a\b"]);
        assert_eq!(words(r#"'no "escapes" \here'"#), vec![r#"no "escapes" \here"#]);
    }

    #[test]
    fn backslash_escapes_in_normal_mode() {
        assert_eq!(words(r"a\ b"), vec!["a b"]);
        assert_eq!(words(r"\'quoted\'"), vec!["'quoted'"]);
        assert_eq!(words(r"world\ \ \ script"), vec!["world   script"]);
    }

    #[test]
    fn trailing_backslash_stays_literal() {
        assert_eq!(words(r"a\"), vec![r"a\"]);
    }

    #[test]
    fn double_quote_escapes() {
        assert_eq!(words(r#""a\"b""#), vec![r#"a"b"#]);
        assert_eq!(words(r#""\$HOME""#), vec!["$HOME"]);
        assert_eq!(words(r#""back\\slash""#), vec![r"back\slash"]);
        // A backslash before any other character stays literal.
        assert_eq!(words(r#""a\b""#), vec![r"a\b"]);
    }

    #[test]
    fn empty_quoted_words_are_discarded() {
        assert_eq!(words("'' x"), vec!["x"]);
        assert_eq!(words(r#""" y"#), vec!["y"]);
    }

    #[test]
    fn unterminated_quotes_error() {
        assert_eq!(tokenize("echo 'abc"), Err(LexError::UnclosedQuote('\'')));
        assert_eq!(tokenize("echo \"abc"), Err(LexError::UnclosedQuote('"')));
        assert_eq!(
            LexError::UnclosedQuote('\'').to_string(),
            "unclosed quote: '"
        );
    }

    #[test]
    fn stage_split_honors_quoting() {
        assert_eq!(split_stages("echo 'a|b'").unwrap().len(), 1);
        assert_eq!(split_stages(r#"echo "a|b""#).unwrap().len(), 1);
        assert_eq!(split_stages(r"a\|b").unwrap().len(), 1);
        assert_eq!(
            split_stages("echo a | cat").unwrap(),
            vec!["echo a ", " cat"]
        );
    }

    #[test]
    fn stage_split_preserves_empty_segments() {
        assert_eq!(split_stages("a||b").unwrap(), vec!["a", "", "b"]);
        assert_eq!(split_stages("|a").unwrap(), vec!["", "a"]);
        assert_eq!(split_stages("a|").unwrap(), vec!["a", ""]);
    }

    #[test]
    fn stage_split_reports_unterminated_quote() {
        assert_eq!(
            split_stages("echo 'a | b"),
            Err(LexError::UnclosedQuote('\''))
        );
    }
}
