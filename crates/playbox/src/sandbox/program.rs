//! Playground snippet source format
//!
//! Snippet bodies are line-oriented: named functions wrap a flat list of
//! instructions. The format is deliberately small; a snippet is data handed
//! to the sandbox, not a program in a general-purpose language.
//!
//! ```text
//! # sums are printed without a trailing newline
//! fn main
//!     print hello
//!     add 5 4 6
//!     call aside
//! end
//!
//! fn aside
//!     eprint from aside
//! end
//! ```

use std::collections::HashMap;

use thiserror::Error;

/// Errors raised while parsing snippet source
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: unknown instruction '{word}'")]
    UnknownInstruction { line: usize, word: String },

    #[error("line {line}: '{instr}' is missing an argument")]
    MissingArgument { line: usize, instr: &'static str },

    #[error("line {line}: '{token}' is not a valid number")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: 'fn' inside another function")]
    NestedFunction { line: usize },

    #[error("line {line}: instruction outside a function")]
    OutsideFunction { line: usize },

    #[error("line {line}: duplicate function '{name}'")]
    DuplicateFunction { line: usize, name: String },

    #[error("line {line}: 'end' without a matching 'fn'")]
    UnmatchedEnd { line: usize },

    #[error("function '{name}' is never closed with 'end'")]
    UnterminatedFunction { name: String },

    #[error("source defines no functions")]
    Empty,
}

/// One instruction in a snippet body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// Write raw text to stdout (no newline added)
    Print(String),

    /// Write raw text to stderr (no newline added)
    PrintErr(String),

    /// Sum the operands and write the decimal result to stdout
    Add(Vec<i64>),

    /// Suspend for the given number of milliseconds
    Sleep(u64),

    /// Spin for `Some(n)` iterations, or until stopped when `None`
    Loop(Option<u64>),

    /// Reserve scratch bytes, charged against the memory budget
    Alloc(u64),

    /// Raise a runtime fault with the given message
    Fail(String),

    /// Invoke another function in the same snippet
    Call(String),
}

/// A parsed snippet: named functions of instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    functions: HashMap<String, Vec<Instr>>,
}

impl Program {
    /// Look up a function body by name
    pub fn function(&self, name: &str) -> Option<&[Instr]> {
        self.functions.get(name).map(Vec::as_slice)
    }

    /// Names of all defined functions, sorted
    pub fn entry_points(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of defined functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the program defines no functions
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Parse snippet source text into a [`Program`]
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let mut functions: HashMap<String, Vec<Instr>> = HashMap::new();
    let mut current: Option<(String, Vec<Instr>)> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let (word, rest) = split_word(text);

        match word {
            "fn" => {
                if current.is_some() {
                    return Err(ParseError::NestedFunction { line });
                }
                let name = rest.trim();
                if name.is_empty() {
                    return Err(ParseError::MissingArgument { line, instr: "fn" });
                }
                if functions.contains_key(name) {
                    return Err(ParseError::DuplicateFunction {
                        line,
                        name: name.to_string(),
                    });
                }
                current = Some((name.to_string(), Vec::new()));
            }
            "end" => {
                let Some((name, body)) = current.take() else {
                    return Err(ParseError::UnmatchedEnd { line });
                };
                functions.insert(name, body);
            }
            _ => {
                let Some((_, ref mut body)) = current else {
                    return Err(ParseError::OutsideFunction { line });
                };
                body.push(parse_instr(line, word, rest)?);
            }
        }
    }

    if let Some((name, _)) = current {
        return Err(ParseError::UnterminatedFunction { name });
    }
    if functions.is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(Program { functions })
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

fn parse_instr(line: usize, word: &str, rest: &str) -> Result<Instr, ParseError> {
    match word {
        "print" => Ok(Instr::Print(rest.to_string())),
        "eprint" => Ok(Instr::PrintErr(rest.to_string())),
        "add" => {
            let operands = rest
                .split_whitespace()
                .map(|token| parse_num::<i64>(line, token))
                .collect::<Result<Vec<_>, _>>()?;
            if operands.is_empty() {
                return Err(ParseError::MissingArgument { line, instr: "add" });
            }
            Ok(Instr::Add(operands))
        }
        "sleep" => {
            let token = first_token(line, "sleep", rest)?;
            Ok(Instr::Sleep(parse_num(line, token)?))
        }
        "loop" => match rest.split_whitespace().next() {
            Some(token) => Ok(Instr::Loop(Some(parse_num(line, token)?))),
            None => Ok(Instr::Loop(None)),
        },
        "alloc" => {
            let token = first_token(line, "alloc", rest)?;
            Ok(Instr::Alloc(parse_num(line, token)?))
        }
        "fail" => Ok(Instr::Fail(rest.to_string())),
        "call" => {
            let name = first_token(line, "call", rest)?;
            Ok(Instr::Call(name.to_string()))
        }
        _ => Err(ParseError::UnknownInstruction {
            line,
            word: word.to_string(),
        }),
    }
}

fn first_token<'a>(
    line: usize,
    instr: &'static str,
    rest: &'a str,
) -> Result<&'a str, ParseError> {
    rest.split_whitespace()
        .next()
        .ok_or(ParseError::MissingArgument { line, instr })
}

fn parse_num<T: std::str::FromStr>(line: usize, token: &str) -> Result<T, ParseError> {
    token.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        token: token.to_string(),
    })
}
