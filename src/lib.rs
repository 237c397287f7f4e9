//! livecalc - live multi-line expression evaluator
//!
//! This crate provides the engine behind a "worksheet" style calculator: the host keeps
//! an ordered list of input lines, and every line is either a free-standing arithmetic
//! expression, a variable definition or a function definition:
//!
//! ```text
//! r = 2
//! area(x) = pi x^2
//! area(r) + 1
//! ```
//!
//! Every edit re-parses one line into postfix form. Evaluating a line may reach other
//! lines by name: user functions are expanded inline at their call sites and variables
//! are resolved recursively, memoized for the duration of one evaluation.
//!
//! ## Lines and bindings
//!
//! Identifiers are bound to the line that defines them. Inserting or removing lines
//! keeps every binding pointing at the right line, and a line that fails to parse keeps
//! its text so that it can be retried lazily once the names it needs exist.
//!
//! ```
//! use livecalc::Calculator;
//!
//! let mut calc = Calculator::new();
//! calc.add_line();
//! calc.add_line();
//! calc.parse_line("f(a) = a * 2", 0).unwrap();
//! calc.parse_line("f(3) + 1", 1).unwrap();
//! assert_eq!(calc.get_formatted_line(1).unwrap(), "7");
//! assert_eq!(calc.get_formatted_line(0).unwrap(), "f(a) = a 2 *");
//! ```
//!
//! ## Modules
//!
//! - `builtinops`: built-in operators, functions and constants
//! - `token`: postfix tokens and their rendering
//! - `registry`: the ordered lines and their identifier bindings
//! - `calculator`: the engine object owned by the host

use std::fmt;

/// Maximum number of characters of input shown as context in error messages
pub const MAX_ERROR_CONTEXT: usize = 40;

/// Error types for the engine
///
/// Every error is scoped to the line being parsed, formatted or evaluated; none of them
/// leave the engine in an inconsistent state.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A numeric literal contains more than one decimal point
    MalformedNumber(String),
    /// The counts of `(` and `)` differ
    MismatchedParentheses { open: usize, close: usize },
    /// Nothing in any symbol table matches the input at this position
    UnknownIdentifier {
        position: usize,
        found: char,
        context: String,
    },
    /// The left-hand side of a definition is not `name` or `name(a, b, ...)`
    MalformedDefinition(String),
    /// The name is already bound to another line, or names a built-in
    DuplicateIdentifier(String),
    /// A user variable or function is referenced but not bound to any line
    UndefinedIdentifier(String),
    /// Expansion or evaluation came back to an identifier already in progress
    RecursionDetected(String),
    /// A user function call site has fewer arguments than parameters
    MissingArguments {
        function: String,
        expected: usize,
        got: usize,
    },
    /// An operator or function is short of operands, or an expression leaves
    /// the wrong number of values behind
    ArityMismatch {
        expected: usize,
        got: usize,
        op: Option<String>,
    },
    /// A token that cannot be evaluated survived to evaluation
    InvalidToken(String),
    /// A line index outside the current worksheet
    LineOutOfRange { index: usize, len: usize },
}

impl Error {
    /// Create an ArityMismatch for a named operator or function
    pub fn arity_error(expected: usize, got: usize, op: &str) -> Self {
        Error::ArityMismatch {
            expected,
            got,
            op: Some(op.to_owned()),
        }
    }

    /// Create an UnknownIdentifier with a context snippet extracted from the input
    pub fn unknown_identifier(input: &str, position: usize) -> Self {
        let found = input
            .get(position..)
            .and_then(|rest| rest.chars().next())
            .unwrap_or('?');

        // Show a little of what came before the offending character
        let context_start = input
            .char_indices()
            .map(|(i, _)| i)
            .filter(|&i| i <= position)
            .rev()
            .nth(10)
            .unwrap_or(0);

        let mut context = String::new();
        if context_start > 0 {
            context.push_str("[...]");
        }
        let snippet: String = input[context_start..]
            .chars()
            .take(MAX_ERROR_CONTEXT)
            .collect();
        let truncated = context_start + snippet.len() < input.len();
        context.push_str(&snippet);
        if truncated {
            context.push_str("[...]");
        }

        Error::UnknownIdentifier {
            position,
            found,
            context,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedNumber(literal) => {
                write!(f, "Cannot parse value '{literal}', two '.' in one number")
            }
            Error::MismatchedParentheses { open, close } => {
                write!(f, "Mismatched parentheses: {open} '(' but {close} ')'")
            }
            Error::UnknownIdentifier {
                position,
                found,
                context,
            } => {
                write!(f, "Unknown identifier at index {position}")?;
                write!(f, "\nFound: {found}")?;
                write!(f, "\nContext: {context}")
            }
            Error::MalformedDefinition(msg) => write!(f, "Malformed definition: {msg}"),
            Error::DuplicateIdentifier(name) => write!(f, "{name} cannot be defined twice"),
            Error::UndefinedIdentifier(name) => write!(f, "{name} isn't well defined"),
            Error::RecursionDetected(name) => write!(f, "Recursion detected through {name}"),
            Error::MissingArguments {
                function,
                expected,
                got,
            } => write!(
                f,
                "Missing arguments: {function} expects {expected} arguments, got {got}"
            ),
            Error::ArityMismatch { expected, got, op } => match op {
                Some(op) => write!(
                    f,
                    "Wrong number of arguments: {op} expects {expected}, got {got}"
                ),
                None => write!(
                    f,
                    "Wrong number of arguments: expression leaves {got} values, expected {expected}"
                ),
            },
            Error::InvalidToken(token) => write!(f, "Invalid symbol: {token}"),
            Error::LineOutOfRange { index, len } => {
                write!(f, "Line {index} is out of range ({len} lines)")
            }
        }
    }
}

impl std::error::Error for Error {}

pub mod builtinops;
pub mod calculator;
mod definition;
mod evaluator;
mod intooperation;
mod postfix;
pub mod registry;
pub mod token;
mod tokenizer;

pub use calculator::{Calculator, FormatConfig};
pub use registry::{InputLine, LineKind};
pub use token::Token;
