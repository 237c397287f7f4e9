//! Postfix tokens.
//!
//! A compiled line is a sequence of [`Token`]s in postfix (reverse Polish) order. Tokens
//! are plain values: they are cloned freely into expanded sequences, and the named
//! variants carry the identifier they are later resolved by.

use std::fmt;

/// One item of a postfix sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal
    Operand(f64),
    /// Named constant with its value (e.g. `pi`)
    OperandSymbol(f64, String),
    /// User variable or, inside a function body, a formal parameter
    Variable(String),
    /// Built-in operator or function
    Function(String),
    /// Call of a user-defined function
    UserFunction(String),
    /// Anything else (parentheses and separators while compiling)
    Other(String),
}

impl Token {
    /// Identifier carried by named tokens
    pub fn name(&self) -> Option<&str> {
        match self {
            Token::OperandSymbol(_, name)
            | Token::Variable(name)
            | Token::Function(name)
            | Token::UserFunction(name)
            | Token::Other(name) => Some(name),
            Token::Operand(_) => None,
        }
    }
}

/// Render a number with the shortest representation that reads back to the same
/// value, or with a fixed number of decimals.
///
/// Infinities and NaN render as `inf`, `-inf` and `NaN`. These are display-only and
/// do not parse back as numbers.
pub(crate) fn format_number(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(decimals) => format!("{value:.decimals$}"),
        None => format!("{value}"),
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Operand(value) => write!(f, "{}", format_number(*value, f.precision())),
            Token::OperandSymbol(_, name)
            | Token::Variable(name)
            | Token::Function(name)
            | Token::UserFunction(name)
            | Token::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Render a postfix sequence as space separated tokens
pub(crate) fn format_postfix(tokens: &[Token], precision: Option<usize>) -> String {
    let rendered: Vec<String> = tokens
        .iter()
        .map(|token| match token {
            Token::Operand(value) => format_number(*value, precision),
            other => other.to_string(),
        })
        .collect();
    rendered.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        let cases = vec![
            (5.0, None, "5"),
            (0.25, None, "0.25"),
            (-3.0, None, "-3"),
            (std::f64::consts::PI, None, "3.141592653589793"),
            (7.0, Some(6), "7.000000"),
            (2.0 / 3.0, Some(2), "0.67"),
        ];
        for (value, precision, expected) in cases {
            assert_eq!(format_number(value, precision), expected);
        }
    }

    #[test]
    fn test_display_and_postfix_rendering() {
        let tokens = vec![
            Token::Operand(2.0),
            Token::OperandSymbol(std::f64::consts::PI, "pi".into()),
            Token::Function("*".into()),
            Token::Variable("x".into()),
            Token::Function("+".into()),
        ];
        assert_eq!(format_postfix(&tokens, None), "2 pi * x +");
        assert_eq!(format_postfix(&tokens, Some(1)), "2.0 pi * x +");
        assert_eq!(format!("{:.3}", Token::Operand(1.5)), "1.500");
        assert_eq!(format_postfix(&[], None), "");
    }

    #[test]
    fn test_token_names() {
        assert_eq!(Token::Operand(1.0).name(), None);
        assert_eq!(Token::UserFunction("f".into()).name(), Some("f"));
    }
}
