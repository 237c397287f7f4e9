//! Left-hand sides of definitions: `name = ...` and `name(a, b) = ...`.

use nom::{
    IResult, Parser,
    character::complete::{alpha1, char},
    error::ErrorKind,
    multi::separated_list0,
    sequence::delimited,
};

use crate::Error;
use crate::builtinops::is_builtin_name;
use crate::registry::LineKind;

/// Character separating a definition's head from its body
pub(crate) const ASSIGNMENT: char = '=';

/// A line split at its assignment
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LineParts<'a> {
    pub(crate) head: Option<Head>,
    pub(crate) body: &'a str,
}

/// Parsed left-hand side of a definition
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Head {
    pub(crate) kind: LineKind,
    pub(crate) name: String,
    pub(crate) parameters: Vec<String>,
}

/// Split a line at its first `=` and parse the left-hand side, if any
pub(crate) fn split_line(text: &str) -> Result<LineParts<'_>, Error> {
    match text.split_once(ASSIGNMENT) {
        Some((head, body)) => Ok(LineParts {
            head: Some(parse_head(head)?),
            body,
        }),
        None => Ok(LineParts {
            head: None,
            body: text,
        }),
    }
}

/// Convert nom parsing errors to user-friendly messages
fn head_error_message(input: &str, error: nom::Err<nom::error::Error<&str>>) -> String {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::Alpha => {
                    format!("Expected alphabetical name at position {position}")
                }
                ErrorKind::Char => format!("Expected ',' or ')' at position {position}"),
                _ => format!("Invalid syntax at position {position}"),
            }
        }
        nom::Err::Incomplete(_) => "Incomplete definition".into(),
    }
}

/// Parse a parenthesized parameter list: `(a, b, c)`
fn parameter_list(input: &str) -> IResult<&str, Vec<&str>> {
    delimited(char('('), separated_list0(char(','), alpha1), char(')')).parse(input)
}

/// Parse `name` or `name(a, b, ...)`; whitespace anywhere in the head is ignored
fn parse_head(head: &str) -> Result<Head, Error> {
    let compact: String = head.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::MalformedDefinition(
            "Identifier length cannot be 0".into(),
        ));
    }

    let (rest, name) = alpha1::<&str, nom::error::Error<&str>>(compact.as_str())
        .map_err(|e| Error::MalformedDefinition(head_error_message(&compact, e)))?;

    let (rest, parameters) = if rest.starts_with('(') {
        let (rest, parameters) = parameter_list(rest)
            .map_err(|e| Error::MalformedDefinition(head_error_message(&compact, e)))?;
        if parameters.is_empty() {
            return Err(Error::MalformedDefinition(format!(
                "{name} needs at least one parameter"
            )));
        }
        (rest, parameters)
    } else {
        (rest, Vec::new())
    };

    if !rest.is_empty() {
        let position = compact.len() - rest.len();
        return Err(Error::MalformedDefinition(format!(
            "Expected alphabetical or ( at position {position}, found '{rest}'"
        )));
    }

    if is_builtin_name(name) {
        return Err(Error::DuplicateIdentifier(name.to_owned()));
    }

    for (i, parameter) in parameters.iter().enumerate() {
        if parameters[..i].contains(parameter) {
            return Err(Error::MalformedDefinition(format!(
                "Duplicate parameter name: {parameter}"
            )));
        }
        if is_builtin_name(parameter) {
            return Err(Error::MalformedDefinition(format!(
                "Parameter {parameter} shadows a built-in"
            )));
        }
    }

    let kind = if parameters.is_empty() {
        LineKind::Variable
    } else {
        LineKind::Function
    };

    Ok(Head {
        kind,
        name: name.to_owned(),
        parameters: parameters.into_iter().map(str::to_owned).collect(),
    })
}
