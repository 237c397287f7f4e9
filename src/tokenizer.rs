//! Tokenizer for the right-hand side of a line.
//!
//! Numbers and whitespace are lexed with `nom`; everything else goes through
//! longest-match identifier resolution against the symbol tables as they are right now:
//! built-in operations, constants, parameters plus bound variables, and bound user
//! functions. Each table contributes its longest candidate that prefixes the remaining
//! text, and the first table with a match wins in that order, so `sinx` reads as
//! `sin x` and `2pi` as `2 pi`.

use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
};

use crate::Error;
use crate::builtinops::{
    BuiltinOp, OpKind, constant_names, find_constant, find_op, get_builtin_ops, get_neg_op,
};
use crate::registry::LineRegistry;
use crate::token::Token;

/// What the compiler needs to know about a token besides the token itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum OpMeta {
    /// Number, constant or variable
    Operand,
    /// Built-in operator, postfix operator or prefix function
    Builtin(&'static BuiltinOp),
    /// Call of a user-defined function
    UserFunction,
    LeftParen,
    RightParen,
    /// `,` between function arguments
    Separator,
}

pub(crate) type Lexeme = (Token, OpMeta);

/// Parse a run of digits and decimal points
fn number_literal(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit() || c == '.').parse(input)
}

fn skip_whitespace(input: &str) -> &str {
    let parsed: IResult<&str, &str> = multispace0.parse(input);
    match parsed {
        Ok((rest, _)) => rest,
        Err(_) => input,
    }
}

/// Value of a decimal literal; a second `.` is an error
fn literal_value(literal: &str) -> Result<f64, Error> {
    if literal.matches('.').count() > 1 {
        return Err(Error::MalformedNumber(literal.to_owned()));
    }
    if literal == "." {
        return Ok(0.0);
    }
    literal
        .parse::<f64>()
        .map_err(|_| Error::MalformedNumber(literal.to_owned()))
}

/// Longest candidate that is a prefix of `text`
fn longest_match<'c>(
    text: &str,
    candidates: impl IntoIterator<Item = &'c str>,
) -> Option<&'c str> {
    candidates
        .into_iter()
        .filter(|candidate| !candidate.is_empty() && text.starts_with(candidate))
        .max_by_key(|candidate| candidate.len())
}

/// Whether the next token starts an operand rather than continuing one
fn expects_operand(previous: Option<&Lexeme>) -> bool {
    match previous {
        None => true,
        Some((_, meta)) => match meta {
            OpMeta::LeftParen | OpMeta::Separator | OpMeta::UserFunction => true,
            OpMeta::Builtin(op) => op.kind != OpKind::Postfix,
            OpMeta::Operand | OpMeta::RightParen => false,
        },
    }
}

/// Resolve the identifier at the start of `text`, returning its lexeme and length
fn resolve_identifier(
    text: &str,
    parameters: &[String],
    registry: &LineRegistry,
    previous: Option<&Lexeme>,
) -> Option<(Lexeme, usize)> {
    if let Some(id) = longest_match(text, get_builtin_ops().iter().map(|op| op.id)) {
        let op = find_op(id)?;
        // A `-` where an operand should start is a negation
        let op = if op.id == "-" && expects_operand(previous) {
            get_neg_op()
        } else {
            op
        };
        return Some(((Token::Function(op.id.to_owned()), OpMeta::Builtin(op)), id.len()));
    }

    if let Some(name) = longest_match(text, constant_names()) {
        let value = find_constant(name)?;
        return Some((
            (Token::OperandSymbol(value, name.to_owned()), OpMeta::Operand),
            name.len(),
        ));
    }

    let variables = parameters
        .iter()
        .map(String::as_str)
        .chain(registry.variable_names());
    if let Some(name) = longest_match(text, variables) {
        return Some((
            (Token::Variable(name.to_owned()), OpMeta::Operand),
            name.len(),
        ));
    }

    if let Some(name) = longest_match(text, registry.function_names()) {
        return Some((
            (Token::UserFunction(name.to_owned()), OpMeta::UserFunction),
            name.len(),
        ));
    }

    None
}

/// Tokenize the right-hand side of a line against the current symbol tables
pub(crate) fn tokenize(
    input: &str,
    parameters: &[String],
    registry: &LineRegistry,
) -> Result<Vec<Lexeme>, Error> {
    let mut lexemes: Vec<Lexeme> = Vec::new();
    let mut open = 0;
    let mut close = 0;
    let mut remaining = skip_whitespace(input);

    while !remaining.is_empty() {
        let position = input.len() - remaining.len();

        if let Ok((rest, literal)) = number_literal(remaining) {
            let value = literal_value(literal)?;
            lexemes.push((Token::Operand(value), OpMeta::Operand));
            remaining = skip_whitespace(rest);
            continue;
        }

        let paren: IResult<&str, char> = char('(').parse(remaining);
        if let Ok((rest, _)) = paren {
            open += 1;
            lexemes.push((Token::Other("(".into()), OpMeta::LeftParen));
            remaining = skip_whitespace(rest);
            continue;
        }

        let paren: IResult<&str, char> = char(')').parse(remaining);
        if let Ok((rest, _)) = paren {
            close += 1;
            lexemes.push((Token::Other(")".into()), OpMeta::RightParen));
            remaining = skip_whitespace(rest);
            continue;
        }

        let comma: IResult<&str, char> = char(',').parse(remaining);
        if let Ok((rest, _)) = comma {
            lexemes.push((Token::Other(",".into()), OpMeta::Separator));
            remaining = skip_whitespace(rest);
            continue;
        }

        match resolve_identifier(remaining, parameters, registry, lexemes.last()) {
            Some((lexeme, length)) => {
                lexemes.push(lexeme);
                remaining = skip_whitespace(&remaining[length..]);
            }
            None => {
                // An unmatched word is a name nobody has defined (yet)
                let word: String = remaining
                    .chars()
                    .take_while(|c| c.is_ascii_alphabetic())
                    .collect();
                if word.is_empty() {
                    return Err(Error::unknown_identifier(input, position));
                }
                return Err(Error::UndefinedIdentifier(word));
            }
        }
    }

    if open != close {
        return Err(Error::MismatchedParentheses { open, close });
    }

    Ok(lexemes)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::registry::LineKind;

    fn op(id: &str) -> Token {
        Token::Function(id.into())
    }

    fn var(name: &str) -> Token {
        Token::Variable(name.into())
    }

    fn num(value: f64) -> Token {
        Token::Operand(value)
    }

    fn paren(p: &str) -> Token {
        Token::Other(p.into())
    }

    /// Registry where line `i` binds the i-th name of `variables` then `functions`
    fn registry_with(variables: &[&str], functions: &[&str]) -> LineRegistry {
        let mut registry = LineRegistry::new();
        let names = variables
            .iter()
            .map(|n| (LineKind::Variable, n))
            .chain(functions.iter().map(|n| (LineKind::Function, n)));
        for (i, (kind, name)) in names.enumerate() {
            registry.insert(i).unwrap();
            registry.bind(kind, name, i).unwrap();
        }
        registry
    }

    #[derive(Debug)]
    enum TokenizeTestResult {
        Tokens(Vec<Token>),
        SpecificError(crate::Error),
    }
    use TokenizeTestResult::*;

    fn run_tokenize_tests(registry: &LineRegistry, test_cases: Vec<(&str, TokenizeTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Tokenize test #{} ({input:?})", i + 1);
            match (tokenize(input, &[], registry), expected) {
                (Ok(lexemes), Tokens(expected_tokens)) => {
                    let tokens: Vec<Token> = lexemes.into_iter().map(|(t, _)| t).collect();
                    assert_eq!(tokens, *expected_tokens, "{test_id}");
                }
                (Err(err), SpecificError(expected_err)) => {
                    assert_eq!(err, *expected_err, "{test_id}");
                }
                (Ok(lexemes), SpecificError(expected_err)) => {
                    panic!("{test_id}: expected {expected_err:?}, got {lexemes:?}")
                }
                (Err(err), Tokens(_)) => panic!("{test_id}: expected tokens, got error {err:?}"),
            }
        }
    }

    #[test]
    fn test_tokenize_comprehensive() {
        let registry = registry_with(&["x", "xy", "rate"], &["f", "fx"]);
        let pi = Token::OperandSymbol(std::f64::consts::PI, "pi".into());

        let test_cases = vec![
            // ===== NUMBERS =====
            ("42", Tokens(vec![num(42.0)])),
            ("  3.25 ", Tokens(vec![num(3.25)])),
            (".5", Tokens(vec![num(0.5)])),
            ("7.", Tokens(vec![num(7.0)])),
            (".", Tokens(vec![num(0.0)])),
            ("1.2.3", SpecificError(crate::Error::MalformedNumber("1.2.3".into()))),
            ("", Tokens(vec![])),
            // ===== OPERATORS =====
            ("1+2", Tokens(vec![num(1.0), op("+"), num(2.0)])),
            (
                "2 ^ 3 * 4 / 5",
                Tokens(vec![num(2.0), op("^"), num(3.0), op("*"), num(4.0), op("/"), num(5.0)]),
            ),
            ("50%", Tokens(vec![num(50.0), op("%")])),
            ("90deg", Tokens(vec![num(90.0), op("deg")])),
            ("sqrt 16", Tokens(vec![op("sqrt"), num(16.0)])),
            // ===== UNARY MINUS =====
            ("-3", Tokens(vec![op("neg"), num(3.0)])),
            ("2 - 3", Tokens(vec![num(2.0), op("-"), num(3.0)])),
            ("2 * -3", Tokens(vec![num(2.0), op("*"), op("neg"), num(3.0)])),
            ("(-1)", Tokens(vec![paren("("), op("neg"), num(1.0), paren(")")])),
            ("5% - 1", Tokens(vec![num(5.0), op("%"), op("-"), num(1.0)])),
            ("x - 1", Tokens(vec![var("x"), op("-"), num(1.0)])),
            // ===== PARENTHESES AND SEPARATORS =====
            (
                "(1)(2)",
                Tokens(vec![paren("("), num(1.0), paren(")"), paren("("), num(2.0), paren(")")]),
            ),
            (
                "f(1, 2)",
                Tokens(vec![
                    Token::UserFunction("f".into()),
                    paren("("),
                    num(1.0),
                    paren(","),
                    num(2.0),
                    paren(")"),
                ]),
            ),
            (
                "(1 + 2",
                SpecificError(crate::Error::MismatchedParentheses { open: 1, close: 0 }),
            ),
            (
                "1 + 2))",
                SpecificError(crate::Error::MismatchedParentheses { open: 0, close: 2 }),
            ),
            // ===== LONGEST MATCH =====
            ("xy", Tokens(vec![var("xy")])),
            ("xyx", Tokens(vec![var("xy"), var("x")])),
            ("fx", Tokens(vec![Token::UserFunction("fx".into())])),
            ("2pi", Tokens(vec![num(2.0), pi.clone()])),
            ("sinx", Tokens(vec![op("sin"), var("x")])),
            // Operators win over everything else, constants over variables
            ("pix", Tokens(vec![pi.clone(), var("x")])),
            ("rate*2", Tokens(vec![var("rate"), op("*"), num(2.0)])),
            // ===== UNKNOWN INPUT =====
            (
                "1 & 2",
                SpecificError(crate::Error::UnknownIdentifier {
                    position: 2,
                    found: '&',
                    context: "1 & 2".into(),
                }),
            ),
            ("1 + a", SpecificError(crate::Error::UndefinedIdentifier("a".into()))),
            ("ratex + q", SpecificError(crate::Error::UndefinedIdentifier("q".into()))),
        ];

        run_tokenize_tests(&registry, test_cases);
    }

    #[test]
    fn test_parameters_resolve_as_variables() {
        let registry = registry_with(&[], &[]);
        let parameters = vec!["a".to_owned(), "b".to_owned()];
        let lexemes = tokenize("a * b", &parameters, &registry).unwrap();
        let tokens: Vec<Token> = lexemes.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(tokens, vec![var("a"), op("*"), var("b")]);
        assert_eq!(lexemes[0].1, OpMeta::Operand);

        // Without the parameter list the same text names nothing
        assert_eq!(
            tokenize("a * b", &[], &registry).unwrap_err(),
            crate::Error::UndefinedIdentifier("a".into())
        );
    }

    #[test]
    fn test_operator_metadata() {
        let registry = registry_with(&[], &["f"]);
        let lexemes = tokenize("f(2) + 3%", &[], &registry).unwrap();
        let metas: Vec<OpMeta> = lexemes.iter().map(|(_, m)| *m).collect();
        assert_eq!(
            metas,
            vec![
                OpMeta::UserFunction,
                OpMeta::LeftParen,
                OpMeta::Operand,
                OpMeta::RightParen,
                OpMeta::Builtin(find_op("+").unwrap()),
                OpMeta::Operand,
                OpMeta::Builtin(find_op("%").unwrap()),
            ]
        );
    }

    #[test]
    fn test_longest_match() {
        let candidates = ["s", "si", "sin", "sinh", ""];
        assert_eq!(longest_match("sinx", candidates), Some("sin"));
        assert_eq!(longest_match("sinh2", candidates), Some("sinh"));
        // A candidate consumed right at the end of the text still qualifies
        assert_eq!(longest_match("si", candidates), Some("si"));
        assert_eq!(longest_match("x", candidates), None);
    }
}
