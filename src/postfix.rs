//! Infix to postfix compilation.
//!
//! Two passes over the tokenizer output: implicit multiplication is made explicit first,
//! then a shunting yard reorders everything into postfix. Parentheses and separators
//! steer the shunting yard and never reach the output.

use crate::Error;
use crate::builtinops::{OpKind, get_mul_op};
use crate::token::Token;
use crate::tokenizer::{Lexeme, OpMeta};
use tracing::trace;

/// Whether a value ends right before this lexeme
fn ends_operand(meta: &OpMeta) -> bool {
    matches!(meta, OpMeta::Operand | OpMeta::RightParen)
}

/// Whether a lexeme starts a new factor that a preceding value multiplies
fn starts_factor(lexeme: &Lexeme) -> bool {
    match lexeme {
        // A bare number never does: `2 3` stays two operands
        (Token::Operand(_), _) => false,
        (_, OpMeta::Operand | OpMeta::LeftParen | OpMeta::UserFunction) => true,
        (_, OpMeta::Builtin(op)) => op.kind == OpKind::Function,
        _ => false,
    }
}

/// Insert `*` wherever two factors are written side by side: `5x`, `2pi`, `2(3+4)`,
/// `(1)(2)`, `2 sqrt 9`
pub(crate) fn insert_implicit_multiplication(lexemes: Vec<Lexeme>) -> Vec<Lexeme> {
    let mul = get_mul_op();
    let mut result: Vec<Lexeme> = Vec::with_capacity(lexemes.len());

    for lexeme in lexemes {
        if let Some((_, previous)) = result.last()
            && ends_operand(previous)
            && starts_factor(&lexeme)
        {
            result.push((Token::Function(mul.id.to_owned()), OpMeta::Builtin(mul)));
        }
        result.push(lexeme);
    }
    result
}

fn paren_counts(lexemes: &[Lexeme]) -> (usize, usize) {
    lexemes.iter().fold((0, 0), |(open, close), (_, meta)| match meta {
        OpMeta::LeftParen => (open + 1, close),
        OpMeta::RightParen => (open, close + 1),
        _ => (open, close),
    })
}

/// Reorder lexemes into postfix with a shunting yard
///
/// Binary operators pop every stacked built-in of greater or equal precedence, and any
/// stacked user function, before being pushed; prefix functions and user functions are
/// pushed as they come.
pub(crate) fn shunting_yard(lexemes: Vec<Lexeme>) -> Result<Vec<Token>, Error> {
    let (open, close) = paren_counts(&lexemes);
    let unbalanced = || Error::MismatchedParentheses { open, close };

    let mut output: Vec<Token> = Vec::with_capacity(lexemes.len());
    let mut stack: Vec<Lexeme> = Vec::new();

    for (token, meta) in lexemes {
        match meta {
            OpMeta::Operand => output.push(token),
            OpMeta::Builtin(op) => match op.kind {
                OpKind::Postfix => output.push(token),
                // Like user functions, pushed without popping so `sqrt sqrt 16` nests
                OpKind::Function => stack.push((token, meta)),
                OpKind::Operator => {
                    while let Some((_, top)) = stack.last() {
                        let pops = match top {
                            OpMeta::Builtin(stacked) => {
                                stacked.is_stacked() && stacked.precedence >= op.precedence
                            }
                            OpMeta::UserFunction => true,
                            _ => false,
                        };
                        if !pops {
                            break;
                        }
                        if let Some((popped, _)) = stack.pop() {
                            output.push(popped);
                        }
                    }
                    stack.push((token, meta));
                }
            },
            // A user function call pops nothing on arrival either
            OpMeta::UserFunction | OpMeta::LeftParen => stack.push((token, meta)),
            OpMeta::RightParen => loop {
                match stack.pop() {
                    Some((_, OpMeta::LeftParen)) => break,
                    Some((popped, _)) => output.push(popped),
                    None => return Err(unbalanced()),
                }
            },
            OpMeta::Separator => {
                while let Some((_, top)) = stack.last() {
                    if *top == OpMeta::LeftParen {
                        break;
                    }
                    if let Some((popped, _)) = stack.pop() {
                        output.push(popped);
                    }
                }
            }
        }
    }

    while let Some((token, meta)) = stack.pop() {
        if meta == OpMeta::LeftParen {
            return Err(unbalanced());
        }
        output.push(token);
    }

    trace!(postfix = ?output, "compiled");
    Ok(output)
}

/// Compile tokenizer output into stored postfix form
pub(crate) fn compile(lexemes: Vec<Lexeme>) -> Result<Vec<Token>, Error> {
    shunting_yard(insert_implicit_multiplication(lexemes))
}
