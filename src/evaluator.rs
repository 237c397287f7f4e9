//! Expansion and evaluation of compiled lines.
//!
//! User functions are inlined before anything is evaluated: each call site takes its
//! arguments off the sequence built so far and is replaced by the function's own body
//! with the arguments substituted for the parameters, which is then expanded in turn.
//! What remains is evaluated on an operand stack. Variables are resolved on demand by
//! evaluating the line that defines them, and every value computed during one top-level
//! evaluation is memoized by name.
//!
//! Both passes carry the set of identifiers currently being expanded or resolved. The
//! set is copied on every descent, so two independent references to the same name are
//! fine and only a real cycle is reported.

use crate::Error;
use crate::builtinops::find_op;
use crate::calculator::Calculator;
use crate::token::Token;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Names currently being expanded or resolved, from the outermost call inwards
pub(crate) type InProgress = HashSet<String>;

/// Variable values computed during one top-level evaluation
pub(crate) type Memo = HashMap<String, f64>;

/// Number of operands a postfix token consumes
fn token_arity(token: &Token) -> usize {
    match token {
        Token::Function(id) => find_op(id).map_or(0, |op| op.arity),
        _ => 0,
    }
}

/// Start of the trailing subsequence of `tokens` that produces exactly one value
fn argument_start(tokens: &[Token]) -> Option<usize> {
    let mut needed: usize = 1;
    for (i, token) in tokens.iter().enumerate().rev() {
        needed = needed + token_arity(token) - 1;
        if needed == 0 {
            return Some(i);
        }
    }
    None
}

/// Split the last `count` complete arguments off `output`, in call order
fn split_arguments(
    output: &mut Vec<Token>,
    function: &str,
    count: usize,
) -> Result<Vec<Vec<Token>>, Error> {
    let mut arguments = Vec::with_capacity(count);
    for got in 0..count {
        let start = argument_start(output).ok_or_else(|| Error::MissingArguments {
            function: function.to_owned(),
            expected: count,
            got,
        })?;
        arguments.push(output.split_off(start));
    }
    arguments.reverse();
    Ok(arguments)
}

fn descend(in_progress: &InProgress, name: &str) -> InProgress {
    let mut nested = in_progress.clone();
    nested.insert(name.to_owned());
    nested
}

impl Calculator {
    /// Inline every user function call in `postfix`
    pub(crate) fn expand(
        &mut self,
        postfix: &[Token],
        in_progress: &InProgress,
    ) -> Result<Vec<Token>, Error> {
        let mut output: Vec<Token> = Vec::with_capacity(postfix.len());

        for token in postfix {
            let Token::UserFunction(name) = token else {
                output.push(token.clone());
                continue;
            };

            let index = self
                .registry
                .function_line(name)
                .ok_or_else(|| Error::UndefinedIdentifier(name.clone()))?;
            if in_progress.contains(name) {
                return Err(Error::RecursionDetected(name.clone()));
            }
            self.repair_line(index)?;

            let line = self.registry.line(index)?;
            let parameters = line.parameters.clone();
            let body = line.postfix.clone();

            let arguments = split_arguments(&mut output, name, parameters.len())?;
            trace!(function = %name, ?arguments, "inlining call");

            // Only the callee's own body is substituted; names inside the functions
            // it calls are resolved when the substituted body is expanded
            let mut substituted: Vec<Token> = Vec::with_capacity(body.len());
            for body_token in body {
                let parameter = match &body_token {
                    Token::Variable(variable) => parameters.iter().position(|p| p == variable),
                    _ => None,
                };
                match parameter {
                    Some(position) => substituted.extend(arguments[position].iter().cloned()),
                    None => substituted.push(body_token),
                }
            }

            output.extend(self.expand(&substituted, &descend(in_progress, name))?);
        }

        Ok(output)
    }

    /// Evaluate a postfix sequence to a single value
    pub(crate) fn evaluate_postfix(
        &mut self,
        postfix: &[Token],
        in_progress: &InProgress,
        memo: &mut Memo,
    ) -> Result<f64, Error> {
        let expanded = self.expand(postfix, &InProgress::new())?;
        let mut stack: Vec<f64> = Vec::new();

        for token in &expanded {
            match token {
                Token::Operand(value) | Token::OperandSymbol(value, _) => stack.push(*value),
                Token::Variable(name) => {
                    let value = self.resolve_variable(name, in_progress, memo)?;
                    stack.push(value);
                }
                Token::Function(id) => {
                    let op = find_op(id).ok_or_else(|| Error::InvalidToken(id.clone()))?;
                    if stack.len() < op.arity {
                        return Err(Error::arity_error(op.arity, stack.len(), op.id));
                    }
                    let args = stack.split_off(stack.len() - op.arity);
                    stack.push(op.apply(&args)?);
                }
                Token::UserFunction(name) | Token::Other(name) => {
                    return Err(Error::InvalidToken(name.clone()));
                }
            }
        }

        match stack.as_slice() {
            [value] => Ok(*value),
            _ => Err(Error::ArityMismatch {
                expected: 1,
                got: stack.len(),
                op: None,
            }),
        }
    }

    /// Value of the variable `name`, evaluating its line on first use
    fn resolve_variable(
        &mut self,
        name: &str,
        in_progress: &InProgress,
        memo: &mut Memo,
    ) -> Result<f64, Error> {
        if let Some(value) = memo.get(name) {
            return Ok(*value);
        }

        let index = self
            .registry
            .variable_line(name)
            .ok_or_else(|| Error::UndefinedIdentifier(name.to_owned()))?;
        if in_progress.contains(name) {
            return Err(Error::RecursionDetected(name.to_owned()));
        }
        self.repair_line(index)?;

        let postfix = self.registry.line(index)?.postfix.clone();
        let value = self.evaluate_postfix(&postfix, &descend(in_progress, name), memo)?;
        trace!(variable = %name, line = index, value, "resolved");
        memo.insert(name.to_owned(), value);
        Ok(value)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::token::format_postfix;

    fn num(value: f64) -> Token {
        Token::Operand(value)
    }

    fn op(id: &str) -> Token {
        Token::Function(id.into())
    }

    /// Calculator with one line per entry of `lines`, parsed in order
    fn sheet(lines: &[&str]) -> Calculator {
        let mut calc = Calculator::new();
        for (i, text) in lines.iter().enumerate() {
            calc.add_line();
            calc.parse_line(text, i).unwrap();
        }
        calc
    }

    #[test]
    fn test_argument_start() {
        // 1 2 + 3 -> the trailing argument is `3`, the one before it `1 2 +`
        let tokens = vec![num(1.0), num(2.0), op("+"), num(3.0)];
        assert_eq!(argument_start(&tokens), Some(3));
        assert_eq!(argument_start(&tokens[..3]), Some(0));

        // Unary operators consume and produce one value
        let tokens = vec![num(4.0), op("sqrt"), op("neg")];
        assert_eq!(argument_start(&tokens), Some(0));

        // A dangling binary operator has no complete argument
        assert_eq!(argument_start(&[num(1.0), op("+")]), None);
        assert_eq!(argument_start(&[]), None);
    }

    #[test]
    fn test_split_arguments() {
        let mut output = vec![num(9.0), num(1.0), num(2.0), op("+"), num(3.0)];
        let arguments = split_arguments(&mut output, "f", 2).unwrap();
        assert_eq!(
            arguments,
            vec![vec![num(1.0), num(2.0), op("+")], vec![num(3.0)]]
        );
        assert_eq!(output, vec![num(9.0)]);

        let mut output = vec![num(1.0)];
        assert_eq!(
            split_arguments(&mut output, "g", 3),
            Err(Error::MissingArguments {
                function: "g".into(),
                expected: 3,
                got: 1,
            })
        );
    }

    #[test]
    fn test_expand_substitutes_arguments() {
        let mut calc = sheet(&["f(a, b) = a - b", "g(x) = f(x, 1) * x", "g(2 + 3)"]);
        let postfix = calc.line(2).unwrap().postfix().to_vec();
        let expanded = calc.expand(&postfix, &InProgress::new()).unwrap();
        assert_eq!(format_postfix(&expanded, None), "2 3 + 1 - 2 3 + *");
    }

    #[test]
    fn test_expand_keeps_globals_inside_nested_calls() {
        // `a` in `f` is the variable, not the parameter of the caller `g`
        let mut calc = sheet(&["a = 10", "f(x) = x + a", "g(a) = f(1) * a", "g(2)"]);
        let postfix = calc.line(3).unwrap().postfix().to_vec();
        let expanded = calc.expand(&postfix, &InProgress::new()).unwrap();
        assert_eq!(format_postfix(&expanded, None), "1 a + 2 *");
        assert_eq!(calc.evaluate_at(3).unwrap(), 22.0);
    }

    #[test]
    fn test_expand_leaves_other_tokens_alone() {
        let mut calc = sheet(&["x = 4"]);
        let postfix = vec![Token::Variable("x".into()), num(2.0), op("^")];
        let expanded = calc.expand(&postfix, &InProgress::new()).unwrap();
        assert_eq!(expanded, postfix);
    }

    #[test]
    fn test_expand_reports_recursion() {
        let mut calc = sheet(&["f(a) = a", "f(1)"]);
        let postfix = calc.line(1).unwrap().postfix().to_vec();
        let in_progress = descend(&InProgress::new(), "f");
        assert_eq!(
            calc.expand(&postfix, &in_progress),
            Err(Error::RecursionDetected("f".into()))
        );
    }

    #[test]
    fn test_memo_is_shared_within_one_evaluation() {
        let mut calc = sheet(&["a = 2", "b = a * a", "c = a + b"]);
        let mut memo = Memo::new();
        let postfix = vec![Token::Variable("c".into())];
        let value = calc
            .evaluate_postfix(&postfix, &InProgress::new(), &mut memo)
            .unwrap();
        assert_eq!(value, 6.0);
        assert_eq!(memo.get("a"), Some(&2.0));
        assert_eq!(memo.get("b"), Some(&4.0));
        assert_eq!(memo.get("c"), Some(&6.0));

        // A memoized value wins over the line it came from
        memo.insert("a".into(), 10.0);
        let postfix = vec![Token::Variable("a".into())];
        let value = calc
            .evaluate_postfix(&postfix, &InProgress::new(), &mut memo)
            .unwrap();
        assert_eq!(value, 10.0);
    }

    #[test]
    fn test_stack_errors() {
        let mut calc = Calculator::new();
        let mut memo = Memo::new();
        let none = InProgress::new();

        assert_eq!(
            calc.evaluate_postfix(&[num(1.0), op("+")], &none, &mut memo),
            Err(Error::arity_error(2, 1, "+"))
        );
        assert_eq!(
            calc.evaluate_postfix(&[num(1.0), num(2.0)], &none, &mut memo),
            Err(Error::ArityMismatch {
                expected: 1,
                got: 2,
                op: None,
            })
        );
        assert_eq!(
            calc.evaluate_postfix(&[Token::Other("(".into())], &none, &mut memo),
            Err(Error::InvalidToken("(".into()))
        );
        assert_eq!(
            calc.evaluate_postfix(&[num(1.0), op("nope")], &none, &mut memo),
            Err(Error::InvalidToken("nope".into()))
        );
    }
}
