//! End-to-end tests of the host contract: insert, parse, format, evaluate, remove.

#![expect(clippy::unwrap_used)] // test code OK

use livecalc::{Calculator, Error, FormatConfig, LineKind, Token};

/// Build a calculator with one line per text
fn worksheet(lines: &[&str]) -> Calculator {
    let mut calc = Calculator::new();
    for (index, text) in lines.iter().enumerate() {
        assert_eq!(calc.add_line(), index);
        let _ = calc.parse_line(text, index);
    }
    calc
}

fn formatted(calc: &mut Calculator) -> Vec<String> {
    (0..calc.line_count())
        .map(|index| match calc.get_formatted_line(index) {
            Ok(text) => text,
            Err(e) => format!("Error: {e}"),
        })
        .collect()
}

#[test]
fn test_mortgage_style_sheet() {
    let mut calc = worksheet(&[
        "principal = 200000",
        "rate = 6% / 12",
        "n = 30 * 12",
        "payment(p, r, k) = p r / (1 - (1 + r)^(0 - k))",
        "payment(principal, rate, n)",
    ]);

    let monthly = calc.evaluate().unwrap();
    assert!((monthly - 1199.10).abs() < 1e-2, "got {monthly}");

    let lines = formatted(&mut calc);
    assert_eq!(lines[1], "rate = 6 % 12 /");
    assert_eq!(lines[3], "payment(p, r, k) = p r * 1 1 r + 0 k - ^ - /");
}

#[test]
fn test_lines_can_be_written_in_any_order() {
    let mut calc = worksheet(&["area(r)", "area(x) = pi x^2", "r = 2"]);

    // The first line failed when it was entered and is repaired on demand
    assert!(calc.line(0).unwrap().is_failed());
    let value = calc.evaluate_at(0).unwrap();
    assert!((value - 4.0 * std::f64::consts::PI).abs() < 1e-12);
    assert!(!calc.line(0).unwrap().is_failed());
}

#[test]
fn test_line_views() {
    let calc = worksheet(&["f(a, b) = a + b", "x = f(1, 2)", "x 2"]);

    let function = calc.line(0).unwrap();
    assert_eq!(function.kind(), LineKind::Function);
    assert_eq!(function.identifier(), Some("f"));
    assert_eq!(function.parameters(), ["a", "b"]);
    assert_eq!(
        function.postfix(),
        [
            Token::Variable("a".into()),
            Token::Variable("b".into()),
            Token::Function("+".into()),
        ]
    );

    let variable = calc.line(1).unwrap();
    assert_eq!(variable.kind(), LineKind::Variable);
    assert!(variable.parameters().is_empty());
    // Stored postfix keeps the call; it is only inlined when formatted or evaluated
    assert_eq!(
        variable.postfix().last(),
        Some(&Token::UserFunction("f".into()))
    );

    let expression = calc.line(2).unwrap();
    assert_eq!(expression.kind(), LineKind::Expression);
    assert_eq!(expression.identifier(), None);
}

#[test]
fn test_editing_cycle() {
    let mut calc = worksheet(&["a = 1", "b = a + 1", "a b"]);
    assert_eq!(formatted(&mut calc), ["a = 1", "b = a 1 +", "2"]);

    // Change a definition; dependents see the new value
    calc.parse_line("a = 4", 0).unwrap();
    assert_eq!(calc.get_formatted_line(2).unwrap(), "20");

    // Insert a line between, then use it
    calc.insert_line(1).unwrap();
    calc.parse_line("c = 10", 1).unwrap();
    calc.parse_line("a b c", 3).unwrap();
    assert_eq!(calc.get_formatted_line(3).unwrap(), "200");

    // Rename `a`; `b` now refers to nothing
    calc.parse_line("z = 4", 0).unwrap();
    assert_eq!(
        calc.get_formatted_line(3),
        Err(Error::UndefinedIdentifier("a".into()))
    );

    // Removing the last line makes the previous one the evaluated line
    calc.remove_line(3).unwrap();
    assert_eq!(calc.line_count(), 3);
    assert_eq!(calc.evaluate(), Err(Error::UndefinedIdentifier("a".into())));
    calc.parse_line("b = z + 1", 2).unwrap();
    assert_eq!(calc.evaluate().unwrap(), 5.0);
}

#[test]
fn test_errors_are_scoped_to_their_line() {
    let mut calc = worksheet(&["x = 2", "x = 3", "1 +* 2", "x 5"]);
    let lines = formatted(&mut calc);
    assert_eq!(lines[0], "x = 2");
    assert_eq!(lines[1], "Error: x cannot be defined twice");
    assert!(
        lines[2].starts_with("Error: Wrong number of arguments"),
        "{}",
        lines[2]
    );
    assert_eq!(lines[3], "10");
}

#[test]
fn test_configured_precision() {
    let mut calc = Calculator::with_config(FormatConfig { precision: Some(2) });
    calc.add_line();
    calc.parse_line("2 / 3", 0).unwrap();
    assert_eq!(calc.get_formatted_line(0).unwrap(), "0.67");
    // Precision only affects rendering
    assert_eq!(calc.evaluate().unwrap(), 2.0 / 3.0);
}
