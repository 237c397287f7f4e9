//! The engine object a host owns.
//!
//! [`Calculator`] ties the pieces together: it parses edited lines into the registry,
//! repairs failed lines on demand, and formats or evaluates lines for display.

use crate::Error;
use crate::definition::split_line;
use crate::evaluator::{InProgress, Memo};
use crate::postfix::compile;
use crate::registry::{InputLine, LineKind, LineRegistry};
use crate::token::{format_number, format_postfix};
use crate::tokenizer::tokenize;
use tracing::debug;

/// How numbers are rendered by [`Calculator::get_formatted_line`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatConfig {
    /// Fixed number of decimals, or `None` for the shortest text that reads back to
    /// the same value
    pub precision: Option<usize>,
}

impl FormatConfig {
    /// Fixed six decimals, the way results were always shown on a calculator screen
    pub fn six_decimals() -> Self {
        FormatConfig { precision: Some(6) }
    }
}

/// A worksheet of input lines together with the engine that parses and evaluates them
///
/// The calculator is owned by its host; nothing is global except the built-in tables.
/// Line indices are zero-based. Formatting and evaluating take `&mut self` because a
/// line that previously failed to parse is retried on demand.
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    pub(crate) registry: LineRegistry,
    evaluate_line: Option<usize>,
    config: FormatConfig,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FormatConfig) -> Self {
        Calculator {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> FormatConfig {
        self.config
    }

    pub fn line_count(&self) -> usize {
        self.registry.len()
    }

    /// Read-only view of a line
    pub fn line(&self, index: usize) -> Option<&InputLine> {
        self.registry.get(index)
    }

    /// Create an empty line at `index`; `index == line_count()` appends
    pub fn insert_line(&mut self, index: usize) -> Result<(), Error> {
        self.registry.insert(index)?;
        if let Some(selected) = self.evaluate_line
            && index <= selected
        {
            self.evaluate_line = Some(selected + 1);
        }
        debug!(line = index, lines = self.registry.len(), "inserted line");
        Ok(())
    }

    /// Append an empty line and return its index
    pub fn add_line(&mut self) -> usize {
        let index = self.registry.push();
        debug!(line = index, lines = self.registry.len(), "appended line");
        index
    }

    /// Delete the line at `index` and whatever name it defined
    pub fn remove_line(&mut self, index: usize) -> Result<(), Error> {
        let removed = self.registry.remove(index)?;
        self.evaluate_line = match self.evaluate_line {
            Some(selected) if selected == index => None,
            Some(selected) if selected > index => Some(selected - 1),
            other => other,
        };
        debug!(
            line = index,
            identifier = removed.identifier(),
            lines = self.registry.len(),
            "removed line"
        );
        Ok(())
    }

    /// Line evaluated by [`Calculator::evaluate`], or `None` for the last line
    pub fn evaluate_line(&self) -> Option<usize> {
        self.evaluate_line
    }

    pub fn set_evaluate_line(&mut self, index: Option<usize>) -> Result<(), Error> {
        if let Some(index) = index {
            self.registry.line(index)?;
        }
        self.evaluate_line = index;
        Ok(())
    }

    /// Value of the selected line, or of the last line when none is selected
    pub fn evaluate(&mut self) -> Result<f64, Error> {
        let index = match self.evaluate_line {
            Some(index) => index,
            None => self
                .registry
                .len()
                .checked_sub(1)
                .ok_or(Error::LineOutOfRange { index: 0, len: 0 })?,
        };
        self.evaluate_at(index)
    }

    /// Parse `text` into the line at `index`
    ///
    /// On failure the line is left failed, holding `text` for a later retry. A
    /// definition whose head parsed keeps its name bound even if the right-hand side
    /// failed, so lines referring to it retry it when they are evaluated.
    pub fn parse_line(&mut self, text: &str, index: usize) -> Result<(), Error> {
        let result = self.compile_line(text, index);
        match &result {
            Ok(()) => debug!(line = index, text, "parsed line"),
            Err(error) => debug!(line = index, text, %error, "line failed to parse"),
        }
        result
    }

    fn compile_line(&mut self, text: &str, index: usize) -> Result<(), Error> {
        self.registry.line(index)?;
        self.registry.release(index);

        let line = self.registry.line_mut(index)?;
        *line = InputLine {
            source: Some(text.to_owned()),
            failed: true,
            ..InputLine::default()
        };

        let parts = split_line(text)?;
        let parameters = match parts.head {
            Some(head) => {
                self.registry.bind(head.kind, &head.name, index)?;
                let line = self.registry.line_mut(index)?;
                line.kind = head.kind;
                line.identifier = Some(head.name);
                line.parameters = head.parameters.clone();
                head.parameters
            }
            None => Vec::new(),
        };

        let lexemes = tokenize(parts.body, &parameters, &self.registry)?;
        let postfix = compile(lexemes)?;

        let line = self.registry.line_mut(index)?;
        line.postfix = postfix;
        line.failed = false;
        line.source = None;
        Ok(())
    }

    /// Re-parse the line at `index` from its kept text if it is failed
    pub(crate) fn repair_line(&mut self, index: usize) -> Result<(), Error> {
        let line = self.registry.line(index)?;
        if !line.failed {
            return Ok(());
        }
        let source = line.source.clone().unwrap_or_default();
        debug!(line = index, text = %source, "retrying failed line");
        self.parse_line(&source, index)
    }

    /// Numeric value of an expression or variable line
    pub fn evaluate_at(&mut self, index: usize) -> Result<f64, Error> {
        self.repair_line(index)?;
        let line = self.registry.line(index)?;
        let postfix = line.postfix.clone();

        let mut in_progress = InProgress::new();
        match (line.kind, &line.identifier) {
            (LineKind::Function, Some(name)) => {
                return Err(Error::MissingArguments {
                    function: name.clone(),
                    expected: line.parameters.len(),
                    got: 0,
                });
            }
            (LineKind::Variable, Some(name)) => {
                in_progress.insert(name.clone());
            }
            _ => {}
        }

        self.evaluate_postfix(&postfix, &in_progress, &mut Memo::new())
    }

    /// Text shown for the line at `index`
    ///
    /// An expression renders as its value. A definition renders as its head followed by
    /// its right-hand side in postfix, with every user function call inlined:
    /// `f(a, b) = a b -`.
    pub fn get_formatted_line(&mut self, index: usize) -> Result<String, Error> {
        self.repair_line(index)?;
        let line = self.registry.line(index)?;
        let name = match line.kind {
            LineKind::Expression => None,
            LineKind::Variable | LineKind::Function => line.identifier.clone(),
        };
        let Some(name) = name else {
            let value = self.evaluate_at(index)?;
            return Ok(format_number(value, self.config.precision));
        };

        let line = self.registry.line(index)?;
        let head = if line.parameters.is_empty() {
            name.clone()
        } else {
            format!("{name}({})", line.parameters.join(", "))
        };
        let postfix = line.postfix.clone();

        let mut in_progress = InProgress::new();
        in_progress.insert(name);
        let expanded = self.expand(&postfix, &in_progress)?;

        if expanded.is_empty() {
            Ok(format!("{head} ="))
        } else {
            Ok(format!(
                "{head} = {}",
                format_postfix(&expanded, self.config.precision)
            ))
        }
    }
}
