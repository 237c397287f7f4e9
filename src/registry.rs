//! The ordered input lines and their identifier bindings.
//!
//! The registry owns every [`InputLine`] plus two maps, variable name to line index and
//! function name to line index. An identifier is bound by at most one line, and both
//! maps are re-indexed whenever lines are inserted or removed so they always point at
//! the line that defined the name.

use crate::Error;
use crate::token::Token;
use std::collections::HashMap;

/// What a line defines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineKind {
    /// `name = expr`
    Variable,
    /// `name(a, b) = expr`
    Function,
    /// A free-standing expression
    #[default]
    Expression,
}

/// One line of the worksheet
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputLine {
    pub(crate) kind: LineKind,
    pub(crate) identifier: Option<String>,
    pub(crate) parameters: Vec<String>,
    pub(crate) postfix: Vec<Token>,
    pub(crate) source: Option<String>,
    pub(crate) failed: bool,
}

impl InputLine {
    pub fn kind(&self) -> LineKind {
        self.kind
    }

    /// Name defined by the line, if it is a definition
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Formal parameters of a function definition
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Compiled right-hand side; only meaningful while the line is not failed
    pub fn postfix(&self) -> &[Token] {
        &self.postfix
    }

    /// Raw text kept for a later retry while the line is failed
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Ordered lines plus identifier-to-line bindings
#[derive(Debug, Clone, Default)]
pub struct LineRegistry {
    lines: Vec<InputLine>,
    variables: HashMap<String, usize>,
    functions: HashMap<String, usize>,
}

impl LineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InputLine> {
        self.lines.get(index)
    }

    pub(crate) fn line(&self, index: usize) -> Result<&InputLine, Error> {
        self.lines.get(index).ok_or(Error::LineOutOfRange {
            index,
            len: self.lines.len(),
        })
    }

    pub(crate) fn line_mut(&mut self, index: usize) -> Result<&mut InputLine, Error> {
        let len = self.lines.len();
        self.lines
            .get_mut(index)
            .ok_or(Error::LineOutOfRange { index, len })
    }

    /// Create an empty line at `index`, shifting every later line (and its binding) up
    pub fn insert(&mut self, index: usize) -> Result<(), Error> {
        if index > self.lines.len() {
            return Err(Error::LineOutOfRange {
                index,
                len: self.lines.len(),
            });
        }

        for bound in self
            .variables
            .values_mut()
            .chain(self.functions.values_mut())
        {
            if *bound >= index {
                *bound += 1;
            }
        }
        self.lines.insert(index, InputLine::default());
        Ok(())
    }

    /// Append an empty line; nothing is bound past the end, so no binding moves
    pub fn push(&mut self) -> usize {
        self.lines.push(InputLine::default());
        self.lines.len() - 1
    }

    /// Delete the line at `index` together with its binding, shifting every later
    /// line (and its binding) down
    pub fn remove(&mut self, index: usize) -> Result<InputLine, Error> {
        self.line(index)?;
        self.release(index);

        for bound in self
            .variables
            .values_mut()
            .chain(self.functions.values_mut())
        {
            if *bound > index {
                *bound -= 1;
            }
        }
        Ok(self.lines.remove(index))
    }

    /// Drop whatever binding the line at `index` owns
    pub(crate) fn release(&mut self, index: usize) {
        let Some(line) = self.lines.get(index) else {
            return;
        };
        let Some(name) = &line.identifier else {
            return;
        };

        let map = match line.kind {
            LineKind::Variable => &mut self.variables,
            LineKind::Function => &mut self.functions,
            LineKind::Expression => return,
        };
        if map.get(name) == Some(&index) {
            map.remove(name);
        }
    }

    /// Bind `name` to the line at `index`
    ///
    /// Fails if another line already owns the name, in either namespace.
    pub(crate) fn bind(&mut self, kind: LineKind, name: &str, index: usize) -> Result<(), Error> {
        if let Some(owner) = self.owner_of(name)
            && owner != index
        {
            return Err(Error::DuplicateIdentifier(name.to_owned()));
        }

        match kind {
            LineKind::Variable => {
                self.variables.insert(name.to_owned(), index);
            }
            LineKind::Function => {
                self.functions.insert(name.to_owned(), index);
            }
            LineKind::Expression => {}
        }
        Ok(())
    }

    /// Line that binds `name`, as either a variable or a function
    pub fn owner_of(&self, name: &str) -> Option<usize> {
        self.variables
            .get(name)
            .or_else(|| self.functions.get(name))
            .copied()
    }

    /// Line that defines the variable `name`
    pub fn variable_line(&self, name: &str) -> Option<usize> {
        self.variables.get(name).copied()
    }

    /// Line that defines the function `name`
    pub fn function_line(&self, name: &str) -> Option<usize> {
        self.functions.get(name).copied()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}
