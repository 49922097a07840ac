//! Path-query evaluation.
//!
//! Compiles a location-path expression and evaluates it against a [`Tree`],
//! returning every matching element in document order. The supported grammar
//! is the abbreviated location-path core:
//!
//! - absolute (`/catalog/entry`) and relative (`entry/name`) paths
//! - name steps and the wildcard step (`*`)
//! - `//` for matches at any depth
//! - positional predicates (`entry[2]`, 1-based)
//! - attribute-equality predicates (`entry[@id='x']`)
//!
//! Anything outside this grammar is rejected at compile time with
//! [`XmlError::Query`]. Relative paths are evaluated from the document node,
//! so `catalog/entry` and `/catalog/entry` select the same nodes.

use crate::error::{Result, XmlError};
use crate::tree::{NodeId, Tree};

/// A compiled path expression.
///
/// Compile once with [`PathExpr::compile`] and evaluate any number of times
/// with [`PathExpr::evaluate`], or use the one-shot [`evaluate`] helper.
#[derive(Debug, Clone)]
pub struct PathExpr {
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Direct element children of the context node.
    Child,
    /// All element descendants of the context node (the `//` shorthand).
    Descendant,
}

#[derive(Debug, Clone)]
enum NameTest {
    Name(String),
    Any,
}

#[derive(Debug, Clone)]
enum Predicate {
    /// 1-based position within the step's candidate list.
    Position(usize),
    /// `[@name='value']`
    AttributeEquals { name: String, value: String },
}

impl PathExpr {
    /// Compiles a path expression.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Query`] if the expression is empty or uses syntax
    /// outside the supported grammar.
    pub fn compile(expression: &str) -> Result<Self> {
        Compiler {
            input: expression,
            bytes: expression.as_bytes(),
            pos: 0,
        }
        .compile()
    }

    /// Evaluates the expression against a tree, starting from the document
    /// node. Matches are returned in document order, without duplicates.
    #[must_use]
    pub fn evaluate(&self, tree: &Tree) -> Vec<NodeId> {
        let mut context: Vec<NodeId> = vec![tree.root()];
        for step in &self.steps {
            let mut matched: Vec<NodeId> = Vec::new();
            for &node in &context {
                let candidates: Vec<NodeId> = match step.axis {
                    Axis::Child => tree
                        .children(node)
                        .filter(|&c| step.test.matches(tree, c))
                        .collect(),
                    Axis::Descendant => tree
                        .descendants(node)
                        .filter(|&c| step.test.matches(tree, c))
                        .collect(),
                };
                let selected = apply_predicates(tree, &candidates, &step.predicates);
                for id in selected {
                    if !matched.contains(&id) {
                        matched.push(id);
                    }
                }
            }
            context = matched;
        }
        context.sort_by_cached_key(|&id| document_position(tree, id));
        context
    }
}

impl NameTest {
    fn matches(&self, tree: &Tree, id: NodeId) -> bool {
        match self {
            Self::Any => tree.element_name(id).is_some(),
            Self::Name(name) => tree.element_name(id) == Some(name.as_str()),
        }
    }
}

fn apply_predicates(tree: &Tree, candidates: &[NodeId], predicates: &[Predicate]) -> Vec<NodeId> {
    let mut current: Vec<NodeId> = candidates.to_vec();
    for predicate in predicates {
        current = match predicate {
            Predicate::Position(n) => current
                .iter()
                .enumerate()
                .filter(|(i, _)| i + 1 == *n)
                .map(|(_, &id)| id)
                .collect(),
            Predicate::AttributeEquals { name, value } => current
                .into_iter()
                .filter(|&id| tree.attribute(id, name) == Some(value.as_str()))
                .collect(),
        };
    }
    current
}

/// Pre-order traversal index of a node, used to report query matches in
/// document order even after relocations reshuffled arena order.
fn document_position(tree: &Tree, id: NodeId) -> usize {
    tree.descendants(tree.root())
        .position(|d| d == id)
        .unwrap_or(usize::MAX)
}

/// Compiles and evaluates `expression` in one call.
///
/// # Errors
///
/// Returns [`XmlError::Query`] if the expression cannot be compiled.
pub fn evaluate(tree: &Tree, expression: &str) -> Result<Vec<NodeId>> {
    Ok(PathExpr::compile(expression)?.evaluate(tree))
}

// --- Expression compiler ---

struct Compiler<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Compiler<'_> {
    fn error(&self, message: impl Into<String>) -> XmlError {
        XmlError::Query {
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn compile(mut self) -> Result<PathExpr> {
        if self.input.is_empty() {
            return Err(self.error("empty expression"));
        }

        let mut steps = Vec::new();
        let mut axis = Axis::Child;

        if self.peek() == Some(b'/') {
            self.pos += 1;
            if self.peek() == Some(b'/') {
                self.pos += 1;
                axis = Axis::Descendant;
            }
        }

        loop {
            steps.push(self.parse_step(axis)?);
            match self.peek() {
                None => break,
                Some(b'/') => {
                    self.pos += 1;
                    axis = if self.peek() == Some(b'/') {
                        self.pos += 1;
                        Axis::Descendant
                    } else {
                        Axis::Child
                    };
                }
                Some(c) => {
                    return Err(self.error(format!(
                        "unexpected character `{}' at offset {}",
                        c as char, self.pos
                    )))
                }
            }
        }

        Ok(PathExpr { steps })
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step> {
        let test = if self.peek() == Some(b'*') {
            self.pos += 1;
            NameTest::Any
        } else {
            NameTest::Name(self.parse_name()?)
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(b'[') {
            self.pos += 1;
            predicates.push(self.parse_predicate()?);
            if self.peek() != Some(b']') {
                return Err(self.error("expected `]' to close predicate"));
            }
            self.pos += 1;
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.input[self.pos..].chars().next() {
            if c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.') || !c.is_ascii() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error(format!("expected a step name at offset {start}")));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_predicate(&mut self) -> Result<Predicate> {
        match self.peek() {
            Some(b'@') => {
                self.pos += 1;
                let name = self.parse_name()?;
                if self.peek() != Some(b'=') {
                    return Err(self.error("expected `=' in attribute predicate"));
                }
                self.pos += 1;
                let value = self.parse_string_literal()?;
                Ok(Predicate::AttributeEquals { name, value })
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
                let n: usize = self.input[start..self.pos]
                    .parse()
                    .map_err(|_| self.error("invalid position predicate"))?;
                if n == 0 {
                    return Err(self.error("position predicates are 1-based"));
                }
                Ok(Predicate::Position(n))
            }
            _ => Err(self.error("expected a position or `@attribute=value' predicate")),
        }
    }

    fn parse_string_literal(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(q @ (b'\'' | b'"')) => q,
            _ => return Err(self.error("expected a quoted string in predicate")),
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek() != Some(quote) {
            if self.pos >= self.bytes.len() {
                return Err(self.error("unterminated string in predicate"));
            }
            self.pos += 1;
        }
        let value = self.input[start..self.pos].to_string();
        self.pos += 1;
        Ok(value)
    }
}
