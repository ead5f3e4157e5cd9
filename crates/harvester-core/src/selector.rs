//! Selector-like node queries.
//!
//! Supported grammar: type selectors, `*`, `#id`, `.class`, `[attr]`,
//! `[attr=value]` / `[attr="value"]`, compound selectors, the descendant
//! combinator (whitespace) and comma-separated selector lists.

use std::fmt;

use crate::document::Node;
use crate::error::SelectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrFilter {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrFilter>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag {
            if !node.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.id() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| node.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|filter| match (node.attr(&filter.name), &filter.value) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        })
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        Parser::new(source).parse()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node` matches, given its ancestors ordered from the query
    /// root down to the direct parent.
    pub fn matches(&self, node: &Node, ancestors: &[&Node]) -> bool {
        self.alternatives
            .iter()
            .any(|chain| chain_matches(chain, node, ancestors))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn chain_matches(chain: &[Compound], node: &Node, ancestors: &[&Node]) -> bool {
    let Some((last, rest)) = chain.split_last() else {
        return false;
    };
    if !last.matches(node) {
        return false;
    }
    // Descendant-only combinators: matching each remaining compound against
    // the nearest qualifying ancestor is sufficient.
    let mut remaining = rest.iter().rev().peekable();
    for ancestor in ancestors.iter().rev() {
        match remaining.peek() {
            Some(compound) if compound.matches(ancestor) => {
                remaining.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    remaining.peek().is_none()
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn unexpected(&self, offset: usize, found: char) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.source.to_string(),
            offset,
            found,
        }
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        let mut alternatives = Vec::new();
        let mut chain: Vec<Compound> = Vec::new();
        let mut current: Option<Compound> = None;

        while let Some((offset, c)) = self.peek() {
            match c {
                c if c.is_whitespace() => {
                    chain.extend(current.take());
                    self.pos += 1;
                }
                ',' => {
                    chain.extend(current.take());
                    if chain.is_empty() {
                        return Err(self.unexpected(offset, c));
                    }
                    alternatives.push(std::mem::take(&mut chain));
                    self.pos += 1;
                }
                '*' => {
                    if current.is_some() {
                        return Err(self.unexpected(offset, c));
                    }
                    current = Some(Compound::default());
                    self.pos += 1;
                }
                '#' | '.' => {
                    self.pos += 1;
                    let ident = self.ident();
                    if ident.is_empty() {
                        return Err(self.unexpected(offset, c));
                    }
                    let compound = current.get_or_insert_with(Compound::default);
                    if c == '#' {
                        compound.id = Some(ident);
                    } else {
                        compound.classes.push(ident);
                    }
                }
                '[' => {
                    self.pos += 1;
                    let filter = self.attr_filter()?;
                    current
                        .get_or_insert_with(Compound::default)
                        .attrs
                        .push(filter);
                }
                c if is_ident_char(c) => {
                    if current.is_some() {
                        return Err(self.unexpected(offset, c));
                    }
                    let tag = self.ident().to_ascii_lowercase();
                    current = Some(Compound {
                        tag: Some(tag),
                        ..Default::default()
                    });
                }
                _ => return Err(self.unexpected(offset, c)),
            }
        }

        chain.extend(current.take());
        if chain.is_empty() {
            return match self.chars.last() {
                Some(&(offset, c)) if !alternatives.is_empty() => Err(self.unexpected(offset, c)),
                _ => Err(SelectorError::Empty),
            };
        }
        alternatives.push(chain);

        Ok(Selector {
            source: self.source.trim().to_string(),
            alternatives,
        })
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some((_, c)) = self.peek() {
            if !is_ident_char(c) {
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        out
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some((_, c)) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn attr_filter(&mut self) -> Result<AttrFilter, SelectorError> {
        let source = self.source;
        let unterminated = || SelectorError::UnterminatedAttribute(source.to_string());

        self.skip_whitespace();
        let name = self.ident();
        if name.is_empty() {
            return match self.peek() {
                Some((offset, c)) => Err(self.unexpected(offset, c)),
                None => Err(unterminated()),
            };
        }
        self.skip_whitespace();

        let value = match self.peek() {
            Some((_, ']')) => None,
            Some((_, '=')) => {
                self.pos += 1;
                self.skip_whitespace();
                Some(self.attr_value()?)
            }
            Some((offset, c)) => return Err(self.unexpected(offset, c)),
            None => return Err(unterminated()),
        };

        self.skip_whitespace();
        match self.peek() {
            Some((_, ']')) => {
                self.pos += 1;
                Ok(AttrFilter { name, value })
            }
            Some((offset, c)) => Err(self.unexpected(offset, c)),
            None => Err(unterminated()),
        }
    }

    fn attr_value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some((_, quote @ ('"' | '\''))) => {
                self.pos += 1;
                let mut out = String::new();
                while let Some((_, c)) = self.peek() {
                    self.pos += 1;
                    if c == quote {
                        return Ok(out);
                    }
                    out.push(c);
                }
                Err(SelectorError::UnterminatedAttribute(self.source.to_string()))
            }
            _ => Ok(self.ident()),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
