//! Object masks: which properties and relationships a call should return.
//!
//! A mask can be written as the string shorthand accepted by the API (`"id,hostname,
//! datacenter.name"`, optionally wrapped as `mask[...]` or `mask(Type)[...]` and with bracketed
//! groups such as `datacenter[id,name]`), built with [`Mask::field`], or given as a legacy nested
//! struct (`{"datacenter": {"name": nil}}`). All of them normalize to the same [`Mask`] and so to
//! the same canonical string on the wire.

use crate::{Error, Value};

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A normalized object mask.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mask {
    kind: Option<String>,
    root: Node,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Node {
    children: BTreeMap<String, Node>,
}

impl Node {
    fn insert_path<'a, I: Iterator<Item = &'a str>>(&mut self, mut path: I) -> &mut Node {
        match path.next() {
            Some(segment) => self
                .children
                .entry(segment.to_string())
                .or_default()
                .insert_path(path),
            None => self,
        }
    }

    fn merge(&mut self, other: Node) {
        for (name, child) in other.children {
            self.children.entry(name).or_default().merge(child);
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        out.push_str(name);
        match self.children.len() {
            0 => {}
            1 => {
                // a single child is written as a dotted path
                for (child_name, child) in &self.children {
                    out.push('.');
                    child.render(child_name, out);
                }
            }
            _ => {
                out.push('[');
                self.render_children(out);
                out.push(']');
            }
        }
    }

    fn render_children(&self, out: &mut String) {
        for (i, (name, child)) in self.children.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            child.render(name, out);
        }
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, child) in &self.children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", prefix, name)
            };
            if child.children.is_empty() {
                out.push(path);
            } else {
                child.collect_paths(&path, out);
            }
        }
    }

    fn to_value(&self) -> Value {
        Value::Struct(
            self.children
                .iter()
                .map(|(name, child)| {
                    let value = if child.children.is_empty() {
                        Value::Nil
                    } else {
                        child.to_value()
                    };
                    (name.clone(), value)
                })
                .collect(),
        )
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn check_ident(name: &str) -> Result<(), String> {
    if name.is_empty() {
        Err("empty property name".to_string())
    } else if let Some(bad) = name.chars().find(|c| !is_ident_char(*c)) {
        Err(format!("unexpected character {:?} in property name {:?}", bad, name))
    } else {
        Ok(())
    }
}

impl Mask {
    /// Creates an empty mask. At least one field must be added before it can be sent.
    pub fn new() -> Self {
        Mask::default()
    }

    /// Adds a property, given as a dotted path through relationships (`"datacenter.name"`).
    pub fn field(mut self, path: &str) -> Result<Self, Error> {
        for segment in path.split('.') {
            check_ident(segment.trim()).map_err(|reason| invalid(path, &reason))?;
        }
        self.root.insert_path(path.split('.').map(str::trim));
        Ok(self)
    }

    /// Restricts the mask to a specific type, rendered as `mask(Type)[...]`.
    pub fn of_type(mut self, kind: &str) -> Result<Self, Error> {
        check_ident(kind).map_err(|reason| invalid(kind, &reason))?;
        self.kind = Some(kind.to_string());
        Ok(self)
    }

    /// Parses the string shorthand.
    ///
    /// A leading `mask[...]` or `mask(Type)[...]` is taken as the wrapper, not as a property named
    /// `mask`. Outside that position `mask` is an ordinary property, so `"mask.id"` selects the
    /// `id` of a `mask` relationship, the same as `Mask::new().field("mask.id")`.
    pub fn parse(input: &str) -> Result<Self, Error> {
        MaskParser::new(input).parse().map_err(|reason| invalid(input, &reason))
    }

    /// Converts a legacy nested struct mask.
    ///
    /// Every member names a property; its value is either a nested struct selecting properties of
    /// that relationship, or `nil`, `true` or an empty struct for a plain property. A string value
    /// is parsed as shorthand.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        match *value {
            Value::String(ref text) => Mask::parse(text),
            Value::Struct(_) => {
                let mut root = Node::default();
                node_from_value(value, &mut root, "")?;
                let mask = Mask { kind: None, root };
                mask.validate()?;
                Ok(mask)
            }
            ref other => Err(Error::invalid_argument(format!(
                "object mask must be a string or a struct, got {:?}",
                other
            ))),
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Returns every selected leaf property as a dotted path, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_paths("", &mut out);
        out
    }

    /// Returns the mask as a nested struct (the legacy structured form).
    pub fn to_struct(&self) -> Value {
        self.root.to_value()
    }

    /// Returns the `SoftLayer_ObjectMask` header value: `{mask: "mask[...]"}`.
    pub fn to_header(&self) -> Value {
        vec![("mask", self.to_string())].into_iter().collect()
    }

    /// Decodes a `SoftLayer_ObjectMask` header value.
    pub fn from_header(header: &Value) -> Result<Self, Error> {
        match header.get("mask") {
            Some(mask) => Mask::from_value(mask),
            None => Err(Error::invalid_argument("object mask header has no `mask` member")),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::invalid_argument("object mask must select at least one property"));
        }
        Ok(())
    }
}

fn invalid(input: &str, reason: &str) -> Error {
    Error::invalid_argument(format!("invalid object mask {:?}: {}", input, reason))
}

fn node_from_value(value: &Value, node: &mut Node, prefix: &str) -> Result<(), Error> {
    let map = match value.as_struct() {
        Some(map) => map,
        None => return Ok(()),
    };
    for (name, child) in map {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        for segment in name.split('.') {
            check_ident(segment).map_err(|reason| invalid(&path, &reason))?;
        }
        let child_node = node.insert_path(name.split('.'));
        match *child {
            Value::Nil | Value::Bool(true) => {}
            Value::Struct(_) => node_from_value(child, child_node, &path)?,
            ref other => {
                return Err(Error::invalid_argument(format!(
                    "invalid object mask entry {:?}: expected nil or a struct, got {:?}",
                    path, other
                )))
            }
        }
    }
    Ok(())
}

impl Display for Mask {
    /// Writes the canonical wire form, `mask[...]` or `mask(Type)[...]`.
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut out = String::from("mask");
        if let Some(ref kind) = self.kind {
            out.push('(');
            out.push_str(kind);
            out.push(')');
        }
        out.push('[');
        self.root.render_children(&mut out);
        out.push(']');
        f.write_str(&out)
    }
}

impl FromStr for Mask {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Mask::parse(s)
    }
}

/// Recursive descent parser for the mask shorthand.
struct MaskParser {
    chars: Vec<char>,
    pos: usize,
}

impl MaskParser {
    fn new(input: &str) -> Self {
        MaskParser {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).map_or(false, |c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).cloned()
    }

    fn eat(&mut self, expected: char) -> Result<(), String> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(format!("expected {:?} at offset {}, found {:?}", expected, self.pos, c)),
            None => Err(format!("expected {:?}, found end of input", expected)),
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        self.skip_ws();
        let start = self.pos;
        while self.chars.get(self.pos).map_or(false, |c| is_ident_char(*c)) {
            self.pos += 1;
        }
        if start == self.pos {
            return match self.chars.get(self.pos) {
                Some(c) => Err(format!("expected a property name at offset {}, found {:?}", self.pos, c)),
                None => Err("expected a property name, found end of input".to_string()),
            };
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    /// Returns `true` if the input starts with the `mask` keyword followed by `[` or `(`.
    fn has_mask_prefix(&mut self) -> bool {
        self.skip_ws();
        let keyword: Vec<char> = "mask".chars().collect();
        if !self.chars[self.pos..].starts_with(&keyword) {
            return false;
        }
        let rest = self.chars[self.pos + keyword.len()..]
            .iter()
            .find(|c| !c.is_whitespace())
            .copied();
        matches!(rest, Some('[') | Some('('))
    }

    fn parse(mut self) -> Result<Mask, String> {
        let mut mask = Mask::default();

        if self.has_mask_prefix() {
            self.pos += "mask".len();
            if self.peek() == Some('(') {
                self.pos += 1;
                mask.kind = Some(self.ident()?);
                self.eat(')')?;
            }
            self.eat('[')?;
            self.list(&mut mask.root)?;
            self.eat(']')?;
        } else if self.peek() == Some('[') {
            self.pos += 1;
            self.list(&mut mask.root)?;
            self.eat(']')?;
        } else {
            self.list(&mut mask.root)?;
        }

        if let Some(c) = self.peek() {
            return Err(format!("unexpected {:?} at offset {}", c, self.pos));
        }
        Ok(mask)
    }

    fn list(&mut self, node: &mut Node) -> Result<(), String> {
        loop {
            self.item(node)?;
            match self.peek() {
                Some(',') => self.pos += 1,
                _ => return Ok(()),
            }
        }
    }

    fn item(&mut self, node: &mut Node) -> Result<(), String> {
        let mut path = vec![self.ident()?];
        while self.peek() == Some('.') {
            self.pos += 1;
            path.push(self.ident()?);
        }

        let mut group = Node::default();
        if self.peek() == Some('[') {
            self.pos += 1;
            self.list(&mut group)?;
            self.eat(']')?;
        }

        node.insert_path(path.iter().map(String::as_str)).merge(group);
        Ok(())
    }
}

/// An object mask as passed to a call, before normalization.
#[derive(Clone, Debug, PartialEq)]
pub enum MaskArg {
    /// The string shorthand.
    Text(String),
    /// An already structured mask.
    Structured(Mask),
    /// A legacy nested struct.
    Value(Value),
}

impl MaskArg {
    /// Normalizes the argument, failing with [`Error::InvalidArgument`] if it is malformed.
    pub fn normalize(&self) -> Result<Mask, Error> {
        let mask = match *self {
            MaskArg::Text(ref text) => Mask::parse(text)?,
            MaskArg::Structured(ref mask) => mask.clone(),
            MaskArg::Value(ref value) => Mask::from_value(value)?,
        };
        mask.validate()?;
        Ok(mask)
    }
}

impl<'a> From<&'a str> for MaskArg {
    fn from(text: &'a str) -> Self {
        MaskArg::Text(text.to_string())
    }
}

impl From<String> for MaskArg {
    fn from(text: String) -> Self {
        MaskArg::Text(text)
    }
}

impl From<Mask> for MaskArg {
    fn from(mask: Mask) -> Self {
        MaskArg::Structured(mask)
    }
}

impl From<Value> for MaskArg {
    fn from(value: Value) -> Self {
        MaskArg::Value(value)
    }
}
