//! Field shapes
//!
//! A [`FieldShape`] describes what a field may hold and, through the codec,
//! how it is written on the wire. Shapes can be built directly or parsed from
//! a type expression such as `dict[str, date | str | float | int]`.
//!
//! Every shape must serialize unambiguously, so untyped collections, `Any`
//! and `object` are rejected, mapping keys must be strings, and union members
//! are put into a deterministic decode order (`datetime`, `date`, `int`, the
//! other scalars and collections, then records).

use crate::value::Value;
use std::collections::BTreeSet;
use std::fmt;
use vellum_core::{Result, VellumError};

/// What a field may hold
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldShape {
    /// `str`
    String,
    /// `int`
    Integer,
    /// `float`
    Float,
    /// `bool`
    Boolean,
    /// `date`
    Date,
    /// `datetime`
    DateTime,
    /// `list[T]` or `tuple[T, ...]`
    List(Box<FieldShape>),
    /// `set[T]` or `frozenset[T]`
    Set(Box<FieldShape>),
    /// `dict[str, T]`
    Map(Box<FieldShape>),
    /// `Optional[T]`
    Optional(Box<FieldShape>),
    /// `A | B | ...`, in decode order
    Union(Vec<FieldShape>),
    /// A record of the named type or any of its subtypes
    Record(String),
    /// `Subclass[Base]`, before registration freezes it
    Subclass(String),
    /// `Subclass[Base]` frozen to the tags registered when its owner was
    OneOf {
        /// The declared base
        base: String,
        /// Tags admitted by the union
        members: BTreeSet<String>,
    },
}

impl FieldShape {
    /// `list[T]`
    pub fn list(inner: FieldShape) -> Self {
        FieldShape::List(Box::new(inner))
    }

    /// `set[T]`
    pub fn set(inner: FieldShape) -> Self {
        FieldShape::Set(Box::new(inner))
    }

    /// `dict[str, T]`
    pub fn map(inner: FieldShape) -> Self {
        FieldShape::Map(Box::new(inner))
    }

    /// `Optional[T]`
    pub fn optional(inner: FieldShape) -> Self {
        match inner {
            FieldShape::Optional(_) => inner,
            other => FieldShape::Optional(Box::new(other)),
        }
    }

    /// A record of `tag` or a subtype
    pub fn record(tag: impl Into<String>) -> Self {
        FieldShape::Record(tag.into())
    }

    /// `Subclass[base]`
    pub fn subclass(base: impl Into<String>) -> Self {
        FieldShape::Subclass(base.into())
    }

    /// A normalized union of `members`
    pub fn union<I: IntoIterator<Item = FieldShape>>(members: I) -> Self {
        normalize_union(members.into_iter().collect(), false)
    }

    /// Parse a type expression
    ///
    /// `field` is used only to label errors.
    pub fn parse(field: &str, expr: &str) -> Result<FieldShape> {
        let mut parser = Parser {
            field,
            tokens: tokenize(field, expr)?,
            pos: 0,
        };
        let shape = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(unsupported(field, format!("trailing input in '{}'", expr)));
        }
        match shape {
            Term::None => Err(unsupported(field, "None is only valid inside a union")),
            Term::Shape(shape) => Ok(shape),
        }
    }

    /// The default a field of this shape takes when none is declared
    pub fn implicit_default(&self) -> Option<Value> {
        match self {
            FieldShape::Optional(_) => Some(Value::Null),
            _ => None,
        }
    }

    /// True for `Optional[T]`
    pub fn is_optional(&self) -> bool {
        matches!(self, FieldShape::Optional(_))
    }

    /// Replace every `Subclass[Base]` with the tags currently registered
    ///
    /// `subtypes` returns `None` when the base itself is unknown.
    pub fn freeze<F>(&self, field: &str, subtypes: &F) -> Result<FieldShape>
    where
        F: Fn(&str) -> Option<BTreeSet<String>>,
    {
        Ok(match self {
            FieldShape::Subclass(base) => {
                let members = subtypes(base).ok_or_else(|| {
                    unsupported(field, format!("Subclass[{}] names an unregistered type", base))
                })?;
                FieldShape::OneOf {
                    base: base.clone(),
                    members,
                }
            }
            FieldShape::List(inner) => FieldShape::list(inner.freeze(field, subtypes)?),
            FieldShape::Set(inner) => FieldShape::set(inner.freeze(field, subtypes)?),
            FieldShape::Map(inner) => FieldShape::map(inner.freeze(field, subtypes)?),
            FieldShape::Optional(inner) => FieldShape::optional(inner.freeze(field, subtypes)?),
            FieldShape::Union(members) => {
                check_union_members(field, members)?;
                FieldShape::Union(
                    members
                        .iter()
                        .map(|m| m.freeze(field, subtypes))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            other => other.clone(),
        })
    }

    /// Check that `value` fits this shape
    pub fn check(&self, value: &Value, path: &str) -> Result<()> {
        let mismatch = || {
            VellumError::invalid_value(
                path,
                format!("expected {}, got {}", self, value.kind_name()),
            )
        };
        match (self, value) {
            (FieldShape::Float, Value::Float(f)) if !f.is_finite() => Err(VellumError::invalid_value(
                path,
                format!("float {} has no JSON representation", f),
            )),
            (FieldShape::String, Value::String(_))
            | (FieldShape::Integer, Value::Int(_))
            | (FieldShape::Float, Value::Float(_))
            | (FieldShape::Boolean, Value::Bool(_))
            | (FieldShape::Date, Value::Date(_))
            | (FieldShape::DateTime, Value::DateTime(_)) => Ok(()),
            (FieldShape::List(inner), Value::List(items)) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| inner.check(item, &format!("{}[{}]", path, i))),
            (FieldShape::Set(inner), Value::Set(items)) => items
                .iter()
                .try_for_each(|item| inner.check(item, &format!("{}[]", path))),
            (FieldShape::Map(inner), Value::Map(entries)) => entries
                .iter()
                .try_for_each(|(k, v)| inner.check(v, &format!("{}.{}", path, k))),
            (FieldShape::Optional(_), Value::Null) => Ok(()),
            (FieldShape::Optional(inner), other) => inner.check(other, path),
            (FieldShape::Union(members), other) => {
                if members.iter().any(|m| m.check(other, path).is_ok()) {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            (FieldShape::Record(tag), Value::Record(record))
            | (FieldShape::Subclass(tag), Value::Record(record)) => {
                if record.descriptor().is_a(tag) {
                    Ok(())
                } else {
                    Err(VellumError::invalid_value(
                        path,
                        format!("{} is not a {}", record.type_tag(), tag),
                    ))
                }
            }
            (FieldShape::OneOf { base, members }, Value::Record(record)) => {
                if members.contains(record.type_tag()) {
                    Ok(())
                } else {
                    Err(VellumError::invalid_value(
                        path,
                        format!("{} is not a member of Subclass[{}]", record.type_tag(), base),
                    ))
                }
            }
            _ => Err(mismatch()),
        }
    }

    fn decode_rank(&self) -> i8 {
        match self {
            FieldShape::DateTime => -2,
            FieldShape::Date | FieldShape::Integer => -1,
            FieldShape::Record(_) | FieldShape::Subclass(_) | FieldShape::OneOf { .. } => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldShape::String => f.write_str("str"),
            FieldShape::Integer => f.write_str("int"),
            FieldShape::Float => f.write_str("float"),
            FieldShape::Boolean => f.write_str("bool"),
            FieldShape::Date => f.write_str("date"),
            FieldShape::DateTime => f.write_str("datetime"),
            FieldShape::List(inner) => write!(f, "list[{}]", inner),
            FieldShape::Set(inner) => write!(f, "set[{}]", inner),
            FieldShape::Map(inner) => write!(f, "dict[str, {}]", inner),
            FieldShape::Optional(inner) => write!(f, "Optional[{}]", inner),
            FieldShape::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", m)?;
                }
                Ok(())
            }
            FieldShape::Record(tag) => f.write_str(tag),
            FieldShape::Subclass(base) | FieldShape::OneOf { base, .. } => {
                write!(f, "Subclass[{}]", base)
            }
        }
    }
}

fn unsupported(field: &str, reason: impl Into<String>) -> VellumError {
    VellumError::UnsupportedFieldShape {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Lists and sets both encode as arrays, so one union cannot hold both.
fn check_union_members(field: &str, members: &[FieldShape]) -> Result<()> {
    let has_list = members.iter().any(|m| matches!(m, FieldShape::List(_)));
    let has_set = members.iter().any(|m| matches!(m, FieldShape::Set(_)));
    if has_list && has_set {
        return Err(unsupported(field, "a union cannot hold both a list and a set"));
    }
    Ok(())
}

fn normalize_union(members: Vec<FieldShape>, mut optional: bool) -> FieldShape {
    let mut flat: Vec<FieldShape> = Vec::with_capacity(members.len());
    let mut stack: Vec<FieldShape> = members.into_iter().rev().collect();
    while let Some(member) = stack.pop() {
        match member {
            FieldShape::Union(inner) => stack.extend(inner.into_iter().rev()),
            FieldShape::Optional(inner) => {
                optional = true;
                stack.push(*inner);
            }
            other => {
                if !flat.contains(&other) {
                    flat.push(other);
                }
            }
        }
    }
    // Stable: members of equal rank keep their declared order.
    flat.sort_by_key(FieldShape::decode_rank);

    let shape = if flat.len() == 1 {
        flat.remove(0)
    } else {
        FieldShape::Union(flat)
    };
    if optional {
        FieldShape::optional(shape)
    } else {
        shape
    }
}

// ============================================================================
// Type expression parser
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Open,
    Close,
    Comma,
    Pipe,
    Ellipsis,
}

fn tokenize(field: &str, expr: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '[' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ']' => {
                chars.next();
                tokens.push(Token::Close);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '.' => {
                let dots: String = std::iter::from_fn(|| chars.next_if_eq(&'.')).collect();
                if dots != "..." {
                    return Err(unsupported(field, format!("unexpected '{}' in '{}'", dots, expr)));
                }
                tokens.push(Token::Ellipsis);
            }
            c if c.is_alphanumeric() || c == '_' => {
                let name: String =
                    std::iter::from_fn(|| chars.next_if(|c| c.is_alphanumeric() || *c == '_' || *c == '.'))
                        .collect();
                tokens.push(Token::Name(name));
            }
            other => {
                return Err(unsupported(field, format!("unexpected '{}' in '{}'", other, expr)));
            }
        }
    }
    Ok(tokens)
}

enum Term {
    None,
    Shape(FieldShape),
}

struct Parser<'a> {
    field: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", token)))
        }
    }

    fn error(&self, reason: impl Into<String>) -> VellumError {
        unsupported(self.field, reason)
    }

    fn expr(&mut self) -> Result<Term> {
        let mut terms = vec![self.term()?];
        while self.eat(&Token::Pipe) {
            terms.push(self.term()?);
        }
        if terms.len() == 1 {
            return Ok(terms.remove(0));
        }
        self.union_of(terms)
    }

    fn union_of(&self, terms: Vec<Term>) -> Result<Term> {
        let mut optional = false;
        let mut members = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Term::None => optional = true,
                Term::Shape(shape) => members.push(shape),
            }
        }
        if members.is_empty() {
            return Err(self.error("union of only None"));
        }
        let shape = normalize_union(members, optional);
        let flat = match &shape {
            FieldShape::Optional(inner) => inner.as_ref(),
            other => other,
        };
        if let FieldShape::Union(members) = flat {
            check_union_members(self.field, members)?;
        }
        Ok(Term::Shape(shape))
    }

    fn shape(&mut self) -> Result<FieldShape> {
        match self.expr()? {
            Term::Shape(shape) => Ok(shape),
            Term::None => Err(self.error("None is only valid inside a union")),
        }
    }

    fn args(&mut self) -> Result<(Vec<Term>, bool)> {
        self.expect(Token::Open)?;
        let mut args = vec![self.expr()?];
        let mut ellipsis = false;
        while self.eat(&Token::Comma) {
            if self.eat(&Token::Ellipsis) {
                ellipsis = true;
                break;
            }
            args.push(self.expr()?);
        }
        self.expect(Token::Close)?;
        Ok((args, ellipsis))
    }

    fn single_arg(&mut self, name: &str) -> Result<FieldShape> {
        let (mut args, ellipsis) = self.args()?;
        if args.len() != 1 || ellipsis {
            return Err(self.error(format!("{} takes exactly one type argument", name)));
        }
        match args.remove(0) {
            Term::Shape(shape) => Ok(shape),
            Term::None => Err(self.error(format!("{}[None] is not persistable", name))),
        }
    }

    fn term(&mut self) -> Result<Term> {
        let name = match self.peek() {
            Some(Token::Name(name)) => name.clone(),
            other => return Err(self.error(format!("expected a type, found {:?}", other))),
        };
        self.pos += 1;
        let parameterized = self.peek() == Some(&Token::Open);

        let shape = match name.as_str() {
            "None" | "NoneType" => return Ok(Term::None),
            "Any" | "object" | "Callable" => {
                return Err(self.error(format!("{} is not a persistable type", name)));
            }
            "str" => FieldShape::String,
            "int" => FieldShape::Integer,
            "float" => FieldShape::Float,
            "bool" => FieldShape::Boolean,
            "date" => FieldShape::Date,
            "datetime" => FieldShape::DateTime,
            "list" | "set" | "frozenset" | "dict" | "FrozenDict" | "tuple" if !parameterized => {
                return Err(self.error(format!("cannot use untyped collection {}", name)));
            }
            "list" => FieldShape::list(self.single_arg(&name)?),
            "set" | "frozenset" => FieldShape::set(self.single_arg(&name)?),
            "tuple" => {
                let (mut args, ellipsis) = self.args()?;
                if args.len() != 1 || !ellipsis {
                    return Err(self.error("only variable-length tuple[T, ...] is supported"));
                }
                match args.remove(0) {
                    Term::Shape(shape) => FieldShape::list(shape),
                    Term::None => return Err(self.error("tuple[None, ...] is not persistable")),
                }
            }
            "dict" | "FrozenDict" => {
                self.expect(Token::Open)?;
                let key = self.shape()?;
                if key != FieldShape::String {
                    return Err(self.error(format!("mapping keys must be str, not {}", key)));
                }
                self.expect(Token::Comma)?;
                let value = self.shape()?;
                self.expect(Token::Close)?;
                FieldShape::map(value)
            }
            "Optional" => FieldShape::optional(self.single_arg(&name)?),
            "Union" => {
                let (args, ellipsis) = self.args()?;
                if ellipsis {
                    return Err(self.error("Union does not take '...'"));
                }
                return self.union_of(args);
            }
            "Subclass" => {
                self.expect(Token::Open)?;
                let base = match self.peek() {
                    Some(Token::Name(base)) => base.clone(),
                    _ => return Err(self.error("Subclass expects a record type name")),
                };
                self.pos += 1;
                self.expect(Token::Close)?;
                FieldShape::subclass(base)
            }
            _ if parameterized => {
                return Err(self.error(format!("unknown generic type {}", name)));
            }
            _ => FieldShape::record(name),
        };
        Ok(Term::Shape(shape))
    }
}
