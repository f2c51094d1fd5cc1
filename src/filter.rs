//! Object filters: structured predicates restricting the objects a call returns.
//!
//! A filter maps property names either to a [`Predicate`] or to a nested filter applied to a
//! relationship, so `{"virtualGuests": {"hostname": {"operation": "^= web"}}}` selects accounts'
//! guests whose hostname starts with `web`.

use crate::{Error, Value};

use std::collections::BTreeMap;

const OPERATION: &str = "operation";
const OPTIONS: &str = "options";

/// Operators understood by the query shorthand, longest first where prefixes overlap.
const KNOWN_OPERATIONS: &[&str] = &["<=", ">=", "<", ">", "!~", "~", "*=", "^=", "$=", "_="];

/// Sort direction for [`Predicate::order_by`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// A named option of a predicate, such as `{name: "startDate", value: [...]}`.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterOption {
    pub name: String,
    pub value: Value,
}

/// The condition applied to a single property.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predicate {
    operation: Option<Value>,
    options: Vec<FilterOption>,
}

impl Predicate {
    /// A predicate with the given operation, for example `"_= web1"` or `42`.
    pub fn new<V: Into<Value>>(operation: V) -> Self {
        Predicate {
            operation: Some(operation.into()),
            options: Vec::new(),
        }
    }

    /// Appends an option.
    pub fn option<N: Into<String>, V: Into<Value>>(mut self, name: N, value: V) -> Self {
        self.options.push(FilterOption {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Builds a predicate from the query shorthand.
    ///
    /// Integers match exactly, a leading operator (`<=`, `>=`, `<`, `>`, `~`, `!~`, `*=`, `^=`,
    /// `$=`, `_=`) is kept, `*abc*` becomes a substring match, `abc*` a prefix match, `*abc` a
    /// suffix match, and anything else a case-insensitive equality match.
    pub fn query(query: &str) -> Self {
        let query = query.trim();

        if let Ok(number) = query.parse::<i64>() {
            let value = match i32::try_from(number) {
                Ok(small) => Value::Int(small),
                Err(_) => Value::Int64(number),
            };
            return Predicate::new(value);
        }

        for operation in KNOWN_OPERATIONS {
            if let Some(rest) = query.strip_prefix(operation) {
                return Predicate::new(format!("{} {}", operation, rest.trim()));
            }
        }

        let operation = if query.len() > 1 && query.starts_with('*') && query.ends_with('*') {
            format!("*= {}", query.trim_matches('*'))
        } else if query.starts_with('*') {
            format!("$= {}", query.trim_start_matches('*'))
        } else if query.ends_with('*') {
            format!("^= {}", query.trim_end_matches('*'))
        } else {
            format!("_= {}", query)
        };
        Predicate::new(operation)
    }

    /// Matches dates between `start` and `end` (both `YYYY-MM-DD`).
    pub fn between_dates(start: &str, end: &str) -> Result<Self, Error> {
        Ok(Predicate::new("betweenDate")
            .option("startDate", vec![Value::from(format!("{} 0:0:0", api_date(start)?))])
            .option("endDate", vec![Value::from(format!("{} 0:0:0", api_date(end)?))]))
    }

    /// Orders the results by this property.
    pub fn order_by(order: Order) -> Self {
        let direction = match order {
            Order::Ascending => "ASC",
            Order::Descending => "DESC",
        };
        Predicate::new("orderBy").option("sort", vec![Value::from(direction)])
    }

    pub fn operation(&self) -> Option<&Value> {
        self.operation.as_ref()
    }

    pub fn options(&self) -> &[FilterOption] {
        &self.options
    }

    fn validate(&self, path: &str) -> Result<(), Error> {
        if self.operation.is_none() && self.options.is_empty() {
            return Err(invalid(path, "predicate needs an operation or options"));
        }
        if let Some(ref operation) = self.operation {
            check_operation(path, operation)?;
        }
        for option in &self.options {
            if option.name.is_empty() {
                return Err(invalid(path, "option name must not be empty"));
            }
        }
        Ok(())
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        if let Some(ref operation) = self.operation {
            map.insert(OPERATION.to_string(), operation.clone());
        }
        if !self.options.is_empty() {
            let options: Vec<Value> = self
                .options
                .iter()
                .map(|option| {
                    vec![
                        ("name", Value::from(option.name.as_str())),
                        ("value", option.value.clone()),
                    ]
                    .into_iter()
                    .collect::<Value>()
                })
                .collect();
            map.insert(OPTIONS.to_string(), Value::Array(options));
        }
        Value::Struct(map)
    }

    fn from_map(path: &str, map: &BTreeMap<String, Value>) -> Result<Self, Error> {
        let mut predicate = Predicate::default();
        for (key, value) in map {
            match key.as_str() {
                OPERATION => predicate.operation = Some(value.clone()),
                OPTIONS => {
                    let options = value
                        .as_array()
                        .ok_or_else(|| invalid(path, "`options` must be an array"))?;
                    for option in options {
                        predicate.options.push(option_from_value(path, option)?);
                    }
                }
                other => {
                    return Err(invalid(
                        path,
                        &format!("predicate mixes `operation`/`options` with property {:?}", other),
                    ))
                }
            }
        }
        predicate.validate(path)?;
        Ok(predicate)
    }
}

fn option_from_value(path: &str, option: &Value) -> Result<FilterOption, Error> {
    let map = option
        .as_struct()
        .ok_or_else(|| invalid(path, "each option must be a struct"))?;
    if map.keys().any(|key| key != "name" && key != "value") {
        return Err(invalid(path, "options may only have `name` and `value` members"));
    }
    let name = map
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(path, "option is missing a string `name`"))?;
    let value = map
        .get("value")
        .ok_or_else(|| invalid(path, "option is missing a `value`"))?;
    Ok(FilterOption {
        name: name.to_string(),
        value: value.clone(),
    })
}

fn check_operation(path: &str, operation: &Value) -> Result<(), Error> {
    match *operation {
        Value::Struct(_) | Value::Array(_) | Value::Nil | Value::Base64(_) => {
            Err(invalid(path, "operation must be a scalar"))
        }
        _ => Ok(()),
    }
}

fn api_date(date: &str) -> Result<String, Error> {
    match iso8601::date(date.trim()) {
        Ok(iso8601::Date::YMD { year, month, day }) => Ok(format!("{}/{}/{}", month, day, year)),
        _ => Err(Error::invalid_argument(format!("expected a YYYY-MM-DD date, got {:?}", date))),
    }
}

fn invalid(path: &str, reason: &str) -> Error {
    if path.is_empty() {
        Error::invalid_argument(format!("invalid object filter: {}", reason))
    } else {
        Error::invalid_argument(format!("invalid object filter at {:?}: {}", path, reason))
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// A node of a filter: a condition on the property, or a filter on the related object(s).
#[derive(Clone, Debug, PartialEq)]
pub enum FilterNode {
    Predicate(Predicate),
    Nested(Filter),
}

/// A structured object filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    nodes: BTreeMap<String, FilterNode>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    /// Sets the predicate for a property, given as a dotted path through relationships.
    ///
    /// Intermediate filters are created as needed. Fails if the path is empty or passes through a
    /// property that already has a predicate.
    pub fn set(mut self, path: &str, predicate: Predicate) -> Result<Self, Error> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid(path, "empty property name in path"));
        }
        predicate.validate(path)?;

        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(invalid(path, "empty path")),
        };
        let mut filter = &mut self;
        for (depth, segment) in parents.iter().enumerate() {
            let node = filter
                .nodes
                .entry(segment.to_string())
                .or_insert_with(|| FilterNode::Nested(Filter::new()));
            filter = match node {
                FilterNode::Nested(nested) => nested,
                FilterNode::Predicate(_) => {
                    let at = segments[..=depth].join(".");
                    return Err(invalid(&at, "property already has a predicate"));
                }
            };
        }
        if let Some(FilterNode::Nested(_)) = filter.nodes.get(*last) {
            return Err(invalid(path, "property already has a nested filter"));
        }
        filter
            .nodes
            .insert(last.to_string(), FilterNode::Predicate(predicate));
        Ok(self)
    }

    /// Looks up the predicate at a dotted path.
    pub fn get(&self, path: &str) -> Option<&Predicate> {
        let mut filter = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            match (filter.nodes.get(segment)?, segments.peek()) {
                (FilterNode::Predicate(predicate), None) => return Some(predicate),
                (FilterNode::Nested(nested), Some(_)) => filter = nested,
                _ => return None,
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &BTreeMap<String, FilterNode> {
        &self.nodes
    }

    /// Encodes the filter as the nested struct sent on the wire.
    pub fn to_value(&self) -> Value {
        Value::Struct(
            self.nodes
                .iter()
                .map(|(name, node)| {
                    let value = match *node {
                        FilterNode::Predicate(ref predicate) => predicate.to_value(),
                        FilterNode::Nested(ref nested) => nested.to_value(),
                    };
                    (name.clone(), value)
                })
                .collect(),
        )
    }

    /// Decodes and validates a filter given as a nested struct.
    ///
    /// A struct containing `operation` or `options` is a predicate and must not contain anything
    /// else; any other struct is a nested filter.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        Filter::decode("", value)
    }

    fn decode(path: &str, value: &Value) -> Result<Self, Error> {
        let map = value
            .as_struct()
            .ok_or_else(|| invalid(path, "expected a struct"))?;
        if map.is_empty() {
            return Err(invalid(path, "filter must not be empty"));
        }

        let mut nodes = BTreeMap::new();
        for (name, child) in map {
            let child_path = join(path, name);
            if name.is_empty() {
                return Err(invalid(path, "empty property name"));
            }
            let child_map = child
                .as_struct()
                .ok_or_else(|| invalid(&child_path, "expected a struct"))?;
            let node = if child_map.contains_key(OPERATION) || child_map.contains_key(OPTIONS) {
                FilterNode::Predicate(Predicate::from_map(&child_path, child_map)?)
            } else {
                FilterNode::Nested(Filter::decode(&child_path, child)?)
            };
            nodes.insert(name.clone(), node);
        }
        Ok(Filter { nodes })
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        self.validate_at("")
    }

    fn validate_at(&self, path: &str) -> Result<(), Error> {
        if self.nodes.is_empty() {
            return Err(invalid(path, "filter must not be empty"));
        }
        for (name, node) in &self.nodes {
            let child_path = join(path, name);
            match *node {
                FilterNode::Predicate(ref predicate) => predicate.validate(&child_path)?,
                FilterNode::Nested(ref nested) => nested.validate_at(&child_path)?,
            }
        }
        Ok(())
    }
}

impl TryFrom<Value> for Filter {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        Filter::from_value(&value)
    }
}
