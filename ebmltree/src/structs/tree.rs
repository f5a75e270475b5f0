//! Parse trees produced by the walker.
//!
//! One [`ParseTree`] is built per container level and nested bottom-up. Keys
//! are the schema names of the children; elements marked `multiple` collect
//! into [`Value::List`].

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Decoded element value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint(u64),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// Nanoseconds since 2001-01-01T00:00:00 UTC.
    Date(i64),
    Binary(Vec<u8>),
    Uid(Vec<u8>),
    Tree(ParseTree),
    List(Vec<Value>),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Uint(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) | Self::Date(v) => Some(*v),
            Self::Uint(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Uint(v) => Some(*v as f64),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) | Self::Uid(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&ParseTree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    /// Items of a list, or the value itself when it is not a list.
    pub fn items(&self) -> &[Value] {
        match self {
            Self::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

/// Name to value mapping for one container level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseTree {
    entries: BTreeMap<&'static str, Value>,
}

impl ParseTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `name`. With `multiple` set the value is appended
    /// to a list (created on first occurrence), otherwise it replaces any
    /// earlier value.
    pub fn store(&mut self, name: &'static str, multiple: bool, value: Value) {
        if !multiple {
            self.entries.insert(name, value);
            return;
        }

        match self.entries.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(Value::List(vec![value]));
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::List(items) => items.push(value),
                single => {
                    let first = std::mem::replace(single, Value::List(Vec::with_capacity(2)));
                    if let Value::List(items) = single {
                        items.push(first);
                        items.push(value);
                    }
                }
            },
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Follows a slash separated path of names. Lists are entered through
    /// their first item.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('/').filter(|part| !part.is_empty());
        let mut value = self.get(parts.next()?)?;

        for part in parts {
            value = value.items().first()?.as_tree()?.get(part)?;
        }

        Some(value)
    }

    /// [`ParseTree::get_path`] followed by a typed conversion.
    pub fn get_as<T: FromValue>(&self, path: &str) -> Option<T> {
        self.get_path(path).and_then(T::from_value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.entries.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Conversion from one decoded value into a typed field.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

/// Conversion from a whole container level into a typed record.
///
/// Usually derived with `#[derive(FromTree)]`.
pub trait FromTree: Sized {
    fn from_tree(tree: &ParseTree) -> Self;
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64()
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().and_then(|v| u32::try_from(v).ok())
    }
}

impl FromValue for u8 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().and_then(|v| u8::try_from(v).ok())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bytes().map(<[u8]>::to_vec)
    }
}

impl FromValue for ParseTree {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_tree().cloned()
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}
