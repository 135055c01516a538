use std::fmt;
use crate::core::{DbError, Result};

/// Parameter or column value exchanged with a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Bytes(Vec<u8>),
    /// Ordered sequence of text values (`TEXT[]`).
    ///
    /// Most drivers cannot bind this natively; the generic conversion
    /// rejects it unless a named-value checker accepts it first.
    TextArray(Vec<String>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Bytes(_) => "BYTEA",
            Self::TextArray(_) => "TEXT[]",
        }
    }

    pub fn is_text_array(&self) -> bool {
        matches!(self, Self::TextArray(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Bytes(bytes) => {
                write!(f, "\\x")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Self::TextArray(items) => write!(f, "{{{}}}", items.join(",")),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::TextArray(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A bound statement argument.
///
/// `ordinal` is 1-based and always set; `name` is set only for named
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: Option<String>,
    pub ordinal: usize,
    pub value: Value,
}

impl NamedValue {
    pub fn positional(ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: None,
            ordinal,
            value: value.into(),
        }
    }
}

/// Outcome of a named-value check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedValueCheck {
    /// The checker accepted (and possibly rewrote) the value.
    Accepted,
    /// The checker declines; apply [`default_check_named_value`].
    UseDefault,
}

/// Generic conversion applied when no checker claims a value.
///
/// Scalars pass through unchanged. Text arrays are rejected because the
/// generic layer has no portable encoding for them.
pub fn default_check_named_value(value: &NamedValue) -> Result<()> {
    match &value.value {
        Value::TextArray(_) => Err(DbError::TypeMismatch(format!(
            "sql: converting argument ${} type: unsupported type {}",
            value.ordinal,
            value.value.type_name()
        ))),
        _ => Ok(()),
    }
}
