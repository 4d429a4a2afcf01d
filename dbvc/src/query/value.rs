//! Literal values inlined by the query builder

use std::fmt;

use crate::schema::dialect::Dialect;

/// How a column's values are written into SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// `%d`
    Int,
    /// `%f`
    Float,
    /// `%s`, single-quoted
    Text,
}

impl TypeTag {
    /// Parse a printf-style tag such as `%d`
    pub fn from_format(format: &str) -> Option<Self> {
        match format {
            "%d" => Some(TypeTag::Int),
            "%f" => Some(TypeTag::Float),
            "%s" => Some(TypeTag::Text),
            _ => None,
        }
    }

    pub fn as_format(&self) -> &'static str {
        match self {
            TypeTag::Int => "%d",
            TypeTag::Float => "%f",
            TypeTag::Text => "%s",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_format())
    }
}

/// A value inlined into a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Convert a JSON scalar; arrays and objects are carried as their JSON text
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    /// Text of the value without any quoting
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    /// Render for a column carrying `tag`; `None` means the column is unknown
    /// and the value's own kind decides. The flag is false when a textual
    /// value is not numeric but the column is.
    pub fn render(&self, tag: Option<TypeTag>, dialect: Dialect) -> (String, bool) {
        match (tag, self) {
            (_, Value::Null) => ("NULL".to_string(), true),
            (Some(TypeTag::Text), value) => (dialect.quote_literal(&value.to_plain_string()), true),
            (None, Value::Text(s)) => (dialect.quote_literal(s), true),
            (Some(_), Value::Text(s)) => {
                let trimmed = s.trim();
                if trimmed.parse::<f64>().is_ok() {
                    (trimmed.to_string(), true)
                } else {
                    (dialect.quote_literal(s), false)
                }
            }
            (_, value) => (value.to_plain_string(), true),
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
