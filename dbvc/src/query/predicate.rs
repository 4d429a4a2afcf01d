//! WHERE clause parts
//!
//! A predicate is a flat sequence of parts rendered in the order given.
//! Conjunctions and parentheses are parts too, so no precedence is inferred.

use crate::query::builder::Query;
use crate::query::value::Value;

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Gt,
    Ltoe,
    Gtoe,
}

impl Comparison {
    pub fn operator(&self) -> &'static str {
        match self {
            Comparison::Eq => " = ",
            Comparison::Ne => " <> ",
            Comparison::Lt => " < ",
            Comparison::Gt => " > ",
            Comparison::Ltoe => " <= ",
            Comparison::Gtoe => " >= ",
        }
    }
}

/// One node of a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub enum WherePart {
    Compare {
        column: String,
        op: Comparison,
        value: Value,
    },
    /// Column compared with a raw expression, usually another column
    EqualsField { column: String, expr: String },
    In { column: String, values: Vec<Value> },
    Between { column: String, low: Value, high: Value },
    Like {
        column: String,
        pattern: Value,
        negated: bool,
    },
    Exists(Box<Query>),
    And,
    Or,
    ParenStart,
    ParenEnd,
    /// `1=1`
    All,
    /// Parts rendered back to back
    Group(Vec<WherePart>),
}

fn compare(column: &str, op: Comparison, value: impl Into<Value>) -> WherePart {
    WherePart::Compare {
        column: column.to_string(),
        op,
        value: value.into(),
    }
}

pub fn eq(column: &str, value: impl Into<Value>) -> WherePart {
    compare(column, Comparison::Eq, value)
}

pub fn ne(column: &str, value: impl Into<Value>) -> WherePart {
    compare(column, Comparison::Ne, value)
}

pub fn lt(column: &str, value: impl Into<Value>) -> WherePart {
    compare(column, Comparison::Lt, value)
}

pub fn gt(column: &str, value: impl Into<Value>) -> WherePart {
    compare(column, Comparison::Gt, value)
}

pub fn ltoe(column: &str, value: impl Into<Value>) -> WherePart {
    compare(column, Comparison::Ltoe, value)
}

pub fn gtoe(column: &str, value: impl Into<Value>) -> WherePart {
    compare(column, Comparison::Gtoe, value)
}

/// Column-to-column equality; `expr` is inlined verbatim
pub fn eqf(column: &str, expr: &str) -> WherePart {
    WherePart::EqualsField {
        column: column.to_string(),
        expr: expr.to_string(),
    }
}

pub fn in_list<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> WherePart {
    WherePart::In {
        column: column.to_string(),
        values: values.into_iter().map(Into::into).collect(),
    }
}

pub fn between(column: &str, low: impl Into<Value>, high: impl Into<Value>) -> WherePart {
    WherePart::Between {
        column: column.to_string(),
        low: low.into(),
        high: high.into(),
    }
}

pub fn like(column: &str, pattern: impl Into<Value>) -> WherePart {
    WherePart::Like {
        column: column.to_string(),
        pattern: pattern.into(),
        negated: false,
    }
}

pub fn not_like(column: &str, pattern: impl Into<Value>) -> WherePart {
    WherePart::Like {
        column: column.to_string(),
        pattern: pattern.into(),
        negated: true,
    }
}

pub fn exists(query: Query) -> WherePart {
    WherePart::Exists(Box::new(query))
}

pub fn and() -> WherePart {
    WherePart::And
}

pub fn or() -> WherePart {
    WherePart::Or
}

pub fn ps() -> WherePart {
    WherePart::ParenStart
}

pub fn pe() -> WherePart {
    WherePart::ParenEnd
}

pub fn all() -> WherePart {
    WherePart::All
}

/// `AND ( parts )`
pub fn and_group(parts: impl IntoIterator<Item = WherePart>) -> WherePart {
    grouped(WherePart::And, parts)
}

/// `OR ( parts )`
pub fn or_group(parts: impl IntoIterator<Item = WherePart>) -> WherePart {
    grouped(WherePart::Or, parts)
}

fn grouped(conjunction: WherePart, parts: impl IntoIterator<Item = WherePart>) -> WherePart {
    let mut group = vec![conjunction, WherePart::ParenStart];
    group.extend(parts);
    group.push(WherePart::ParenEnd);
    WherePart::Group(group)
}
