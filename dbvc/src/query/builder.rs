//! Composable SELECT/INSERT/UPDATE/DELETE builder
//!
//! Problems found while building or rendering (unknown columns, mistyped
//! literals, an empty WHERE) are collected rather than raised, and handed
//! back next to the best-effort SQL.

use indexmap::IndexMap;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::query::model::Model;
use crate::query::predicate::WherePart;
use crate::query::value::{TypeTag, Value};
use crate::schema::dialect::Dialect;
use crate::utils::naming::quote_ident;

/// One problem detected by the builder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderIssue {
    #[error("invalid column `{column}` on `{table}` in {location}")]
    InvalidColumn {
        table: String,
        column: String,
        location: &'static str,
    },
    #[error("invalid value for `{column}` on `{table}`: {detail}")]
    InvalidValue {
        table: String,
        column: String,
        detail: String,
    },
    #[error("empty WHERE clause on `{table}`")]
    EmptyWhereClause { table: String },
}

/// All problems detected while rendering a query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_issues(.issues))]
pub struct RenderError {
    pub issues: Vec<RenderIssue>,
}

fn join_issues(issues: &[RenderIssue]) -> String {
    let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
    messages.join("; ")
}

impl RenderError {
    fn from_issues(issues: Vec<RenderIssue>) -> Option<Self> {
        if issues.is_empty() {
            None
        } else {
            Some(Self { issues })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    fn name(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Projection {
    Field { column: String, alias: Option<String> },
    Raw { expr: String, alias: String },
    Aggregate { func: Aggregate, column: String, alias: String },
}

/// A query against one model
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    statement: Statement,
    table: String,
    column_types: BTreeMap<String, TypeTag>,
    dialect: Dialect,
    alias: String,
    projections: Vec<Projection>,
    sets: IndexMap<String, Value>,
    wheres: Vec<WherePart>,
    where_requested: bool,
    orders: Vec<(String, Direction)>,
    limit: u64,
    offset: u64,
    issues: Vec<RenderIssue>,
}

pub fn select(model: &impl Model) -> Query {
    Query::new(Statement::Select, model)
}

pub fn insert(model: &impl Model) -> Query {
    Query::new(Statement::Insert, model)
}

pub fn update(model: &impl Model) -> Query {
    Query::new(Statement::Update, model)
}

pub fn delete(model: &impl Model) -> Query {
    Query::new(Statement::Delete, model)
}

/// Join renderings with `UNION ALL`, collecting the issues of every query
pub fn union(queries: &[Query]) -> (String, Option<RenderError>) {
    let mut issues = Vec::new();
    let parts: Vec<String> = queries.iter().map(|q| q.render(&mut issues)).collect();
    (parts.join(" UNION ALL "), RenderError::from_issues(issues))
}

impl Query {
    /// Snapshot the model's table name and column tags
    pub fn new(statement: Statement, model: &impl Model) -> Self {
        Self {
            statement,
            table: model.table_name().to_string(),
            column_types: model.column_types(),
            dialect: Dialect::MySql,
            alias: "t".to_string(),
            projections: Vec::new(),
            sets: IndexMap::new(),
            wheres: Vec::new(),
            where_requested: false,
            orders: Vec::new(),
            limit: 0,
            offset: 0,
            issues: Vec::new(),
        }
    }

    pub fn statement(&self) -> Statement {
        self.statement
    }

    fn check_column(&mut self, column: &str, location: &'static str) -> bool {
        if self.column_types.contains_key(column) {
            return true;
        }
        self.issues.push(RenderIssue::InvalidColumn {
            table: self.table.clone(),
            column: column.to_string(),
            location,
        });
        false
    }

    /// Dialect whose literal escaping rules apply; MySQL unless set
    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Table alias used by SELECT; ignored by the other statements
    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self
    }

    #[must_use]
    pub fn field(mut self, column: &str) -> Self {
        self.check_column(column, "field");
        self.projections.push(Projection::Field {
            column: column.to_string(),
            alias: None,
        });
        self
    }

    #[must_use]
    pub fn field_as(mut self, column: &str, alias: &str) -> Self {
        self.check_column(column, "field");
        self.projections.push(Projection::Field {
            column: column.to_string(),
            alias: Some(alias.to_string()),
        });
        self
    }

    #[must_use]
    pub fn fields(self, columns: &[&str]) -> Self {
        columns.iter().fold(self, |query, column| query.field(column))
    }

    /// Project a raw expression; `expr` is inlined verbatim
    #[must_use]
    pub fn field_raw(mut self, expr: &str, alias: &str) -> Self {
        self.projections.push(Projection::Raw {
            expr: expr.to_string(),
            alias: alias.to_string(),
        });
        self
    }

    fn aggregate(mut self, func: Aggregate, column: &str, alias: &str) -> Self {
        if self.check_column(column, func.name()) {
            self.projections.push(Projection::Aggregate {
                func,
                column: column.to_string(),
                alias: alias.to_string(),
            });
        }
        self
    }

    #[must_use]
    pub fn count(self, column: &str, alias: &str) -> Self {
        self.aggregate(Aggregate::Count, column, alias)
    }

    #[must_use]
    pub fn sum(self, column: &str, alias: &str) -> Self {
        self.aggregate(Aggregate::Sum, column, alias)
    }

    #[must_use]
    pub fn avg(self, column: &str, alias: &str) -> Self {
        self.aggregate(Aggregate::Avg, column, alias)
    }

    #[must_use]
    pub fn min(self, column: &str, alias: &str) -> Self {
        self.aggregate(Aggregate::Min, column, alias)
    }

    #[must_use]
    pub fn max(self, column: &str, alias: &str) -> Self {
        self.aggregate(Aggregate::Max, column, alias)
    }

    /// Add a SET/VALUES entry; a column already set keeps its first value
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.check_column(column, "set");
        if !self.sets.contains_key(column) {
            self.sets.insert(column.to_string(), value.into());
        }
        self
    }

    /// Append predicate parts; repeated calls concatenate
    #[must_use]
    pub fn where_clause(mut self, parts: impl IntoIterator<Item = WherePart>) -> Self {
        self.where_requested = true;
        self.wheres.extend(parts);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.check_column(column, "order by");
        self.orders.push((column.to_string(), direction));
        self
    }

    /// Zero leaves either clause out
    #[must_use]
    pub fn limit(mut self, limit: u64, offset: u64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Render the statement together with every problem found
    pub fn to_sql(&self) -> (String, Option<RenderError>) {
        let mut issues = Vec::new();
        let sql = self.render(&mut issues);
        (sql, RenderError::from_issues(issues))
    }

    /// Render the statement, failing on any problem
    pub fn try_to_sql(&self) -> Result<String, RenderError> {
        match self.to_sql() {
            (sql, None) => Ok(sql),
            (_, Some(err)) => Err(err),
        }
    }

    fn column_ref(&self, column: &str) -> String {
        match self.statement {
            Statement::Select => format!("{}.{}", quote_ident(&self.alias), quote_ident(column)),
            _ => quote_ident(column),
        }
    }

    fn value_sql(&self, column: &str, value: &Value, issues: &mut Vec<RenderIssue>) -> String {
        let (sql, ok) = value.render(self.column_types.get(column).copied(), self.dialect);
        if !ok {
            issues.push(RenderIssue::InvalidValue {
                table: self.table.clone(),
                column: column.to_string(),
                detail: format!("{} is not numeric", sql),
            });
        }
        sql
    }

    fn render(&self, issues: &mut Vec<RenderIssue>) -> String {
        issues.extend(self.issues.iter().cloned());

        let mut sql = match self.statement {
            Statement::Select => format!(
                "SELECT {} FROM {} {}",
                self.render_projections(),
                quote_ident(&self.table),
                quote_ident(&self.alias)
            ),
            Statement::Insert => {
                let columns: Vec<String> = self.sets.keys().map(|c| quote_ident(c)).collect();
                let values: Vec<String> = self
                    .sets
                    .iter()
                    .map(|(c, v)| self.value_sql(c, v, issues))
                    .collect();
                format!(
                    "INSERT INTO {} ( {} ) VALUES ( {} )",
                    quote_ident(&self.table),
                    columns.join(", "),
                    values.join(", ")
                )
            }
            Statement::Update => {
                let sets: Vec<String> = self
                    .sets
                    .iter()
                    .map(|(c, v)| format!("{} = {}", quote_ident(c), self.value_sql(c, v, issues)))
                    .collect();
                format!("UPDATE {} SET {}", quote_ident(&self.table), sets.join(", "))
            }
            Statement::Delete => format!("DELETE FROM {}", quote_ident(&self.table)),
        };

        if self.statement != Statement::Insert {
            sql.push_str(&self.render_where(issues));
        }

        if self.statement == Statement::Select {
            if !self.orders.is_empty() {
                let orders: Vec<String> = self
                    .orders
                    .iter()
                    .map(|(c, d)| format!("{} {}", self.column_ref(c), d.as_str()))
                    .collect();
                sql.push_str(" ORDER BY ");
                sql.push_str(&orders.join(", "));
            }
            if self.limit > 0 {
                sql.push_str(&format!(" LIMIT {}", self.limit));
            }
            if self.offset > 0 {
                sql.push_str(&format!(" OFFSET {}", self.offset));
            }
        }

        sql
    }

    fn render_projections(&self) -> String {
        if self.projections.is_empty() {
            return format!("{}.*", quote_ident(&self.alias));
        }

        let rendered: Vec<String> = self
            .projections
            .iter()
            .map(|p| match p {
                Projection::Field { column, alias: None } => self.column_ref(column),
                Projection::Field {
                    column,
                    alias: Some(alias),
                } => format!("{} AS {}", self.column_ref(column), quote_ident(alias)),
                Projection::Raw { expr, alias } => format!("{} AS {}", expr, quote_ident(alias)),
                Projection::Aggregate {
                    func: Aggregate::Count,
                    column,
                    alias,
                } => format!("COUNT({}) AS {}", self.column_ref(column), quote_ident(alias)),
                Projection::Aggregate { func, column, alias } => format!(
                    "COALESCE({}({}), 0) AS {}",
                    func.name(),
                    self.column_ref(column),
                    quote_ident(alias)
                ),
            })
            .collect();
        rendered.join(", ")
    }

    fn render_where(&self, issues: &mut Vec<RenderIssue>) -> String {
        if !self.where_requested {
            return String::new();
        }
        if self.wheres.is_empty() {
            issues.push(RenderIssue::EmptyWhereClause {
                table: self.table.clone(),
            });
            return " WHERE ".to_string();
        }

        let mut out = String::from(" WHERE ");
        for part in &self.wheres {
            self.render_part(part, &mut out, issues);
        }
        out
    }

    fn where_column(&self, column: &str, issues: &mut Vec<RenderIssue>) -> String {
        if !self.column_types.contains_key(column) {
            issues.push(RenderIssue::InvalidColumn {
                table: self.table.clone(),
                column: column.to_string(),
                location: "where",
            });
        }
        self.column_ref(column)
    }

    fn render_part(&self, part: &WherePart, out: &mut String, issues: &mut Vec<RenderIssue>) {
        match part {
            WherePart::Compare { column, op, value } => {
                out.push_str(&self.where_column(column, issues));
                out.push_str(op.operator());
                out.push_str(&self.value_sql(column, value, issues));
            }
            WherePart::EqualsField { column, expr } => {
                out.push_str(&self.where_column(column, issues));
                out.push_str(" = ");
                out.push_str(expr);
            }
            WherePart::In { column, values } => {
                out.push_str(&self.where_column(column, issues));
                if values.is_empty() {
                    issues.push(RenderIssue::InvalidValue {
                        table: self.table.clone(),
                        column: column.clone(),
                        detail: "IN list is empty".to_string(),
                    });
                }
                let rendered: Vec<String> =
                    values.iter().map(|v| self.value_sql(column, v, issues)).collect();
                out.push_str(&format!(" IN ( {} )", rendered.join(", ")));
            }
            WherePart::Between { column, low, high } => {
                out.push_str(&self.where_column(column, issues));
                out.push_str(" BETWEEN ");
                out.push_str(&self.value_sql(column, low, issues));
                out.push_str(" AND ");
                out.push_str(&self.value_sql(column, high, issues));
            }
            WherePart::Like {
                column,
                pattern,
                negated,
            } => {
                out.push_str(&self.where_column(column, issues));
                out.push_str(if *negated { " NOT LIKE " } else { " LIKE " });
                if !matches!(pattern, Value::Text(_)) {
                    issues.push(RenderIssue::InvalidValue {
                        table: self.table.clone(),
                        column: column.clone(),
                        detail: "LIKE pattern must be text".to_string(),
                    });
                }
                let (sql, _) = pattern.render(Some(TypeTag::Text), self.dialect);
                out.push_str(&sql);
            }
            WherePart::Exists(query) => {
                out.push_str("EXISTS ( ");
                out.push_str(&query.render(issues));
                out.push_str(" )");
            }
            WherePart::And => out.push_str(" AND "),
            WherePart::Or => out.push_str(" OR "),
            WherePart::ParenStart => out.push_str("( "),
            WherePart::ParenEnd => out.push_str(" )"),
            WherePart::All => out.push_str("1=1"),
            WherePart::Group(parts) => {
                for part in parts {
                    self.render_part(part, out, issues);
                }
            }
        }
    }
}
