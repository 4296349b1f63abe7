//! SQL rendering of uniqueness existence checks.
//!
//! A descriptor becomes a single parameterised query:
//!
//! ```sql
//! SELECT 1 FROM "library_author"
//! WHERE "email" = $1 AND ("is_active" = $2) AND "id" <> $3
//! LIMIT 1 FOR UPDATE
//! ```
//!
//! Condition literals are passed as parameters, never inlined.

use std::fmt;
use std::str::FromStr;

use crate::catalog::EntityDef;
use crate::storage::Row;

use super::{ConstraintDescriptor, Operator, Predicate, Value};

/// SQL dialects an existence query can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    /// PostgreSQL: `$n` placeholders, double-quoted identifiers.
    Postgres,
    /// MySQL: `?` placeholders, backtick identifiers.
    MySql,
    /// SQLite: `?` placeholders, no row locks.
    Sqlite,
}

impl SqlDialect {
    /// Whether `SELECT ... FOR UPDATE` is available.
    pub fn supports_row_locks(&self) -> bool {
        !matches!(self, SqlDialect::Sqlite)
    }

    fn placeholder(&self, n: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${}", n),
            SqlDialect::MySql | SqlDialect::Sqlite => "?".to_string(),
        }
    }

    fn quote(&self, ident: &str) -> String {
        match self {
            SqlDialect::MySql => format!("`{}`", ident.replace('`', "``")),
            SqlDialect::Postgres | SqlDialect::Sqlite => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
        }
    }

    /// Render the existence query of `descriptor`.
    ///
    /// With `exclude_identity` the candidate's own identity is bound last and
    /// filtered out. `lock` appends `FOR UPDATE` where the dialect supports it.
    pub fn existence_query(
        &self,
        entity: &EntityDef,
        descriptor: &ConstraintDescriptor,
        exclude_identity: bool,
        lock: bool,
    ) -> ExistenceQuery {
        let mut writer = Writer {
            dialect: *self,
            entity,
            params: Vec::new(),
            negated: 0,
        };

        let mut clauses: Vec<String> = descriptor
            .fields()
            .iter()
            .map(|field| {
                let column = self.quote(entity.column_for(field));
                let placeholder = writer.bind(Param::Key(field.clone()));
                format!("{} = {}", column, placeholder)
            })
            .collect();

        if let Some(condition) = descriptor.condition() {
            clauses.push(format!("({})", writer.predicate(condition)));
        }

        if exclude_identity {
            let column = self.quote(entity.column_for(&entity.identity_field));
            let placeholder = writer.bind(Param::Identity);
            clauses.push(format!("{} <> {}", column, placeholder));
        }

        let locked = lock && self.supports_row_locks();
        let mut sql = format!(
            "SELECT 1 FROM {} WHERE {} LIMIT 1",
            self.quote(&entity.table_name()),
            clauses.join(" AND ")
        );
        if locked {
            sql.push_str(" FOR UPDATE");
        }

        ExistenceQuery {
            sql,
            params: writer.params,
            locked,
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SqlDialect::Postgres => "postgres",
            SqlDialect::MySql => "mysql",
            SqlDialect::Sqlite => "sqlite",
        })
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
            "mysql" | "mariadb" => Ok(SqlDialect::MySql),
            "sqlite" | "sqlite3" => Ok(SqlDialect::Sqlite),
            other => Err(format!("unknown SQL dialect: {}", other)),
        }
    }
}

/// A bound parameter slot of an existence query.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// The candidate's value for a key field.
    Key(String),
    /// A condition literal.
    Literal(Value),
    /// The candidate's own identity.
    Identity,
}

/// A rendered existence query and its parameter slots, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistenceQuery {
    /// SQL text.
    pub sql: String,
    /// Parameter slots.
    pub params: Vec<Param>,
    /// Whether the query takes row locks.
    pub locked: bool,
}

impl ExistenceQuery {
    /// Resolve the parameters for a candidate row.
    ///
    /// Returns `None` if a key field is missing or the identity slot is
    /// present but the row has none. Identities bind as lowercase hex.
    pub fn bind(&self, row: &Row) -> Option<Vec<Value>> {
        self.params
            .iter()
            .map(|param| match param {
                Param::Key(field) => row.values.get(field).cloned(),
                Param::Literal(value) => Some(value.clone()),
                Param::Identity => row.id.map(|id| Value::String(hex::encode(id))),
            })
            .collect()
    }
}

struct Writer<'a> {
    dialect: SqlDialect,
    entity: &'a EntityDef,
    params: Vec<Param>,
    /// Number of enclosing `NOT`s.
    negated: usize,
}

impl Writer<'_> {
    fn bind(&mut self, param: Param) -> String {
        self.params.push(param);
        self.dialect.placeholder(self.params.len())
    }

    fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Leaf(cmp) => {
                let column = self.dialect.quote(self.entity.column_for(&cmp.field));
                let (op, value) = match &cmp.op {
                    Operator::Eq(v) => ("=", v),
                    Operator::Ne(v) => ("<>", v),
                    Operator::Lt(v) => ("<", v),
                    Operator::Le(v) => ("<=", v),
                    Operator::Gt(v) => (">", v),
                    Operator::Ge(v) => (">=", v),
                    Operator::In(values) if values.is_empty() => return "1 = 0".to_string(),
                    Operator::In(values) => {
                        let placeholders: Vec<String> = values
                            .iter()
                            .map(|v| self.bind(Param::Literal(v.clone())))
                            .collect();
                        let rendered = format!("{} IN ({})", column, placeholders.join(", "));
                        return self.null_safe(rendered);
                    }
                    Operator::IsNull(true) => return format!("{} IS NULL", column),
                    Operator::IsNull(false) => return format!("{} IS NOT NULL", column),
                };
                let placeholder = self.bind(Param::Literal(value.clone()));
                self.null_safe(format!("{} {} {}", column, op, placeholder))
            }
            Predicate::And(children) => self.joined(children, " AND ", "1 = 1"),
            Predicate::Or(children) => self.joined(children, " OR ", "1 = 0"),
            Predicate::Not(child) => {
                self.negated += 1;
                let inner = self.predicate(child);
                self.negated -= 1;
                format!("NOT ({})", inner)
            }
        }
    }

    /// Comparisons against NULL are unknown in SQL, and `NOT unknown` never
    /// matches. Under a negation they are pinned to false so a null column
    /// scopes the same way as in memory.
    fn null_safe(&self, comparison: String) -> String {
        if self.negated > 0 {
            format!("COALESCE({}, FALSE)", comparison)
        } else {
            comparison
        }
    }

    fn joined(&mut self, children: &[Predicate], sep: &str, empty: &str) -> String {
        if children.is_empty() {
            return empty.to_string();
        }
        let parts: Vec<String> = children
            .iter()
            .map(|child| match child {
                Predicate::Leaf(_) | Predicate::Not(_) => self.predicate(child),
                _ => format!("({})", self.predicate(child)),
            })
            .collect();
        parts.join(sep)
    }
}
