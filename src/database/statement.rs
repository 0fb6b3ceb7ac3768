//! Statement construction
//!
//! All SQL issued by the store is built from [`Statement`]. Rendering assigns
//! `$n` placeholders in the same order [`Statement::args`] lists the values,
//! so a backend binds `args()` positionally against `to_sql()`.

use crate::database::schema::{SqlType, Table};
use crate::database::value::FieldValue;

/// Array mutation applied in place by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayOp {
    /// Add the element if it is not already present
    Append,
    /// Remove every occurrence of the element
    Remove,
}

/// One SET clause of an UPDATE
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `col = $n`
    Replace(String, FieldValue),
    /// `col = array_append(...)` / `col = array_remove(...)`
    Mutate(String, ArrayOp, FieldValue),
}

impl Assignment {
    /// Target column
    pub fn column(&self) -> &str {
        match self {
            Assignment::Replace(column, _) | Assignment::Mutate(column, _, _) => column,
        }
    }

    /// Bound value
    pub fn value(&self) -> &FieldValue {
        match self {
            Assignment::Replace(_, value) | Assignment::Mutate(_, _, value) => value,
        }
    }
}

/// Conjunction of `column = value` equalities
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    terms: Vec<(String, FieldValue)>,
}

impl Predicate {
    /// Empty predicate (matches every row)
    pub fn new() -> Self {
        Self::default()
    }

    /// Single equality
    pub fn eq(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new().and(column, value)
    }

    /// Add an equality
    pub fn and(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.terms.push((column.into(), value.into()));
        self
    }

    /// The equality terms
    pub fn terms(&self) -> &[(String, FieldValue)] {
        &self.terms
    }

    /// Whether there are no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether a row satisfies every term.
    ///
    /// As with SQL `=`, a NULL on either side never matches.
    pub fn matches(&self, row: &crate::database::value::Row) -> bool {
        self.terms.iter().all(|(column, value)| {
            !value.is_null() && row.get(column).is_some_and(|found| found == value)
        })
    }
}

/// What an INSERT does when the primary key already exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnConflict {
    /// Let the backend raise
    Error,
    /// `ON CONFLICT (pk) DO NOTHING`
    Ignore,
    /// `ON CONFLICT (pk) DO UPDATE SET col = EXCLUDED.col` for the listed columns
    Update(Vec<String>),
}

/// A statement the store can issue
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `SELECT * FROM t [WHERE ...]`
    Select {
        table: Table,
        filter: Predicate,
    },
    /// `INSERT INTO t (...) VALUES (...) [ON CONFLICT ...] RETURNING *`
    Insert {
        table: Table,
        values: Vec<(String, FieldValue)>,
        on_conflict: OnConflict,
    },
    /// `UPDATE t SET ... WHERE ... RETURNING *`
    Update {
        table: Table,
        assignments: Vec<Assignment>,
        filter: Predicate,
    },
    /// `DELETE FROM t WHERE ... RETURNING *`
    Delete {
        table: Table,
        filter: Predicate,
    },
    /// Hand-written SQL with positional arguments
    Raw {
        sql: String,
        args: Vec<FieldValue>,
    },
}

impl Statement {
    /// SELECT rows matching a predicate
    pub fn select(table: Table, filter: Predicate) -> Self {
        Statement::Select { table, filter }
    }

    /// Raw SQL
    pub fn raw(sql: impl Into<String>, args: Vec<FieldValue>) -> Self {
        Statement::Raw {
            sql: sql.into(),
            args,
        }
    }

    /// Table this statement targets, if any
    pub fn table(&self) -> Option<Table> {
        match self {
            Statement::Select { table, .. }
            | Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. } => Some(*table),
            Statement::Raw { .. } => None,
        }
    }

    /// Render the SQL text with `$n` placeholders
    pub fn to_sql(&self) -> String {
        let mut n = 0usize;
        let mut next = || {
            n += 1;
            format!("${}", n)
        };

        match self {
            Statement::Select { table, filter } => {
                let mut sql = format!("SELECT * FROM {}", table.name());
                push_where(&mut sql, filter, &mut next);
                sql
            }
            Statement::Insert {
                table,
                values,
                on_conflict,
            } => {
                let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
                let placeholders: Vec<String> = values.iter().map(|_| next()).collect();
                let mut sql = if values.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES", table.name())
                } else {
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        table.name(),
                        columns.join(", "),
                        placeholders.join(", ")
                    )
                };
                match on_conflict {
                    OnConflict::Error => {}
                    OnConflict::Ignore => {
                        sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", table.primary_key()));
                    }
                    OnConflict::Update(columns) if columns.is_empty() => {
                        sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", table.primary_key()));
                    }
                    OnConflict::Update(columns) => {
                        let sets: Vec<String> = columns
                            .iter()
                            .map(|c| format!("{} = EXCLUDED.{}", c, c))
                            .collect();
                        sql.push_str(&format!(
                            " ON CONFLICT ({}) DO UPDATE SET {}",
                            table.primary_key(),
                            sets.join(", ")
                        ));
                    }
                }
                sql.push_str(" RETURNING *");
                sql
            }
            Statement::Update {
                table,
                assignments,
                filter,
            } => {
                let sets: Vec<String> = assignments
                    .iter()
                    .map(|a| match a {
                        Assignment::Replace(column, _) => format!("{} = {}", column, next()),
                        Assignment::Mutate(column, ArrayOp::Append, _) => {
                            let p = next();
                            format!(
                                "{c} = array_append(array_remove({c}, {p}), {p})",
                                c = column,
                                p = p
                            )
                        }
                        Assignment::Mutate(column, ArrayOp::Remove, _) => {
                            format!("{c} = array_remove({c}, {p})", c = column, p = next())
                        }
                    })
                    .collect();
                let mut sql = format!("UPDATE {} SET {}", table.name(), sets.join(", "));
                push_where(&mut sql, filter, &mut next);
                sql.push_str(" RETURNING *");
                sql
            }
            Statement::Delete { table, filter } => {
                let mut sql = format!("DELETE FROM {}", table.name());
                push_where(&mut sql, filter, &mut next);
                sql.push_str(" RETURNING *");
                sql
            }
            Statement::Raw { sql, .. } => sql.clone(),
        }
    }

    /// Bound values in placeholder order
    pub fn args(&self) -> Vec<&FieldValue> {
        match self {
            Statement::Select { filter, .. } | Statement::Delete { filter, .. } => {
                filter.terms().iter().map(|(_, v)| v).collect()
            }
            Statement::Insert { values, .. } => values.iter().map(|(_, v)| v).collect(),
            Statement::Update {
                assignments,
                filter,
                ..
            } => assignments
                .iter()
                .map(Assignment::value)
                .chain(filter.terms().iter().map(|(_, v)| v))
                .collect(),
            Statement::Raw { args, .. } => args.iter().collect(),
        }
    }

    /// Declared type for each bound value, when the target column is known.
    ///
    /// Needed to bind NULLs and empty arrays with the right Postgres type.
    pub fn arg_types(&self) -> Vec<Option<SqlType>> {
        let lookup = |table: &Table, column: &str| table.column(column).map(|c| c.ty);
        match self {
            Statement::Select { table, filter } | Statement::Delete { table, filter } => filter
                .terms()
                .iter()
                .map(|(c, _)| lookup(table, c))
                .collect(),
            Statement::Insert { table, values, .. } => {
                values.iter().map(|(c, _)| lookup(table, c)).collect()
            }
            Statement::Update {
                table,
                assignments,
                filter,
            } => assignments
                .iter()
                .map(|a| match a {
                    Assignment::Replace(c, _) => lookup(table, c),
                    // array_append/array_remove bind a single element
                    Assignment::Mutate(c, _, _) => {
                        lookup(table, c).map(|t| SqlType::Scalar(t.element()))
                    }
                })
                .chain(filter.terms().iter().map(|(c, _)| lookup(table, c)))
                .collect(),
            Statement::Raw { args, .. } => vec![None; args.len()],
        }
    }
}

fn push_where(sql: &mut String, filter: &Predicate, next: &mut impl FnMut() -> String) {
    if filter.is_empty() {
        return;
    }
    let terms: Vec<String> = filter
        .terms()
        .iter()
        .map(|(column, _)| format!("{} = {}", column, next()))
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&terms.join(" AND "));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_sql() {
        let stmt = Statement::select(Table::Users, Predicate::eq("user_id", 42_i64));
        assert_eq!(stmt.to_sql(), "SELECT * FROM users WHERE user_id = $1");
        assert_eq!(stmt.args(), vec![&FieldValue::BigInt(42)]);

        let all = Statement::select(Table::Users, Predicate::new());
        assert_eq!(all.to_sql(), "SELECT * FROM users");
        assert!(all.args().is_empty());
    }

    #[test]
    fn test_update_placeholders_follow_assignments_then_filter() {
        let stmt = Statement::Update {
            table: Table::Blacklist,
            assignments: vec![
                Assignment::Replace("blacklisted".into(), true.into()),
                Assignment::Replace("reason".into(), "spam".into()),
            ],
            filter: Predicate::eq("user_id", 42_i64),
        };
        assert_eq!(
            stmt.to_sql(),
            "UPDATE blacklist SET blacklisted = $1, reason = $2 WHERE user_id = $3 RETURNING *"
        );
        assert_eq!(stmt.args().len(), 3);
        assert_eq!(stmt.args()[2], &FieldValue::BigInt(42));
    }

    #[test]
    fn test_array_mutation_sql() {
        let append = Statement::Update {
            table: Table::Guilds,
            assignments: vec![Assignment::Mutate(
                "autorole_ids".into(),
                ArrayOp::Append,
                7_i64.into(),
            )],
            filter: Predicate::eq("guild_id", 1_i64),
        };
        assert_eq!(
            append.to_sql(),
            "UPDATE guilds SET autorole_ids = array_append(array_remove(autorole_ids, $1), $1) \
             WHERE guild_id = $2 RETURNING *"
        );
        assert_eq!(append.args().len(), 2);
        assert_eq!(
            append.arg_types(),
            vec![
                Some(SqlType::Scalar(crate::database::schema::ScalarType::BigInt)),
                Some(SqlType::Scalar(crate::database::schema::ScalarType::BigInt)),
            ]
        );

        let remove = Statement::Update {
            table: Table::Guilds,
            assignments: vec![Assignment::Mutate(
                "autorole_ids".into(),
                ArrayOp::Remove,
                7_i64.into(),
            )],
            filter: Predicate::eq("guild_id", 1_i64),
        };
        assert_eq!(
            remove.to_sql(),
            "UPDATE guilds SET autorole_ids = array_remove(autorole_ids, $1) WHERE guild_id = $2 RETURNING *"
        );
    }

    #[test]
    fn test_insert_upsert_sql() {
        let stmt = Statement::Insert {
            table: Table::Blacklist,
            values: vec![
                ("user_id".into(), 42_i64.into()),
                ("blacklisted".into(), true.into()),
            ],
            on_conflict: OnConflict::Update(vec!["blacklisted".into()]),
        };
        assert_eq!(
            stmt.to_sql(),
            "INSERT INTO blacklist (user_id, blacklisted) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET blacklisted = EXCLUDED.blacklisted RETURNING *"
        );

        let ignore = Statement::Insert {
            table: Table::Commands,
            values: vec![("guild_id".into(), 1_i64.into())],
            on_conflict: OnConflict::Ignore,
        };
        assert_eq!(
            ignore.to_sql(),
            "INSERT INTO commands (guild_id) VALUES ($1) ON CONFLICT (guild_id) DO NOTHING RETURNING *"
        );
    }

    #[test]
    fn test_delete_sql() {
        let stmt = Statement::Delete {
            table: Table::Badges,
            filter: Predicate::eq("name", "early"),
        };
        assert_eq!(stmt.to_sql(), "DELETE FROM badges WHERE name = $1 RETURNING *");
        assert_eq!(stmt.table(), Some(Table::Badges));
    }

    #[test]
    fn test_null_terms_never_match() {
        use crate::database::value::Row;
        let row = Row::new()
            .with("user_id", 1_i64)
            .with("reason", FieldValue::Null);
        assert!(!Predicate::eq("reason", FieldValue::Null).matches(&row));
        assert!(!Predicate::eq("missing", 1_i64).matches(&row));
        assert!(Predicate::eq("user_id", 1_i64).matches(&row));
        assert!(Predicate::new().matches(&row));
    }
}
