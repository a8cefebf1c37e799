//! Composable query fragments shared by behavior read scopes.
//!
//! # Responsibility
//! - Represent row filters as explicit values (SQL fragment plus bound
//!   parameters) that behaviors hand to callers and callers combine.
//! - Represent default read orderings declared by the position sequencer.
//!
//! # Invariants
//! - A `Filter` only ever narrows: combining two filters matches the
//!   intersection of their row sets.
//! - Fragments use positional `?` placeholders; parameters are carried in
//!   clause order so composed filters bind correctly.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Explicit row filter: a conjunction of SQL conditions with their bound
/// parameters.
///
/// Behaviors expose their visibility scopes as `Filter` values instead of
/// installing an ambient default scope, so no caller ever has to "unscope"
/// anything before applying its own condition.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Single-condition filter with no bound parameters.
    pub fn expr(sql: impl Into<String>) -> Self {
        Self {
            clauses: vec![sql.into()],
            params: Vec::new(),
        }
    }

    /// Single-condition filter with bound parameters in placeholder order.
    pub fn expr_with(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            clauses: vec![sql.into()],
            params,
        }
    }

    /// Conjunction of this filter with another.
    pub fn and(mut self, other: Filter) -> Self {
        self.clauses.extend(other.clauses);
        self.params.extend(other.params);
        self
    }

    /// Returns `" WHERE ..."` for SQL assembly, or an empty string when the
    /// filter matches everything.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Bound parameters in the order the clauses reference them.
    pub fn params(&self) -> Vec<Value> {
        self.params.clone()
    }
}

/// Sort direction for a sequenced collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parses a direction token. Unrecognized tokens fall back to ascending
    /// rather than erroring.
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "desc" => Self::Desc,
            _ => Self::Asc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Default read ordering over a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    field: String,
    direction: SortDirection,
}

impl Order {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Returns the `ORDER BY ...` fragment for SQL assembly.
    pub fn sql(&self) -> String {
        format!("ORDER BY {} {}", self.field, self.direction.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, Order, SortDirection};
    use rusqlite::types::Value;

    #[test]
    fn empty_filter_has_no_where_clause() {
        assert_eq!(Filter::all().where_clause(), "");
        assert!(Filter::all().params().is_empty());
    }

    #[test]
    fn composed_filters_join_with_and_and_keep_param_order() {
        let combined = Filter::expr("deleted_at IS NULL").and(Filter::expr_with(
            "author_id = ?",
            vec![Value::Integer(7)],
        ));

        assert_eq!(
            combined.where_clause(),
            " WHERE deleted_at IS NULL AND author_id = ?"
        );
        assert_eq!(combined.params(), vec![Value::Integer(7)]);
    }

    #[test]
    fn direction_parse_falls_back_to_ascending() {
        assert_eq!(SortDirection::parse("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse(" DESC "), SortDirection::Desc);
        assert_eq!(SortDirection::parse("asc"), SortDirection::Asc);
        assert_eq!(SortDirection::parse("sideways"), SortDirection::Asc);
        assert_eq!(SortDirection::parse(""), SortDirection::Asc);
    }

    #[test]
    fn order_renders_field_and_direction() {
        let order = Order::new("position", SortDirection::Desc);
        assert_eq!(order.sql(), "ORDER BY position DESC");
    }
}
