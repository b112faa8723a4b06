use crate::criteria::{Aggregation, Criteria};
use crate::error::MiddlewareError;

use super::filter::where_clause;
use super::{Query, Statement};

impl Query {
    /// Compile a `SELECT`.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Routing` if the location cannot be routed, or
    /// `MiddlewareError::Query` for a non-scalar comparison or an unknown sort direction.
    pub fn compile_select(&self, criteria: &Criteria) -> Result<Statement, MiddlewareError> {
        let route = self.routing.get_route(criteria)?;
        let filter = where_clause(&criteria.conditions)?;

        let mut sql = format!(
            "SELECT {} FROM {route} WHERE {}",
            expression(criteria),
            filter.sql
        );

        if !criteria.aggregations.is_empty() && !criteria.fields.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&criteria.fields.join(","));
        }

        if !criteria.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order(&criteria.order_by)?);
        }

        if let Some(limit) = criteria.limit.filter(|&limit| limit > 0) {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = criteria.offset.filter(|&offset| offset > 0) {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }

        Ok(Statement {
            sql,
            params: filter.params,
            route,
            server_type: Self::server_type(criteria),
        })
    }
}

/// Projection: plain fields first, then aggregates; `*` when both are empty.
fn expression(criteria: &Criteria) -> String {
    let columns: Vec<String> = criteria
        .fields
        .iter()
        .cloned()
        .chain(criteria.aggregations.iter().map(aggregate))
        .collect();
    if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(",")
    }
}

fn aggregate(aggregation: &Aggregation) -> String {
    let field = aggregation.field.as_deref().unwrap_or("*");
    let mut expr = format!("{}({field})", aggregation.function.to_uppercase());
    if let Some(alias) = &aggregation.alias {
        expr.push_str(" AS ");
        expr.push_str(alias);
    }
    expr
}

fn order(order_by: &[(String, String)]) -> Result<String, MiddlewareError> {
    let keys = order_by
        .iter()
        .map(|(field, direction)| {
            let direction = if direction.eq_ignore_ascii_case("asc") {
                "ASC"
            } else if direction.eq_ignore_ascii_case("desc") {
                "DESC"
            } else {
                return Err(MiddlewareError::Query(format!(
                    "Unknown {direction} sort type"
                )));
            };
            Ok(format!("{field} {direction}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys.join(", "))
}
