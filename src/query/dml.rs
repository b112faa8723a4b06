use crate::criteria::{Criteria, UpsertEntry};
use crate::error::MiddlewareError;
use crate::types::{ServerType, Value};

use super::filter::{placeholders, where_clause};
use super::{Query, Statement};

impl Query {
    /// Compile a single- or multi-row `INSERT`, with an optional `ON DUPLICATE KEY UPDATE`.
    ///
    /// Values are column-major: each write value is either a scalar (one row) or a
    /// `Value::List` holding that column's value for every row.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Query` when there are no fields, the request asks for a
    /// replica, the columns have different row counts, or an upsert entry is invalid.
    pub fn compile_insert(&self, criteria: &Criteria) -> Result<Statement, MiddlewareError> {
        if criteria.fields.is_empty() {
            return Err(MiddlewareError::Query("No fields for insert statement".into()));
        }
        let server_type = Self::write_server_type(criteria)?;
        let route = self.routing.get_route(criteria)?;

        let (rows, mut params) = flatten_rows(criteria)?;
        let mut sql = format!(
            "INSERT INTO {route}({}) VALUES {}",
            criteria.fields.join(","),
            vec![format!("({})", placeholders(criteria.fields.len())); rows].join(",")
        );

        if !criteria.upsert.is_empty() {
            sql.push_str(" ON DUPLICATE KEY UPDATE ");
            sql.push_str(&upsert_clause(criteria, &mut params)?);
        }

        Ok(Statement {
            sql,
            params,
            route,
            server_type,
        })
    }

    /// Compile `UPDATE ... SET a=?,b=?`.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Query` when the request asks for a replica or has no fields.
    pub fn compile_update(&self, criteria: &Criteria) -> Result<Statement, MiddlewareError> {
        let server_type = Self::write_server_type(criteria)?;
        self.compile_set(criteria, server_type, |field| format!("{field}=?"))
    }

    /// Compile `UPDATE ... SET a=a+(?),b=b+(?)`.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Query` when the request asks for a replica or has no fields.
    pub fn compile_increment(&self, criteria: &Criteria) -> Result<Statement, MiddlewareError> {
        let server_type = Self::write_server_type(criteria)?;
        self.compile_set(criteria, server_type, |field| format!("{field}={field}+(?)"))
    }

    /// Compile a `DELETE`. Without conditions every row of the table matches.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Query` when the request asks for a replica or a condition is
    /// malformed.
    pub fn compile_delete(&self, criteria: &Criteria) -> Result<Statement, MiddlewareError> {
        let server_type = Self::write_server_type(criteria)?;
        let route = self.routing.get_route(criteria)?;
        let filter = where_clause(&criteria.conditions)?;
        Ok(Statement {
            sql: format!("DELETE FROM {route} WHERE {}", filter.sql),
            params: filter.params,
            route,
            server_type,
        })
    }

    fn compile_set(
        &self,
        criteria: &Criteria,
        server_type: ServerType,
        assignment: impl Fn(&str) -> String,
    ) -> Result<Statement, MiddlewareError> {
        if criteria.fields.is_empty() {
            return Err(MiddlewareError::Query("No fields for update statement".into()));
        }
        if criteria.values.len() != criteria.fields.len() {
            return Err(MiddlewareError::Query(
                "Wrong values count for update statement".into(),
            ));
        }
        for (field, value) in criteria.fields.iter().zip(&criteria.values) {
            write_cell(field, value)?;
        }
        let route = self.routing.get_route(criteria)?;
        let filter = where_clause(&criteria.conditions)?;

        let set = criteria
            .fields
            .iter()
            .map(|field| assignment(field.as_str()))
            .collect::<Vec<_>>()
            .join(",");

        // Write values bind before the WHERE parameters.
        let mut params = criteria.values.clone();
        params.extend(filter.params);

        Ok(Statement {
            sql: format!("UPDATE {route} SET {set} WHERE {}", filter.sql),
            params,
            route,
            server_type,
        })
    }
}

/// Row count and row-major parameters of a column-major insert payload.
fn flatten_rows(criteria: &Criteria) -> Result<(usize, Vec<Value>), MiddlewareError> {
    let wrong_rows = |column: usize| {
        MiddlewareError::Query(format!(
            "Wrong rows count in {column} column for multi insert query"
        ))
    };

    let columns: Vec<Vec<&Value>> = criteria.values.iter().map(Value::as_list).collect();
    if columns.len() != criteria.fields.len() {
        return Err(wrong_rows(columns.len().min(criteria.fields.len())));
    }
    let rows = columns.first().map_or(0, Vec::len);
    if rows == 0 {
        return Err(wrong_rows(0));
    }
    if let Some(column) = columns.iter().position(|values| values.len() != rows) {
        return Err(wrong_rows(column));
    }
    for (field, values) in criteria.fields.iter().zip(&columns) {
        for value in values {
            write_cell(field, value)?;
        }
    }

    let mut params = Vec::with_capacity(rows * columns.len());
    for row in 0..rows {
        params.extend(columns.iter().map(|values| values[row].clone()));
    }
    Ok((rows, params))
}

/// A single bound cell: NULL and scalars only.
fn write_cell(column: &str, value: &Value) -> Result<(), MiddlewareError> {
    match value {
        Value::List(_) | Value::Json(_) => Err(MiddlewareError::Query(format!(
            "The {} type of value is wrong for \"{column}\" column",
            value.type_name()
        ))),
        _ => Ok(()),
    }
}

/// `ON DUPLICATE KEY UPDATE` assignments; `inc` entries append their bound value to `params`.
fn upsert_clause(criteria: &Criteria, params: &mut Vec<Value>) -> Result<String, MiddlewareError> {
    let mut updates = Vec::with_capacity(criteria.upsert.len());
    for entry in &criteria.upsert {
        let (column, mode) = match entry {
            UpsertEntry::Copy(column) => (column, "value"),
            UpsertEntry::Mode { column, mode } => (column, mode.as_str()),
        };
        match mode {
            "value" => updates.push(format!("{column}=VALUES({column})")),
            "inc" => {
                let value = criteria
                    .value_of(column)
                    .and_then(|value| value.as_list().first().map(|first| (*first).clone()))
                    .ok_or_else(|| {
                        MiddlewareError::Query(format!("Value for \"{column}\" is not specified"))
                    })?;
                updates.push(format!("{column}={column}+(?)"));
                params.push(value);
            }
            other => {
                return Err(MiddlewareError::Query(format!(
                    "Unsupported function: {other}"
                )));
            }
        }
    }
    Ok(updates.join(","))
}
