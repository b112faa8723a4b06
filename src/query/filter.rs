use crate::criteria::{Comparator, Condition};
use crate::error::MiddlewareError;
use crate::types::Value;

/// Compiled `WHERE` body and the parameters it binds, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

/// Compile conditions into a `WHERE` body. No conditions compile to `1`.
pub(crate) fn where_clause(conditions: &[Condition]) -> Result<WhereClause, MiddlewareError> {
    if conditions.is_empty() {
        return Ok(WhereClause {
            sql: "1".to_string(),
            params: Vec::new(),
        });
    }

    let mut parts = Vec::with_capacity(conditions.len());
    let mut params = Vec::new();
    for Condition {
        column,
        value,
        comparator,
    } in conditions
    {
        match comparator {
            Comparator::IsNull | Comparator::IsNotNull => {
                parts.push(format!("{column} {comparator}"));
            }
            Comparator::In | Comparator::NotIn => {
                let items = value.as_list();
                parts.push(format!("{column} {comparator}({})", placeholders(items.len())));
                params.extend(items.into_iter().cloned());
            }
            _ => {
                if !value.is_scalar() {
                    return Err(MiddlewareError::Query(format!(
                        "The {} type of value is wrong for {comparator} comparison",
                        value.type_name()
                    )));
                }
                parts.push(format!("{column}{comparator}?"));
                params.push(value.clone());
            }
        }
    }

    Ok(WhereClause {
        sql: parts.join(" AND "),
        params,
    })
}
