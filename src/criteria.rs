//! Declarative description of a data operation.
//!
//! A [`Criteria`] names a logical table, the filters, projection and write payload of an
//! operation, plus the per-request metadata used for sharding and read affinity.
//!
//! ```rust
//! use mysql_middleware::prelude::*;
//!
//! let criteria = Criteria::new("word_user")
//!     .with_meta(CriteriaMeta::new().with_spot_id(3).with_chunk_id(99))
//!     .filter("user_id", 42)
//!     .filter_with("word_id", vec![1, 2, 3], Comparator::In)
//!     .order_by("created", SortOrder::Desc)
//!     .limit(10);
//! assert_eq!(criteria.conditions.len(), 2);
//! ```

use std::fmt;

use crate::types::Value;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Comparator {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single `column <comparator> value` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub value: Value,
    pub comparator: Comparator,
}

/// Aggregate function applied to a field (`None` means `*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub function: String,
    pub field: Option<String>,
    pub alias: Option<String>,
}

/// Sort direction helper for [`Criteria::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl From<SortOrder> for String {
    fn from(order: SortOrder) -> Self {
        order.as_str().to_string()
    }
}

/// One `ON DUPLICATE KEY UPDATE` entry of an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertEntry {
    /// Copy the inserted value: `col=VALUES(col)`.
    Copy(String),
    /// Apply a named function to the column; only `"inc"` and `"value"` are understood.
    Mode { column: String, mode: String },
}

/// Sharding dimensions carried in the request metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    ChunkId,
    SpotId,
    Locale,
}

impl MetaKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChunkId => "chunk_id",
            Self::SpotId => "spot_id",
            Self::Locale => "locale",
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request metadata: read affinity and sharding dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriteriaMeta {
    pub read_from_replica: Option<bool>,
    pub chunk_id: Option<String>,
    pub spot_id: Option<String>,
    pub locale: Option<String>,
}

impl CriteriaMeta {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_read_from_replica(mut self, allowed: bool) -> Self {
        self.read_from_replica = Some(allowed);
        self
    }

    #[must_use]
    pub fn with_chunk_id(mut self, chunk_id: impl fmt::Display) -> Self {
        self.chunk_id = Some(chunk_id.to_string());
        self
    }

    #[must_use]
    pub fn with_spot_id(mut self, spot_id: impl fmt::Display) -> Self {
        self.spot_id = Some(spot_id.to_string());
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Look up a sharding dimension. A missing key is `None`, never an error.
    #[must_use]
    pub fn get(&self, key: MetaKey) -> Option<&str> {
        match key {
            MetaKey::ChunkId => self.chunk_id.as_deref(),
            MetaKey::SpotId => self.spot_id.as_deref(),
            MetaKey::Locale => self.locale.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    pub location: String,
    pub conditions: Vec<Condition>,
    pub fields: Vec<String>,
    pub aggregations: Vec<Aggregation>,
    /// Column-major write payload, one entry per field; a `Value::List` holds one value per row.
    pub values: Vec<Value>,
    pub upsert: Vec<UpsertEntry>,
    pub order_by: Vec<(String, String)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub meta: CriteriaMeta,
}

impl Criteria {
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            conditions: Vec::new(),
            fields: Vec::new(),
            aggregations: Vec::new(),
            values: Vec::new(),
            upsert: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            meta: CriteriaMeta::default(),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, meta: CriteriaMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Add an equality condition.
    #[must_use]
    pub fn filter(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter_with(column, value, Comparator::Equal)
    }

    /// Add a condition with an explicit comparator.
    #[must_use]
    pub fn filter_with(
        mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
        comparator: Comparator,
    ) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            value: value.into(),
            comparator,
        });
        self
    }

    /// Set the projected columns or raw expressions.
    #[must_use]
    pub fn read<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Append an aggregate such as `COUNT(*)` or `SUM(bar) AS total`.
    #[must_use]
    pub fn aggregate(
        mut self,
        function: impl Into<String>,
        field: Option<&str>,
        alias: Option<&str>,
    ) -> Self {
        self.aggregations.push(Aggregation {
            function: function.into(),
            field: field.map(str::to_string),
            alias: alias.map(str::to_string),
        });
        self
    }

    /// Set the write payload. Each pair is a column and either a scalar or a per-row list.
    #[must_use]
    pub fn write<I, K, V>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (fields, values): (Vec<String>, Vec<Value>) = columns
            .into_iter()
            .map(|(column, value)| (column.into(), value.into()))
            .unzip();
        self.fields = fields;
        self.values = values;
        self
    }

    /// Copy the listed columns from the inserted row when the key already exists.
    #[must_use]
    pub fn upsert<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.upsert
            .extend(columns.into_iter().map(|column| UpsertEntry::Copy(column.into())));
        self
    }

    /// Apply `mode` (e.g. `"inc"`) to `column` when the key already exists.
    #[must_use]
    pub fn upsert_with(mut self, column: impl Into<String>, mode: impl Into<String>) -> Self {
        self.upsert.push(UpsertEntry::Mode {
            column: column.into(),
            mode: mode.into(),
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        self.order_by.push((field.into(), direction.into()));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Write value of `column`, if the column is part of the payload.
    #[must_use]
    pub fn value_of(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .position(|field| field == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Whether the caller allowed this request to be served by a replica.
    #[must_use]
    pub fn reads_from_replica(&self) -> bool {
        self.meta.read_from_replica.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_splits_columns_and_values() {
        let criteria = Criteria::new("t").write([("foo", Value::Int(1)), ("bar", Value::Int(-2))]);
        assert_eq!(criteria.fields, vec!["foo", "bar"]);
        assert_eq!(criteria.values, vec![Value::Int(1), Value::Int(-2)]);
        assert_eq!(criteria.value_of("bar"), Some(&Value::Int(-2)));
        assert_eq!(criteria.value_of("baz"), None);
    }

    #[test]
    fn meta_lookup_is_a_miss_not_an_error() {
        let meta = CriteriaMeta::new().with_spot_id("c4ca42");
        assert_eq!(meta.get(MetaKey::SpotId), Some("c4ca42"));
        assert_eq!(meta.get(MetaKey::ChunkId), None);
    }

    #[test]
    fn read_affinity_defaults_to_primary() {
        assert!(!Criteria::new("t").reads_from_replica());
        let criteria =
            Criteria::new("t").with_meta(CriteriaMeta::new().with_read_from_replica(true));
        assert!(criteria.reads_from_replica());
    }
}
