//! Resolution of logical table names into physical `database.table` locations.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::criteria::{Criteria, MetaKey};
use crate::error::MiddlewareError;

/// Physical location of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    database: String,
    table: String,
}

impl Route {
    #[must_use]
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Which part of a route a sharding option rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Database,
    TableName,
}

/// Named transform that suffixes part of a route with a metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardOption {
    /// `table_name` + `_` + `chunk_id`
    Chunked,
    /// `database` + `_` + `spot_id`
    Spotted,
    /// `database` + `_` + `locale`
    Localized,
}

impl ShardOption {
    #[must_use]
    pub fn placeholder(self) -> Placeholder {
        match self {
            Self::Chunked => Placeholder::TableName,
            Self::Spotted | Self::Localized => Placeholder::Database,
        }
    }

    #[must_use]
    pub fn meta_key(self) -> MetaKey {
        match self {
            Self::Chunked => MetaKey::ChunkId,
            Self::Spotted => MetaKey::SpotId,
            Self::Localized => MetaKey::Locale,
        }
    }
}

impl FromStr for ShardOption {
    type Err = MiddlewareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chunked" => Ok(Self::Chunked),
            "spotted" => Ok(Self::Spotted),
            "localized" => Ok(Self::Localized),
            other => Err(MiddlewareError::Routing(format!(
                "Unknown \"{other}\" option type"
            ))),
        }
    }
}

/// Registry entry describing where a logical table lives and how it is sharded.
///
/// Options are kept as written in the configuration; they are validated when a route is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    #[serde(default, alias = "db")]
    pub database: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub options: Vec<String>,
}

impl TableEntry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(option)) => vec![option],
        Some(OneOrMany::Many(options)) => options,
    })
}

/// Table registry plus the primary database used when a table has no entry.
#[derive(Debug, Clone)]
pub struct Routing {
    primary_db: String,
    tables: HashMap<String, TableEntry>,
}

impl Routing {
    #[must_use]
    pub fn new(primary_db: impl Into<String>, tables: HashMap<String, TableEntry>) -> Self {
        Self {
            primary_db: primary_db.into(),
            tables,
        }
    }

    /// Build the registry from a JSON object keyed by logical table name.
    ///
    /// `null` entries are accepted and behave like a missing entry.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Serialization` if the document is malformed.
    pub fn from_json(primary_db: impl Into<String>, json: &str) -> Result<Self, MiddlewareError> {
        let raw: HashMap<String, Option<TableEntry>> = serde_json::from_str(json)?;
        let tables = raw
            .into_iter()
            .filter_map(|(name, entry)| entry.map(|entry| (name, entry)))
            .collect();
        Ok(Self::new(primary_db, tables))
    }

    #[must_use]
    pub fn primary_db(&self) -> &str {
        &self.primary_db
    }

    /// Resolve the physical route of `criteria.location`.
    ///
    /// Options apply in the order they are listed, so several options compound left to right.
    ///
    /// # Errors
    /// Returns `MiddlewareError::Routing` if an option is unknown or the metadata lacks the
    /// value an option needs.
    pub fn get_route(&self, criteria: &Criteria) -> Result<Route, MiddlewareError> {
        let entry = self.tables.get(&criteria.location);
        let mut database = entry
            .and_then(|e| e.database.clone())
            .unwrap_or_else(|| self.primary_db.clone());
        let mut table = entry
            .and_then(|e| e.table_name.clone())
            .unwrap_or_else(|| criteria.location.clone());

        for raw in entry.map(|e| e.options.as_slice()).unwrap_or_default() {
            let option: ShardOption = raw.parse()?;
            let key = option.meta_key();
            let suffix = criteria.meta.get(key).ok_or_else(|| {
                MiddlewareError::Routing(format!(
                    "Meta parameter \"{key}\" is required to route {}",
                    criteria.location
                ))
            })?;
            let target = match option.placeholder() {
                Placeholder::Database => &mut database,
                Placeholder::TableName => &mut table,
            };
            target.push('_');
            target.push_str(suffix);
        }

        Ok(Route::new(database, table))
    }
}
