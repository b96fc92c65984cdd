//! Read-only view of the database schema the resolver works against.
//!
//! Loaded from the JSON document produced by schema introspection. Table
//! order is the declared order of the document and is what every ranking
//! falls back to on ties.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed table identifier '{0}': expected schema.table")]
    MalformedId(String),

    #[error("unknown tables: {}", .0.join(", "))]
    UnknownTables(Vec<String>),

    #[error("table '{0}' is declared twice")]
    DuplicateTable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema document is malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// `schema.table` identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableId {
    schema: String,
    table: String,
}

impl TableId {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn parse(value: &str) -> Result<Self, SchemaError> {
        let value = value.trim();
        let mut parts = value.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(schema), Some(table), None) if !schema.is_empty() && !table.is_empty() => {
                Ok(Self::new(schema, table))
            }
            _ => Err(SchemaError::MalformedId(value.to_string())),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Case-folded form used for lookups.
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.table).to_lowercase()
    }
}

impl Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

impl TryFrom<String> for TableId {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TableId> for String {
    fn from(id: TableId) -> Self {
        id.to_string()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
}

fn default_nullable() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub from_table: String,
    #[serde(default)]
    pub from_column: String,
    #[serde(default)]
    pub to_table: String,
    #[serde(default)]
    pub to_column: String,
}

/// Serialized schema description.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub tables: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub columns: IndexMap<String, IndexMap<String, IndexMap<String, ColumnSpec>>>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
}

const LOCATION_HINTS: &[&str] = &[
    "city", "state", "country", "address", "location", "region", "zip", "postal",
];

const NUMERIC_TYPES: &[&str] = &[
    "int", "numeric", "decimal", "float", "double", "real", "number", "money",
];

impl Column {
    pub fn is_temporal(&self) -> bool {
        let data_type = self.data_type.to_lowercase();
        let name = self.name.to_lowercase();
        data_type.contains("date")
            || data_type.contains("time")
            || name.contains("date")
            || name.ends_with("_at")
    }

    pub fn is_location(&self) -> bool {
        let name = self.name.to_lowercase();
        LOCATION_HINTS.iter().any(|hint| name.contains(hint))
    }

    /// Numeric measure column: numeric type and not a key.
    pub fn is_measure(&self) -> bool {
        let data_type = self.data_type.to_lowercase();
        !self.is_primary_key
            && !self.is_foreign_key
            && NUMERIC_TYPES.iter().any(|t| data_type.contains(t))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub id: TableId,
    pub columns: Vec<Column>,
}

#[derive(Clone, Debug, Default)]
pub struct SchemaView {
    tables: Vec<Table>,
    lookup: HashMap<String, usize>,
    relationships: Vec<Relationship>,
}

impl SchemaView {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, SchemaError> {
        let document: SchemaDocument = serde_json::from_str(content)?;
        Self::from_document(document)
    }

    pub fn from_document(document: SchemaDocument) -> Result<Self, SchemaError> {
        let mut view = Self {
            relationships: document.relationships,
            ..Self::default()
        };

        for (schema, tables) in &document.tables {
            for table in tables {
                let id = TableId::new(schema.trim(), table.trim());
                if id.schema.is_empty() || id.table.is_empty() || id.schema.contains('.') || id.table.contains('.') {
                    return Err(SchemaError::MalformedId(id.to_string()));
                }
                if view.lookup.contains_key(&id.key()) {
                    return Err(SchemaError::DuplicateTable(id.to_string()));
                }

                let columns = document
                    .columns
                    .get(schema)
                    .and_then(|tables| tables.get(table))
                    .map(|columns| {
                        columns
                            .iter()
                            .map(|(name, def)| Column {
                                name: name.clone(),
                                data_type: def.data_type.clone(),
                                nullable: def.nullable,
                                is_primary_key: def.is_primary_key,
                                is_foreign_key: def.is_foreign_key,
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                view.lookup.insert(id.key(), view.tables.len());
                view.tables.push(Table { id, columns });
            }
        }

        Ok(view)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Tables in declared enumeration order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn table(&self, id: &TableId) -> Option<&Table> {
        self.position(id).map(|idx| &self.tables[idx])
    }

    /// Enumeration index of a table, matched case-insensitively.
    pub fn position(&self, id: &TableId) -> Option<usize> {
        self.lookup.get(&id.key()).copied()
    }

    /// Canonical identifier for a user-supplied name, if the table exists.
    pub fn resolve(&self, name: &str) -> Option<&TableId> {
        let id = TableId::parse(name).ok()?;
        self.table(&id).map(|table| &table.id)
    }

    /// Canonicalize every name or fail listing all that don't resolve.
    /// Duplicates collapse, first occurrence wins.
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<TableId>, SchemaError> {
        let mut resolved = Vec::with_capacity(names.len());
        let mut unknown = Vec::new();

        for name in names {
            match self.resolve(name.as_ref()) {
                Some(id) if !resolved.contains(id) => resolved.push(id.clone()),
                Some(_) => {}
                None => unknown.push(name.as_ref().trim().to_string()),
            }
        }

        if unknown.is_empty() {
            Ok(resolved)
        } else {
            Err(SchemaError::UnknownTables(unknown))
        }
    }

    /// Canonicalize, dropping identifiers that don't resolve.
    pub fn filter_known(&self, ids: impl IntoIterator<Item = TableId>) -> Vec<TableId> {
        let mut seen = HashSet::new();
        ids.into_iter()
            .filter_map(|id| self.table(&id).map(|table| table.id.clone()))
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }
}
