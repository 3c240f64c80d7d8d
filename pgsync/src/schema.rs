use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use pg_escape::quote_identifier;

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::sync_error;

/// A table as it was requested, optionally qualified with its schema.
///
/// An unqualified reference is resolved against the source's `search_path` when the table is
/// introspected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<TableName> for TableRef {
    fn from(table_name: TableName) -> Self {
        Self::qualified(table_name.schema, table_name.name)
    }
}

/// Parses `table`, `schema.table` or their double-quoted forms.
///
/// The name is split on the first dot outside of double quotes. Quoted parts are unquoted, with
/// `""` standing for a literal quote. Unquoted parts are taken as written.
impl FromStr for TableRef {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut parts = Vec::with_capacity(2);
        let mut current = String::new();
        let mut quoted = false;
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '"' if quoted && chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push('"');
                }
                '"' => quoted = !quoted,
                '.' if !quoted && parts.is_empty() => {
                    parts.push(std::mem::take(&mut current));
                }
                c => current.push(c),
            }
        }

        if quoted {
            return Err(sync_error!(
                ErrorKind::ConfigError,
                "Unterminated quoted identifier in table name",
                s
            ));
        }
        parts.push(current);

        if parts.iter().any(|part| part.is_empty()) {
            return Err(sync_error!(
                ErrorKind::ConfigError,
                "Table name has an empty part",
                s
            ));
        }

        let name = parts.pop().unwrap_or_default();
        Ok(TableRef {
            schema: parts.pop(),
            name,
        })
    }
}

/// Parses the configured table names, dropping repeated entries while keeping the first
/// occurrence of each.
pub fn parse_table_list<S: AsRef<str>>(names: &[S]) -> SyncResult<Vec<TableRef>> {
    let mut seen = HashSet::new();
    let mut tables = Vec::with_capacity(names.len());

    for name in names {
        let table: TableRef = name.as_ref().parse()?;
        if seen.insert(table.clone()) {
            tables.push(table);
        }
    }

    Ok(tables)
}

/// A fully qualified Postgres table name, as found in the catalog.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct TableName {
    /// The schema name containing the table
    pub schema: String,
    /// The name of the table within the schema
    pub name: String,
}

impl TableName {
    pub fn new(schema: String, name: String) -> TableName {
        Self { schema, name }
    }

    /// Returns the table name as a properly quoted Postgres identifier.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{0}.{1}", self.schema, self.name))
    }
}

/// A single column of a table, as described by `information_schema.columns`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnSchema {
    /// The name of the column
    pub name: String,
    /// The SQL type of the column, without length qualifier
    pub data_type: String,
    /// Declared length of character and bit types
    pub character_maximum_length: Option<i32>,
    /// Whether the column can contain NULL values
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(
        name: String,
        data_type: String,
        character_maximum_length: Option<i32>,
        nullable: bool,
    ) -> ColumnSchema {
        Self {
            name,
            data_type,
            character_maximum_length,
            nullable,
        }
    }

    /// Returns the column's type with its length qualifier, e.g. `character varying(50)`.
    pub fn type_definition(&self) -> String {
        match self.character_maximum_length {
            Some(length) => format!("{}({length})", self.data_type),
            None => self.data_type.clone(),
        }
    }

    /// Returns the column definition used in a create table statement.
    pub fn definition(&self) -> String {
        let mut definition = format!(
            "{} {}",
            quote_identifier(&self.name),
            self.type_definition()
        );
        if !self.nullable {
            definition.push_str(" not null");
        }

        definition
    }
}

/// Structure of a table: its name and its columns in ordinal order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableSchema {
    pub name: TableName,
    pub column_schemas: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: TableName, column_schemas: Vec<ColumnSchema>) -> Self {
        Self {
            name,
            column_schemas,
        }
    }

    /// Renders the idempotent statement that creates this table when it doesn't exist yet.
    ///
    /// The output depends only on the schema, so an unchanged source yields the same statement on
    /// every run.
    pub fn create_table_statement(&self) -> String {
        let columns = self
            .column_schemas
            .iter()
            .map(ColumnSchema::definition)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "create table if not exists {} ({columns})",
            self.name.as_quoted_identifier()
        )
    }

    /// Describes the first difference that makes a binary copy from `self` into `other`
    /// impossible, or returns `None` if the layouts are compatible.
    ///
    /// Column count, order, types and lengths have to match. Names and nullability don't take part
    /// in the binary format.
    pub fn layout_mismatch(&self, other: &TableSchema) -> Option<String> {
        if self.column_schemas.len() != other.column_schemas.len() {
            return Some(format!(
                "{} has {} columns but {} has {}",
                self.name,
                self.column_schemas.len(),
                other.name,
                other.column_schemas.len()
            ));
        }

        self.column_schemas
            .iter()
            .zip(other.column_schemas.iter())
            .enumerate()
            .find(|(_, (ours, theirs))| ours.type_definition() != theirs.type_definition())
            .map(|(position, (ours, theirs))| {
                format!(
                    "column {} of {} is {} but column {} of {} is {}",
                    position + 1,
                    self.name,
                    ours.type_definition(),
                    position + 1,
                    other.name,
                    theirs.type_definition()
                )
            })
    }
}
