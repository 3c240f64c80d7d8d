use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{StreamExt, stream};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::clients::base::{
    Catalog, Connector, CopyInWriter, CopyOutStream, SyncSource, SyncTarget,
};
use crate::error::{ErrorKind, SyncResult};
use crate::schema::{ColumnSchema, TableName, TableRef, TableSchema};

/// Size of the pieces a copy out of a [`MemoryDatabase`] is streamed in.
const COPY_OUT_PIECE_SIZE: usize = 8 * 1024;

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    rows: Vec<Bytes>,
}

#[derive(Debug)]
struct Inner {
    tables: BTreeMap<TableName, MemoryTable>,
    search_path: Vec<String>,
    executed_statements: Vec<String>,
    connections: u64,
}

/// An in-memory database usable as both source and target of a sync.
///
/// Rows are opaque byte strings. The copy format frames every row with its length as a big-endian
/// `u32`. Statements are limited to the create table statements rendered by
/// [`TableSchema::create_table_statement`].
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        let inner = Inner {
            tables: BTreeMap::new(),
            search_path: vec!["public".to_owned()],
            executed_statements: Vec::new(),
            connections: 0,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Replaces the schemas unqualified table names are resolved against.
    pub async fn set_search_path(&self, schemas: Vec<String>) {
        let mut inner = self.inner.lock().await;
        inner.search_path = schemas;
    }

    /// Creates a table, replacing any existing table with the same name.
    pub async fn create_table(&self, schema: TableSchema) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema,
                rows: Vec::new(),
            },
        );
    }

    pub async fn insert_rows(&self, table: &TableName, rows: Vec<Bytes>) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(memory_table) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::SourceSchemaError,
                "Table does not exist",
                table
            );
        };
        memory_table.rows.extend(rows);

        Ok(())
    }

    pub async fn table_schema(&self, table: &TableName) -> Option<TableSchema> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).map(|t| t.schema.clone())
    }

    pub async fn rows(&self, table: &TableName) -> Option<Vec<Bytes>> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).map(|t| t.rows.clone())
    }

    pub async fn table_names(&self) -> Vec<TableName> {
        let inner = self.inner.lock().await;
        inner.tables.keys().cloned().collect()
    }

    /// Returns every statement executed against this database, in execution order.
    pub async fn executed_statements(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.executed_statements.clone()
    }

    /// Returns how many times a client was opened to this database.
    pub async fn connections(&self) -> u64 {
        let inner = self.inner.lock().await;
        inner.connections
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MemoryDatabase {
    type Client = MemoryDatabase;

    async fn connect(&self) -> SyncResult<MemoryDatabase> {
        let mut inner = self.inner.lock().await;
        inner.connections += 1;

        Ok(self.clone())
    }
}

impl Catalog for MemoryDatabase {
    async fn get_table_schema(&self, table: &TableRef) -> SyncResult<Option<TableSchema>> {
        let inner = self.inner.lock().await;

        let schema = match &table.schema {
            Some(schema) => inner
                .tables
                .get(&TableName::new(schema.clone(), table.name.clone())),
            None => inner.search_path.iter().find_map(|schema| {
                inner
                    .tables
                    .get(&TableName::new(schema.clone(), table.name.clone()))
            }),
        };

        // A table without columns has no rows in the column catalog, so it looks absent.
        Ok(schema
            .filter(|t| !t.schema.column_schemas.is_empty())
            .map(|t| t.schema.clone()))
    }

    async fn get_schema_table_names(&self, schema: &str) -> SyncResult<Vec<TableName>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .tables
            .keys()
            .filter(|name| name.schema == schema)
            .cloned()
            .collect())
    }
}

impl SyncSource for MemoryDatabase {
    async fn copy_table_out(&self, table: &TableName) -> SyncResult<CopyOutStream> {
        let inner = self.inner.lock().await;
        let Some(memory_table) = inner.tables.get(table) else {
            bail!(
                ErrorKind::SourceSchemaError,
                "Table does not exist",
                table
            );
        };

        let mut data = encode_rows(&memory_table.rows);
        let mut pieces: Vec<SyncResult<Bytes>> =
            Vec::with_capacity(data.len() / COPY_OUT_PIECE_SIZE + 1);
        while !data.is_empty() {
            let piece_size = data.len().min(COPY_OUT_PIECE_SIZE);
            pieces.push(Ok(data.split_to(piece_size)));
        }

        Ok(stream::iter(pieces).boxed())
    }
}

impl SyncTarget for MemoryDatabase {
    type Writer = MemoryCopyInWriter;

    async fn execute_statement(&self, statement: &str) -> SyncResult<()> {
        let Some(schema) = parse_create_table_statement(statement) else {
            bail!(
                ErrorKind::QueryFailed,
                "Statement is not supported by the in-memory database",
                statement
            );
        };

        let mut inner = self.inner.lock().await;
        inner.executed_statements.push(statement.to_owned());
        if inner.tables.contains_key(&schema.name) {
            debug!(table = %schema.name, "table already exists, statement is a no-op");
            return Ok(());
        }

        inner.tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema,
                rows: Vec::new(),
            },
        );

        Ok(())
    }

    async fn truncate_table(&self, table: &TableName) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(memory_table) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::SourceSchemaError,
                "Table does not exist",
                table
            );
        };
        memory_table.rows.clear();

        Ok(())
    }

    async fn copy_table_in(&self, table: &TableName) -> SyncResult<MemoryCopyInWriter> {
        let inner = self.inner.lock().await;
        if !inner.tables.contains_key(table) {
            bail!(
                ErrorKind::SourceSchemaError,
                "Table does not exist",
                table
            );
        }

        Ok(MemoryCopyInWriter {
            database: self.clone(),
            table: table.clone(),
            buffer: BytesMut::new(),
        })
    }
}

/// Write half of an import into a [`MemoryDatabase`] table.
///
/// Data is buffered and only decoded into rows on [`CopyInWriter::finish`].
#[derive(Debug)]
pub struct MemoryCopyInWriter {
    database: MemoryDatabase,
    table: TableName,
    buffer: BytesMut,
}

impl CopyInWriter for MemoryCopyInWriter {
    async fn write(&mut self, chunk: Bytes) -> SyncResult<()> {
        self.buffer.extend_from_slice(&chunk);

        Ok(())
    }

    async fn finish(self) -> SyncResult<u64> {
        let rows = decode_rows(self.buffer.freeze())?;
        let row_count = rows.len() as u64;

        self.database.insert_rows(&self.table, rows).await?;

        Ok(row_count)
    }
}

/// Frames every row with its big-endian `u32` length.
fn encode_rows(rows: &[Bytes]) -> Bytes {
    let size = rows.iter().map(|row| row.len() + 4).sum();
    let mut data = BytesMut::with_capacity(size);
    for row in rows {
        data.put_u32(row.len() as u32);
        data.put_slice(row);
    }

    data.freeze()
}

fn decode_rows(mut data: Bytes) -> SyncResult<Vec<Bytes>> {
    let mut rows = Vec::new();
    while data.has_remaining() {
        if data.remaining() < 4 {
            bail!(
                ErrorKind::CopyFailed,
                "Copy data ends inside a row header"
            );
        }

        let length = data.get_u32() as usize;
        if data.remaining() < length {
            bail!(
                ErrorKind::CopyFailed,
                "Copy data ends inside a row",
                format!("expected {length} bytes, got {}", data.remaining())
            );
        }
        rows.push(data.split_to(length));
    }

    Ok(rows)
}

/// Reads a possibly double-quoted identifier from the start of `s`.
fn read_identifier(s: &str) -> Option<(String, &str)> {
    if let Some(quoted) = s.strip_prefix('"') {
        let mut identifier = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '"' {
                identifier.push(c);
            } else if chars.peek().map(|(_, next)| *next) == Some('"') {
                chars.next();
                identifier.push('"');
            } else {
                return Some((identifier, &quoted[i + 1..]));
            }
        }

        return None;
    }

    let end = s
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }

    Some((s[..end].to_owned(), &s[end..]))
}

/// Splits a column list on the commas that are outside of quotes and parentheses.
fn split_columns(columns: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;

    for (i, c) in columns.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                parts.push(&columns[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&columns[start..]);

    parts
}

fn parse_column(column: &str) -> Option<ColumnSchema> {
    let (name, rest) = read_identifier(column.trim())?;
    let mut type_definition = rest.trim();

    let nullable = match type_definition.strip_suffix(" not null") {
        Some(stripped) => {
            type_definition = stripped.trim_end();
            false
        }
        None => true,
    };

    let (data_type, character_maximum_length) = match type_definition.strip_suffix(')') {
        Some(without_paren) if !type_definition.starts_with('"') => {
            let (data_type, length) = without_paren.rsplit_once('(')?;
            (data_type.to_owned(), Some(length.parse().ok()?))
        }
        _ => (type_definition.to_owned(), None),
    };

    if data_type.is_empty() {
        return None;
    }

    Some(ColumnSchema::new(
        name,
        data_type,
        character_maximum_length,
        nullable,
    ))
}

/// Parses a statement rendered by [`TableSchema::create_table_statement`].
pub(crate) fn parse_create_table_statement(statement: &str) -> Option<TableSchema> {
    let rest = statement.trim().strip_prefix("create table if not exists ")?;
    let (schema, rest) = read_identifier(rest)?;
    let rest = rest.strip_prefix('.')?;
    let (name, rest) = read_identifier(rest)?;
    let columns = rest.trim().strip_prefix('(')?.strip_suffix(')')?;

    let column_schemas = if columns.trim().is_empty() {
        Vec::new()
    } else {
        split_columns(columns)
            .into_iter()
            .map(parse_column)
            .collect::<Option<Vec<_>>>()?
    };

    Some(TableSchema::new(TableName::new(schema, name), column_schemas))
}
