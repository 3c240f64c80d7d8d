use bytes::Bytes;
use futures::stream::BoxStream;
use std::future::Future;

use crate::error::SyncResult;
use crate::schema::{TableName, TableRef, TableSchema};

/// Stream of raw binary `COPY` data exported from a source table.
pub type CopyOutStream = BoxStream<'static, SyncResult<Bytes>>;

/// Opens fresh clients to one database endpoint.
///
/// A connector holds only the endpoint description. Every table attempt calls
/// [`Connector::connect`] and drops the client when the attempt ends, so no connection outlives an
/// attempt.
pub trait Connector: Clone + Send + Sync + 'static {
    type Client: Send + Sync + 'static;

    fn connect(&self) -> impl Future<Output = SyncResult<Self::Client>> + Send;
}

/// Read access to the table catalog of a database.
pub trait Catalog {
    /// Returns the structure of `table`, or `None` if the catalog has no such table.
    ///
    /// Unqualified tables are looked up in the schemas of the `search_path`, in order.
    fn get_table_schema(
        &self,
        table: &TableRef,
    ) -> impl Future<Output = SyncResult<Option<TableSchema>>> + Send;

    /// Lists the base tables of `schema`, ordered by name.
    fn get_schema_table_names(
        &self,
        schema: &str,
    ) -> impl Future<Output = SyncResult<Vec<TableName>>> + Send;
}

/// A database tables are synced from.
pub trait SyncSource: Catalog {
    /// Starts a binary export of every row of `table`.
    fn copy_table_out(
        &self,
        table: &TableName,
    ) -> impl Future<Output = SyncResult<CopyOutStream>> + Send;
}

/// A database tables are synced into.
pub trait SyncTarget: Catalog {
    type Writer: CopyInWriter;

    /// Executes a single statement.
    fn execute_statement(&self, statement: &str) -> impl Future<Output = SyncResult<()>> + Send;

    /// Removes every row of `table`.
    fn truncate_table(&self, table: &TableName) -> impl Future<Output = SyncResult<()>> + Send;

    /// Starts a binary import into `table`.
    fn copy_table_in(
        &self,
        table: &TableName,
    ) -> impl Future<Output = SyncResult<Self::Writer>> + Send;
}

/// Write half of a binary import.
///
/// Rows written become visible only once [`CopyInWriter::finish`] succeeds. Dropping the writer
/// before that aborts the import.
pub trait CopyInWriter: Send {
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = SyncResult<()>> + Send;

    /// Commits the import, returning the number of rows imported.
    fn finish(self) -> impl Future<Output = SyncResult<u64>> + Send;
}
