use bytes::Bytes;
use futures::{StreamExt, stream};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::clients::base::{
    Catalog, Connector, CopyInWriter, CopyOutStream, SyncSource, SyncTarget,
};
use crate::clients::memory::{MemoryCopyInWriter, MemoryDatabase, parse_create_table_statement};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::schema::{TableName, TableRef, TableSchema};
use crate::sync_error;

/// The operations of a table a fault can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Looking up the structure of the table.
    Introspect,
    /// Executing the create statement of the table.
    ApplyStatement,
    /// Starting the copy out of the table.
    CopyOut,
    /// Reading the copy out of the table, after its first piece.
    CopyOutStream,
    /// Committing the copy into the table.
    FinishCopyIn,
}

#[derive(Debug)]
struct Fault {
    remaining: u32,
    kind: ErrorKind,
}

#[derive(Debug, Default)]
struct Inner {
    faults: HashMap<(String, FaultPoint), Fault>,
    introspect_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

/// Decrements the introspections in flight when dropped, also when an attempt is abandoned.
struct InFlightGuard<'a>(&'a InFlight);

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a InFlight) -> Self {
        let current = in_flight.current.fetch_add(1, Ordering::SeqCst) + 1;
        in_flight.max.fetch_max(current, Ordering::SeqCst);

        Self(in_flight)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A [`MemoryDatabase`] wrapper failing chosen operations of chosen tables.
///
/// Faults are keyed by the unqualified table name. Every fault fails a fixed number of times and
/// is then spent, which models transient failures.
#[derive(Debug, Clone)]
pub struct FaultyDatabase {
    database: MemoryDatabase,
    inner: Arc<Mutex<Inner>>,
    in_flight: Arc<InFlight>,
}

impl FaultyDatabase {
    pub fn wrap(database: MemoryDatabase) -> Self {
        Self {
            database,
            inner: Arc::new(Mutex::new(Inner::default())),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn database(&self) -> &MemoryDatabase {
        &self.database
    }

    /// Fails `point` of `table` the next `times` times with a [`ErrorKind::ConnectionFailed`].
    pub async fn fail(&self, table: &str, point: FaultPoint, times: u32) {
        self.fail_with(table, point, times, ErrorKind::ConnectionFailed)
            .await;
    }

    /// Fails `point` of `table` the next `times` times with an error of `kind`.
    pub async fn fail_with(&self, table: &str, point: FaultPoint, times: u32, kind: ErrorKind) {
        let mut inner = self.inner.lock().await;
        inner.faults.insert(
            (table.to_owned(), point),
            Fault {
                remaining: times,
                kind,
            },
        );
    }

    /// Makes every introspection take `delay`.
    pub async fn set_introspect_delay(&self, delay: Duration) {
        let mut inner = self.inner.lock().await;
        inner.introspect_delay = Some(delay);
    }

    /// Returns the highest number of introspections that were running at the same time.
    ///
    /// Every attempt introspects its table exactly once, so with a delay set this is the highest
    /// number of concurrent attempts.
    pub fn max_concurrent_introspections(&self) -> usize {
        self.in_flight.max.load(Ordering::SeqCst)
    }

    async fn check_fault(&self, table: &str, point: FaultPoint) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(fault) = inner.faults.get_mut(&(table.to_owned(), point)) else {
            return Ok(());
        };

        if fault.remaining == 0 {
            return Ok(());
        }
        fault.remaining -= 1;

        Err(injected_error(fault.kind, table, point))
    }
}

fn injected_error(kind: ErrorKind, table: &str, point: FaultPoint) -> SyncError {
    sync_error!(
        kind,
        "Injected fault",
        format!("{point:?} of table {table}")
    )
}

impl Connector for FaultyDatabase {
    type Client = FaultyDatabase;

    async fn connect(&self) -> SyncResult<FaultyDatabase> {
        self.database.connect().await?;

        Ok(self.clone())
    }
}

impl Catalog for FaultyDatabase {
    async fn get_table_schema(&self, table: &TableRef) -> SyncResult<Option<TableSchema>> {
        let _guard = InFlightGuard::enter(&self.in_flight);

        let delay = self.inner.lock().await.introspect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check_fault(&table.name, FaultPoint::Introspect).await?;

        self.database.get_table_schema(table).await
    }

    async fn get_schema_table_names(&self, schema: &str) -> SyncResult<Vec<TableName>> {
        self.database.get_schema_table_names(schema).await
    }
}

impl SyncSource for FaultyDatabase {
    async fn copy_table_out(&self, table: &TableName) -> SyncResult<CopyOutStream> {
        self.check_fault(&table.name, FaultPoint::CopyOut).await?;

        let stream = self.database.copy_table_out(table).await?;
        if let Err(err) = self
            .check_fault(&table.name, FaultPoint::CopyOutStream)
            .await
        {
            let failure = stream::once(async move { Err::<Bytes, _>(err) });
            return Ok(stream.take(1).chain(failure).boxed());
        }

        Ok(stream)
    }
}

impl SyncTarget for FaultyDatabase {
    type Writer = FaultyCopyInWriter;

    async fn execute_statement(&self, statement: &str) -> SyncResult<()> {
        if let Some(table_schema) = parse_create_table_statement(statement) {
            self.check_fault(&table_schema.name.name, FaultPoint::ApplyStatement)
                .await?;
        }

        self.database.execute_statement(statement).await
    }

    async fn truncate_table(&self, table: &TableName) -> SyncResult<()> {
        self.database.truncate_table(table).await
    }

    async fn copy_table_in(&self, table: &TableName) -> SyncResult<FaultyCopyInWriter> {
        let writer = self.database.copy_table_in(table).await?;

        Ok(FaultyCopyInWriter {
            database: self.clone(),
            table: table.clone(),
            writer,
        })
    }
}

/// Write half of an import into a [`FaultyDatabase`].
#[derive(Debug)]
pub struct FaultyCopyInWriter {
    database: FaultyDatabase,
    table: TableName,
    writer: MemoryCopyInWriter,
}

impl CopyInWriter for FaultyCopyInWriter {
    async fn write(&mut self, chunk: Bytes) -> SyncResult<()> {
        self.writer.write(chunk).await
    }

    async fn finish(self) -> SyncResult<u64> {
        // On a fault the inner writer is dropped unfinished, so nothing is imported.
        self.database
            .check_fault(&self.table.name, FaultPoint::FinishCopyIn)
            .await?;

        self.writer.finish().await
    }
}
