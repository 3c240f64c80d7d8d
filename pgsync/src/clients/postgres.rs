use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use pgsync_config::shared::{IntoConnectOptions, PgConnectionConfig};
use rustls::ClientConfig;
use std::io::BufReader;
use std::pin::Pin;
use std::sync::Arc;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, Connection, CopyInSink, NoTls, Row, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, debug, error, info};

use crate::clients::base::{
    Catalog, Connector, CopyInWriter, CopyOutStream, SyncSource, SyncTarget,
};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::schema::{ColumnSchema, TableName, TableRef, TableSchema};
use crate::sync_error;

/// Columns of a table in ordinal order.
///
/// `$1` is the schema, or null to pick the first schema of the `search_path` holding a table named
/// `$2`, which is how an unqualified name in `copy` is resolved as well. Array and user-defined
/// types are rendered through their underlying type so the result can be used in a statement.
const TABLE_COLUMNS_QUERY: &str = r#"
select
    c.table_schema::text as table_schema,
    c.table_name::text as table_name,
    c.column_name::text as column_name,
    case
        when c.data_type in ('ARRAY', 'USER-DEFINED')
            then quote_ident(c.udt_schema::text) || '.' || quote_ident(c.udt_name::text)
        else c.data_type::text
    end as data_type,
    c.character_maximum_length::int4 as character_maximum_length,
    c.is_nullable::text = 'YES' as nullable
from information_schema.columns c
where c.table_name::text = $2::text
    and c.table_schema::text = coalesce($1::text, (
        select p.nspname::text
        from unnest(current_schemas(false)) with ordinality as p(nspname, position)
        where exists (
            select 1
            from information_schema.tables t
            where t.table_schema::text = p.nspname::text
                and t.table_name::text = $2::text
                and t.table_type::text = 'BASE TABLE'
        )
        order by p.position
        limit 1
    ))
order by c.ordinal_position
"#;

/// Base tables of a schema, ordered by name.
const SCHEMA_TABLES_QUERY: &str = r#"
select t.table_schema::text as table_schema, t.table_name::text as table_name
from information_schema.tables t
where t.table_schema::text = $1::text
    and t.table_type::text = 'BASE TABLE'
order by t.table_name
"#;

/// Spawns a background task to monitor a Postgres connection until it terminates.
///
/// The connection ends when the owning [`PgClient`] is dropped.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        if let Err(e) = connection.await {
            error!("an error occurred during the Postgres connection: {}", e);
            return;
        }

        debug!("postgres connection terminated successfully")
    }
    .instrument(span);

    tokio::spawn(task);
}

/// Opens [`PgClient`]s to the database described by a [`PgConnectionConfig`].
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: PgConnectionConfig,
}

impl PgConnector {
    pub fn new(config: PgConnectionConfig) -> Self {
        Self { config }
    }
}

impl Connector for PgConnector {
    type Client = PgClient;

    async fn connect(&self) -> SyncResult<PgClient> {
        PgClient::connect(self.config.clone()).await
    }
}

/// A client to a Postgres database acting as either end of a sync.
#[derive(Debug, Clone)]
pub struct PgClient {
    client: Arc<Client>,
}

impl PgClient {
    /// Establishes a connection to Postgres. The connection uses TLS if configured in the
    /// supplied [`PgConnectionConfig`].
    pub async fn connect(pg_connection_config: PgConnectionConfig) -> SyncResult<Self> {
        match pg_connection_config.tls.enabled {
            true => PgClient::connect_tls(pg_connection_config).await,
            false => PgClient::connect_no_tls(pg_connection_config).await,
        }
    }

    async fn connect_no_tls(pg_connection_config: PgConnectionConfig) -> SyncResult<Self> {
        let config: Config = pg_connection_config.with_db();

        let (client, connection) = config.connect(NoTls).await?;
        spawn_postgres_connection::<NoTls>(connection);

        debug!(
            host = %pg_connection_config.host,
            database = %pg_connection_config.name,
            "connected to postgres without tls"
        );

        Ok(PgClient {
            client: Arc::new(client),
        })
    }

    async fn connect_tls(pg_connection_config: PgConnectionConfig) -> SyncResult<Self> {
        let config: Config = pg_connection_config.with_db();

        let mut root_store = rustls::RootCertStore::empty();
        let mut root_certs_reader =
            BufReader::new(pg_connection_config.tls.trusted_root_certs.as_bytes());
        for cert in rustls_pemfile::certs(&mut root_certs_reader) {
            let cert = cert?;
            root_store.add(cert)?;
        }

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let (client, connection) = config.connect(MakeRustlsConnect::new(tls_config)).await?;
        spawn_postgres_connection::<MakeRustlsConnect>(connection);

        debug!(
            host = %pg_connection_config.host,
            database = %pg_connection_config.name,
            "connected to postgres with tls"
        );

        Ok(PgClient {
            client: Arc::new(client),
        })
    }

    fn table_name_from_row(row: &Row) -> SyncResult<TableName> {
        Ok(TableName::new(
            row.try_get("table_schema")?,
            row.try_get("table_name")?,
        ))
    }
}

impl Catalog for PgClient {
    async fn get_table_schema(&self, table: &TableRef) -> SyncResult<Option<TableSchema>> {
        let schema = table.schema.as_deref();
        let params: [&(dyn ToSql + Sync); 2] = [&schema, &table.name];
        let rows = self.client.query(TABLE_COLUMNS_QUERY, &params).await?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let name = Self::table_name_from_row(first)?;

        let mut column_schemas = Vec::with_capacity(rows.len());
        for row in &rows {
            column_schemas.push(ColumnSchema::new(
                row.try_get("column_name")?,
                row.try_get("data_type")?,
                row.try_get("character_maximum_length")?,
                row.try_get("nullable")?,
            ));
        }

        Ok(Some(TableSchema::new(name, column_schemas)))
    }

    async fn get_schema_table_names(&self, schema: &str) -> SyncResult<Vec<TableName>> {
        let rows = self.client.query(SCHEMA_TABLES_QUERY, &[&schema]).await?;

        rows.iter().map(Self::table_name_from_row).collect()
    }
}

impl SyncSource for PgClient {
    async fn copy_table_out(&self, table: &TableName) -> SyncResult<CopyOutStream> {
        let statement = format!(
            "copy {} to stdout (format binary)",
            table.as_quoted_identifier()
        );
        let stream = self.client.copy_out(statement.as_str()).await?;

        Ok(stream.map(|chunk| chunk.map_err(SyncError::from)).boxed())
    }
}

impl SyncTarget for PgClient {
    type Writer = PgCopyInWriter;

    async fn execute_statement(&self, statement: &str) -> SyncResult<()> {
        self.client.batch_execute(statement).await?;

        Ok(())
    }

    async fn truncate_table(&self, table: &TableName) -> SyncResult<()> {
        let statement = format!("truncate table {}", table.as_quoted_identifier());
        self.client.batch_execute(&statement).await?;

        info!(table = %table, "truncated target table");

        Ok(())
    }

    async fn copy_table_in(&self, table: &TableName) -> SyncResult<PgCopyInWriter> {
        let statement = format!(
            "copy {} from stdin (format binary)",
            table.as_quoted_identifier()
        );
        let sink = self.client.copy_in::<_, Bytes>(statement.as_str()).await?;

        Ok(PgCopyInWriter {
            sink: Box::pin(sink),
        })
    }
}

/// Write half of a `copy ... from stdin` on a [`PgClient`].
///
/// Dropping it without calling [`CopyInWriter::finish`] makes the server abort the copy.
pub struct PgCopyInWriter {
    sink: Pin<Box<CopyInSink<Bytes>>>,
}

impl CopyInWriter for PgCopyInWriter {
    async fn write(&mut self, chunk: Bytes) -> SyncResult<()> {
        self.sink.send(chunk).await?;

        Ok(())
    }

    async fn finish(mut self) -> SyncResult<u64> {
        self.sink.as_mut().finish().await.map_err(|err| {
            sync_error!(
                ErrorKind::CopyFailed,
                "Finishing the copy into the target failed",
                err
            )
        })
    }
}
