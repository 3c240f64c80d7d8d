use pgsync_config::shared::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
use tokio::runtime::Handle;
use tokio_postgres::{Client, NoTls};
use tracing::info;
use uuid::Uuid;

/// Returns the [`PgConnectionConfig`] of a fresh database on the local Postgres instance.
///
/// The database name is random so tests never share a database.
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: "localhost".to_owned(),
        port: 5430,
        name: Uuid::new_v4().to_string(),
        username: "postgres".to_owned(),
        password: Some("postgres".into()),
        tls: TlsConfig {
            trusted_root_certs: String::new(),
            enabled: false,
        },
    }
}

/// A throwaway Postgres database, dropped together with this value.
///
/// Dropping requires a multi threaded runtime.
pub struct PgDatabase {
    pub config: PgConnectionConfig,
    pub client: Client,
}

impl PgDatabase {
    /// Creates a database with a random name and connects to it.
    ///
    /// # Panics
    ///
    /// Panics if the local Postgres instance can't be reached.
    pub async fn new() -> Self {
        let config = local_pg_connection_config();

        let admin = connect(&config.without_db()).await;
        admin
            .execute(&*format!(r#"create database "{}""#, config.name), &[])
            .await
            .expect("Failed to create database");

        let client = connect(&config.with_db()).await;

        Self { config, client }
    }

    /// Executes one or more statements separated by semicolons.
    pub async fn run_sql(&self, sql: &str) {
        self.client
            .batch_execute(sql)
            .await
            .expect("Failed to run sql");
    }
}

impl Drop for PgDatabase {
    fn drop(&mut self) {
        let name = self.config.name.clone();
        let config: tokio_postgres::Config = self.config.without_db();

        tokio::task::block_in_place(move || {
            Handle::current().block_on(async move {
                let admin = connect(&config).await;
                admin
                    .execute(
                        "select pg_terminate_backend(pid) from pg_stat_activity where datname = $1 and pid <> pg_backend_pid()",
                        &[&name],
                    )
                    .await
                    .expect("Failed to terminate database connections");
                admin
                    .execute(&*format!(r#"drop database if exists "{name}""#), &[])
                    .await
                    .expect("Failed to drop database");
            });
        });
    }
}

async fn connect(config: &tokio_postgres::Config) -> Client {
    let (client, connection) = config
        .connect(NoTls)
        .await
        .expect("Failed to connect to Postgres");

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            info!("connection error: {e}");
        }
    });

    client
}

/// Creates a database for each end of a sync.
pub async fn spawn_databases() -> (PgDatabase, PgDatabase) {
    (PgDatabase::new().await, PgDatabase::new().await)
}
