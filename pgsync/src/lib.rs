//! Copies the structure, and optionally the rows, of Postgres tables from a source database into a
//! target database.
//!
//! A run is driven by a [`pipeline::SyncPipeline`]. For every table it introspects the source
//! catalog, creates the table on the target if it's missing and relays the rows with a binary
//! `copy`. Each table is retried independently and a bounded number of tables is worked on at the
//! same time.

pub mod clients;
pub mod concurrency;
pub mod error;
mod macros;
pub mod observer;
pub mod pipeline;
pub mod schema;
pub mod sync;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod workers;
