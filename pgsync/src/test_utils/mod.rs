//! Helpers shared by the unit and integration tests.
//!
//! Includes a fault injecting wrapper around [`crate::clients::memory::MemoryDatabase`], an
//! observer and a sleeper recording what a run did, and the management of throwaway Postgres
//! databases for the tests that need a live server.
pub mod database;
pub mod faults;
pub mod observer;
pub mod sleeper;
