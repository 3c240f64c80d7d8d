//! Syncing of a single table, from catalog introspection to the bulk copy of its rows.

pub mod report;
pub mod retry;
pub mod structure;
pub mod table;
pub mod transfer;
