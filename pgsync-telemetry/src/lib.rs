//! Tracing setup for the sync service.
//!
//! Development runs log pretty output to the terminal, production runs log JSON lines to a
//! daily-rotated file. Every JSON line carries the `run_id` of the process that emitted it so the
//! output of one sync run can be told apart from the next.

mod tracing;

pub use crate::tracing::*;
