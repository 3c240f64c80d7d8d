pub mod base;
pub mod pool;
pub mod table_sync;
