#[path = "../common/mod.rs"]
mod common;

mod pipeline_test;
mod postgres_test;
mod retry_test;
mod transfer_test;
