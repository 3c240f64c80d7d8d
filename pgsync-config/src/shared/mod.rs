mod base;
mod connection;
mod retry;
mod service;
mod sync;

pub use base::*;
pub use connection::*;
pub use retry::*;
pub use service::*;
pub use sync::*;
