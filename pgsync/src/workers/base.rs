use std::future::Future;

use crate::error::SyncResult;

/// Something that runs on its own task once started.
///
/// Starting yields a handle `H` through which the worker's state `S` can be read.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    type Error;

    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle to a started [`Worker`].
pub trait WorkerHandle<S> {
    /// Returns the state shared with the worker, readable also after the worker ended.
    fn state(&self) -> S;

    /// Waits for the worker's task to end.
    ///
    /// Errors only when the task itself died, for example by panicking. How the work went is
    /// found in [`WorkerHandle::state`].
    fn wait(self) -> impl Future<Output = SyncResult<()>> + Send;
}
