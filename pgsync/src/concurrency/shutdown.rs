use tokio::sync::watch;

/// Sending half of the shutdown channel of a sync run.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    /// Asks every table of the run to stop.
    ///
    /// Fails only when no receiver is left, i.e. when the run is already over.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }
}

/// Receiving half of the shutdown channel, one clone per table sync worker.
pub type ShutdownRx = watch::Receiver<()>;

pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(tx), rx)
}

/// Resolves once a shutdown has been signaled on `shutdown_rx`.
///
/// Clones of the channel's initial receiver also observe a shutdown sent before they were cloned.
/// If every sender is gone no shutdown can arrive anymore and the future never resolves.
pub async fn wait_for_shutdown(shutdown_rx: &mut ShutdownRx) {
    if shutdown_rx.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}
