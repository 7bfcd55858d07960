use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
///
/// [`ShutdownTx`] stops a scheduled sync loop once the cycle in progress, if any, is done.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Wraps a watch sender into a [`ShutdownTx`].
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Requests every subscriber to stop.
    pub fn shutdown(&self) {
        // Succeeds even when no receiver subscribed yet.
        self.0.send_replace(true);
    }

    /// Creates a new shutdown receiver subscription.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Receiver side of the shutdown channel.
pub type ShutdownRx = watch::Receiver<bool>;

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx::new(tx), rx)
}

/// Resolves once shutdown was requested or every transmitter was dropped.
pub async fn wait_for_shutdown(rx: &mut ShutdownRx) {
    // An error means the transmitter is gone, which is treated as a shutdown request.
    let _ = rx.wait_for(|requested| *requested).await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn subscribers_see_shutdown_requested_before_subscribing() {
        let (tx, _rx) = create_shutdown_channel();
        tx.shutdown();

        let mut rx = tx.subscribe();
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_transmitter_means_shutdown() {
        let (tx, mut rx) = create_shutdown_channel();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut rx))
            .await
            .unwrap();
    }
}
