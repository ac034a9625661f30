//! Stop signal for the proxy server.

use tokio::sync::broadcast;

/// One-shot stop signal handed to [`HttpServer::run`](crate::HttpServer::run).
///
/// The server is normally the only subscriber. Signal forwarding holds a
/// clone and calls [`trigger`](Self::trigger); tests do the same directly.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver to pass to the server before it starts.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop the server. A receiver created afterwards never sees this.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Whether a server is still waiting on this signal.
    pub fn is_listening(&self) -> bool {
        self.tx.receiver_count() > 0
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_server_receiver() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_listening());

        let mut server = shutdown.subscribe();
        let forwarder = shutdown.clone();
        assert!(shutdown.is_listening());

        forwarder.trigger();
        assert!(server.recv().await.is_ok());

        drop(server);
        assert!(!shutdown.is_listening());
    }
}
