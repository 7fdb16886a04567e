//! Cooperative stop signalling between the engine and its loops.

use std::sync::Arc;

use tokio::sync::watch;

/// Owner side of a stop request. Clones share the same signal.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

/// Loop side of a stop request.
#[derive(Debug, Clone)]
pub struct StopListener {
    rx: watch::Receiver<bool>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request that every listening loop finish after its current item.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> StopListener {
        StopListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl StopListener {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop has been requested.
    ///
    /// Never resolves if every `StopSignal` was dropped without stopping.
    pub async fn stopped(&mut self) {
        let closed = self.rx.wait_for(|stopped| *stopped).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
