//! Stop request shared between the lifecycle manager and the consumer loop.

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Owner side of the stop request. Held only by the pipe.
#[derive(Debug)]
pub(crate) struct StopRequest {
    tx: Option<oneshot::Sender<()>>,
}

/// Consumer side of the stop request.
#[derive(Debug)]
pub(crate) struct StopListener {
    /// `None` once the stop has been observed.
    rx: Option<oneshot::Receiver<()>>,
}

pub(crate) fn stop_request() -> (StopRequest, StopListener) {
    let (tx, rx) = oneshot::channel();
    (StopRequest { tx: Some(tx) }, StopListener { rx: Some(rx) })
}

impl StopRequest {
    /// Raises the stop request. Idempotent.
    pub(crate) fn raise(&mut self) {
        if let Some(tx) = self.tx.take() {
            // The listener is gone only if the consumer already exited.
            let _ = tx.send(());
        }
    }
}

impl StopListener {
    /// Completes once stop is raised, or the request is dropped.
    ///
    /// Cancellation-safe: dropping the future before completion leaves the
    /// listener armed.
    pub(crate) async fn raised(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let _ = rx.await;
            self.rx = None;
        }
    }

    /// Non-blocking check, consuming the stop if it is there.
    pub(crate) fn try_raised(&mut self) -> bool {
        let Some(rx) = self.rx.as_mut() else {
            return true;
        };
        match rx.try_recv() {
            Err(TryRecvError::Empty) => false,
            Ok(()) | Err(TryRecvError::Closed) => {
                self.rx = None;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_raise_is_idempotent() {
        let (mut stop, mut listener) = stop_request();
        assert!(!listener.try_raised());

        stop.raise();
        stop.raise();

        listener.raised().await;
        assert!(listener.try_raised());
        // Observing it again completes immediately.
        listener.raised().await;
    }

    #[tokio::test]
    async fn test_listener_survives_cancelled_wait() {
        let (mut stop, mut listener) = stop_request();

        let timed_out = tokio::time::timeout(Duration::from_millis(5), listener.raised()).await;
        assert!(timed_out.is_err());

        stop.raise();
        assert!(listener.try_raised());
    }

    #[tokio::test]
    async fn test_dropped_request_counts_as_raised() {
        let (stop, mut listener) = stop_request();
        drop(stop);
        assert!(listener.try_raised());
    }
}
