//! Cooperative shutdown shared by every task.
//!
//! A [`ShutdownTrigger`] fires once and every cloned [`Shutdown`] observes it,
//! including clones taken after the trigger fired. Tasks select on
//! [`Shutdown::cancelled`] at each suspension point.
//!
//! # Example
//!
//! ```rust
//! use rs_blinds::shutdown;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let (trigger, shutdown) = shutdown::channel();
//! let worker = shutdown.clone();
//!
//! let task = tokio::spawn(async move {
//!     worker.cancelled().await;
//!     "stopped"
//! });
//!
//! trigger.trigger();
//! assert_eq!(task.await.unwrap(), "stopped");
//! assert!(shutdown.is_cancelled());
//! # });
//! ```

use tokio::sync::watch;

/// Creates a connected trigger/listener pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Sending side of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signal every listener. Calling this more than once is harmless.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Create another listener.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

/// Listening side of the shutdown signal.
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Returns true once shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when shutdown is requested.
    ///
    /// Dropping the trigger without firing it also counts as a request, so
    /// tasks never outlive the owner of the trigger.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // Err means the trigger is gone.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
