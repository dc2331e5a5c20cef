//! Online-state probe.
//!
//! The host application owns the `OnlineWatch` and reports connectivity
//! into it (browser online/offline events, a heartbeat probe, a test
//! toggling the flag). The coordinator only ever reads the receiver side.

use tokio::sync::watch;

/// Connectivity handle feeding the sync coordinator.
#[derive(Debug)]
pub struct OnlineWatch {
    tx: watch::Sender<bool>,
}

impl OnlineWatch {
    /// Creates a watch with the given initial connectivity.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Reports a connectivity change. Redundant reports are harmless.
    pub fn set_online(&self, online: bool) {
        // send_if_modified so redundant reports don't wake the loop.
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Current connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribes to connectivity transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for OnlineWatch {
    fn default() -> Self {
        Self::new(true)
    }
}
