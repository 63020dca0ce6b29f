//! DON membership discovery

use crate::error::DonError;
use async_trait::async_trait;
use tokio::sync::watch;
use wfsync_types::Don;

/// Source of the node's DON membership
#[async_trait]
pub trait DonNotifier: Send + Sync {
    /// Resolve once the node's DON is known
    async fn wait_for_don(&self) -> Result<Don, DonError>;
}

/// [`DonNotifier`] fed by the membership subsystem through a watch channel
#[derive(Debug)]
pub struct WatchDonNotifier {
    tx: watch::Sender<Option<Don>>,
}

impl Default for WatchDonNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchDonNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish the node's DON, waking every waiter
    pub fn notify_don_set(&self, don: Don) {
        self.tx.send_replace(Some(don));
    }

    pub fn current(&self) -> Option<Don> {
        self.tx.borrow().clone()
    }
}

#[async_trait]
impl DonNotifier for WatchDonNotifier {
    async fn wait_for_don(&self) -> Result<Don, DonError> {
        let mut rx = self.tx.subscribe();
        let don = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| DonError::Unavailable("membership channel closed".to_string()))?;

        don.clone()
            .ok_or_else(|| DonError::Unavailable("membership cleared".to_string()))
    }
}
