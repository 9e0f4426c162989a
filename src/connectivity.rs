//! Network reachability publishing.
//!
//! The platform (or the built-in probe) feeds online/offline states into a
//! [`ConnectivityMonitor`]; subscribers see the current value and are woken
//! on changes. Edge-triggering on offline-to-online transitions is the
//! scheduler's job, so repeated "still online" reports never fan out.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::ApiClient;

#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx }
    }

    /// Feed a reachability state. Subscribers are only notified on an
    /// actual transition.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|state| {
            if *state != online {
                info!(online, "connectivity changed");
                *state = online;
                true
            } else {
                false
            }
        });
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Poll the server health endpoint and feed the monitor. Used by the daemon
/// where no platform reachability signal is available.
pub fn spawn_probe(
    monitor: Arc<ConnectivityMonitor>,
    client: ApiClient,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let online = client.probe().await;
            monitor.set_online(online);
            tokio::time::sleep(interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transitions_notify_subscribers() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();
        assert!(!*rx.borrow_and_update());

        monitor.set_online(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn repeated_states_do_not_notify() {
        let monitor = ConnectivityMonitor::new(true);
        let mut rx = monitor.subscribe();
        rx.borrow_and_update();

        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }
}
