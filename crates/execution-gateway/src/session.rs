//! Closes the engine session exactly once

use std::sync::atomic::{AtomicBool, Ordering};

use engine_client::SharedEngineClient;

pub(crate) struct SessionGuard {
    client: SharedEngineClient,
    closed: AtomicBool,
}

impl SessionGuard {
    pub(crate) fn new(client: SharedEngineClient) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.client.close().await;
        log::debug!("Engine session closed");
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let client = self.client.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                log::debug!("Stream dropped early, closing engine session");
                handle.spawn(async move { client.close().await });
            }
            Err(_) => log::warn!("No async runtime available to close the engine session"),
        }
    }
}
