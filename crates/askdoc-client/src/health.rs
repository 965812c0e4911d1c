//! Background liveness monitor.
//!
//! Fixed-interval poll of `GET /health`, entirely outside the stream
//! controllers. The only shared state is one boolean flag with
//! last-write-wins semantics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::stream::CancelToken;

/// Periodic health poller with a shared online flag.
pub struct HealthMonitor {
    api: Arc<ApiClient>,
    online: Arc<AtomicBool>,
    shutdown: CancelToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            online: Arc::new(AtomicBool::new(false)),
            shutdown: CancelToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Last observed liveness verdict.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Start polling. Probes immediately, then every configured interval.
    /// Idempotent; a second call does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return;
        }

        let interval = Duration::from_secs(self.api.config().health_poll_interval_secs);
        let monitor = Arc::clone(self);
        info!(interval_secs = interval.as_secs(), "health monitor started");

        *task = Some(tokio::spawn(async move {
            loop {
                let online = monitor.api.health().await;
                monitor.online.store(online, Ordering::Relaxed);
                debug!(online, "health probe");

                tokio::select! {
                    _ = monitor.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }));
    }

    /// Stop polling. The flag retains its last value.
    pub fn stop(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}
