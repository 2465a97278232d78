//! Configuration file watcher for hot reload.
//!
//! # Responsibilities
//! - Watch the config file for writes
//! - Coalesce the burst of events a single save produces
//! - Forward a reloaded config only when its admission section changed
//!
//! # Design Decisions
//! - Only admission settings are hot-swappable; listener and upstream
//!   changes alone are logged and not forwarded
//! - A config that fails to load or validate is dropped, the running one stays

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{AdmissionConfig, ProxyConfig};

/// Quiet period after a file event before the file is read.
const SETTLE: Duration = Duration::from_millis(200);

/// A watcher that monitors the configuration file for admission changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: AdmissionConfig,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, starting from the admission settings in use.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path, current: &AdmissionConfig) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                current: current.clone(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. The returned watcher must be kept alive.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                let _ = event_tx.send(());
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Config watch error"),
        })?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        tokio::spawn(self.reload_loop(event_rx));
        Ok(watcher)
    }

    async fn reload_loop(mut self, mut events: mpsc::UnboundedReceiver<()>) {
        while events.recv().await.is_some() {
            tokio::time::sleep(SETTLE).await;
            while events.try_recv().is_ok() {}

            let config = match load_config(&self.path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                    continue;
                }
            };

            if let Some(config) = self.accept(config) {
                if self.update_tx.send(config).is_err() {
                    tracing::debug!("Config receiver dropped, stopping watcher");
                    break;
                }
            }
        }
    }

    /// Keep `config` only if it changes the admission settings.
    fn accept(&mut self, config: ProxyConfig) -> Option<ProxyConfig> {
        if config.admission == self.current {
            tracing::info!("Config file changed without admission changes; restart to apply other settings");
            return None;
        }

        tracing::info!("Admission settings changed on disk");
        self.current = config.admission.clone();
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("admission-proxy-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_accept_only_admission_changes() {
        let initial = ProxyConfig::default();
        let (mut watcher, _rx) = ConfigWatcher::new(Path::new("proxy.toml"), &initial.admission);

        let mut listener_only = initial.clone();
        listener_only.listener.bind_address = "127.0.0.1:9999".into();
        assert!(watcher.accept(listener_only).is_none());

        let mut disabled = initial.clone();
        disabled.admission.enabled = false;
        assert!(watcher.accept(disabled.clone()).is_some());
        assert!(watcher.accept(disabled).is_none(), "same admission settings twice");
    }

    #[tokio::test]
    async fn test_file_write_delivers_update() {
        let path = temp_config("");
        let (watcher, mut updates) = ConfigWatcher::new(&path, &ProxyConfig::default().admission);
        let _watcher = watcher.run().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&path, "[admission]\nenabled = false\n").unwrap();

        let update = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("no update within timeout")
            .expect("channel closed");
        assert!(!update.admission.enabled);

        let _ = std::fs::remove_file(&path);
    }
}
