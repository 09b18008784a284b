//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{apply_bind_override, load_config};
use crate::config::schema::ProxyConfig;

/// Watches the configuration file and publishes every valid, changed config.
///
/// Editors often emit several events per save; a reload that produces the same
/// configuration as the last one published is dropped.
pub struct ConfigWatcher {
    path: PathBuf,
    current: ProxyConfig,
    bind_override: Option<String>,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, seeded with the configuration in effect.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path, current: ProxyConfig) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                current,
                bind_override: None,
                update_tx,
            },
            update_rx,
        )
    }

    /// Keep `bind` as the listen address of every reloaded configuration.
    pub fn with_bind_override(mut self, bind: Option<String>) -> Self {
        self.bind_override = bind;
        self
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let bind_override = self.bind_override;
        let last = Mutex::new(self.current);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(mut new_config) => {
                            apply_bind_override(&mut new_config, bind_override.as_deref());
                            let Ok(mut last) = last.lock() else { return };
                            if *last == new_config {
                                return;
                            }
                            tracing::info!(path = ?path, "Config file changed, publishing reload");
                            *last = new_config.clone();
                            let _ = tx.send(new_config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
