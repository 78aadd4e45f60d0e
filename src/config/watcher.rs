//! Hot reload of route policies.
//!
//! The config file's parent directory is watched, so editors that save by
//! renaming a temp file over the original are still seen. Only create and
//! content/name changes that touch the config file trigger a reload;
//! permission and timestamp updates are ignored. A file that fails to parse
//! or validate is logged and dropped, and the running `PolicyTable` stays.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{PolicyTable, ServiceConfig};

/// Publishes validated [`ServiceConfig`] reloads for one config file.
pub struct ConfigWatcher {
    path: PathBuf,
    file_name: Option<OsString>,
    update_tx: mpsc::UnboundedSender<ServiceConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServiceConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            file_name: path.file_name().map(|n| n.to_os_string()),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = self.watch_dir();
        tracing::info!(path = ?self.path, dir = ?dir, "Config watcher started");

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| self.handle(res),
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }

    fn watch_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn handle(&self, res: notify::Result<Event>) {
        match res {
            Ok(event) if self.touches_config(&event) => {
                tracing::debug!(kind = ?event.kind, "Config file changed");
                self.reload();
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(path = ?self.path, error = %e, "Config watch error"),
        }
    }

    fn touches_config(&self, event: &Event) -> bool {
        let content_change = match event.kind {
            EventKind::Create(_) => true,
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(_) => true,
            _ => false,
        };
        content_change
            && event
                .paths
                .iter()
                .any(|p| p.file_name().is_some() && p.file_name() == self.file_name.as_deref())
    }

    /// Load, validate and publish. Returns whether an update was sent.
    fn reload(&self) -> bool {
        match load_config(&self.path) {
            Ok(config) => {
                let routes = PolicyTable::from_config(&config).route_names();
                tracing::info!(path = ?self.path, routes = ?routes, "Config reloaded");
                self.update_tx.send(config).is_ok()
            }
            Err(e) => {
                tracing::warn!(
                    path = ?self.path,
                    error = %e,
                    "Config reload rejected, keeping current route policies"
                );
                false
            }
        }
    }
}
