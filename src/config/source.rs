// Configuration sources
// Where the loop fetches a fresh snapshot when a reload is requested

use std::sync::Arc;

use arc_swap::ArcSwap;

use super::types::Config;
use crate::error::ConfigError;

/// Produces the configuration snapshot applied at a reload point.
pub trait ConfigSource: Send {
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Re-reads the config file and environment on every reload
#[derive(Debug, Clone)]
pub struct FileSource {
    path: String,
}

impl FileSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load_from(&self.path)
    }
}

/// Snapshot published by an embedding host.
///
/// The host stores a new [`Config`] with [`SnapshotSource::publish`] and then
/// calls `request_reload()` on the control bridge. Clones share the slot.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    current: Arc<ArcSwap<Config>>,
}

impl SnapshotSource {
    pub fn new(initial: Config) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Replace the stored snapshot; the loop picks it up on its next reload
    pub fn publish(&self, config: Config) {
        self.current.store(Arc::new(config));
    }
}

impl ConfigSource for SnapshotSource {
    fn load(&self) -> Result<Config, ConfigError> {
        let snapshot = self.current.load_full();
        snapshot.validate()?;
        Ok(Config::clone(&snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_publish_replaces_whole_config() {
        let source = SnapshotSource::new(Config::default());
        let mut next = Config::default();
        next.server.max_sockets = 9;
        next.logging.level = "debug".to_string();

        source.publish(next.clone());
        assert_eq!(source.load().unwrap(), next);
    }

    #[test]
    fn test_snapshot_clone_shares_slot() {
        let source = SnapshotSource::new(Config::default());
        let host_side = source.clone();
        let mut next = Config::default();
        next.server.max_sockets = 1;
        host_side.publish(next);
        assert_eq!(source.load().unwrap().server.max_sockets, 1);
    }

    #[test]
    fn test_snapshot_invalid_is_error() {
        let mut bad = Config::default();
        bad.server.max_sockets = 0;
        let source = SnapshotSource::new(bad);
        assert!(source.load().is_err());
    }

    #[test]
    fn test_file_source_missing_file_falls_back_to_defaults() {
        let source = FileSource::new("/nonexistent/hello_httpd_source_test");
        assert_eq!(source.load().unwrap().server.port, 8888);
    }
}
