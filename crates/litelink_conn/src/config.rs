//! Connection configuration.

use crate::wake::WakeBroadcast;
use std::sync::Arc;
use std::time::Duration;

/// Default ceiling for busy-retry loops.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(1_000_000);

/// How date values are stored and interpreted by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateMode {
    /// The engine's default textual/epoch representation.
    #[default]
    Default,
    /// Floating-point Julian day numbers.
    Julian,
}

impl DateMode {
    /// Parses the date-representation selector.
    ///
    /// A selector starting with `j` or `J` selects Julian mode; any
    /// other value (or none) selects the default representation.
    #[must_use]
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            Some(s) if s.starts_with('j') || s.starts_with('J') => Self::Julian,
            _ => Self::Default,
        }
    }
}

/// Configuration for opening a connection.
///
/// Captured at construction; the session configuration fields
/// (`encoding`, `vfs`, `date_mode`) are immutable for the connection's
/// lifetime.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Session character encoding.
    pub encoding: String,

    /// VFS name routing the engine to a storage backend, if any.
    pub vfs: Option<String>,

    /// Encryption passphrase. Empty or absent means no key is applied.
    pub passphrase: Option<String>,

    /// Date representation for the session.
    pub date_mode: DateMode,

    /// Ceiling for any busy-retry loop tied to this connection.
    pub timeout: Duration,

    /// Wake broadcast to park busy waits on.
    ///
    /// `None` gives the connection its own broadcast. Supplying one
    /// shared instance across connections opts into cross-connection
    /// wakes (see [`WakeBroadcast`]).
    pub wake: Option<Arc<WakeBroadcast>>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            encoding: "UTF-8".to_string(),
            vfs: None,
            passphrase: None,
            date_mode: DateMode::Default,
            timeout: DEFAULT_BUSY_TIMEOUT,
            wake: None,
        }
    }
}

impl ConnectionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session character encoding.
    #[must_use]
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Sets the VFS name.
    #[must_use]
    pub fn vfs(mut self, vfs: impl Into<String>) -> Self {
        self.vfs = Some(vfs.into());
        self
    }

    /// Sets the encryption passphrase.
    #[must_use]
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Sets the date representation from a selector string.
    #[must_use]
    pub fn date_selector(mut self, selector: &str) -> Self {
        self.date_mode = DateMode::from_selector(Some(selector));
        self
    }

    /// Sets the busy-retry timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parks busy waits on a shared wake broadcast.
    #[must_use]
    pub fn wake_broadcast(mut self, wake: Arc<WakeBroadcast>) -> Self {
        self.wake = Some(wake);
        self
    }
}
