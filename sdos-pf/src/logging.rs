//! Tracing subscriber setup shared by the binaries
//!
//! The subscriber is installed before the config file is read so that config
//! warnings are not lost. Its filter can then be switched to the configured
//! level, unless `RUST_LOG` was set, which always wins.

use tracing::warn;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Handle to the installed log filter
pub struct LogFilter {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilter {
    /// Switch to the configured level unless `RUST_LOG` is in effect
    pub fn apply_level(&self, level: &str) {
        if self.from_env {
            return;
        }
        match EnvFilter::try_new(level) {
            Ok(filter) => {
                if let Err(e) = self.handle.reload(filter) {
                    warn!("Failed to apply log level '{}': {}", level, e);
                }
            }
            Err(e) => warn!("Invalid log level '{}' in config: {}", level, e),
        }
    }
}

/// Install the global subscriber, writing to stderr
///
/// `default_filter` is used until [`LogFilter::apply_level`] is called, and
/// only when `RUST_LOG` is unset.
pub fn init(default_filter: &str) -> LogFilter {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(default_filter), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    LogFilter { handle, from_env }
}
