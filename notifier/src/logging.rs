//! Tracing setup and the runtime verbosity switch shared by components.
//!
//! `LogConfig` is created once by [`init_tracing`] (or [`LogConfig::detached`]
//! in tests) and handed to each component at construction. Verbose mode
//! swaps the active `EnvFilter` to `debug` for this workspace's crates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};

const VERBOSE_DIRECTIVES: &str = "info,linear_notify=debug,linear_notify_lib=debug,linear_client=debug,notify_db=debug";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[derive(Clone)]
pub struct LogConfig {
    inner: Arc<LogConfigInner>,
}

struct LogConfigInner {
    verbose: AtomicBool,
    base_directives: String,
    handle: Option<FilterHandle>,
}

impl LogConfig {
    /// A config that is not attached to any subscriber.
    pub fn detached(verbose: bool) -> Self {
        Self {
            inner: Arc::new(LogConfigInner {
                verbose: AtomicBool::new(verbose),
                base_directives: "info".into(),
                handle: None,
            }),
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.inner.verbose.load(Ordering::Relaxed)
    }

    /// Switch verbose logging on or off. Returns the previous state.
    pub fn set_verbose(&self, verbose: bool) -> bool {
        let previous = self.inner.verbose.swap(verbose, Ordering::Relaxed);
        if previous != verbose {
            self.apply_filter(verbose);
            tracing::info!(verbose, "Log verbosity changed");
        }
        previous
    }

    /// Enable or disable verbose logging until the returned guard drops.
    pub fn scoped_verbose(&self, verbose: bool) -> VerboseGuard {
        let previous = self.set_verbose(verbose);
        VerboseGuard {
            config: self.clone(),
            previous,
        }
    }

    fn apply_filter(&self, verbose: bool) {
        let Some(handle) = &self.inner.handle else {
            return;
        };
        let directives = if verbose {
            VERBOSE_DIRECTIVES
        } else {
            self.inner.base_directives.as_str()
        };
        if let Err(e) = handle.reload(EnvFilter::new(directives)) {
            eprintln!("failed to reload log filter: {e}");
        }
    }
}

/// Restores the previous verbosity on drop.
pub struct VerboseGuard {
    config: LogConfig,
    previous: bool,
}

impl Drop for VerboseGuard {
    fn drop(&mut self) {
        self.config.set_verbose(self.previous);
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the base directive.
pub fn init_tracing(verbose: bool) -> LogConfig {
    let base_directives = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let initial = if verbose {
        VERBOSE_DIRECTIVES.to_string()
    } else {
        base_directives.clone()
    };

    let (filter, handle) = reload::Layer::new(EnvFilter::new(initial));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    LogConfig {
        inner: Arc::new(LogConfigInner {
            verbose: AtomicBool::new(verbose),
            base_directives,
            handle: Some(handle),
        }),
    }
}
