//! Logging setup.
//!
//! Events carry a component target (`loader`, `chunker`, `embedding`,
//! `index`, `retrieve`, `answer`, `pipeline`, `cli`), so levels can be set per
//! component.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! pipeline = "info"
//! retrieve = "debug"
//! ```
//!
//! `RUST_LOG` takes precedence over the config:
//! ```bash
//! RUST_LOG=pipeline=debug,index=trace ragcore index docs/
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Filter directives for `config`, e.g. `warn,pipeline=info`.
///
/// Module overrides are sorted so the output does not depend on map order.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    let mut directives = config.default.clone();
    for (module, level) in modules {
        directives.push(',');
        directives.push_str(module);
        directives.push('=');
        directives.push_str(level);
    }
    directives
}

/// Install the global subscriber. Only the first call has an effect.
///
/// Output goes to stderr so `--json` output on stdout stays machine readable.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Log a component event at info level.
///
/// ```ignore
/// log_event!("pipeline", "saved", "{}", path.display());
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:literal, $event:expr) => {
        tracing::info!(target: $component, "{}", $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::info!(target: $component, "{}: {}", $event, format!($($arg)*))
    };
}

/// Log a component event at debug level.
#[macro_export]
macro_rules! debug_event {
    ($component:literal, $event:expr) => {
        tracing::debug!(target: $component, "{}", $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::debug!(target: $component, "{}: {}", $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_filter_directives() {
        let config = LoggingConfig {
            default: "warn".to_string(),
            modules: HashMap::from([
                ("retrieve".to_string(), "debug".to_string()),
                ("pipeline".to_string(), "info".to_string()),
            ]),
        };
        assert_eq!(filter_directives(&config), "warn,pipeline=info,retrieve=debug");
        assert!(EnvFilter::try_new(filter_directives(&config)).is_ok());
    }
}
