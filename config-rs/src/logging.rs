//! Process-wide tracing setup for the pipeline binaries

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install a global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `{default_level},warn`
/// style directives. `LOG_FORMAT=json` switches to JSON lines. Repeated calls
/// are no-ops, so tests and binaries can both call this freely.
pub fn init_tracing(service_name: &str, default_level: &str) {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    match result {
        Ok(()) => tracing::info!(service = service_name, "tracing initialized"),
        Err(e) => eprintln!("tracing already initialized for {}: {}", service_name, e),
    }
}
