//! Tracing bootstrap for the seeder.

use std::sync::OnceLock;

use anyhow::Context;
use tgfp_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// command output. Later calls are no-ops.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }

    let filter = env_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    match settings.log_format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .with_context(|| "failed to initialize tracing subscriber")?;

    let _ = TRACING_INIT.set(());
    tracing::debug!(target: "tgfp-telemetry", format = ?settings.log_format, "tracing initialized");
    Ok(())
}

fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => configured_filter(settings),
    }
}

fn configured_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(&settings.filter)
        .with_context(|| format!("invalid log filter '{}'", settings.filter))
}
