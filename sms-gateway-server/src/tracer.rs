use crate::settings::TracingSettings;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, prelude::*};

pub fn init_logs(settings: &TracingSettings) {
    let default_directive = settings
        .level
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let stdout = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive(default_directive)
            .from_env_lossy(),
    );
    tracing_subscriber::registry()
        // output logs (tracing) to stdout with log level taken from env
        // (default comes from the settings)
        .with(stdout)
        .try_init()
        .unwrap_or_else(|err| tracing::debug!(error = %err, "tracing is already initialized"));
}
