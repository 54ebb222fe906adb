use dbt_runner_core::config::{LogFormat, RunnerConfig};
use tracing::Level;

/// Installs the global subscriber. Output goes to stderr so stdout stays
/// parseable; repeated calls (tests) keep the first subscriber.
pub fn init(config: &RunnerConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
