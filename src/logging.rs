//! Logger initialisation

use log::warn;

use crate::config::LoggingConfig;

/// Initialise log4rs from the configured YAML file, falling back to
/// env_logger (`RUST_LOG`, default `info`) when it cannot be loaded.
pub fn init(config: &LoggingConfig) {
    if let Err(e) = log4rs::init_file(&config.config_file, Default::default()) {
        let fallback = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
        if fallback.is_ok() {
            warn!("Could not load log config {}: {}; logging to stderr", config.config_file, e);
        }
    }
}
