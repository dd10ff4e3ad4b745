use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Dependencies whose logs are hidden unless running at Trace. The HTTP stack
/// and the WebSocket codec log every frame at Debug.
const FILTERED_MODULES: &[&str] = &[
    "tower",
    "tower_http",
    "hyper",
    "axum",
    "tungstenite",
    "tokio_tungstenite",
];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger at the configured level.
    ///
    /// Panics if a logger is already installed; call once from `main`.
    pub fn init_logger(config: &Config) {
        Self::try_init_logger(config.log_level_filter).expect("Failed to start simplelog");
    }

    pub fn try_init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
        TermLogger::init(
            level,
            Self::build_log_config(level),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )
    }

    /// RFC3339 timestamps everywhere. Module paths are shown from Debug down so
    /// hub, session and dispatcher lines can be told apart when tracing a
    /// connection.
    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if level >= LevelFilter::Debug {
            builder.set_target_level(LevelFilter::Error);
        }

        if Self::should_filter_dependencies(level) {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }

    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_and_websocket_stacks_are_filtered() {
        for module in ["tower", "hyper", "axum", "tungstenite"] {
            assert!(
                FILTERED_MODULES.contains(&module),
                "{module} should be filtered"
            );
        }
    }

    #[test]
    fn test_workspace_crates_are_never_filtered() {
        for module in ["hub", "web", "domain", "events", "omnihome"] {
            assert!(
                !FILTERED_MODULES.contains(&module),
                "{module} should not be filtered"
            );
        }
    }

    #[test]
    fn test_only_trace_shows_dependency_logs() {
        assert!(!Logger::should_filter_dependencies(LevelFilter::Trace));
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ] {
            assert!(Logger::should_filter_dependencies(level), "{level}");
        }
    }

    #[test]
    fn test_build_log_config_for_every_level() {
        for level in [LevelFilter::Info, LevelFilter::Debug, LevelFilter::Trace] {
            let _config = Logger::build_log_config(level);
        }
    }
}
