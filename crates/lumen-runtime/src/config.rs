use crate::error::{set_error_policy, ErrorPolicy};
use crate::logging::{init_logging, LoggingConfig};

/// Process-wide runtime settings.
///
/// Keep this structure small. Backend-specific knobs belong to the backend's
/// own configuration type.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Logger setup. `None` leaves logger installation to the application.
    pub logging: Option<LoggingConfig>,

    /// Behavior on programmer errors (fatal unless relaxed).
    pub error_policy: ErrorPolicy,
}

/// Applies `config`. Intended usage is early in `main`.
///
/// Calling this again replaces the error policy; the logger is installed at
/// most once.
pub fn init(config: RuntimeConfig) {
    if let Some(logging) = config.logging {
        init_logging(logging);
    }
    set_error_policy(config.error_policy);
    log::debug!("runtime initialized (error policy: {:?})", config.error_policy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_policy;

    #[test]
    fn init_installs_policy_and_logger_once() {
        let config = RuntimeConfig {
            logging: Some(LoggingConfig {
                env_filter: Some("debug".to_string()),
                is_test: true,
                ..LoggingConfig::default()
            }),
            error_policy: ErrorPolicy::Return,
        };
        init(config.clone());
        assert_eq!(error_policy(), ErrorPolicy::Return);
        assert_eq!(log::max_level(), log::LevelFilter::Debug);

        // The logger stays as installed; the policy is applied again.
        init(RuntimeConfig {
            logging: Some(LoggingConfig {
                env_filter: Some("error".to_string()),
                ..LoggingConfig::default()
            }),
            ..config
        });
        assert_eq!(log::max_level(), log::LevelFilter::Debug);
        assert_eq!(error_policy(), ErrorPolicy::Return);
    }
}
