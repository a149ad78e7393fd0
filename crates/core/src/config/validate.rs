use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Library section exists (enforced by serde) with non-empty directories
/// - Server port is not 0
/// - Scheduler intervals and cancel timeout are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let library = &config.library;
    if library.movie_dir.as_os_str().is_empty() {
        return Err(invalid("library.movie_dir cannot be empty"));
    }
    if library.tv_dir.as_os_str().is_empty() {
        return Err(invalid("library.tv_dir cannot be empty"));
    }
    // Library scans would pick up each other's files.
    if library.movie_dir.starts_with(&library.tv_dir)
        || library.tv_dir.starts_with(&library.movie_dir)
    {
        return Err(invalid("library.movie_dir and library.tv_dir must not overlap"));
    }

    let scheduler = &config.scheduler;
    for (name, value) in [
        ("pending_poll_interval_ms", scheduler.pending_poll_interval_ms),
        ("check_interval_secs", scheduler.check_interval_secs),
        ("prune_interval_secs", scheduler.prune_interval_secs),
        ("cancel_timeout_secs", scheduler.cancel_timeout_secs),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "scheduler.{} cannot be 0",
                name
            )));
        }
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn config() -> Config {
        load_config_from_str(
            r#"
[library]
movie_dir = "/media/movies"
tv_dir = "/media/tv"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_empty_library_dir_fails() {
        let mut config = config();
        config.library.tv_dir = Default::default();
        let err = validate_config(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration validation failed: library.tv_dir cannot be empty"
        );
    }

    #[test]
    fn test_validate_overlapping_library_dirs_fail() {
        let mut config = config();
        config.library.tv_dir = "/media/movies/tv".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("must not overlap"));

        config.library.tv_dir = "/media".into();
        assert!(validate_config(&config).is_err());

        config.library.tv_dir = "/media/movies-tv".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_interval_fails() {
        let mut config = config();
        config.scheduler.cancel_timeout_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("scheduler.cancel_timeout_secs"));
    }

    #[test]
    fn test_zero_cadence_is_valid() {
        let mut config = config();
        config.scheduler.indexer_sync_secs = 0;
        config.scheduler.cleanup.retention_hours = 0;
        assert!(validate_config(&config).is_ok());
    }
}
