use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Output and thumbnail bounds are non-zero
/// - Bitrates and the subprocess timeout are non-zero
/// - Thumbnail offset is a non-negative number
/// - At least one job may run and at least one finished job is retained
/// - Storage roots are set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let processing = &config.processing;
    if processing.max_width == 0 || processing.max_height == 0 {
        return Err(ConfigError::ValidationError(
            "processing.max_width and processing.max_height must be greater than 0".to_string(),
        ));
    }
    if processing.thumbnail_max_width == 0 || processing.thumbnail_max_height == 0 {
        return Err(ConfigError::ValidationError(
            "processing.thumbnail_max_width and processing.thumbnail_max_height must be greater than 0"
                .to_string(),
        ));
    }
    if processing.target_bitrate_kbps == 0 {
        return Err(ConfigError::ValidationError(
            "processing.target_bitrate_kbps cannot be 0".to_string(),
        ));
    }
    if processing.audio_bitrate_kbps == 0 {
        return Err(ConfigError::ValidationError(
            "processing.audio_bitrate_kbps cannot be 0".to_string(),
        ));
    }
    if !processing.thumbnail_offset_secs.is_finite() || processing.thumbnail_offset_secs < 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "processing.thumbnail_offset_secs must be >= 0, got {}",
            processing.thumbnail_offset_secs
        )));
    }

    if config.transcoder.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.jobs.max_parallel_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "jobs.max_parallel_jobs must be at least 1".to_string(),
        ));
    }
    if config.jobs.max_retained_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "jobs.max_retained_jobs must be at least 1".to_string(),
        ));
    }
    if config.jobs.retention_secs == 0 {
        return Err(ConfigError::ValidationError(
            "jobs.retention_secs cannot be 0".to_string(),
        ));
    }

    if config.storage.input_root.as_os_str().is_empty()
        || config.storage.output_root.as_os_str().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "storage.input_root and storage.output_root must be set".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_dimensions_fail() {
        let mut config = Config::default();
        config.processing.max_height = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("processing.max_width"));

        let mut config = Config::default();
        config.processing.thumbnail_max_width = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rates_and_offsets() {
        let mut config = Config::default();
        config.processing.target_bitrate_kbps = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.processing.thumbnail_offset_secs = -1.0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.processing.thumbnail_offset_secs = f64::NAN;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.processing.thumbnail_offset_secs = 0.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_timeout_and_jobs() {
        let mut config = Config::default();
        config.transcoder.timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.jobs.max_parallel_jobs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_parallel_jobs"));

        let mut config = Config::default();
        config.jobs.max_retained_jobs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_retained_jobs"));

        let mut config = Config::default();
        config.jobs.retention_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_storage_roots() {
        let mut config = Config::default();
        config.storage.output_root = std::path::PathBuf::new();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("storage.input_root"));
    }

    #[test]
    fn test_default_host_is_loopback() {
        assert!(Config::default().server.host.is_loopback());
    }
}
