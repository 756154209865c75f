use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
///
/// Nested keys use a double underscore, e.g. `VIDINGEST_TRANSCODER__FFMPEG_PATH`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("VIDINGEST_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use crate::transcode::{BackendKind, RotationMetadataPolicy};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[server]
port = 9000

[transcoder]
backend = "encoder_cli"
rotation_metadata = "zero"

[processing]
max_width = 1920
max_height = 1080
video_codec_fallbacks = ["mpeg4"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.transcoder.backend, BackendKind::EncoderCli);
        assert_eq!(config.transcoder.rotation_metadata, RotationMetadataPolicy::Zero);
        assert_eq!(config.processing.max_width, 1920);
        assert_eq!(config.processing.video_codec_fallbacks, vec!["mpeg4"]);
        // Untouched keys keep their defaults.
        assert_eq!(config.processing.thumbnail_max_width, 480);
        assert_eq!(config.jobs.max_parallel_jobs, 2);
    }

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.transcoder.backend, BackendKind::DirectProcess);
        assert_eq!(config.jobs.max_retained_jobs, 1000);
        assert_eq!(config.storage.input_root, PathBuf::from("data/uploads"));
    }

    #[test]
    fn test_load_storage_and_retention() {
        let toml = r#"
[jobs]
max_retained_jobs = 50
retention_secs = 600

[storage]
input_root = "/srv/uploads"
output_root = "/srv/media"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.jobs.max_retained_jobs, 50);
        assert_eq!(config.jobs.retention_secs, 600);
        assert_eq!(config.storage.input_root, PathBuf::from("/srv/uploads"));
        assert_eq!(config.storage.output_root, PathBuf::from("/srv/media"));
    }

    #[test]
    fn test_load_config_from_str_unknown_backend() {
        let toml = r#"
[transcoder]
backend = "gstreamer"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 3000

[logging]
format = "json"

[transcoder]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
timeout_secs = 600
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.transcoder.ffmpeg_path,
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg")
        );
        assert_eq!(config.transcoder.timeout_secs, 600);
    }
}
