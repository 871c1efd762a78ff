use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use super::types::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let config: Config = serde_yaml::from_str(&yaml_string)?;

    validate_config(&config)?;

    Ok(config)
}

/// Rejects startup on missing or out-of-range values; every problem is
/// reported, not just the first.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut problems = Vec::new();

    if config.server.port == 0 {
        problems.push("server.port (min=1)".to_string());
    }
    if config.server.read_header_timeout == 0 {
        problems.push("server.read_header_timeout (min=1)".to_string());
    }
    if config.server.read_timeout == 0 {
        problems.push("server.read_timeout (min=1)".to_string());
    }
    if config.server.write_timeout == 0 {
        problems.push("server.write_timeout (min=1)".to_string());
    }
    if config.server.idle_timeout == 0 {
        problems.push("server.idle_timeout (min=1)".to_string());
    }
    if config.log.level.parse::<tracing::Level>().is_err() {
        problems.push(format!(
            "log.level (oneof=trace debug info warn error, got {:?})",
            config.log.level
        ));
    }
    if config.file_storage.root_dir.as_os_str().is_empty() {
        problems.push("file_storage.root_dir (required)".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(problems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WindowSize;
    use std::io::Write;
    use tempfile::TempDir;

    const VALID_CONFIG: &str = r#"
server:
  port: 8080
  read_header_timeout: 5
  read_timeout: 30
  write_timeout: 30
  idle_timeout: 60
log:
  level: info
file_storage:
  root_dir: ./data
aggregation:
  window_size: minute
"#;

    fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_valid_config_loads() {
        let (_dir, path) = write_config(VALID_CONFIG);
        let config = load_config(&path).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.aggregation.window_size, WindowSize::Minute);
    }

    #[test]
    fn test_missing_section_rejected() {
        let (_dir, path) = write_config("server:\n  port: 8080\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::YamlParse(_))
        ));
    }

    #[test]
    fn test_zero_port_and_timeout_rejected_together() {
        let config = VALID_CONFIG
            .replace("port: 8080", "port: 0")
            .replace("read_timeout: 30", "read_timeout: 0");
        let (_dir, path) = write_config(&config);

        match load_config(&path) {
            Err(ConfigError::ValidationList(problems)) => {
                assert!(problems.iter().any(|p| p.contains("server.port")));
                assert!(problems.iter().any(|p| p.contains("server.read_timeout")));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let config = VALID_CONFIG.replace("level: info", "level: loud");
        let (_dir, path) = write_config(&config);
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::ValidationList(_))
        ));
    }

    #[test]
    fn test_unknown_window_size_rejected() {
        let config = VALID_CONFIG.replace("window_size: minute", "window_size: day");
        let (_dir, path) = write_config(&config);
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::YamlParse(_))
        ));
    }

    #[test]
    fn test_out_of_range_port_rejected() {
        let config = VALID_CONFIG.replace("port: 8080", "port: 70000");
        let (_dir, path) = write_config(&config);
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::YamlParse(_))
        ));
    }
}
