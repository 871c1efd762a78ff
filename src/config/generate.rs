/// Starter configuration emitted by `logmill config init`.
pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGMILL CONFIGURATION
# =============================================================================
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logmill/config.yml
#   3. /etc/logmill/config.yml

server:
  port: 8080
  # Timeouts are in seconds.
  read_header_timeout: 5
  read_timeout: 30
  write_timeout: 30
  idle_timeout: 60

log:
  # One of: trace, debug, info, warn, error. RUST_LOG overrides.
  level: info

file_storage:
  # Root directory for raw batches and aggregate results. Created on demand.
  root_dir: ./data

aggregation:
  # Rollup window size: minute or hour.
  window_size: minute
"#
    .to_string()
}
