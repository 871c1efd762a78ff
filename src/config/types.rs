use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::WindowSize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub file_storage: FileStorageConfig,
    pub aggregation: AggregationConfig,
}

/// HTTP server settings. All timeouts are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub read_header_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub idle_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStorageConfig {
    pub root_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub window_size: WindowSize,
}
