use super::RequestsLoggingLevel;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub bind_address: String,
    pub port: u16,
    pub metrics_port: u16,
    pub frontend_dir_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            metrics_port: 9091,
            frontend_dir_path: None,
        }
    }
}

impl From<&AppConfig> for ServerConfig {
    fn from(config: &AppConfig) -> Self {
        ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            bind_address: config.bind_address.clone(),
            port: config.port,
            metrics_port: config.metrics_port,
            frontend_dir_path: config.frontend_dir_path.clone(),
        }
    }
}
