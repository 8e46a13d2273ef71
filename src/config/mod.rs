pub mod display;
pub mod types;
pub mod validate;

pub use display::display_config;
pub use types::{Config, ServerConfig};
pub use validate::validate_configs;

use config_yaml::FromYaml;

/// Loads and validates the server block list from a YAML config file.
pub fn load(path: &str) -> Result<Vec<ServerConfig>, config_yaml::ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| config_yaml::ConfigError {
        message: format!("reading {}: {}", path, e),
        loc: config_yaml::Loc { line: 0, col: 0 },
        context: Vec::new(),
    })?;
    let config = Config::from_str(&contents)?;
    Ok(validate_configs(config.servers))
}
