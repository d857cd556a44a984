//! Process configuration, read from the environment.

use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the API binds on, `API_PORT`.
    pub api_port: u16,
    /// Depth of the service request queue, `REQUEST_BUFFER`.
    pub request_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_port: 8080,
            request_buffer: 64,
        }
    }
}

impl Config {
    /// Read the environment, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Config, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            api_port: env_parsed("API_PORT", defaults.api_port)?,
            request_buffer: env_parsed("REQUEST_BUFFER", defaults.request_buffer)?,
        })
    }
}

fn env_parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::default();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.request_buffer, 64);

        let config = Config::from_env().unwrap();
        assert_eq!(config.api_port, 8080);
    }
}
