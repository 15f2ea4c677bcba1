use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::Schema;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "routeplan.yaml";

#[derive(Debug, Error)]
pub enum Error {
    #[error("can't read from '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    pub fn invalid_configuration(msg: impl Display) -> Self {
        Self::InvalidConfiguration(msg.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////
// LogLevel
////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub const VARIANTS: [&'static str; 4] = ["error", "warn", "info", "debug"];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            _ => Err(format!(
                "unknown log level '{s}', expected one of: {}",
                Self::VARIANTS.join(", ")
            )),
        }
    }
}

impl From<LogLevel> for slog::Level {
    fn from(l: LogLevel) -> slog::Level {
        match l {
            LogLevel::Error => slog::Level::Error,
            LogLevel::Warn => slog::Level::Warning,
            LogLevel::Info => slog::Level::Info,
            LogLevel::Debug => slog::Level::Debug,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Config
////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub log_level: Option<LogLevel>,

    #[serde(default)]
    pub schema: Schema,
}

impl Config {
    /// Reads and validates the configuration file. A log level given on
    /// the command line wins over the one from the file.
    ///
    /// # Errors
    /// - see [`Config::read_yaml_file`] and [`Config::validate`]
    pub fn init(path: &str, log_level: Option<LogLevel>) -> Result<Self, Error> {
        let mut config = Self::read_yaml_file(path)?;
        if log_level.is_some() {
            config.log_level = log_level;
        }
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// - the file can't be read
    /// - the contents are not a valid configuration
    pub fn read_yaml_file(path: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.into(),
            source,
        })?;
        Self::read_yaml_contents(&contents)
    }

    /// # Errors
    /// - the contents are not a valid configuration
    pub fn read_yaml_contents(contents: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(contents).map_err(Error::invalid_configuration)?;
        Ok(config)
    }

    /// # Errors
    /// - the schema can't be used for routing
    pub fn validate(&self) -> Result<(), Error> {
        if self.schema.keyspaces.is_empty() {
            return Err(Error::invalid_configuration(
                "`schema.keyspaces` must contain at least one keyspace",
            ));
        }
        self.schema.validate().map_err(Error::invalid_configuration)
    }

    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        self.log_level.unwrap_or_default()
    }
}

////////////////////////////////////////////////////////////////////////////////
// tests
////////////////////////////////////////////////////////////////////////////////
