//! Configuration of the certkeeper binary.

use std::{env, error, fmt, fs, io};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::{LevelFilter, error};
use serde::de;
use serde::{Deserialize, Deserializer};
#[cfg(unix)]
use syslog::Facility;
use crate::constants::{
    CERTKEEPER_APP, CERTKEEPER_DEFAULT_CONFIG_FILE,
    CERTKEEPER_ENV_LOG_LEVEL, CERTKEEPER_ENV_LOG_TYPE,
    CERTKEEPER_ENV_STORAGE_PATH,
};


//------------ ConfigDefaults ------------------------------------------------

pub struct ConfigDefaults;

impl ConfigDefaults {
    fn storage_path() -> PathBuf {
        match env::var(CERTKEEPER_ENV_STORAGE_PATH) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from("./data"),
        }
    }

    fn log_level() -> LevelFilter {
        env::var(CERTKEEPER_ENV_LOG_LEVEL).ok().and_then(|level| {
            match LevelFilter::from_str(&level) {
                Ok(level) => Some(level),
                Err(_) => {
                    eprintln!(
                        "Ignoring unrecognized log level in env var {}",
                        CERTKEEPER_ENV_LOG_LEVEL
                    );
                    None
                }
            }
        }).unwrap_or(LevelFilter::Warn)
    }

    fn log_type() -> LogType {
        env::var(CERTKEEPER_ENV_LOG_TYPE).ok().and_then(|log_type| {
            match LogType::from_str(&log_type) {
                Ok(log_type) => Some(log_type),
                Err(err) => {
                    eprintln!(
                        "Ignoring env var {}: {}",
                        CERTKEEPER_ENV_LOG_TYPE, err
                    );
                    None
                }
            }
        }).unwrap_or(LogType::Stderr)
    }

    fn log_file() -> PathBuf {
        PathBuf::from("./certkeeper.log")
    }

    fn syslog_facility() -> String {
        "daemon".to_string()
    }
}


//------------ Config --------------------------------------------------------

/// The global configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The base directory of the store.
    #[serde(default = "ConfigDefaults::storage_path")]
    pub storage_path: PathBuf,

    #[serde(
        default = "ConfigDefaults::log_level",
        deserialize_with = "deserialize_level_filter"
    )]
    pub log_level: LevelFilter,

    #[serde(default = "ConfigDefaults::log_type")]
    pub log_type: LogType,

    #[serde(default = "ConfigDefaults::log_file")]
    pub log_file: PathBuf,

    #[serde(default = "ConfigDefaults::syslog_facility")]
    pub syslog_facility: String,
}

/// # Loading
impl Config {
    /// Creates the configuration.
    ///
    /// If `file` is given, it must exist. Otherwise the default config file
    /// is read if it exists and the defaults are used if it doesn't.
    pub fn create(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match file {
            Some(file) => Self::read_config(file)?,
            None => {
                let file = Path::new(CERTKEEPER_DEFAULT_CONFIG_FILE);
                if file.exists() {
                    Self::read_config(file)?
                }
                else {
                    Self::from_toml("")?
                }
            }
        };
        config.verify()?;
        Ok(config)
    }

    pub fn read_config(file: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(file).map_err(|err| {
            ConfigError::Other(format!(
                "Cannot read config file '{}': {}", file.display(), err
            ))
        })?;
        Self::from_toml(&content).map_err(|err| {
            ConfigError::Other(format!(
                "Error parsing config file '{}': {}", file.display(), err
            ))
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn verify(&self) -> Result<(), ConfigError> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(ConfigError::other("storage_path must not be empty"))
        }
        if self.log_type == LogType::File
            && self.log_file.as_os_str().is_empty()
        {
            return Err(ConfigError::other(
                "log_file is required when log_type is \"file\""
            ))
        }
        Ok(())
    }
}

/// # Logging
impl Config {
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        match self.log_type {
            LogType::File => self.file_logger(&self.log_file),
            LogType::Stderr => self.stderr_logger(),
            #[cfg(unix)]
            LogType::Syslog => {
                let facility = Facility::from_str(&self.syslog_facility)
                    .map_err(|_| {
                        ConfigError::other("Invalid syslog_facility")
                    })?;
                self.syslog_logger(facility)
            }
            #[cfg(not(unix))]
            LogType::Syslog => {
                Err(ConfigError::other(
                    "syslog logging is only supported on Unix systems"
                ))
            }
        }
    }

    /// Creates a stderr logger.
    fn stderr_logger(&self) -> Result<(), ConfigError> {
        self.fern_logger()
            .chain(io::stderr())
            .apply()
            .map_err(|e| {
                ConfigError::Other(
                    format!("Failed to init stderr logging: {e}")
                )
            })
    }

    /// Creates a file logger using the file provided by `path`.
    fn file_logger(&self, path: &Path) -> Result<(), ConfigError> {
        let file = match fern::log_file(path) {
            Ok(file) => file,
            Err(err) => {
                let error_string = format!(
                    "Failed to open log file '{}': {}", path.display(), err
                );
                error!("{}", error_string.as_str());
                return Err(ConfigError::Other(error_string));
            }
        };
        self.fern_logger()
            .chain(file)
            .apply()
            .map_err(|e| {
                ConfigError::Other(format!("Failed to init file logging: {e}"))
            })
    }

    /// Creates a syslog logger and configures correctly.
    #[cfg(unix)]
    fn syslog_logger(
        &self, facility: syslog::Facility
    ) -> Result<(), ConfigError> {
        let process = env::current_exe()
            .ok()
            .and_then(|path| {
                path.file_name()
                    .and_then(std::ffi::OsStr::to_str)
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| String::from(CERTKEEPER_APP));
        let formatter = syslog::Formatter3164 {
            facility,
            hostname: None,
            process,
            pid: std::process::id(),
        };
        let logger = syslog::unix(formatter.clone())
            .or_else(|_| syslog::tcp(formatter.clone(), ("127.0.0.1", 601)))
            .or_else(|_| {
                syslog::udp(formatter, ("127.0.0.1", 0), ("127.0.0.1", 514))
            });
        match logger {
            Ok(logger) => {
                self.fern_logger().chain(logger).apply().map_err(|e| {
                    ConfigError::Other(format!("Failed to init syslog: {e}"))
                })
            }
            Err(err) => {
                let msg = format!("Cannot connect to syslog: {err}");
                Err(ConfigError::Other(msg))
            }
        }
    }

    /// Creates and returns a fern logger with log level tweaks.
    fn fern_logger(&self) -> fern::Dispatch {
        // Every file read is logged at trace level which drowns out
        // everything else.
        let storage_level = self.log_level.min(LevelFilter::Debug);

        let show_target = self.log_level == LevelFilter::Trace
            || self.log_level == LevelFilter::Debug;
        fern::Dispatch::new()
            .format(move |out, message, record| {
                if show_target {
                    out.finish(format_args!(
                        "{} [{}] [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                }
                else {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        message
                    ))
                }
            })
            .level(self.log_level)
            .level_for("certkeeper::commons::storage", storage_level)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: ConfigDefaults::storage_path(),
            log_level: ConfigDefaults::log_level(),
            log_type: ConfigDefaults::log_type(),
            log_file: ConfigDefaults::log_file(),
            syslog_facility: ConfigDefaults::syslog_facility(),
        }
    }
}

fn deserialize_level_filter<'de, D>(d: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    let string = String::deserialize(d)?;
    LevelFilter::from_str(&string).map_err(|_| {
        de::Error::custom(format!(
            "expected \"off\", \"error\", \"warn\", \"info\", \"debug\", \
             or \"trace\", found: \"{string}\""
        ))
    })
}


//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    TomlError(toml::de::Error),
    Other(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::TomlError(e) => e.fmt(f),
            ConfigError::Other(s) => s.fmt(f),
        }
    }
}

impl error::Error for ConfigError { }

impl ConfigError {
    pub fn other(s: &str) -> ConfigError {
        ConfigError::Other(s.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::TomlError(e)
    }
}


//------------ LogType -------------------------------------------------------

/// The target to log to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogType {
    Stderr,
    File,
    Syslog,
}

impl FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stderr" => Ok(LogType::Stderr),
            "file" => Ok(LogType::File),
            "syslog" => Ok(LogType::Syslog),
            _ => Err(format!(
                "expected \"stderr\", \"file\", or \"syslog\", found: \"{s}\""
            )),
        }
    }
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D>(d: D) -> Result<LogType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        LogType::from_str(&string).map_err(de::Error::custom)
    }
}


//------------ Tests ---------------------------------------------------------
