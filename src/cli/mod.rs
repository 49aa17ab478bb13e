//! The command line interface.

pub mod options;
pub mod report;

pub use self::options::Options;

use std::{error, fmt, io};
use std::borrow::Cow;
use crate::ca;
use crate::commons::storage::{self, Store};
use crate::config::{Config, ConfigError};
use self::report::ReportError;


//------------ run -----------------------------------------------------------

/// Runs the command given in `options` and prints its report to stdout.
pub fn run(options: Options) -> Result<(), Error> {
    let mut config = Config::create(options.general.config.as_deref())?;
    if let Some(storage) = options.general.storage {
        config.storage_path = storage;
    }
    config.init_logging()?;

    let store = Store::new(&config.storage_path)?;
    let response = options.command.run(&store)?;
    let report = response.report(options.general.format)?;
    print!("{}", report);
    if !report.ends_with('\n') {
        println!();
    }
    Ok(())
}


//------------ Error ---------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    Storage(storage::Error),
    Ca(ca::Error),
    Report(ReportError),
    Io {
        context: Cow<'static, str>,
        err: io::Error,
    },
}

impl Error {
    pub fn io(
        context: impl Into<Cow<'static, str>>, err: io::Error
    ) -> Self {
        Error::Io { context: context.into(), err }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
            Error::Storage(err) => err.fmt(f),
            Error::Ca(err) => err.fmt(f),
            Error::Report(err) => err.fmt(f),
            Error::Io { context, err } => write!(f, "{}: {}", context, err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Config(_) => None,
            Error::Storage(err) => Some(err),
            Error::Ca(err) => Some(err),
            Error::Report(err) => Some(err),
            Error::Io { err, .. } => Some(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<storage::Error> for Error {
    fn from(err: storage::Error) -> Self {
        Error::Storage(err)
    }
}

impl From<ca::Error> for Error {
    fn from(err: ca::Error) -> Self {
        Error::Ca(err)
    }
}

impl From<ReportError> for Error {
    fn from(err: ReportError) -> Self {
        Error::Report(err)
    }
}
