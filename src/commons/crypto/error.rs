//! Errors of the crypto layer.

use std::{error, fmt};
use openssl::error::ErrorStack;


//------------ Error ---------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    /// An error reported by openssl.
    OpenSsl(ErrorStack),

    /// An error reported by rcgen while building a CRL.
    Rcgen(rcgen::Error),

    /// A timestamp outside of what can be encoded.
    Time(String),

    /// A value could not be decoded.
    Decode(String),

    /// A signature did not match the key it claims.
    InvalidSignature,

    /// A certificate or CSR lacks a usable common name.
    MissingCommonName,
}

impl Error {
    pub fn decode(e: impl fmt::Display) -> Self {
        Error::Decode(e.to_string())
    }

    pub fn time(e: impl fmt::Display) -> Self {
        Error::Time(e.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenSsl(e) => write!(f, "OpenSSL error: {e}"),
            Error::Rcgen(e) => write!(f, "cannot build CRL: {e}"),
            Error::Time(e) => write!(f, "invalid time: {e}"),
            Error::Decode(e) => write!(f, "cannot decode: {e}"),
            Error::InvalidSignature => f.write_str("invalid signature"),
            Error::MissingCommonName => {
                f.write_str("subject has no valid common name")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::OpenSsl(e) => Some(e),
            Error::Rcgen(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ErrorStack> for Error {
    fn from(e: ErrorStack) -> Self {
        Error::OpenSsl(e)
    }
}

impl From<rcgen::Error> for Error {
    fn from(e: rcgen::Error) -> Self {
        Error::Rcgen(e)
    }
}
