//! Errors of CA operations.

use std::{error, fmt};
use crate::commons::crypto::{self, Serial};
use crate::commons::storage::{self, Artifact, CommonName, CommonNameError};
use super::Certificate;


//------------ Error ---------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    /// A common name that cannot be used.
    InvalidName(CommonNameError),

    /// The identity lacks one of the fields required for a CA.
    MissingInfo,

    /// A CA with this name already exists.
    AlreadyExists(CommonName),

    /// There is no CA with this name.
    NotFound(CommonName),

    /// The CA has no certificate with this name.
    CertificateNotFound {
        ca: CommonName,
        certificate: CommonName,
    },

    /// An intermediate CA was requested without a parent.
    ParentNotSpecified,

    /// The named CA or certificate has no certificate yet.
    MissingCertificate(CommonName),

    /// A required artifact is absent.
    MissingArtifact {
        owner: CommonName,
        artifact: Artifact,
    },

    /// A stored artifact cannot be parsed.
    InvalidArtifact {
        owner: CommonName,
        artifact: Artifact,
        error: crypto::Error,
    },

    /// The certificate was not issued by this CA.
    ForeignCertificate {
        ca: CommonName,
        certificate: CommonName,
    },

    /// The serial number is already on the CA's CRL.
    AlreadyRevoked {
        ca: CommonName,
        serial: Serial,
    },

    /// Creating, signing, or verifying failed.
    Codec(crypto::Error),

    /// Reading or writing the store failed.
    Storage(storage::Error),

    /// A certificate for a known CA was signed and stored, but copying it
    /// into that CA's own certificate slot failed.
    ///
    /// The signed certificate is returned so that the copy can be retried
    /// via [`propagate_certificate`].
    ///
    /// [`propagate_certificate`]: super::CertificateAuthority::propagate_certificate
    ChainPropagation {
        certificate: Box<Certificate>,
        error: storage::Error,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidName(e) => write!(f, "invalid name: {e}"),
            Error::MissingInfo => {
                f.write_str(
                    "identity needs organization, organizational unit, \
                     country, locality, and province"
                )
            }
            Error::AlreadyExists(ca) => {
                write!(f, "CA '{ca}' already exists")
            }
            Error::NotFound(ca) => write!(f, "unknown CA '{ca}'"),
            Error::CertificateNotFound { ca, certificate } => {
                write!(f, "CA '{ca}' has no certificate '{certificate}'")
            }
            Error::ParentNotSpecified => {
                f.write_str("intermediate CA requires a parent CA")
            }
            Error::MissingCertificate(name) => {
                write!(f, "'{name}' has no certificate")
            }
            Error::MissingArtifact { owner, artifact } => {
                write!(f, "missing {artifact} for '{owner}'")
            }
            Error::InvalidArtifact { owner, artifact, error } => {
                write!(f, "invalid {artifact} for '{owner}': {error}")
            }
            Error::ForeignCertificate { ca, certificate } => {
                write!(
                    f, "certificate '{certificate}' was not issued by CA '{ca}'"
                )
            }
            Error::AlreadyRevoked { ca, serial } => {
                write!(f, "serial {serial} already revoked by CA '{ca}'")
            }
            Error::Codec(e) => e.fmt(f),
            Error::Storage(e) => write!(f, "storage error: {e}"),
            Error::ChainPropagation { certificate, error } => {
                write!(
                    f,
                    "signed certificate '{}' but could not update that CA: {}",
                    certificate.common_name(), error
                )
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::InvalidName(e) => Some(e),
            Error::InvalidArtifact { error, .. } => Some(error),
            Error::Codec(e) => Some(e),
            Error::Storage(e) => Some(e),
            Error::ChainPropagation { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<CommonNameError> for Error {
    fn from(e: CommonNameError) -> Self {
        Error::InvalidName(e)
    }
}

impl From<crypto::Error> for Error {
    fn from(e: crypto::Error) -> Self {
        Error::Codec(e)
    }
}

impl From<storage::Error> for Error {
    fn from(e: storage::Error) -> Self {
        Error::Storage(e)
    }
}
