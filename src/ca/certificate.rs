//! Certificates issued by a CA.

use crate::commons::crypto::{Cert, Csr, KeyPair, PublicKey, Serial};
use crate::commons::storage::CommonName;
use super::{CaResult, CertificateAuthority, Error};


//------------ Certificate ---------------------------------------------------

/// A certificate issued by a CA along with the material it was made from.
///
/// Which parts are present depends on how the value came about. Issuing
/// a certificate produces everything, signing a CSR produces no key, and
/// loading produces whatever the store has. The issuing CA's certificate
/// is kept alongside for building the chain.
#[derive(Debug)]
pub struct Certificate {
    common_name: CommonName,
    key: Option<KeyPair>,
    public_key: Option<PublicKey>,
    csr: Option<Csr>,
    certificate: Option<Cert>,
    ca_certificate: Option<Cert>,
}

impl Certificate {
    pub(super) fn new(
        common_name: CommonName,
        key: Option<KeyPair>,
        public_key: Option<PublicKey>,
        csr: Option<Csr>,
        certificate: Option<Cert>,
        ca_certificate: Option<Cert>,
    ) -> Self {
        Certificate {
            common_name, key, public_key, csr, certificate, ca_certificate
        }
    }

    pub fn common_name(&self) -> &CommonName {
        &self.common_name
    }

    pub fn key(&self) -> Option<&KeyPair> {
        self.key.as_ref()
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    pub fn csr(&self) -> Option<&Csr> {
        self.csr.as_ref()
    }

    pub fn certificate(&self) -> Option<&Cert> {
        self.certificate.as_ref()
    }

    /// Returns the certificate of the issuing CA.
    pub fn ca_certificate(&self) -> Option<&Cert> {
        self.ca_certificate.as_ref()
    }

    pub fn private_key_pem(&self) -> Option<&str> {
        self.key.as_ref().map(KeyPair::pem)
    }

    pub fn public_key_pem(&self) -> Option<&str> {
        self.public_key.as_ref().map(PublicKey::pem)
    }

    pub fn csr_pem(&self) -> Option<&str> {
        self.csr.as_ref().map(Csr::pem)
    }

    pub fn certificate_pem(&self) -> Option<&str> {
        self.certificate.as_ref().map(Cert::pem)
    }

    pub fn ca_certificate_pem(&self) -> Option<&str> {
        self.ca_certificate.as_ref().map(Cert::pem)
    }

    /// Returns the certificate or fails with `MissingCertificate`.
    pub fn require_certificate(&self) -> CaResult<&Cert> {
        self.certificate.as_ref().ok_or_else(|| {
            Error::MissingCertificate(self.common_name.clone())
        })
    }

    pub fn serial(&self) -> CaResult<Serial> {
        Ok(self.require_certificate()?.serial()?)
    }

    /// Returns whether the certificate was signed by `ca`.
    pub fn is_issued_by(&self, ca: &CertificateAuthority) -> CaResult<bool> {
        let cert = self.require_certificate()?;
        Ok(cert.is_signed_by(ca.require_certificate()?)?)
    }
}
