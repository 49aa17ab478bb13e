//! Commands related to the certificates issued by a CA.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use crate::ca::{self, CertificateAuthority};
use crate::cli::Error;
use crate::cli::report::{CertificateDetails, CertificateList, Response};
use crate::commons::crypto::Csr;
use crate::commons::storage::{CommonName, Store};
use super::{Handle, IdentityArgs};


//-------- Issue -------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Issue {
    #[command(flatten)]
    ca: Handle,

    /// Common name of the new certificate
    name: String,

    #[command(flatten)]
    identity: IdentityArgs,
}

impl Issue {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        let ca_name = ca_name(&self.ca)?;
        let identity = self.identity.into_identity(false);
        let details = store.with_lock(&ca_name, || {
            let ca = CertificateAuthority::load(store, ca_name.as_str())?;
            let certificate = ca.issue_certificate(&self.name, &identity)?;
            CertificateDetails::new(&ca, &certificate)
        })?;
        Ok(Response::CertificateDetails(details))
    }
}


//-------- Sign --------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Sign {
    #[command(flatten)]
    ca: Handle,

    /// Path to a PEM encoded certificate signing request
    #[arg(long, value_name = "FILE")]
    csr: PathBuf,

    /// Validity in days
    #[arg(long, value_name = "DAYS", default_value_t = 0)]
    valid: u32,
}

impl Sign {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        let ca_name = ca_name(&self.ca)?;
        let pem = fs::read(&self.csr).map_err(|err| {
            Error::io(format!("Cannot read '{}'", self.csr.display()), err)
        })?;
        let csr = Csr::from_pem(&pem).map_err(ca::Error::Codec)?;

        // A CSR for another CA also writes to that CA, so lock both in
        // name order.
        let target = csr.common_name().and_then(|name| {
            CommonName::from_str(&name).ok()
        }).filter(|name| *name != ca_name);
        let sign = || {
            let ca = CertificateAuthority::load(store, ca_name.as_str())?;
            let certificate = ca.sign_csr(csr, self.valid)?;
            CertificateDetails::new(&ca, &certificate)
        };
        let details = match target {
            Some(target) => {
                let (first, second) = if target < ca_name {
                    (&target, &ca_name)
                }
                else {
                    (&ca_name, &target)
                };
                store.with_lock(first, || store.with_lock(second, sign))?
            }
            None => store.with_lock(&ca_name, sign)?,
        };
        Ok(Response::CertificateDetails(details))
    }
}


//-------- List --------------------------------------------------------------

#[derive(clap::Parser)]
pub struct List {
    #[command(flatten)]
    ca: Handle,
}

impl List {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        let ca = CertificateAuthority::load(store, &self.ca.ca)?;
        Ok(Response::CertificateList(CertificateList::new(
            ca.common_name().clone(), ca.list_certificates()?
        )))
    }
}


//-------- Show --------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Show {
    #[command(flatten)]
    ca: Handle,

    /// Common name of the certificate
    name: String,
}

impl Show {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        let ca = CertificateAuthority::load(store, &self.ca.ca)?;
        let certificate = ca.load_certificate(&self.name)?;
        Ok(Response::CertificateDetails(
            CertificateDetails::new(&ca, &certificate)?
        ))
    }
}


//-------- Revoke ------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Revoke {
    #[command(flatten)]
    ca: Handle,

    /// Common name of the certificate to revoke
    name: String,
}

impl Revoke {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        let ca_name = ca_name(&self.ca)?;
        let details = store.with_lock(&ca_name, || {
            let mut ca = CertificateAuthority::load(store, ca_name.as_str())?;
            let certificate = ca.revoke_by_name(&self.name)?;
            CertificateDetails::new(&ca, &certificate)
        })?;
        Ok(Response::CertificateDetails(details))
    }
}


//------------ Helpers -------------------------------------------------------

fn ca_name(handle: &Handle) -> Result<CommonName, ca::Error> {
    Ok(CommonName::from_str(&handle.ca)?)
}
