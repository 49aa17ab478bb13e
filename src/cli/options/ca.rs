//! Commands related to managing a CA.

use std::str::FromStr;
use crate::ca::{self, CertificateAuthority};
use crate::cli::Error;
use crate::cli::report::{CaDetails, CrlDetails, Response};
use crate::commons::storage::{CommonName, Store};
use super::{Handle, IdentityArgs};


//-------- Create ------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Create {
    /// Common name of the new CA
    pub name: String,

    /// Name of the CA that signs the new CA
    #[arg(long)]
    pub parent: Option<String>,

    #[command(flatten)]
    pub identity: IdentityArgs,
}

impl Create {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        let name = CommonName::from_str(&self.name).map_err(ca::Error::from)?;
        let identity = self.identity.into_identity(self.parent.is_some());
        let ca = store.with_lock(&name, || {
            CertificateAuthority::create(
                store, name.as_str(), self.parent.as_deref(), &identity
            )
        })?;
        Ok(Response::CaDetails(CaDetails::new(&ca)?))
    }
}


//-------- List --------------------------------------------------------------

#[derive(clap::Parser)]
pub struct List;

impl List {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        Ok(Response::CaList(ca::list(store)?.into()))
    }
}


//-------- Show --------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Show {
    /// Name of the CA to show
    pub ca: String,
}

impl Show {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        let ca = CertificateAuthority::load(store, &self.ca)?;
        Ok(Response::CaDetails(CaDetails::new(&ca)?))
    }
}


//-------- Crl ---------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Crl {
    #[command(flatten)]
    ca: Handle,
}

impl Crl {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        let ca = CertificateAuthority::load(store, &self.ca.ca)?;
        Ok(Response::Crl(CrlDetails::from(&ca)))
    }
}
