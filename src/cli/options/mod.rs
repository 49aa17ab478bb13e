//! The command line options.

//------------ Sub-modules ---------------------------------------------------

mod ca;
mod certs;


//------------ Content -------------------------------------------------------

use std::path::PathBuf;
use clap::Parser;
use crate::ca::Identity;
use crate::commons::storage::Store;
use super::Error;
use super::report::{ReportFormat, Response};


//------------ Options -------------------------------------------------------

/// The command line options for certkeeper.
#[derive(clap::Parser)]
#[command(
    version,
    about = "Manages certificate authorities and their certificates.",
)]
pub struct Options {
    #[command(flatten)]
    pub general: GeneralOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Options {
    /// Creates the options from the process arguments.
    ///
    /// If the arguments won’t result in usable options, exits the process.
    pub fn from_args() -> Self {
        Self::parse()
    }
}


//------------ GeneralOptions ------------------------------------------------

/// The options common to all commands.
#[derive(clap::Args)]
pub struct GeneralOptions {
    /// Path to the config file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory of the store, overrides the config file.
    #[arg(short, long, value_name = "DIR")]
    pub storage: Option<PathBuf>,

    /// Report format: json or text
    #[arg(
        short, long,
        env = "CERTKEEPER_FORMAT",
        default_value = "text",
    )]
    pub format: ReportFormat,
}


//------------ Command -------------------------------------------------------

#[derive(clap::Subcommand)]
pub enum Command {
    /// Create a root CA, or an intermediate CA if a parent is given
    Create(ca::Create),

    /// List the CAs in the store
    List(ca::List),

    /// Show details of a CA
    Show(ca::Show),

    /// Issue a new certificate with a fresh key
    Issue(certs::Issue),

    /// Sign a certificate signing request
    Sign(certs::Sign),

    /// List the certificates issued by a CA
    Certs(certs::List),

    /// Show an issued certificate
    Cert(certs::Show),

    /// Revoke a certificate issued by a CA
    Revoke(certs::Revoke),

    /// Print the CRL of a CA
    Crl(ca::Crl),
}

impl Command {
    pub fn run(self, store: &Store) -> Result<Response, Error> {
        match self {
            Self::Create(cmd) => cmd.run(store),
            Self::List(cmd) => cmd.run(store),
            Self::Show(cmd) => cmd.run(store),
            Self::Issue(cmd) => cmd.run(store),
            Self::Sign(cmd) => cmd.run(store),
            Self::Certs(cmd) => cmd.run(store),
            Self::Cert(cmd) => cmd.run(store),
            Self::Revoke(cmd) => cmd.run(store),
            Self::Crl(cmd) => cmd.run(store),
        }
    }
}


//------------ Handle --------------------------------------------------------

#[derive(clap::Args)]
pub struct Handle {
    /// Name of the CA to use
    #[arg(long, short = 'a', env = "CERTKEEPER_CA")]
    pub ca: String,
}


//------------ IdentityArgs --------------------------------------------------

/// The subject and issuance options for new keys.
#[derive(clap::Args)]
pub struct IdentityArgs {
    /// Organization name
    #[arg(long = "org")]
    organization: Option<String>,

    /// Organizational unit
    #[arg(long = "ou")]
    organizational_unit: Option<String>,

    /// Two letter country code
    #[arg(long)]
    country: Option<String>,

    /// Locality, usually a city
    #[arg(long)]
    locality: Option<String>,

    /// State or province
    #[arg(long)]
    province: Option<String>,

    /// Contact email address
    #[arg(long)]
    email: Option<String>,

    /// A DNS name for the certificate, may be given multiple times
    #[arg(long = "dns", value_name = "NAME")]
    dns_names: Vec<String>,

    /// RSA key size in bits
    #[arg(long, value_name = "BITS")]
    key_size: Option<u32>,

    /// Validity in days
    #[arg(long, value_name = "DAYS")]
    valid: Option<u32>,
}

impl IdentityArgs {
    fn into_identity(self, intermediate: bool) -> Identity {
        Identity {
            organization: self.organization.unwrap_or_default(),
            organizational_unit: self.organizational_unit.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
            locality: self.locality.unwrap_or_default(),
            province: self.province.unwrap_or_default(),
            email: self.email,
            dns_names: self.dns_names,
            intermediate,
            key_bit_size: self.key_size.unwrap_or_default(),
            valid: self.valid.unwrap_or_default(),
        }
    }
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_create() {
        let options = Options::try_parse_from([
            "certkeeper", "--format", "json", "create", "inter.test",
            "--parent", "root.test", "--org", "Acme", "--dns", "a.test",
            "--dns", "b.test", "--valid", "90",
        ]).unwrap();
        assert_eq!(options.general.format, ReportFormat::Json);
        match options.command {
            Command::Create(cmd) => {
                assert_eq!(cmd.name, "inter.test");
                assert_eq!(cmd.parent.as_deref(), Some("root.test"));
                let identity = cmd.identity.into_identity(true);
                assert_eq!(identity.organization, "Acme");
                assert_eq!(identity.dns_names, ["a.test", "b.test"]);
                assert_eq!(identity.valid, 90);
                assert_eq!(identity.key_bit_size, 0);
            }
            _ => panic!("expected create command"),
        }
    }

    #[test]
    fn reject_unknown_format() {
        assert!(
            Options::try_parse_from([
                "certkeeper", "--format", "xml", "list"
            ]).is_err()
        );
    }
}
