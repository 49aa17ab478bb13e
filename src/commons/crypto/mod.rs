//! Keys, certificates, and revocation lists.
//!
//! This is a thin layer over openssl for keys, certificates and signing
//! requests, and over rcgen for encoding revocation lists. Everything is
//! exchanged with the rest of the crate as PEM.

pub use self::cert::{Cert, Csr, Profile, Serial, Subject};
pub use self::crl::{RevocationList, RevokedEntry};
pub use self::error::Error;
pub use self::keys::{KeyPair, PublicKey};

mod cert;
mod crl;
mod error;
mod keys;

pub type CryptoResult<T> = Result<T, Error>;
