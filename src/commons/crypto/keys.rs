//! RSA key pairs.

use std::fmt;
use openssl::pkey::{PKey, PKeyRef, Private, Public};
use openssl::rsa::Rsa;
use super::{CryptoResult, Error};


//------------ KeyPair -------------------------------------------------------

/// An RSA private key together with its public key.
#[derive(Clone)]
pub struct KeyPair {
    pkey: PKey<Private>,
    pem: String,
}

impl KeyPair {
    /// Generates a new key pair with a modulus of `bits` bits.
    pub fn generate(bits: u32) -> CryptoResult<Self> {
        let rsa = Rsa::generate(bits)?;
        let pkey = PKey::from_rsa(rsa)?;
        let pem = pem_string(pkey.private_key_to_pem_pkcs8()?)?;
        Ok(KeyPair { pkey, pem })
    }

    /// Reads a private key from PEM.
    ///
    /// Both PKCS#8 and traditional RSA encodings are accepted. The PEM is
    /// kept as given.
    pub fn from_pem(pem: &[u8]) -> CryptoResult<Self> {
        let pkey = PKey::private_key_from_pem(pem)?;
        let pem = String::from_utf8(pem.to_vec()).map_err(Error::decode)?;
        Ok(KeyPair { pkey, pem })
    }

    /// Returns the private key as PEM.
    ///
    /// Freshly generated keys are encoded as PKCS#8.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Returns the public half of the key pair.
    pub fn public_key(&self) -> CryptoResult<PublicKey> {
        let der = self.pkey.public_key_to_der()?;
        PublicKey::from_pkey(PKey::public_key_from_der(&der)?)
    }

    /// Returns the size of the key in bits.
    pub fn bits(&self) -> u32 {
        self.pkey.bits()
    }

    /// Returns the private key as PKCS#8 PEM regardless of how it was read.
    pub(super) fn pkcs8_pem(&self) -> CryptoResult<String> {
        pem_string(self.pkey.private_key_to_pem_pkcs8()?)
    }

    pub(super) fn pkey(&self) -> &PKeyRef<Private> {
        &self.pkey
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyPair(RSA {} bits)", self.bits())
    }
}


//------------ PublicKey -----------------------------------------------------

#[derive(Clone)]
pub struct PublicKey {
    pkey: PKey<Public>,
    pem: String,
}

impl PublicKey {
    /// Reads a public key from a PEM encoded SubjectPublicKeyInfo.
    pub fn from_pem(pem: &[u8]) -> CryptoResult<Self> {
        let pkey = PKey::public_key_from_pem(pem)?;
        let pem = String::from_utf8(pem.to_vec()).map_err(Error::decode)?;
        Ok(PublicKey { pkey, pem })
    }

    pub(super) fn from_pkey(pkey: PKey<Public>) -> CryptoResult<Self> {
        let pem = pem_string(pkey.public_key_to_pem()?)?;
        Ok(PublicKey { pkey, pem })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Returns whether this is the public key of `key`.
    pub fn matches(&self, key: &KeyPair) -> bool {
        self.pkey.public_eq(key.pkey())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublicKey({} bits)", self.pkey.bits())
    }
}


//------------ Helpers -------------------------------------------------------

/// Converts PEM output of openssl into a string.
pub(super) fn pem_string(pem: Vec<u8>) -> CryptoResult<String> {
    String::from_utf8(pem).map_err(Error::decode)
}


//------------ Tests ---------------------------------------------------------
