//! A certificate authority kept in the store.

use std::fmt;
use std::str::FromStr;
use chrono::Utc;
use log::{debug, info, warn};
use crate::commons::crypto::{
    self, Cert, CryptoResult, Csr, KeyPair, Profile, PublicKey,
    RevocationList, RevokedEntry, Serial,
};
use crate::commons::storage::{self, Artifact, CommonName, Scope, Store};
use super::identity::{self, Identity};
use super::{CaResult, Certificate, Error};


//------------ CertificateAuthority ------------------------------------------

/// A certificate authority.
///
/// A CA is created once via [`create`][Self::create] and can then be loaded
/// from the store as often as needed via [`load`][Self::load]. The value
/// returned by either is a snapshot of the stored state owned by the
/// caller. The CA does not lock anything. Callers that may run concurrently
/// need to hold [`Store::with_lock`] for the CA's name while they change it.
#[derive(Debug)]
pub struct CertificateAuthority {
    store: Store,
    common_name: CommonName,
    key: KeyPair,
    public_key: PublicKey,

    /// The CSR sent to the parent of an intermediate CA.
    csr: Option<Csr>,

    certificate: Option<Cert>,
    crl: Option<RevocationList>,
    intermediate: bool,
}

/// # Creating and loading
impl CertificateAuthority {
    /// Creates a new CA.
    ///
    /// If `identity` asks for an intermediate CA, the CA named by `parent`
    /// signs the new CA's certificate. Otherwise the certificate is
    /// self-signed. All checks happen before anything is written, and all
    /// material is created before the first write.
    pub fn create(
        store: &Store,
        common_name: &str,
        parent: Option<&str>,
        identity: &Identity,
    ) -> CaResult<Self> {
        let common_name = CommonName::from_str(common_name)?;
        if store.has_ca(&common_name)? {
            return Err(Error::AlreadyExists(common_name))
        }
        if !identity.has_required_fields() {
            return Err(Error::MissingInfo)
        }
        let parent = if identity.intermediate {
            let parent = parent.filter(|parent| !parent.is_empty()).ok_or(
                Error::ParentNotSpecified
            )?;
            let parent = Self::load(store, parent)?;
            parent.require_certificate()?;
            Some(parent)
        }
        else {
            None
        };

        let key = KeyPair::generate(identity.key_bits())?;
        let public_key = key.public_key()?;
        let subject = identity.subject(&common_name);
        let (csr, certificate) = match parent.as_ref() {
            None => {
                let cert = Cert::self_signed(
                    &key, &subject, &identity.dns_names,
                    identity.valid_days(),
                )?;
                (None, cert)
            }
            Some(parent) => {
                let csr = Csr::build(&key, &subject, &identity.dns_names)?;
                let cert = csr.sign(
                    parent.require_certificate()?, &parent.key,
                    Profile::Ca, identity.valid_days(),
                )?;
                (Some(csr), cert)
            }
        };
        let crl = RevocationList::build(
            &certificate, &key, Vec::new(), Utc::now()
        )?;

        store.create_ca_dirs(&common_name)?;
        let scope = Scope::Ca(&common_name);
        store.store(scope, Artifact::PrivateKey, key.pem().as_bytes())?;
        store.store(
            scope, Artifact::PublicKey, public_key.pem().as_bytes()
        )?;
        if let Some(csr) = csr.as_ref() {
            store.store(scope, Artifact::Csr, csr.pem().as_bytes())?;
        }
        store.store(
            scope, Artifact::Certificate, certificate.pem().as_bytes()
        )?;
        store.store(scope, Artifact::Crl, crl.pem().as_bytes())?;

        // The parent keeps what it signed so it can load and revoke it.
        if let (Some(parent), Some(csr)) = (parent.as_ref(), csr.as_ref()) {
            let issued = Scope::Issued {
                ca: &parent.common_name, cert: &common_name
            };
            store.store(
                issued, Artifact::PublicKey, public_key.pem().as_bytes()
            )?;
            store.store(issued, Artifact::Csr, csr.pem().as_bytes())?;
            store.store(
                issued, Artifact::Certificate, certificate.pem().as_bytes()
            )?;
            info!(
                "Created intermediate CA '{}' under parent '{}'",
                common_name, parent.common_name
            );
        }
        else {
            info!("Created root CA '{common_name}'");
        }

        Ok(CertificateAuthority {
            store: store.clone(),
            common_name,
            key,
            public_key,
            csr,
            certificate: Some(certificate),
            crl: Some(crl),
            intermediate: parent.is_some(),
        })
    }

    /// Loads an existing CA from the store.
    ///
    /// The key and public key must be present. The CSR, certificate, and
    /// CRL may be missing, but if present they must be valid.
    pub fn load(store: &Store, common_name: &str) -> CaResult<Self> {
        let common_name = CommonName::from_str(common_name)?;
        if !store.has_ca(&common_name)? {
            return Err(Error::NotFound(common_name))
        }

        let scope = Scope::Ca(&common_name);
        let key = read_required(
            store, scope, Artifact::PrivateKey, KeyPair::from_pem
        )?;
        let public_key = read_required(
            store, scope, Artifact::PublicKey, PublicKey::from_pem
        )?;
        let csr = read_optional(store, scope, Artifact::Csr, Csr::from_pem)?;
        let certificate = read_optional(
            store, scope, Artifact::Certificate, Cert::from_pem
        )?;
        let crl = read_optional(
            store, scope, Artifact::Crl, RevocationList::from_pem
        )?;

        let intermediate = csr.is_some() || certificate.as_ref().is_some_and(
            |cert| !cert.is_self_issued()
        );

        debug!("Loaded CA '{common_name}'");
        Ok(CertificateAuthority {
            store: store.clone(),
            common_name,
            key,
            public_key,
            csr,
            certificate,
            crl,
            intermediate,
        })
    }

    /// Loads the CA if the store knows it or creates it otherwise.
    pub fn create_or_load(
        store: &Store,
        common_name: &str,
        parent: Option<&str>,
        identity: &Identity,
    ) -> CaResult<Self> {
        if store.has_ca(&CommonName::from_str(common_name)?)? {
            Self::load(store, common_name)
        }
        else {
            Self::create(store, common_name, parent, identity)
        }
    }
}

/// # Issuing certificates
impl CertificateAuthority {
    /// Issues a new end-entity certificate.
    ///
    /// Creates a fresh key and CSR for `common_name` from `identity` and
    /// signs it. Everything is stored under the CA, replacing an earlier
    /// certificate with the same name.
    pub fn issue_certificate(
        &self,
        common_name: &str,
        identity: &Identity,
    ) -> CaResult<Certificate> {
        let common_name = CommonName::from_str(common_name)?;
        let ca_certificate = self.require_certificate()?;

        let key = KeyPair::generate(identity.key_bits())?;
        let public_key = key.public_key()?;
        let csr = Csr::build(
            &key, &identity.subject(&common_name), &identity.dns_names
        )?;
        let certificate = csr.sign(
            ca_certificate, &self.key, Profile::Leaf, identity.valid_days()
        )?;

        let scope = self.issued_scope(&common_name);
        self.store.store(scope, Artifact::PrivateKey, key.pem().as_bytes())?;
        self.store.store(
            scope, Artifact::PublicKey, public_key.pem().as_bytes()
        )?;
        self.store.store(scope, Artifact::Csr, csr.pem().as_bytes())?;
        self.store.store(
            scope, Artifact::Certificate, certificate.pem().as_bytes()
        )?;

        info!(
            "CA '{}' issued certificate '{}' with serial {}",
            self.common_name, common_name, certificate.serial()?
        );
        Ok(Certificate::new(
            common_name,
            Some(key),
            Some(public_key),
            Some(csr),
            Some(certificate),
            Some(ca_certificate.clone()),
        ))
    }

    /// Signs a CSR brought by the caller.
    ///
    /// The CSR must carry a valid signature and a usable common name. If
    /// that name belongs to another CA in the store, a CA certificate is
    /// issued and also copied into that CA's own certificate slot. If only
    /// the copy fails, the result is [`Error::ChainPropagation`] carrying
    /// the signed certificate, which stays stored under this CA.
    pub fn sign_csr(
        &self,
        csr: Csr,
        valid_days: u32,
    ) -> CaResult<Certificate> {
        let ca_certificate = self.require_certificate()?;
        if !csr.verify()? {
            return Err(Error::Codec(crypto::Error::InvalidSignature))
        }
        let common_name = CommonName::try_from(
            csr.common_name().ok_or_else(|| {
                Error::Codec(crypto::Error::MissingCommonName)
            })?
        )?;

        let for_ca = common_name != self.common_name
            && self.store.has_ca(&common_name)?;
        let profile = if for_ca { Profile::Ca } else { Profile::Leaf };
        let certificate = csr.sign(
            ca_certificate, &self.key, profile,
            identity::valid_days(valid_days),
        )?;

        let scope = self.issued_scope(&common_name);
        self.store.store(scope, Artifact::Csr, csr.pem().as_bytes())?;
        self.store.store(
            scope, Artifact::Certificate, certificate.pem().as_bytes()
        )?;
        info!(
            "CA '{}' signed {} certificate '{}' with serial {}",
            self.common_name, profile, common_name, certificate.serial()?
        );

        let certificate = Certificate::new(
            common_name,
            None,
            None,
            Some(csr),
            Some(certificate),
            Some(ca_certificate.clone()),
        );
        if for_ca {
            if let Err(error) = self.copy_to_ca(&certificate) {
                warn!(
                    "Could not update the certificate of CA '{}': {}",
                    certificate.common_name(), error
                );
                return Err(Error::ChainPropagation {
                    certificate: Box::new(certificate),
                    error,
                })
            }
        }
        Ok(certificate)
    }

    /// Copies a certificate into the certificate slot of the CA it is for.
    ///
    /// This is the second step of [`sign_csr`][Self::sign_csr] for
    /// certificates of other CAs and can be used to retry it.
    pub fn propagate_certificate(
        &self, certificate: &Certificate
    ) -> CaResult<()> {
        certificate.require_certificate()?;
        if !self.store.has_ca(certificate.common_name())? {
            return Err(Error::NotFound(certificate.common_name().clone()))
        }
        if !certificate.is_issued_by(self)? {
            return Err(Error::ForeignCertificate {
                ca: self.common_name.clone(),
                certificate: certificate.common_name().clone(),
            })
        }
        Ok(self.copy_to_ca(certificate)?)
    }

    fn copy_to_ca(
        &self, certificate: &Certificate
    ) -> Result<(), storage::Error> {
        let target = certificate.common_name();
        self.store.copy(
            self.issued_scope(target), Scope::Ca(target), Artifact::Certificate
        )?;
        info!(
            "Updated certificate of CA '{}' as signed by '{}'",
            target, self.common_name
        );
        Ok(())
    }

    /// Loads a certificate issued by this CA.
    pub fn load_certificate(&self, common_name: &str) -> CaResult<Certificate> {
        let common_name = CommonName::from_str(common_name)?;
        if !self.store.has_issued(&self.common_name, &common_name)? {
            return Err(Error::CertificateNotFound {
                ca: self.common_name.clone(),
                certificate: common_name,
            })
        }

        let scope = self.issued_scope(&common_name);
        let store = &self.store;
        let key = read_optional(
            store, scope, Artifact::PrivateKey, KeyPair::from_pem
        )?;
        let public_key = read_optional(
            store, scope, Artifact::PublicKey, PublicKey::from_pem
        )?;
        let csr = read_optional(store, scope, Artifact::Csr, Csr::from_pem)?;
        let certificate = read_optional(
            store, scope, Artifact::Certificate, Cert::from_pem
        )?;

        debug!(
            "Loaded certificate '{}' of CA '{}'", common_name, self.common_name
        );
        Ok(Certificate::new(
            common_name, key, public_key, csr, certificate,
            self.certificate.clone(),
        ))
    }

    /// Returns the names of all certificates issued by this CA, sorted.
    pub fn list_certificates(&self) -> CaResult<Vec<CommonName>> {
        Ok(self.store.list_issued(&self.common_name)?)
    }

    fn issued_scope<'a>(&'a self, common_name: &'a CommonName) -> Scope<'a> {
        Scope::Issued { ca: &self.common_name, cert: common_name }
    }
}

/// # Revoking certificates
impl CertificateAuthority {
    /// Adds a certificate to the CRL.
    ///
    /// The complete CRL is signed anew and stored. A certificate that is
    /// already on the CRL results in [`Error::AlreadyRevoked`] and leaves
    /// the CRL untouched.
    pub fn revoke_certificate(
        &mut self, certificate: &Certificate
    ) -> CaResult<()> {
        let cert = certificate.require_certificate()?;
        let ca_certificate = self.require_certificate()?;
        if !cert.is_signed_by(ca_certificate)? {
            return Err(Error::ForeignCertificate {
                ca: self.common_name.clone(),
                certificate: certificate.common_name().clone(),
            })
        }

        let serial = cert.serial()?;
        if self.is_serial_revoked(&serial) {
            return Err(Error::AlreadyRevoked {
                ca: self.common_name.clone(),
                serial,
            })
        }

        let now = Utc::now();
        let mut entries = self.revoked().to_vec();
        entries.push(RevokedEntry::new(serial.clone(), now)?);
        let crl = RevocationList::build(
            ca_certificate, &self.key, entries, now
        )?;
        self.store.store(
            Scope::Ca(&self.common_name), Artifact::Crl, crl.pem().as_bytes()
        )?;

        info!(
            "CA '{}' revoked certificate '{}' with serial {}",
            self.common_name, certificate.common_name(), serial
        );
        self.crl = Some(crl);
        Ok(())
    }

    /// Loads the named certificate and revokes it.
    pub fn revoke_by_name(
        &mut self, common_name: &str
    ) -> CaResult<Certificate> {
        let certificate = self.load_certificate(common_name)?;
        self.revoke_certificate(&certificate)?;
        Ok(certificate)
    }

    /// Returns whether the certificate is on this CA's CRL.
    pub fn is_revoked(&self, certificate: &Certificate) -> CaResult<bool> {
        Ok(self.is_serial_revoked(&certificate.serial()?))
    }

    fn is_serial_revoked(&self, serial: &Serial) -> bool {
        self.crl.as_ref().is_some_and(|crl| crl.contains(serial))
    }
}

/// # Access to properties
impl CertificateAuthority {
    pub fn common_name(&self) -> &CommonName {
        &self.common_name
    }

    /// Returns whether the CA's certificate was signed by another CA.
    pub fn is_intermediate(&self) -> bool {
        self.intermediate
    }

    pub fn status(&self) -> CaStatus {
        if self.certificate.is_some() {
            CaStatus::Ready
        }
        else {
            CaStatus::AwaitingCertificate
        }
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn csr(&self) -> Option<&Csr> {
        self.csr.as_ref()
    }

    pub fn certificate(&self) -> Option<&Cert> {
        self.certificate.as_ref()
    }

    pub fn crl(&self) -> Option<&RevocationList> {
        self.crl.as_ref()
    }

    /// Returns the revoked entries in the order of revocation.
    pub fn revoked(&self) -> &[RevokedEntry] {
        self.crl.as_ref().map(RevocationList::entries).unwrap_or_default()
    }

    pub fn private_key_pem(&self) -> &str {
        self.key.pem()
    }

    pub fn public_key_pem(&self) -> &str {
        self.public_key.pem()
    }

    pub fn csr_pem(&self) -> Option<&str> {
        self.csr.as_ref().map(Csr::pem)
    }

    pub fn certificate_pem(&self) -> Option<&str> {
        self.certificate.as_ref().map(Cert::pem)
    }

    pub fn crl_pem(&self) -> Option<&str> {
        self.crl.as_ref().map(RevocationList::pem)
    }

    /// Returns the certificate or fails with `MissingCertificate`.
    pub fn require_certificate(&self) -> CaResult<&Cert> {
        self.certificate.as_ref().ok_or_else(|| {
            Error::MissingCertificate(self.common_name.clone())
        })
    }
}


//------------ CaStatus ------------------------------------------------------

/// Whether a CA can sign.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaStatus {
    Ready,
    AwaitingCertificate,
}

impl fmt::Display for CaStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            CaStatus::Ready => "Certificate Authority is ready.",
            CaStatus::AwaitingCertificate => {
                "Certificate Authority has no certificate yet."
            }
        })
    }
}


//------------ Helpers -------------------------------------------------------

/// Reads and parses an artifact that may be missing.
fn read_optional<T>(
    store: &Store,
    scope: Scope,
    artifact: Artifact,
    parse: impl FnOnce(&[u8]) -> CryptoResult<T>,
) -> CaResult<Option<T>> {
    match store.get(scope, artifact)? {
        Some(content) => {
            parse(&content).map(Some).map_err(|error| {
                Error::InvalidArtifact {
                    owner: scope.owner().clone(),
                    artifact,
                    error,
                }
            })
        }
        None => Ok(None),
    }
}

/// Reads and parses an artifact that must be present.
fn read_required<T>(
    store: &Store,
    scope: Scope,
    artifact: Artifact,
    parse: impl FnOnce(&[u8]) -> CryptoResult<T>,
) -> CaResult<T> {
    read_optional(store, scope, artifact, parse)?.ok_or_else(|| {
        Error::MissingArtifact { owner: scope.owner().clone(), artifact }
    })
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;
    use crate::commons::crypto::Subject;
    use crate::test;
    use super::*;

    fn root(store: &Store, name: &str) -> CertificateAuthority {
        CertificateAuthority::create(store, name, None, &test::identity())
            .unwrap()
    }

    fn intermediate(
        store: &Store, name: &str, parent: &str
    ) -> CertificateAuthority {
        CertificateAuthority::create(
            store, name, Some(parent), &test::intermediate_identity()
        ).unwrap()
    }

    #[test]
    fn create_twice_fails() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let ca = root(&store, "root.test");
            assert!(!ca.is_intermediate());
            assert_eq!(ca.status(), CaStatus::Ready);
            assert!(ca.revoked().is_empty());

            assert!(matches!(
                CertificateAuthority::create(
                    &store, "root.test", None, &test::identity()
                ),
                Err(Error::AlreadyExists(name)) if name == *"root.test"
            ));
        })
    }

    #[test]
    fn create_checks_name() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            assert!(matches!(
                CertificateAuthority::create(
                    &store, "../escape", None, &test::identity()
                ),
                Err(Error::InvalidName(_))
            ));
            assert!(store.list_cas().unwrap().is_empty());
        })
    }

    #[test]
    fn create_without_required_fields_writes_nothing() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let blanks: [fn(&mut Identity); 5] = [
                |id| id.organization.clear(),
                |id| id.organizational_unit.clear(),
                |id| id.country.clear(),
                |id| id.locality.clear(),
                |id| id.province.clear(),
            ];
            for blank in blanks {
                let mut id = test::identity();
                blank(&mut id);
                assert!(matches!(
                    CertificateAuthority::create(
                        &store, "root.test", None, &id
                    ),
                    Err(Error::MissingInfo)
                ));
            }
            assert!(!dir.join("root.test").exists());
        })
    }

    #[test]
    fn intermediate_needs_existing_parent() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let id = test::intermediate_identity();

            for parent in [None, Some("")] {
                assert!(matches!(
                    CertificateAuthority::create(
                        &store, "inter.test", parent, &id
                    ),
                    Err(Error::ParentNotSpecified)
                ));
            }
            assert!(matches!(
                CertificateAuthority::create(
                    &store, "inter.test", Some("root.test"), &id
                ),
                Err(Error::NotFound(name)) if name == *"root.test"
            ));
            assert!(!store.has_ca(
                &CommonName::from_str("inter.test").unwrap()
            ).unwrap());
        })
    }

    #[test]
    fn load_matches_stored_files() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let created = root(&store, "root.test");
            let loaded = CertificateAuthority::load(
                &store, "root.test"
            ).unwrap();

            let ca_dir = dir.join("root.test").join("ca");
            let read = |name: &str| {
                fs::read_to_string(ca_dir.join(name)).unwrap()
            };
            assert_eq!(loaded.private_key_pem(), read("key.pem"));
            assert_eq!(loaded.public_key_pem(), read("key.pub"));
            assert_eq!(
                loaded.certificate_pem(), Some(read("root.test.crt").as_str())
            );
            assert_eq!(
                loaded.crl_pem(), Some(read("root.test.crl").as_str())
            );
            assert_eq!(loaded.private_key_pem(), created.private_key_pem());
            assert_eq!(loaded.certificate_pem(), created.certificate_pem());
            assert!(loaded.csr().is_none());
            assert!(!loaded.is_intermediate());

            assert!(matches!(
                CertificateAuthority::load(&store, "other.test"),
                Err(Error::NotFound(_))
            ));
        })
    }

    #[test]
    fn load_tolerates_missing_optional_artifacts() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            root(&store, "root.test");
            let ca_dir = dir.join("root.test").join("ca");
            fs::remove_file(ca_dir.join("root.test.crt")).unwrap();
            fs::remove_file(ca_dir.join("root.test.crl")).unwrap();

            let ca = CertificateAuthority::load(&store, "root.test").unwrap();
            assert_eq!(ca.status(), CaStatus::AwaitingCertificate);
            assert!(ca.crl().is_none());
            assert!(matches!(
                ca.issue_certificate("leaf.test", &test::identity()),
                Err(Error::MissingCertificate(_))
            ));
        })
    }

    #[test]
    fn load_fails_on_invalid_or_missing_required_artifacts() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            root(&store, "root.test");
            let ca_dir = dir.join("root.test").join("ca");

            fs::write(ca_dir.join("root.test.crt"), "garbage").unwrap();
            assert!(matches!(
                CertificateAuthority::load(&store, "root.test"),
                Err(Error::InvalidArtifact {
                    artifact: Artifact::Certificate, ..
                })
            ));

            fs::remove_file(ca_dir.join("key.pub")).unwrap();
            assert!(matches!(
                CertificateAuthority::load(&store, "root.test"),
                Err(Error::MissingArtifact {
                    artifact: Artifact::PublicKey, ..
                })
            ));
        })
    }

    #[test]
    fn create_or_load_is_idempotent() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let first = CertificateAuthority::create_or_load(
                &store, "root.test", None, &test::identity()
            ).unwrap();
            let second = CertificateAuthority::create_or_load(
                &store, "root.test", None, &Identity::default()
            ).unwrap();
            assert_eq!(first.certificate_pem(), second.certificate_pem());
            assert_eq!(first.private_key_pem(), second.private_key_pem());
        })
    }

    #[test]
    fn intermediate_is_signed_by_parent() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let root = root(&store, "root.test");
            let inter = intermediate(&store, "inter.test", "root.test");

            assert!(inter.is_intermediate());
            assert!(inter.csr().is_some());
            let cert = inter.certificate().unwrap();
            assert_eq!(cert.issuer_common_name().as_deref(), Some("root.test"));
            assert!(cert.is_signed_by(root.certificate().unwrap()).unwrap());

            // The parent can load and revoke what it signed.
            let mut root = CertificateAuthority::load(
                &store, "root.test"
            ).unwrap();
            let issued = root.load_certificate("inter.test").unwrap();
            assert_eq!(issued.certificate_pem(), inter.certificate_pem());
            assert!(issued.key().is_none());
            root.revoke_certificate(&issued).unwrap();
            assert!(root.is_revoked(&issued).unwrap());

            let loaded = CertificateAuthority::load(
                &store, "inter.test"
            ).unwrap();
            assert!(loaded.is_intermediate());
        })
    }

    #[test]
    fn issue_and_load_certificate() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let ca = root(&store, "root.test");
            let cert = ca.issue_certificate(
                "leaf.test", &test::identity()
            ).unwrap();

            assert_eq!(cert.ca_certificate_pem(), ca.certificate_pem());
            assert!(cert.is_issued_by(&ca).unwrap());
            assert_eq!(
                cert.certificate().unwrap().dns_names(),
                test::identity().dns_names
            );

            let loaded = ca.load_certificate("leaf.test").unwrap();
            assert_eq!(loaded.certificate_pem(), cert.certificate_pem());
            assert_eq!(loaded.private_key_pem(), cert.private_key_pem());
            assert_eq!(loaded.csr_pem(), cert.csr_pem());
            assert_eq!(loaded.ca_certificate_pem(), ca.certificate_pem());
            assert_eq!(
                ca.list_certificates().unwrap(),
                vec![CommonName::from_str("leaf.test").unwrap()]
            );

            assert!(matches!(
                ca.load_certificate("other.test"),
                Err(Error::CertificateNotFound { .. })
            ));
        })
    }

    #[cfg(unix)]
    #[test]
    fn issued_private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let ca = root(&store, "root.test");
            ca.issue_certificate("leaf.test", &test::identity()).unwrap();

            let path = dir.join("root.test").join("certs")
                .join("leaf.test").join("key.pem");
            let mode = fs::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        })
    }

    #[test]
    fn revocation_only_grows() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let mut ca = root(&store, "root.test");
            let one = ca.issue_certificate(
                "one.test", &test::identity()
            ).unwrap();
            let two = ca.issue_certificate(
                "two.test", &test::identity()
            ).unwrap();

            ca.revoke_certificate(&one).unwrap();
            assert_eq!(ca.revoked().len(), 1);
            assert_eq!(ca.revoked()[0].serial(), &one.serial().unwrap());
            assert!(!ca.is_revoked(&two).unwrap());

            assert!(matches!(
                ca.revoke_certificate(&one),
                Err(Error::AlreadyRevoked { .. })
            ));
            assert_eq!(ca.revoked().len(), 1);

            let two = ca.revoke_by_name("two.test").unwrap();
            assert_eq!(ca.revoked().len(), 2);
            assert!(ca.is_revoked(&two).unwrap());
            assert!(
                ca.crl().unwrap().is_signed_by(ca.certificate().unwrap())
                    .unwrap()
            );

            let loaded = CertificateAuthority::load(
                &store, "root.test"
            ).unwrap();
            assert_eq!(loaded.revoked(), ca.revoked());
        })
    }

    #[test]
    fn revoke_rejects_foreign_certificate() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let mut one = root(&store, "one.test");
            let two = root(&store, "two.test");
            let cert = two.issue_certificate(
                "leaf.test", &test::identity()
            ).unwrap();

            assert!(matches!(
                one.revoke_certificate(&cert),
                Err(Error::ForeignCertificate { .. })
            ));
            assert!(one.revoked().is_empty());
        })
    }

    #[test]
    fn sign_foreign_csr_as_leaf() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let ca = root(&store, "root.test");
            let other = root(&store, "other.test");

            let key = KeyPair::generate(2048).unwrap();
            let subject = Subject {
                common_name: "client.test".into(), ..Default::default()
            };
            let csr = Csr::build(&key, &subject, &[]).unwrap();
            let cert = ca.sign_csr(csr, 30).unwrap();

            assert!(cert.key().is_none());
            assert!(cert.is_issued_by(&ca).unwrap());
            assert!(!cert.is_issued_by(&other).unwrap());
            assert!(
                cert.certificate().unwrap().public_key().unwrap().matches(&key)
            );

            let loaded = ca.load_certificate("client.test").unwrap();
            assert_eq!(loaded.certificate_pem(), cert.certificate_pem());

            let other_now = CertificateAuthority::load(
                &store, "other.test"
            ).unwrap();
            assert_eq!(other_now.certificate_pem(), other.certificate_pem());
        })
    }

    #[test]
    fn sign_csr_of_known_ca_propagates() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let parent = root(&store, "parent.test");
            let child = root(&store, "child.test");
            assert!(!child.is_intermediate());

            let csr = Csr::build(
                child.key(),
                &test::identity().subject(child.common_name()),
                &[],
            ).unwrap();
            let cert = parent.sign_csr(csr, 0).unwrap();

            let child = CertificateAuthority::load(
                &store, "child.test"
            ).unwrap();
            assert_eq!(child.certificate_pem(), cert.certificate_pem());
            assert!(child.is_intermediate());
            assert!(cert.is_issued_by(&parent).unwrap());

            // Retrying the copy is harmless.
            parent.propagate_certificate(&cert).unwrap();
        })
    }

    #[test]
    fn failed_propagation_can_be_retried() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let parent = root(&store, "parent.test");
            let child = root(&store, "child.test");
            let old_pem = child.certificate_pem().unwrap().to_string();

            // Put a directory where the child's certificate goes.
            let child_crt = dir.join("child.test").join("ca")
                .join("child.test.crt");
            fs::remove_file(&child_crt).unwrap();
            fs::create_dir(&child_crt).unwrap();

            let csr = Csr::build(
                child.key(),
                &test::identity().subject(child.common_name()),
                &[],
            ).unwrap();
            let cert = match parent.sign_csr(csr, 0) {
                Err(Error::ChainPropagation { certificate, .. }) => {
                    *certificate
                }
                other => panic!("expected failed propagation, got {other:?}"),
            };
            assert!(cert.is_issued_by(&parent).unwrap());

            // The signing half stuck.
            let issued = dir.join("parent.test").join("certs")
                .join("child.test").join("child.test.crt");
            assert_eq!(
                fs::read_to_string(&issued).unwrap(),
                cert.certificate_pem().unwrap()
            );
            assert_eq!(
                parent.load_certificate("child.test").unwrap()
                    .certificate_pem(),
                cert.certificate_pem()
            );

            fs::remove_dir(&child_crt).unwrap();
            fs::write(&child_crt, &old_pem).unwrap();
            parent.propagate_certificate(&cert).unwrap();

            let child = CertificateAuthority::load(
                &store, "child.test"
            ).unwrap();
            assert_eq!(child.certificate_pem(), cert.certificate_pem());
            assert!(child.is_intermediate());
        })
    }

    #[test]
    fn propagate_needs_known_ca_and_own_certificate() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let parent = root(&store, "parent.test");
            let other = root(&store, "other.test");
            let child = root(&store, "child.test");

            let leaf = parent.issue_certificate(
                "leaf.test", &test::identity()
            ).unwrap();
            assert!(matches!(
                parent.propagate_certificate(&leaf),
                Err(Error::NotFound(name)) if name == *"leaf.test"
            ));

            let csr = Csr::build(
                child.key(),
                &test::identity().subject(child.common_name()),
                &[],
            ).unwrap();
            let cert = parent.sign_csr(csr, 0).unwrap();
            assert!(matches!(
                other.propagate_certificate(&cert),
                Err(Error::ForeignCertificate { .. })
            ));
        })
    }

    #[test]
    fn sign_csr_with_invalid_name() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let ca = root(&store, "root.test");

            let key = KeyPair::generate(2048).unwrap();
            let subject = Subject {
                common_name: "my client".into(), ..Default::default()
            };
            let csr = Csr::build(&key, &subject, &[]).unwrap();
            assert!(matches!(
                ca.sign_csr(csr, 30), Err(Error::InvalidName(_))
            ));

            let subject = Subject {
                organization: "Acme".into(), ..Default::default()
            };
            let csr = Csr::build(&key, &subject, &[]).unwrap();
            assert!(matches!(ca.sign_csr(csr, 30), Err(Error::Codec(_))));
            assert!(ca.list_certificates().unwrap().is_empty());
        })
    }

    #[test]
    fn status_display() {
        assert_eq!(
            CaStatus::Ready.to_string(), "Certificate Authority is ready."
        );
        assert_eq!(
            CaStatus::AwaitingCertificate.to_string(),
            "Certificate Authority has no certificate yet."
        );
    }
}
