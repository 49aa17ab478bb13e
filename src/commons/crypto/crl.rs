//! Certificate revocation lists.

use chrono::{DateTime, TimeDelta, Utc};
use openssl::asn1::Asn1Time;
use openssl::x509::X509Crl;
use rcgen::{
    CertificateRevocationListParams, Issuer, KeyIdMethod, RevokedCertParams,
    SerialNumber,
};
use time::OffsetDateTime;
use crate::constants::CRL_NEXT_UPDATE_DAYS;
use super::{Cert, CryptoResult, Error, KeyPair, Serial};


//------------ RevokedEntry --------------------------------------------------

/// A single revoked certificate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevokedEntry {
    serial: Serial,
    revoked_at: DateTime<Utc>,
}

impl RevokedEntry {
    /// Creates an entry revoking `serial` at `revoked_at`.
    ///
    /// The time is truncated to whole seconds, the precision of a CRL.
    pub fn new(
        serial: Serial, revoked_at: DateTime<Utc>
    ) -> CryptoResult<Self> {
        let revoked_at = from_timestamp(revoked_at.timestamp())?;
        Ok(RevokedEntry { serial, revoked_at })
    }

    pub fn serial(&self) -> &Serial {
        &self.serial
    }

    pub fn revoked_at(&self) -> DateTime<Utc> {
        self.revoked_at
    }
}


//------------ RevocationList ------------------------------------------------

/// A signed CRL along with the entries it contains.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevocationList {
    pem: String,
    entries: Vec<RevokedEntry>,
}

impl RevocationList {
    /// Creates and signs a CRL with the given entries.
    ///
    /// The CRL number is the number of entries, so it grows with every
    /// revocation. The next update is set a fixed number of days after
    /// `this_update`.
    pub fn build(
        issuer: &Cert,
        key: &KeyPair,
        entries: Vec<RevokedEntry>,
        this_update: DateTime<Utc>,
    ) -> CryptoResult<Self> {
        let signing_key = rcgen::KeyPair::from_pem(&key.pkcs8_pem()?)?;
        let issuer = Issuer::from_ca_cert_pem(issuer.pem(), signing_key)?;

        let next_update = this_update + TimeDelta::days(CRL_NEXT_UPDATE_DAYS);
        let revoked_certs = entries.iter().map(|entry| {
            Ok(RevokedCertParams {
                serial_number: SerialNumber::from_slice(
                    entry.serial.as_slice()
                ),
                revocation_time: offset_time(entry.revoked_at)?,
                reason_code: None,
                invalidity_date: None,
            })
        }).collect::<CryptoResult<Vec<_>>>()?;

        let params = CertificateRevocationListParams {
            this_update: offset_time(this_update)?,
            next_update: offset_time(next_update)?,
            crl_number: SerialNumber::from(entries.len() as u64),
            issuing_distribution_point: None,
            revoked_certs,
            key_identifier_method: KeyIdMethod::Sha256,
        };
        let pem = params.signed_by(&issuer)?.pem()?;
        Ok(RevocationList { pem, entries })
    }

    /// Reads a CRL from PEM.
    pub fn from_pem(pem: &[u8]) -> CryptoResult<Self> {
        let crl = X509Crl::from_pem(pem)?;
        let epoch = Asn1Time::from_unix(0)?;

        let mut entries = Vec::new();
        if let Some(revoked) = crl.get_revoked() {
            for item in revoked {
                let diff = epoch.diff(item.revocation_date())?;
                entries.push(RevokedEntry {
                    serial: Serial::from_asn1(item.serial_number())?,
                    revoked_at: from_timestamp(
                        i64::from(diff.days) * 86_400 + i64::from(diff.secs)
                    )?,
                });
            }
        }

        let pem = String::from_utf8(pem.to_vec()).map_err(Error::decode)?;
        Ok(RevocationList { pem, entries })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Returns the revoked entries in the order they were added.
    pub fn entries(&self) -> &[RevokedEntry] {
        &self.entries
    }

    pub fn contains(&self, serial: &Serial) -> bool {
        self.entries.iter().any(|entry| entry.serial == *serial)
    }

    /// Checks that the CRL is signed by the subject of `issuer`.
    pub fn is_signed_by(&self, issuer: &Cert) -> CryptoResult<bool> {
        let crl = X509Crl::from_pem(self.pem.as_bytes())?;
        let key = issuer.x509().public_key()?;
        Ok(crl.verify(&key)?)
    }
}


//------------ Helpers -------------------------------------------------------

fn offset_time(time: DateTime<Utc>) -> CryptoResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(time.timestamp()).map_err(Error::time)
}

fn from_timestamp(secs: i64) -> CryptoResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        Error::time(format!("timestamp {secs} out of range"))
    })
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::commons::crypto::{Csr, Profile, Subject};
    use super::*;

    fn ca() -> (KeyPair, Cert) {
        let key = KeyPair::generate(2048).unwrap();
        let subject = Subject {
            common_name: "root.test".into(),
            organization: "Company".into(),
            organizational_unit: "Security Management".into(),
            country: "NL".into(),
            locality: "Amsterdam".into(),
            province: "Noord-Holland".into(),
            email: None,
        };
        let cert = Cert::self_signed(&key, &subject, &[], 365).unwrap();
        (key, cert)
    }

    fn leaf_serial(ca_key: &KeyPair, ca: &Cert, cn: &str) -> Serial {
        let key = KeyPair::generate(2048).unwrap();
        let subject = Subject {
            common_name: cn.into(), ..Default::default()
        };
        let csr = Csr::build(&key, &subject, &[]).unwrap();
        let cert = csr.sign(ca, ca_key, Profile::Leaf, 30).unwrap();
        cert.serial().unwrap()
    }

    #[test]
    fn empty_crl() {
        let (key, cert) = ca();
        let crl = RevocationList::build(
            &cert, &key, Vec::new(), Utc::now()
        ).unwrap();
        assert!(crl.pem().starts_with("-----BEGIN X509 CRL-----"));
        assert!(crl.entries().is_empty());
        assert!(crl.is_signed_by(&cert).unwrap());

        let loaded = RevocationList::from_pem(crl.pem().as_bytes()).unwrap();
        assert!(loaded.entries().is_empty());
    }

    #[test]
    fn entries_survive_encoding_in_order() {
        let (key, cert) = ca();
        let first = RevokedEntry::new(
            leaf_serial(&key, &cert, "one.test"),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ).unwrap();
        let second = RevokedEntry::new(
            leaf_serial(&key, &cert, "two.test"), Utc::now()
        ).unwrap();

        let crl = RevocationList::build(
            &cert, &key, vec![first.clone(), second.clone()], Utc::now()
        ).unwrap();
        assert!(crl.contains(first.serial()));

        let loaded = RevocationList::from_pem(crl.pem().as_bytes()).unwrap();
        assert_eq!(loaded.entries(), &[first, second]);
        assert!(loaded.is_signed_by(&cert).unwrap());

        let (_, other) = ca();
        assert!(!loaded.is_signed_by(&other).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(RevocationList::from_pem(b"-----BEGIN X509 CRL-----").is_err());
    }
}
