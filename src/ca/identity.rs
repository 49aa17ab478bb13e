//! The identity used for creating CAs and issuing certificates.

use log::warn;
use serde::{Deserialize, Serialize};
use crate::commons::crypto::Subject;
use crate::commons::storage::CommonName;
use crate::constants::{
    DEFAULT_KEY_BIT_SIZE, DEFAULT_VALID_DAYS, MAX_VALID_DAYS,
    MIN_KEY_BIT_SIZE, MIN_VALID_DAYS,
};


//------------ Identity ------------------------------------------------------

/// The subject details and issuance parameters for a CA or certificate.
///
/// Zero values for the key size and the validity select the defaults.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Identity {
    pub organization: String,
    pub organizational_unit: String,
    pub country: String,
    pub locality: String,
    pub province: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// The DNS names for the subject alternative name, in order.
    pub dns_names: Vec<String>,

    /// Whether a CA created with this identity is signed by a parent.
    pub intermediate: bool,

    /// The requested RSA key size in bits.
    pub key_bit_size: u32,

    /// The requested validity in days.
    pub valid: u32,
}

impl Identity {
    /// Returns whether all fields needed to create a CA are present.
    pub fn has_required_fields(&self) -> bool {
        [
            &self.organization,
            &self.organizational_unit,
            &self.country,
            &self.locality,
            &self.province,
        ].iter().all(|field| !field.trim().is_empty())
    }

    /// Returns the key size to use.
    pub fn key_bits(&self) -> u32 {
        match self.key_bit_size {
            0 => DEFAULT_KEY_BIT_SIZE,
            bits if bits < MIN_KEY_BIT_SIZE => {
                warn!(
                    "Key size of {bits} bits too small, using {} bits.",
                    MIN_KEY_BIT_SIZE
                );
                MIN_KEY_BIT_SIZE
            }
            bits => bits,
        }
    }

    /// Returns the validity in days to use.
    pub fn valid_days(&self) -> u32 {
        valid_days(self.valid)
    }

    /// Returns the certificate subject for the given common name.
    pub fn subject(&self, common_name: &CommonName) -> Subject {
        Subject {
            common_name: common_name.to_string(),
            organization: self.organization.clone(),
            organizational_unit: self.organizational_unit.clone(),
            country: self.country.clone(),
            locality: self.locality.clone(),
            province: self.province.clone(),
            email: self.email.clone().filter(|email| !email.is_empty()),
        }
    }
}


//------------ valid_days ----------------------------------------------------

/// Normalizes a requested validity in days.
///
/// Zero selects the default, everything else is clamped to what we are
/// willing to issue.
pub fn valid_days(requested: u32) -> u32 {
    if requested == 0 {
        return DEFAULT_VALID_DAYS
    }
    let days = requested.clamp(MIN_VALID_DAYS, MAX_VALID_DAYS);
    if days != requested {
        warn!(
            "Requested validity of {requested} days out of range, \
             using {days} days."
        );
    }
    days
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use crate::test;
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let mut id = Identity::default();
        assert_eq!(id.key_bits(), 2048);
        assert_eq!(id.valid_days(), 397);

        id.key_bit_size = 4096;
        id.valid = 100;
        assert_eq!(id.key_bits(), 4096);
        assert_eq!(id.valid_days(), 100);

        id.key_bit_size = 1024;
        id.valid = 5000;
        assert_eq!(id.key_bits(), 2048);
        assert_eq!(id.valid_days(), 825);
    }

    #[test]
    fn required_fields() {
        assert!(test::identity().has_required_fields());
        assert!(!Identity::default().has_required_fields());

        let mut id = test::identity();
        id.province = " ".into();
        assert!(!id.has_required_fields());

        let mut id = test::identity();
        id.email = None;
        id.dns_names.clear();
        assert!(id.has_required_fields());
    }

    #[test]
    fn subject_skips_empty_email() {
        let mut id = test::identity();
        id.email = Some(String::new());
        let cn = CommonName::from_str("root.test").unwrap();
        let subject = id.subject(&cn);
        assert_eq!(subject.common_name, "root.test");
        assert_eq!(subject.organization, id.organization);
        assert_eq!(subject.email, None);
    }

    #[test]
    fn deserialize_with_defaults() {
        let id: Identity = serde_json::from_str(r#"{
            "organization": "Acme",
            "organizational_unit": "Sec",
            "country": "NL",
            "locality": "X",
            "province": "Y",
            "dns_names": ["root.test", "www.root.test"]
        }"#).unwrap();
        assert!(id.has_required_fields());
        assert!(!id.intermediate);
        assert_eq!(id.dns_names, ["root.test", "www.root.test"]);
        assert_eq!(id.valid_days(), 397);
    }
}
