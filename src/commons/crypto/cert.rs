//! Certificates and certificate signing requests.

use std::fmt;
use openssl::asn1::{Asn1Integer, Asn1IntegerRef, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, PKeyRef};
use openssl::stack::Stack;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage,
    SubjectAlternativeName, SubjectKeyIdentifier,
};
use openssl::x509::{
    X509, X509Builder, X509Extension, X509Name, X509NameBuilder,
    X509NameRef, X509Ref, X509Req, X509ReqBuilder, X509VerifyResult,
    X509v3Context,
};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;
use super::keys::pem_string;
use super::{CryptoResult, Error, KeyPair, PublicKey};


//------------ Subject -------------------------------------------------------

/// The distinguished name of a certificate subject.
///
/// Empty fields are left out of the encoded name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Subject {
    pub common_name: String,
    pub organization: String,
    pub organizational_unit: String,
    pub country: String,
    pub locality: String,
    pub province: String,
    pub email: Option<String>,
}

impl Subject {
    fn to_x509_name(&self) -> CryptoResult<X509Name> {
        let mut name = X509NameBuilder::new()?;
        let fields = [
            (Nid::COUNTRYNAME, self.country.as_str()),
            (Nid::STATEORPROVINCENAME, self.province.as_str()),
            (Nid::LOCALITYNAME, self.locality.as_str()),
            (Nid::ORGANIZATIONNAME, self.organization.as_str()),
            (Nid::ORGANIZATIONALUNITNAME, self.organizational_unit.as_str()),
            (Nid::COMMONNAME, self.common_name.as_str()),
            (
                Nid::PKCS9_EMAILADDRESS,
                self.email.as_deref().unwrap_or_default()
            ),
        ];
        for (nid, value) in fields {
            if !value.is_empty() {
                name.append_entry_by_nid(nid, value)?;
            }
        }
        Ok(name.build())
    }
}


//------------ Profile -------------------------------------------------------

/// The kind of certificate to issue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Profile {
    /// A CA certificate that can sign certificates and CRLs.
    Ca,

    /// An end-entity certificate for TLS servers and clients.
    Leaf,
}

impl Profile {
    fn append_extensions(self, builder: &mut X509Builder) -> CryptoResult<()> {
        match self {
            Profile::Ca => {
                builder.append_extension(
                    BasicConstraints::new().critical().ca().build()?
                )?;
                builder.append_extension(
                    KeyUsage::new().critical()
                        .key_cert_sign().crl_sign().digital_signature()
                        .build()?
                )?;
            }
            Profile::Leaf => {
                builder.append_extension(
                    BasicConstraints::new().critical().build()?
                )?;
                builder.append_extension(
                    KeyUsage::new().critical()
                        .digital_signature().key_encipherment()
                        .build()?
                )?;
                builder.append_extension(
                    ExtendedKeyUsage::new()
                        .server_auth().client_auth()
                        .build()?
                )?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Profile::Ca => "CA",
            Profile::Leaf => "leaf",
        })
    }
}


//------------ Serial --------------------------------------------------------

/// A certificate serial number.
///
/// Kept as big-endian unsigned bytes without leading zeros. Displayed as
/// lowercase hex.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Serial(Vec<u8>);

impl Serial {
    pub(super) fn from_asn1(int: &Asn1IntegerRef) -> CryptoResult<Self> {
        Ok(Serial(int.to_bn()?.to_vec()))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Creates a random serial of at most 159 bits.
    fn random() -> CryptoResult<Asn1Integer> {
        let mut bn = BigNum::new()?;
        bn.rand(159, MsbOption::MAYBE_ZERO, false)?;
        Ok(bn.to_asn1_integer()?)
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("00")
        }
        else {
            f.write_str(&hex::encode(&self.0))
        }
    }
}


//------------ Cert ----------------------------------------------------------

/// An X.509 certificate along with its PEM encoding.
#[derive(Clone)]
pub struct Cert {
    x509: X509,
    pem: String,
}

impl Cert {
    /// Creates a self-signed CA certificate.
    pub fn self_signed(
        key: &KeyPair,
        subject: &Subject,
        dns_names: &[String],
        valid_days: u32,
    ) -> CryptoResult<Self> {
        let name = subject.to_x509_name()?;
        let mut builder = new_builder(&name, key.pkey(), valid_days)?;
        builder.set_issuer_name(&name)?;
        Profile::Ca.append_extensions(&mut builder)?;

        let ski = SubjectKeyIdentifier::new().build(
            &builder.x509v3_context(None, None)
        )?;
        builder.append_extension(ski)?;

        if !dns_names.is_empty() {
            let san = san_extension(
                dns_names, &builder.x509v3_context(None, None)
            )?;
            builder.append_extension(san)?;
        }

        builder.sign(key.pkey(), MessageDigest::sha256())?;
        Self::from_x509(builder.build())
    }

    /// Reads a certificate from PEM.
    pub fn from_pem(pem: &[u8]) -> CryptoResult<Self> {
        let x509 = X509::from_pem(pem)?;
        let pem = String::from_utf8(pem.to_vec()).map_err(Error::decode)?;
        Ok(Cert { x509, pem })
    }

    fn from_x509(x509: X509) -> CryptoResult<Self> {
        let pem = pem_string(x509.to_pem()?)?;
        Ok(Cert { x509, pem })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn x509(&self) -> &X509Ref {
        &self.x509
    }

    pub fn serial(&self) -> CryptoResult<Serial> {
        Serial::from_asn1(self.x509.serial_number())
    }

    /// Returns the common name of the subject, if there is one.
    pub fn common_name(&self) -> Option<String> {
        common_name(self.x509.subject_name())
    }

    /// Returns the common name of the issuer, if there is one.
    pub fn issuer_common_name(&self) -> Option<String> {
        common_name(self.x509.issuer_name())
    }

    pub fn not_before(&self) -> String {
        self.x509.not_before().to_string()
    }

    pub fn not_after(&self) -> String {
        self.x509.not_after().to_string()
    }

    /// Returns the DNS names of the subject alternative name extension.
    pub fn dns_names(&self) -> Vec<String> {
        self.x509.subject_alt_names().map(|names| {
            names.iter().filter_map(|name| {
                name.dnsname().map(ToString::to_string)
            }).collect()
        }).unwrap_or_default()
    }

    pub fn public_key(&self) -> CryptoResult<PublicKey> {
        PublicKey::from_pkey(self.x509.public_key()?)
    }

    /// Returns whether issuer and subject of the certificate are the same.
    pub fn is_self_issued(&self) -> bool {
        self.x509.issued(&self.x509) == X509VerifyResult::OK
    }

    /// Returns whether the certificate was signed by the subject of `issuer`.
    pub fn is_signed_by(&self, issuer: &Cert) -> CryptoResult<bool> {
        if issuer.x509.issued(&self.x509) != X509VerifyResult::OK {
            return Ok(false)
        }
        let key = issuer.x509.public_key()?;
        Ok(self.x509.verify(&key)?)
    }
}

impl PartialEq for Cert {
    fn eq(&self, other: &Self) -> bool {
        self.pem == other.pem
    }
}

impl Eq for Cert { }

impl fmt::Debug for Cert {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cert")
            .field("subject", &self.common_name())
            .field("issuer", &self.issuer_common_name())
            .finish()
    }
}


//------------ Csr -----------------------------------------------------------

/// A certificate signing request along with its PEM encoding.
pub struct Csr {
    req: X509Req,
    pem: String,
}

impl Csr {
    /// Creates a CSR for `subject` signed by `key`.
    ///
    /// The DNS names are requested as a subject alternative name extension.
    pub fn build(
        key: &KeyPair,
        subject: &Subject,
        dns_names: &[String],
    ) -> CryptoResult<Self> {
        let mut builder = X509ReqBuilder::new()?;
        builder.set_version(0)?;
        let name: X509Name = subject.to_x509_name()?;
        builder.set_subject_name(&name)?;
        builder.set_pubkey(key.pkey())?;

        if !dns_names.is_empty() {
            let san = san_extension(
                dns_names, &builder.x509v3_context(None)
            )?;
            let mut extensions = Stack::new()?;
            extensions.push(san)?;
            builder.add_extensions(&extensions)?;
        }

        builder.sign(key.pkey(), MessageDigest::sha256())?;
        let req = builder.build();
        let pem = pem_string(req.to_pem()?)?;
        Ok(Csr { req, pem })
    }

    /// Reads a CSR from PEM.
    pub fn from_pem(pem: &[u8]) -> CryptoResult<Self> {
        let req = X509Req::from_pem(pem)?;
        let pem = String::from_utf8(pem.to_vec()).map_err(Error::decode)?;
        Ok(Csr { req, pem })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Returns the common name of the subject, if there is one.
    pub fn common_name(&self) -> Option<String> {
        common_name(self.req.subject_name())
    }

    /// Returns the DNS names of the requested subject alternative names.
    pub fn dns_names(&self) -> CryptoResult<Vec<String>> {
        let der = self.req.to_der()?;
        let (_, req) = X509CertificationRequest::from_der(&der)
            .map_err(Error::decode)?;
        let mut res = Vec::new();
        for extension in req.requested_extensions().into_iter().flatten() {
            if let ParsedExtension::SubjectAlternativeName(san) = extension {
                for name in &san.general_names {
                    if let GeneralName::DNSName(dns) = name {
                        res.push(dns.to_string())
                    }
                }
            }
        }
        Ok(res)
    }

    /// Checks that the CSR is signed by the key it contains.
    pub fn verify(&self) -> CryptoResult<bool> {
        let key = self.req.public_key()?;
        Ok(self.req.verify(&key)?)
    }

    /// Issues a certificate for this request.
    ///
    /// The certificate is signed by `key` on behalf of `issuer`. It carries
    /// the extensions of `profile`. Of the extensions the request asks for,
    /// only the DNS names are copied.
    pub fn sign(
        &self,
        issuer: &Cert,
        key: &KeyPair,
        profile: Profile,
        valid_days: u32,
    ) -> CryptoResult<Cert> {
        if !self.verify()? {
            return Err(Error::InvalidSignature)
        }

        let pubkey = self.req.public_key()?;
        let mut builder = new_builder(
            self.req.subject_name(), &pubkey, valid_days
        )?;
        builder.set_issuer_name(issuer.x509.subject_name())?;
        profile.append_extensions(&mut builder)?;

        let ski = SubjectKeyIdentifier::new().build(
            &builder.x509v3_context(Some(issuer.x509()), None)
        )?;
        builder.append_extension(ski)?;
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .issuer(false)
            .build(&builder.x509v3_context(Some(issuer.x509()), None))?;
        builder.append_extension(aki)?;

        let dns_names = self.dns_names()?;
        if !dns_names.is_empty() {
            let san = san_extension(
                &dns_names, &builder.x509v3_context(Some(issuer.x509()), None)
            )?;
            builder.append_extension(san)?;
        }

        builder.sign(key.pkey(), MessageDigest::sha256())?;
        Cert::from_x509(builder.build())
    }
}

impl fmt::Debug for Csr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Csr")
            .field("subject", &self.common_name())
            .finish()
    }
}


//------------ Helpers -------------------------------------------------------

/// Starts a version 3 certificate valid from now for `valid_days` days.
fn new_builder<T: HasPublic>(
    subject: &X509NameRef,
    pubkey: &PKeyRef<T>,
    valid_days: u32,
) -> CryptoResult<X509Builder> {
    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial: Asn1Integer = Serial::random()?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(subject)?;
    builder.set_pubkey(pubkey)?;
    let not_before: Asn1Time = Asn1Time::days_from_now(0)?;
    builder.set_not_before(&not_before)?;
    let not_after: Asn1Time = Asn1Time::days_from_now(valid_days)?;
    builder.set_not_after(&not_after)?;
    Ok(builder)
}

fn san_extension(
    dns_names: &[String],
    context: &X509v3Context,
) -> CryptoResult<X509Extension> {
    let mut san = SubjectAlternativeName::new();
    for name in dns_names {
        san.dns(name);
    }
    Ok(san.build(context)?)
}

fn common_name(name: &X509NameRef) -> Option<String> {
    let entry = name.entries_by_nid(Nid::COMMONNAME).next()?;
    entry.data().as_utf8().ok().map(|cn| cn.to_string())
}


//------------ Tests ---------------------------------------------------------
