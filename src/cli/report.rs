//! Formatting command results for the user.

use std::{error, fmt};
use std::fmt::Write;
use std::str::FromStr;
use serde::Serialize;
use crate::ca::{CaResult, Certificate, CertificateAuthority};
use crate::commons::crypto::{Cert, RevokedEntry};
use crate::commons::storage::CommonName;


//------------ Response ------------------------------------------------------

/// The result of a command ready for reporting.
#[derive(Clone, Debug)]
pub enum Response {
    CaList(CaList),
    CaDetails(CaDetails),
    CertificateList(CertificateList),
    CertificateDetails(CertificateDetails),
    Crl(CrlDetails),
}

impl Response {
    pub fn report(&self, fmt: ReportFormat) -> Result<String, ReportError> {
        match self {
            Response::CaList(list) => list.report(fmt),
            Response::CaDetails(details) => details.report(fmt),
            Response::CertificateList(list) => list.report(fmt),
            Response::CertificateDetails(details) => details.report(fmt),
            Response::Crl(crl) => crl.report(fmt),
        }
    }
}


//------------ ReportFormat --------------------------------------------------

/// The format to use when presenting a response.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReportFormat {
    Json,

    #[default]
    Text,
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, ReportError> {
        match s {
            "json" => Ok(ReportFormat::Json),
            "text" => Ok(ReportFormat::Text),
            _ => Err(ReportError::UnrecognisedFormat(s.to_string())),
        }
    }
}


//------------ Report --------------------------------------------------------

/// Implemented by everything a command can answer with.
trait Report: Serialize {
    fn text(&self) -> String;

    fn report(&self, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::Json => {
                serde_json::to_string_pretty(self).map_err(ReportError::Json)
            }
            ReportFormat::Text => Ok(self.text()),
        }
    }
}


//------------ CaList --------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct CaList {
    cas: Vec<CommonName>,
}

impl From<Vec<CommonName>> for CaList {
    fn from(cas: Vec<CommonName>) -> Self {
        CaList { cas }
    }
}

impl Report for CaList {
    fn text(&self) -> String {
        let mut res = String::new();
        for ca in &self.cas {
            let _ = writeln!(res, "{}", ca);
        }
        res
    }
}


//------------ CertDetails ---------------------------------------------------

/// The parts of an X.509 certificate worth showing.
#[derive(Clone, Debug, Serialize)]
pub struct CertDetails {
    subject: Option<String>,
    issuer: Option<String>,
    serial: String,
    not_before: String,
    not_after: String,
    dns_names: Vec<String>,
    pem: String,
}

impl CertDetails {
    fn new(cert: &Cert) -> CaResult<Self> {
        Ok(CertDetails {
            subject: cert.common_name(),
            issuer: cert.issuer_common_name(),
            serial: cert.serial()?.to_string(),
            not_before: cert.not_before(),
            not_after: cert.not_after(),
            dns_names: cert.dns_names(),
            pem: cert.pem().to_string(),
        })
    }

    fn write_text(&self, res: &mut String) {
        let unknown = "<unknown>";
        let _ = writeln!(
            res, "Subject:    {}", self.subject.as_deref().unwrap_or(unknown)
        );
        let _ = writeln!(
            res, "Issuer:     {}", self.issuer.as_deref().unwrap_or(unknown)
        );
        let _ = writeln!(res, "Serial:     {}", self.serial);
        let _ = writeln!(res, "Not before: {}", self.not_before);
        let _ = writeln!(res, "Not after:  {}", self.not_after);
        if !self.dns_names.is_empty() {
            let _ = writeln!(res, "DNS names:  {}", self.dns_names.join(", "));
        }
        res.push('\n');
        res.push_str(&self.pem);
    }
}


//------------ CaDetails -----------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct CaDetails {
    name: CommonName,
    status: String,
    intermediate: bool,
    certificate: Option<CertDetails>,
    revoked: Vec<RevokedDetails>,
}

impl CaDetails {
    pub fn new(ca: &CertificateAuthority) -> CaResult<Self> {
        Ok(CaDetails {
            name: ca.common_name().clone(),
            status: ca.status().to_string(),
            intermediate: ca.is_intermediate(),
            certificate: ca.certificate().map(CertDetails::new).transpose()?,
            revoked: ca.revoked().iter().map(RevokedDetails::from).collect(),
        })
    }
}

impl Report for CaDetails {
    fn text(&self) -> String {
        let mut res = String::new();
        let _ = writeln!(res, "Name:   {}", self.name);
        let _ = writeln!(res, "Status: {}", self.status);
        let _ = writeln!(
            res, "Type:   {}",
            if self.intermediate { "intermediate" } else { "root" }
        );
        res.push('\n');

        if let Some(cert) = self.certificate.as_ref() {
            cert.write_text(&mut res);
            res.push('\n');
        }

        res.push_str("Revoked:\n");
        if self.revoked.is_empty() {
            res.push_str("<none>\n");
        }
        else {
            for entry in &self.revoked {
                entry.write_text(&mut res);
            }
        }
        res
    }
}


//------------ CertificateList -----------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct CertificateList {
    ca: CommonName,
    certificates: Vec<CommonName>,
}

impl CertificateList {
    pub fn new(ca: CommonName, certificates: Vec<CommonName>) -> Self {
        CertificateList { ca, certificates }
    }
}

impl Report for CertificateList {
    fn text(&self) -> String {
        let mut res = String::new();
        for cert in &self.certificates {
            let _ = writeln!(res, "{}", cert);
        }
        res
    }
}


//------------ CertificateDetails --------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct CertificateDetails {
    name: CommonName,
    ca: CommonName,
    revoked: bool,
    certificate: CertDetails,
}

impl CertificateDetails {
    pub fn new(
        ca: &CertificateAuthority, certificate: &Certificate
    ) -> CaResult<Self> {
        Ok(CertificateDetails {
            name: certificate.common_name().clone(),
            ca: ca.common_name().clone(),
            revoked: ca.is_revoked(certificate)?,
            certificate: CertDetails::new(
                certificate.require_certificate()?
            )?,
        })
    }
}

impl Report for CertificateDetails {
    fn text(&self) -> String {
        let mut res = String::new();
        let _ = writeln!(res, "Name:    {}", self.name);
        let _ = writeln!(res, "CA:      {}", self.ca);
        let _ = writeln!(
            res, "Revoked: {}", if self.revoked { "yes" } else { "no" }
        );
        res.push('\n');
        self.certificate.write_text(&mut res);
        res
    }
}


//------------ CrlDetails ----------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct CrlDetails {
    ca: CommonName,
    entries: Vec<RevokedDetails>,
    pem: Option<String>,
}

impl From<&CertificateAuthority> for CrlDetails {
    fn from(ca: &CertificateAuthority) -> Self {
        CrlDetails {
            ca: ca.common_name().clone(),
            entries: ca.revoked().iter().map(RevokedDetails::from).collect(),
            pem: ca.crl_pem().map(String::from),
        }
    }
}

impl Report for CrlDetails {
    fn text(&self) -> String {
        match self.pem.as_ref() {
            Some(pem) => pem.clone(),
            None => format!("CA '{}' has no CRL.\n", self.ca),
        }
    }
}


//------------ RevokedDetails ------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct RevokedDetails {
    serial: String,
    revoked_at: String,
}

impl RevokedDetails {
    fn write_text(&self, res: &mut String) {
        let _ = writeln!(res, "  {} at {}", self.serial, self.revoked_at);
    }
}

impl From<&RevokedEntry> for RevokedDetails {
    fn from(entry: &RevokedEntry) -> Self {
        RevokedDetails {
            serial: entry.serial().to_string(),
            revoked_at: entry.revoked_at().to_rfc3339(),
        }
    }
}


//------------ ReportError ---------------------------------------------------

#[derive(Debug)]
pub enum ReportError {
    UnrecognisedFormat(String),
    Json(serde_json::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReportError::UnrecognisedFormat(s) => {
                write!(f, "This report format is not recognised: {}", s)
            }
            ReportError::Json(err) => {
                write!(f, "Cannot produce JSON report: {}", err)
            }
        }
    }
}

impl error::Error for ReportError { }


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_format() {
        assert_eq!(ReportFormat::from_str("json").unwrap(), ReportFormat::Json);
        assert_eq!(ReportFormat::from_str("text").unwrap(), ReportFormat::Text);
        assert!(ReportFormat::from_str("xml").is_err());
    }

    #[test]
    fn ca_list() {
        let list = Response::CaList(CaList::from(vec![
            CommonName::from_str("a.test").unwrap(),
            CommonName::from_str("b.test").unwrap(),
        ]));
        assert_eq!(list.report(ReportFormat::Text).unwrap(), "a.test\nb.test\n");

        let json: serde_json::Value = serde_json::from_str(
            &list.report(ReportFormat::Json).unwrap()
        ).unwrap();
        assert_eq!(json["cas"][1], "b.test");
    }
}
