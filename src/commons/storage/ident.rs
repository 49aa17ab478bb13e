//! The common names used as keys into the store.

use std::{error, fmt};
use std::borrow::Borrow;
use std::str::FromStr;
use serde::{Deserialize, Serialize};


//------------ CommonName ----------------------------------------------------

/// The common name of a CA or of a certificate issued by a CA.
///
/// Common names are used both as the subject common name of a certificate
/// and as a directory name in the store. They therefore have a limited set
/// of allowed characters: ASCII letters and digits, plus, dash, underscore,
/// asterisk, and periods. They can never be empty and they cannot start
/// with a period.
#[derive(
    Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
#[serde(try_from = "String", into = "String")]
pub struct CommonName(String);

impl CommonName {
    /// Converts the name to a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that `s` is a valid common name.
    fn check(s: &str) -> Result<(), CommonNameError> {
        let Some(first) = s.as_bytes().first() else {
            return Err(CommonNameError::Empty)
        };
        if *first == b'.' {
            return Err(CommonNameError::LeadingDot)
        }
        if let Some(ch) = s.bytes().find(|ch| {
            !ch.is_ascii_alphanumeric()
                && !matches!(ch, b'+' | b'-' | b'_' | b'.' | b'*')
        }) {
            return Err(CommonNameError::IllegalCharacter(ch))
        }
        Ok(())
    }
}

impl FromStr for CommonName {
    type Err = CommonNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::check(s)?;
        Ok(CommonName(s.to_string()))
    }
}

impl TryFrom<String> for CommonName {
    type Error = CommonNameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::check(&s)?;
        Ok(CommonName(s))
    }
}

impl From<CommonName> for String {
    fn from(name: CommonName) -> Self {
        name.0
    }
}

impl AsRef<str> for CommonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CommonName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for CommonName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl fmt::Display for CommonName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}


//------------ CommonNameError -----------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommonNameError {
    Empty,
    LeadingDot,
    IllegalCharacter(u8),
}

impl fmt::Display for CommonNameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommonNameError::Empty => {
                f.write_str("empty common name")
            }
            CommonNameError::LeadingDot => {
                f.write_str("common name starts with a period")
            }
            CommonNameError::IllegalCharacter(ch) => {
                write!(
                    f, "illegal character '{}' in common name",
                    ch.escape_ascii()
                )
            }
        }
    }
}

impl error::Error for CommonNameError { }


//------------ Tests ---------------------------------------------------------
