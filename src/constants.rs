//! Various certkeeper-wide constants.


//------------ Binary Names -------------------------------------------------

/// The friendly name of the `certkeeper` binary.
pub const CERTKEEPER_APP: &str = "certkeeper";


//------------ Config Files Paths -------------------------------------------

/// The default path to the certkeeper config file.
pub const CERTKEEPER_DEFAULT_CONFIG_FILE: &str = "/etc/certkeeper.conf";


//------------ Environment Variables ----------------------------------------

/// The environment variable with the base directory of the store.
///
/// It is overwritten by the config file and by the `--storage` command
/// line option. The default is “./data”.
pub const CERTKEEPER_ENV_STORAGE_PATH: &str = "CERTKEEPER_STORAGE_PATH";

/// The environment variable with the log level.
///
/// The variable should contain the name of a [`log::LevelFilter`]. It will
/// be overwritten by the config file. The default is “warn.”
pub const CERTKEEPER_ENV_LOG_LEVEL: &str = "CERTKEEPER_LOG_LEVEL";

/// The environment variable with the log target.
///
/// The variable should contain the name of a
/// [`LogType`][crate::config::LogType]. It will be overwritten by the
/// config file. The default is “stderr.”
pub const CERTKEEPER_ENV_LOG_TYPE: &str = "CERTKEEPER_LOG_TYPE";


//------------ Store Layout -------------------------------------------------

/// The directory under a CA that holds its own material.
pub const CA_DIR: &str = "ca";

/// The directory under a CA that holds the certificates it issued.
pub const CERTS_DIR: &str = "certs";

/// The file name of a private key.
pub const PRIVATE_KEY_FILE: &str = "key.pem";

/// The file name of a public key.
pub const PUBLIC_KEY_FILE: &str = "key.pub";

pub const CSR_EXTENSION: &str = "csr";
pub const CERT_EXTENSION: &str = "crt";
pub const CRL_EXTENSION: &str = "crl";


//------------ Issuance Defaults --------------------------------------------

/// The RSA key size used when an identity does not ask for one.
pub const DEFAULT_KEY_BIT_SIZE: u32 = 2048;

/// The smallest RSA key size we will generate.
///
/// CRLs are signed through a library that refuses smaller RSA keys.
pub const MIN_KEY_BIT_SIZE: u32 = 2048;

/// The validity in days used when an identity does not ask for one.
pub const DEFAULT_VALID_DAYS: u32 = 397;

/// The shortest validity in days we will issue.
pub const MIN_VALID_DAYS: u32 = 1;

/// The longest validity in days we will issue.
pub const MAX_VALID_DAYS: u32 = 825;

/// The number of days between a CRL's this-update and next-update.
pub const CRL_NEXT_UPDATE_DAYS: i64 = 7;
