//! Certificate authorities and the certificates they issue.

pub use self::authority::{CaStatus, CertificateAuthority};
pub use self::certificate::Certificate;
pub use self::error::Error;
pub use self::identity::{Identity, valid_days};

use crate::commons::storage::{CommonName, Store};

mod authority;
mod certificate;
mod error;
mod identity;

pub type CaResult<T> = Result<T, Error>;

/// Returns the names of all CAs in the store, sorted.
pub fn list(store: &Store) -> CaResult<Vec<CommonName>> {
    Ok(store.list_cas()?)
}
