//! Filesystem-based storage of CA material.

use std::{error, fmt, fs, io};
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use log::{debug, trace};
use tempfile::NamedTempFile;
use crate::constants::{
    CA_DIR, CERTS_DIR, CERT_EXTENSION, CRL_EXTENSION, CSR_EXTENSION,
    PRIVATE_KEY_FILE, PUBLIC_KEY_FILE,
};
use super::CommonName;


//------------ Constants -----------------------------------------------------

/// The directory under the base that contains temporary files.
const TMP_FILE_DIR: &str = ".tmp";

/// The directory under the base that contains the lock files.
const LOCK_FILE_DIR: &str = ".locks";

/// The name of the lock file for a common name.
pub const LOCK_FILE_NAME: &str = "lockfile.lock";

/// The permissions for private keys.
#[cfg(unix)]
const SECRET_FILE_MODE: u32 = 0o600;

/// The permissions for everything else.
#[cfg(unix)]
const PUBLIC_FILE_MODE: u32 = 0o644;


//------------ Scope ---------------------------------------------------------

/// The place in the store where a set of artifacts lives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope<'a> {
    /// The material of the CA itself: `<base>/<ca>/ca`.
    Ca(&'a CommonName),

    /// A certificate issued by a CA: `<base>/<ca>/certs/<cert>`.
    Issued {
        ca: &'a CommonName,
        cert: &'a CommonName,
    },
}

impl Scope<'_> {
    /// Returns the common name the artifacts in the scope belong to.
    ///
    /// This is the name used for the certificate, CSR and CRL file names.
    pub fn owner(&self) -> &CommonName {
        match self {
            Scope::Ca(ca) => ca,
            Scope::Issued { cert, .. } => cert,
        }
    }
}

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scope::Ca(ca) => write!(f, "CA '{ca}'"),
            Scope::Issued { ca, cert } => {
                write!(f, "certificate '{cert}' of CA '{ca}'")
            }
        }
    }
}


//------------ Artifact ------------------------------------------------------

/// The kinds of files kept for a CA or an issued certificate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Artifact {
    PrivateKey,
    PublicKey,
    Csr,
    Certificate,
    Crl,
}

impl Artifact {
    /// Returns the file name of the artifact for the given owner.
    pub fn file_name(self, owner: &CommonName) -> String {
        match self {
            Artifact::PrivateKey => PRIVATE_KEY_FILE.to_string(),
            Artifact::PublicKey => PUBLIC_KEY_FILE.to_string(),
            Artifact::Csr => format!("{owner}.{CSR_EXTENSION}"),
            Artifact::Certificate => format!("{owner}.{CERT_EXTENSION}"),
            Artifact::Crl => format!("{owner}.{CRL_EXTENSION}"),
        }
    }

    /// Returns whether the artifact must only be readable by its owner.
    pub fn is_secret(self) -> bool {
        matches!(self, Artifact::PrivateKey)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Artifact::PrivateKey => "private key",
            Artifact::PublicKey => "public key",
            Artifact::Csr => "certificate signing request",
            Artifact::Certificate => "certificate",
            Artifact::Crl => "certificate revocation list",
        })
    }
}


//------------ Store ---------------------------------------------------------

/// A store that keeps CA material as PEM files in a directory tree.
///
/// Each CA has a directory named after its common name directly under the
/// base directory. Its own key, certificate, CSR, and CRL live in the `ca`
/// subdirectory, certificates it issued live in a subdirectory per
/// certificate under `certs`. A CA is known to the store if and only if its
/// `ca` subdirectory exists.
///
/// In addition, the directory `.tmp` under the base is used for temporary
/// files: every value is written there first and then renamed into place
/// so that no half-written file is ever visible. The directory `.locks`
/// holds advisory lock files per common name, see [`Store::with_lock`].
///
/// The store itself never takes a lock. Callers that may run concurrently
/// need to serialize access to a CA via [`Store::with_lock`].
#[derive(Clone, Debug)]
pub struct Store {
    /// The base directory.
    base: PathBuf,

    /// The path for temporary files.
    tmp: PathBuf,

    /// The path for lock files.
    locks: PathBuf,
}

impl Store {
    /// Creates a store for the given base directory.
    ///
    /// Creates the base and temporary directories if needed.
    pub fn new(base: &Path) -> Result<Self, Error> {
        let base = base.to_path_buf();
        let tmp = base.join(TMP_FILE_DIR);
        let locks = base.join(LOCK_FILE_DIR);

        fs::create_dir_all(&tmp).map_err(|err| {
            Error::io(
                format!(
                    "failed to create temporary directory '{}'",
                    tmp.display()
                ),
                err
            )
        })?;

        debug!("Using store at '{}'", base.display());
        Ok(Self { base, tmp, locks })
    }

    /// Runs `op` while holding the advisory lock for `name`.
    ///
    /// The lock is a write lock on a lock file under `.locks/<name>`, so it
    /// excludes other processes using the same base directory, too.
    pub fn with_lock<F, T, E>(&self, name: &CommonName, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<Error>,
    {
        let mut file_lock = FileLock::create(self.locks.join(name.as_str()))?;
        let _write_lock = file_lock.write()?;
        trace!("Acquired lock for '{name}'");
        op()
    }

    /// Returns the directory of the CA with the given name.
    fn ca_path(&self, ca: &CommonName) -> PathBuf {
        self.base.join(ca.as_str())
    }

    /// Returns the directory for the given scope.
    fn scope_path(&self, scope: Scope) -> PathBuf {
        match scope {
            Scope::Ca(ca) => self.ca_path(ca).join(CA_DIR),
            Scope::Issued { ca, cert } => {
                let mut res = self.ca_path(ca);
                res.push(CERTS_DIR);
                res.push(cert.as_str());
                res
            }
        }
    }

    /// Returns the path for an artifact in the given scope.
    fn artifact_path(&self, scope: Scope, artifact: Artifact) -> PathBuf {
        self.scope_path(scope).join(artifact.file_name(scope.owner()))
    }
}


/// # Reading
impl Store {
    /// Returns whether the store knows a CA with the given name.
    pub fn has_ca(&self, ca: &CommonName) -> Result<bool, Error> {
        self.has_scope(Scope::Ca(ca))
    }

    /// Returns whether the CA `ca` has material for certificate `cert`.
    pub fn has_issued(
        &self, ca: &CommonName, cert: &CommonName
    ) -> Result<bool, Error> {
        self.has_scope(Scope::Issued { ca, cert })
    }

    fn has_scope(&self, scope: Scope) -> Result<bool, Error> {
        let path = self.scope_path(scope);
        path.try_exists().map_err(|err| {
            Error::io(
                format!("failed to check existence of {scope}"),
                err
            )
        })
    }

    /// Returns the content of an artifact.
    ///
    /// If the artifact does not exist, returns `Ok(None)`.
    pub fn get(
        &self, scope: Scope, artifact: Artifact
    ) -> Result<Option<Vec<u8>>, Error> {
        let path = self.artifact_path(scope, artifact);
        match fs::read(&path) {
            Ok(content) => {
                trace!("Read {} of {}", artifact, scope);
                Ok(Some(content))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(Error::io(
                    format!("failed to read file '{}'", path.display()),
                    err
                ))
            }
        }
    }

    /// Returns the names of all CAs known to the store, sorted.
    pub fn list_cas(&self) -> Result<Vec<CommonName>, Error> {
        let mut res = Vec::new();
        for name in list_dirs(&self.base)? {
            if self.has_ca(&name)? {
                res.push(name)
            }
        }
        res.sort();
        Ok(res)
    }

    /// Returns the names of all certificates issued by a CA, sorted.
    pub fn list_issued(
        &self, ca: &CommonName
    ) -> Result<Vec<CommonName>, Error> {
        let mut res = list_dirs(&self.ca_path(ca).join(CERTS_DIR))?;
        res.sort();
        Ok(res)
    }
}


/// # Writing
impl Store {
    /// Creates the directories for a new CA.
    pub fn create_ca_dirs(&self, ca: &CommonName) -> Result<(), Error> {
        Self::create_dirs(&self.scope_path(Scope::Ca(ca)))?;
        Self::create_dirs(&self.ca_path(ca).join(CERTS_DIR))
    }

    /// Stores an artifact.
    ///
    /// Quietly overwrites a possibly already existing file. Private keys
    /// are only readable and writable by the owner.
    pub fn store(
        &self, scope: Scope, artifact: Artifact, content: &[u8]
    ) -> Result<(), Error> {
        let path = self.artifact_path(scope, artifact);

        if let Some(dir) = path.parent() {
            Self::create_dirs(dir)?;
        }

        // Write to a temporary file first to ensure that the file can be
        // written entirely.
        //
        // tempfile ensures that the temporary file is cleaned up in case it
        // would be left behind because of some issue.
        let mut tmp_file = NamedTempFile::new_in(&self.tmp).map_err(|err| {
            Error::io(
                format!("writing temp file failed for {artifact} of {scope}"),
                err,
            )
        })?;

        tmp_file.write_all(content).and_then(|_| tmp_file.flush()).map_err(
            |err| {
                Error::io(
                    format!(
                        "failed to write temp file '{}' for {} of {}",
                        tmp_file.path().display(), artifact, scope
                    ),
                    err,
                )
            }
        )?;

        Self::set_mode(tmp_file.as_file(), artifact)?;

        // Move the temporary file to its final location.
        tmp_file.persist(&path).map_err(|err| {
            Error::io(
                format!(
                    "failed to rename temp file '{}' to '{}'",
                    err.file.path().display(),
                    path.display()
                ),
                err.error,
            )
        })?;

        debug!("Stored {} of {}", artifact, scope);
        Ok(())
    }

    /// Copies an artifact from one scope to another.
    ///
    /// Fails if the source does not exist.
    pub fn copy(
        &self, from: Scope, to: Scope, artifact: Artifact
    ) -> Result<(), Error> {
        let content = self.get(from, artifact)?.ok_or_else(|| {
            Error::other(format!("no {artifact} to copy for {from}"))
        })?;
        self.store(to, artifact, &content)
    }

    /// Creates the given directory if necessary.
    fn create_dirs(path: &Path) -> Result<(), Error> {
        fs::create_dir_all(path).map_err(|err| {
            Error::io(
                format!("failed to create directory '{}'", path.display()),
                err
            )
        })
    }

    #[cfg(unix)]
    fn set_mode(file: &File, artifact: Artifact) -> Result<(), Error> {
        use std::os::unix::fs::PermissionsExt;

        let mode = if artifact.is_secret() {
            SECRET_FILE_MODE
        }
        else {
            PUBLIC_FILE_MODE
        };
        file.set_permissions(fs::Permissions::from_mode(mode)).map_err(
            |err| Error::io(format!("failed to set mode of {artifact}"), err)
        )
    }

    #[cfg(not(unix))]
    fn set_mode(_file: &File, _artifact: Artifact) -> Result<(), Error> {
        Ok(())
    }
}


//------------ Helpers -------------------------------------------------------

/// Returns the names of all directories directly under `path`.
///
/// Directories whose names are not valid common names, such as our own
/// `.tmp` and `.locks`, are skipped. A missing `path` is empty.
fn list_dirs(path: &Path) -> Result<Vec<CommonName>, Error> {
    let read_err = |err| {
        Error::io(
            format!("failed to read directory '{}'", path.display()),
            err
        )
    };

    let dir = match fs::read_dir(path) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(Vec::new())
        }
        Err(err) => return Err(read_err(err)),
    };

    let mut res = Vec::new();
    for item in dir {
        let item = item.map_err(read_err)?;
        if !item.file_type().map_err(read_err)?.is_dir() {
            continue
        }
        if let Some(name) = item.file_name().into_string().ok().and_then(
            |name| CommonName::try_from(name).ok()
        ) {
            res.push(name)
        }
    }
    Ok(res)
}


//------------ FileLock ------------------------------------------------------

#[derive(Debug)]
struct FileLock {
    lock: fd_lock::RwLock<File>,
}

impl FileLock {
    fn create(path: PathBuf) -> Result<Self, Error> {
        let lock_path = path.join(LOCK_FILE_NAME);
        Store::create_dirs(&path)?;

        let mut options = OpenOptions::new();
        options.create(true).truncate(false).read(true).write(true);
        let lock_file = options.open(&lock_path).map_err(|err| {
            Error::io(
                format!(
                    "failed to open lock file '{}'", lock_path.display(),
                ),
                err
            )
        })?;

        Ok(FileLock { lock: fd_lock::RwLock::new(lock_file) })
    }

    fn write(&mut self) -> Result<fd_lock::RwLockWriteGuard<'_, File>, Error> {
        self.lock
            .write()
            .map_err(|e| Error::other(format!("Cannot get file lock: {e}")))
    }
}


//------------ Error ---------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    Io {
        context: Cow<'static, str>,
        err: io::Error,
    },
    Other(String),
}

impl Error {
    fn io(context: impl Into<Cow<'static, str>>, err: io::Error) -> Self {
        Error::Io { context: context.into(), err }
    }

    fn other(info: impl Into<String>) -> Self {
        Error::Other(info.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io { context, err } => {
                write!(f, "{context}: {err}")
            }
            Error::Other(s) => f.write_str(s)
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io { err, .. } => Some(err),
            Error::Other(_) => None,
        }
    }
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use crate::test;
    use super::*;

    fn cn(s: &str) -> CommonName {
        CommonName::from_str(s).unwrap()
    }

    #[test]
    fn store_and_get_artifact() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let ca = cn("root.test");
            store.create_ca_dirs(&ca).unwrap();

            assert!(store.has_ca(&ca).unwrap());
            assert_eq!(
                store.get(Scope::Ca(&ca), Artifact::Certificate).unwrap(),
                None
            );

            store.store(
                Scope::Ca(&ca), Artifact::Certificate, b"certificate"
            ).unwrap();
            assert_eq!(
                store.get(Scope::Ca(&ca), Artifact::Certificate).unwrap(),
                Some(b"certificate".to_vec())
            );
            assert!(
                dir.join("root.test").join("ca").join("root.test.crt")
                    .is_file()
            );
        })
    }

    #[test]
    fn issued_artifacts_use_their_own_names() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let ca = cn("root.test");
            let leaf = cn("leaf.test");
            let scope = Scope::Issued { ca: &ca, cert: &leaf };

            assert!(!store.has_issued(&ca, &leaf).unwrap());
            store.store(scope, Artifact::Csr, b"csr").unwrap();
            store.store(scope, Artifact::PublicKey, b"pub").unwrap();

            assert!(store.has_issued(&ca, &leaf).unwrap());
            let path = dir.join("root.test").join("certs").join("leaf.test");
            assert!(path.join("leaf.test.csr").is_file());
            assert!(path.join("key.pub").is_file());
            assert_eq!(store.list_issued(&ca).unwrap(), vec![leaf]);
        })
    }

    #[cfg(unix)]
    #[test]
    fn private_keys_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let ca = cn("root.test");
            store.store(Scope::Ca(&ca), Artifact::PrivateKey, b"k").unwrap();
            store.store(Scope::Ca(&ca), Artifact::PublicKey, b"p").unwrap();

            let ca_dir = dir.join("root.test").join("ca");
            let mode = |name: &str| {
                fs::metadata(ca_dir.join(name)).unwrap().permissions().mode()
                    & 0o777
            };
            assert_eq!(mode("key.pem"), 0o600);
            assert_eq!(mode("key.pub"), 0o644);
        })
    }

    #[test]
    fn list_cas_skips_internal_and_incomplete_dirs() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            store.create_ca_dirs(&cn("b.test")).unwrap();
            store.create_ca_dirs(&cn("a.test")).unwrap();
            fs::create_dir_all(dir.join("not-a-ca")).unwrap();
            store.with_lock(&cn("a.test"), || Ok::<_, Error>(())).unwrap();

            assert_eq!(
                store.list_cas().unwrap(),
                vec![cn("a.test"), cn("b.test")]
            );
        })
    }

    #[test]
    fn copy_between_scopes() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let root = cn("root.test");
            let inter = cn("inter.test");
            let from = Scope::Issued { ca: &root, cert: &inter };

            assert!(
                store.copy(from, Scope::Ca(&inter), Artifact::Certificate)
                    .is_err()
            );

            store.store(from, Artifact::Certificate, b"signed").unwrap();
            store.copy(from, Scope::Ca(&inter), Artifact::Certificate)
                .unwrap();
            assert_eq!(
                store.get(Scope::Ca(&inter), Artifact::Certificate).unwrap(),
                Some(b"signed".to_vec())
            );
        })
    }

    #[test]
    fn with_lock_returns_result_of_op() {
        test::test_under_tmp(|dir| {
            let store = Store::new(&dir).unwrap();
            let res: Result<u32, Error> = store.with_lock(
                &cn("root.test"), || Ok(42)
            );
            assert_eq!(res.unwrap(), 42);
            assert!(
                dir.join(".locks").join("root.test").join(LOCK_FILE_NAME)
                    .is_file()
            );
        })
    }
}
