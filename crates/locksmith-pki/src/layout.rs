//! On-disk layout of one CA and the file primitives the engine builds on.
//!
//! ```text
//! <ca>/
//!   certs/ca.pem  private/ca.{priv,pub}.pem  certreqs/ca.pem  crl/ca.crl
//!   newcerts/<serial>.pem  intermed-ca/<child>/  ca.index  ca.serial
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::path::INTERMEDIATE_DIR;

/// File name used for a CA's own certificate, request, and keys.
pub const CA_STEM: &str = "ca";

/// Initial content of a fresh serial file.
pub const INITIAL_SERIAL: &str = "1";

/// Paths belonging to one CA directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaLayout {
    base: PathBuf,
}

impl CaLayout {
    /// Layout rooted at `base`. Nothing is touched on disk.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The CA directory itself.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// True if the CA directory exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.base.is_dir()
    }

    /// `certs/`
    #[must_use]
    pub fn certs_dir(&self) -> PathBuf {
        self.base.join("certs")
    }

    /// `certreqs/`
    #[must_use]
    pub fn requests_dir(&self) -> PathBuf {
        self.base.join("certreqs")
    }

    /// `crl/`
    #[must_use]
    pub fn crl_dir(&self) -> PathBuf {
        self.base.join("crl")
    }

    /// `newcerts/`
    #[must_use]
    pub fn newcerts_dir(&self) -> PathBuf {
        self.base.join("newcerts")
    }

    /// `private/`
    #[must_use]
    pub fn private_dir(&self) -> PathBuf {
        self.base.join("private")
    }

    /// `intermed-ca/`
    #[must_use]
    pub fn intermediates_dir(&self) -> PathBuf {
        self.base.join(INTERMEDIATE_DIR)
    }

    /// `ca.index`
    #[must_use]
    pub fn index_file(&self) -> PathBuf {
        self.base.join("ca.index")
    }

    /// `ca.serial`
    #[must_use]
    pub fn serial_file(&self) -> PathBuf {
        self.base.join("ca.serial")
    }

    /// `certs/ca.pem`
    #[must_use]
    pub fn certificate(&self) -> PathBuf {
        self.certificate_for(CA_STEM)
    }

    /// `private/ca.priv.pem`
    #[must_use]
    pub fn private_key(&self) -> PathBuf {
        self.private_key_for(CA_STEM)
    }

    /// `private/ca.pub.pem`
    #[must_use]
    pub fn public_key(&self) -> PathBuf {
        self.public_key_for(CA_STEM)
    }

    /// `certreqs/ca.pem`
    #[must_use]
    pub fn request(&self) -> PathBuf {
        self.request_for(CA_STEM)
    }

    /// `crl/ca.crl`
    #[must_use]
    pub fn crl(&self) -> PathBuf {
        self.crl_dir().join("ca.crl")
    }

    /// `certs/<slug>.pem`
    #[must_use]
    pub fn certificate_for(&self, slug: &str) -> PathBuf {
        self.certs_dir().join(format!("{slug}.pem"))
    }

    /// `certreqs/<slug>.pem`
    #[must_use]
    pub fn request_for(&self, slug: &str) -> PathBuf {
        self.requests_dir().join(format!("{slug}.pem"))
    }

    /// `private/<slug>.priv.pem`
    #[must_use]
    pub fn private_key_for(&self, slug: &str) -> PathBuf {
        self.private_dir().join(format!("{slug}.priv.pem"))
    }

    /// `private/<slug>.pub.pem`
    #[must_use]
    pub fn public_key_for(&self, slug: &str) -> PathBuf {
        self.private_dir().join(format!("{slug}.pub.pem"))
    }

    /// `newcerts/<serial>.pem`
    #[must_use]
    pub fn newcert(&self, serial: u64) -> PathBuf {
        self.newcerts_dir().join(format!("{serial}.pem"))
    }

    /// Layout of a child CA.
    #[must_use]
    pub fn child(&self, slug: &str) -> Self {
        Self::new(self.intermediates_dir().join(slug))
    }

    /// Creates the directory tree, an empty index, and a serial file of `1`.
    ///
    /// Existing directories and files are left untouched.
    pub fn setup(&self) -> Result<()> {
        for dir in [
            self.base.clone(),
            self.requests_dir(),
            self.certs_dir(),
            self.crl_dir(),
            self.newcerts_dir(),
            self.private_dir(),
            self.intermediates_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| Error::storage(&dir, e))?;
        }
        if write_new(&self.index_file(), b"")? {
            debug!(path = %self.index_file().display(), "created index file");
        }
        if write_new(&self.serial_file(), INITIAL_SERIAL.as_bytes())? {
            debug!(path = %self.serial_file().display(), "created serial file");
        }
        Ok(())
    }
}

/// Writes a file only if it does not exist yet.
///
/// The content is staged in a temporary file in the same directory and
/// linked into place, so readers never see a partial file. Returns `false`
/// when the target already existed.
pub fn write_new(path: &Path, contents: &[u8]) -> Result<bool> {
    let staged = stage(path, contents)?;
    match staged.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Error::storage(path, e.error)),
    }
}

/// Replaces a file atomically.
pub fn write_replace(path: &Path, contents: &[u8]) -> Result<()> {
    stage(path, contents)?
        .persist(path)
        .map_err(|e| Error::storage(path, e.error))?;
    Ok(())
}

fn stage(path: &Path, contents: &[u8]) -> Result<NamedTempFile> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::storage(path, io::Error::other("path has no parent directory")))?;
    let mut file = NamedTempFile::new_in(dir).map_err(|e| Error::storage(dir, e))?;
    file.write_all(contents)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| Error::storage(path, e))?;
    Ok(file)
}

/// Copies a file to a destination that must not exist yet.
pub fn copy_new(src: &Path, dst: &Path) -> Result<bool> {
    let contents = fs::read(src).map_err(|e| Error::storage(src, e))?;
    write_new(dst, &contents)
}

/// Reads a whole file as UTF-8.
pub fn read_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::storage(path, e))
}

/// Reads a whole file.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::storage(path, e))
}

/// Sorted names of the sub-directories of `dir`.
pub fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    list(dir, |entry| entry.is_dir(), |name| Some(name.to_string()))
}

/// Sorted stems of the files in `dir` ending in `suffix`.
pub fn list_files(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    list(
        dir,
        |entry| entry.is_file(),
        |name| name.strip_suffix(suffix).map(str::to_string),
    )
}

fn list(
    dir: &Path,
    keep: impl Fn(&Path) -> bool,
    name_of: impl Fn(&str) -> Option<String>,
) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::storage(dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::storage(dir, e))?;
        let path = entry.path();
        if !keep(&path) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str().and_then(&name_of) {
            if !name.starts_with('.') {
                names.push(name);
            }
        }
    }
    names.sort();
    Ok(names)
}
