//! Key stores: named directories of stand-alone RSA key pairs.
//!
//! ```text
//! <pki_root>/keystores/<store>/<key>/rsa.pub.pem
//! <pki_root>/keystores/<store>/<key>/rsa.priv.pem   (optional)
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::error::{Artifact, Error, Result};
use crate::keys::{self, KeyPair};
use crate::layout;
use crate::path::slugify;
use crate::protect;

/// File name of a stored public key.
pub const PUBLIC_KEY_FILE: &str = "rsa.pub.pem";

/// File name of a stored private key.
pub const PRIVATE_KEY_FILE: &str = "rsa.priv.pem";

/// A key pair handed back to the caller.
#[derive(Clone)]
pub struct StoredKeyPair {
    /// Slug of the key inside its store.
    pub id: String,
    /// SPKI PEM of the public key.
    pub public_key_pem: String,
    /// PKCS#8 PEM of the private key, when one is available.
    pub private_key_pem: Option<Zeroizing<String>>,
}

impl fmt::Debug for StoredKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredKeyPair")
            .field("id", &self.id)
            .field("public_key_pem", &self.public_key_pem)
            .field(
                "private_key_pem",
                &self.private_key_pem.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn slug_of(name: &str, artifact: Artifact) -> Result<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        let field = match artifact {
            Artifact::KeyStore => "key store",
            _ => "key pair",
        };
        return Err(Error::InvalidPath(format!("empty {field} name '{name}'")));
    }
    Ok(slug)
}

fn store_dir(keystores: &Path, store: &str) -> Result<(String, PathBuf)> {
    let slug = slug_of(store, Artifact::KeyStore)?;
    let dir = keystores.join(&slug);
    if !dir.is_dir() {
        return Err(Error::NotFound {
            artifact: Artifact::KeyStore,
            slug,
        });
    }
    Ok((slug, dir))
}

/// Creates a key store, failing if it already exists.
pub fn create_store(keystores: &Path, name: &str) -> Result<String> {
    let slug = slug_of(name, Artifact::KeyStore)?;
    fs::create_dir_all(keystores).map_err(|e| Error::storage(keystores, e))?;
    let dir = keystores.join(&slug);
    match fs::create_dir(&dir) {
        Ok(()) => {
            info!(store = %slug, "created key store");
            Ok(slug)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::AlreadyExists {
            artifact: Artifact::KeyStore,
            slug,
        }),
        Err(e) => Err(Error::storage(&dir, e)),
    }
}

/// Creates a key store unless it is already there.
pub fn ensure_store(keystores: &Path, name: &str) -> Result<String> {
    match create_store(keystores, name) {
        Err(Error::AlreadyExists { slug, .. }) => Ok(slug),
        other => other,
    }
}

/// Slugs of every key store.
pub fn list_stores(keystores: &Path) -> Result<Vec<String>> {
    layout::list_dirs(keystores)
}

/// Generates a key pair in `store`.
///
/// The public key is always written. The private key is written only when
/// `store_private_key` is set, protected with `passphrase` when non-empty.
/// Both PEMs are returned either way.
pub fn create_key_pair(
    keystores: &Path,
    store: &str,
    id: &str,
    passphrase: &str,
    store_private_key: bool,
    bits: usize,
) -> Result<StoredKeyPair> {
    let (store_slug, dir) = store_dir(keystores, store)?;
    let key_slug = slug_of(id, Artifact::KeyPair)?;
    let key_dir = dir.join(&key_slug);
    match fs::create_dir(&key_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(Error::AlreadyExists {
                artifact: Artifact::KeyPair,
                slug: key_slug,
            });
        }
        Err(e) => return Err(Error::storage(&key_dir, e)),
    }

    let written = generate_into(&key_dir, passphrase, store_private_key, bits);
    let (public_key_pem, private_key_pem) = match written {
        Ok(pems) => pems,
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&key_dir) {
                warn!(
                    path = %key_dir.display(),
                    error = %cleanup,
                    "failed to remove partial key pair"
                );
            }
            return Err(e);
        }
    };

    info!(store = %store_slug, key = %key_slug, store_private_key, "created key pair");
    Ok(StoredKeyPair {
        id: key_slug,
        public_key_pem,
        private_key_pem: Some(private_key_pem),
    })
}

fn generate_into(
    key_dir: &Path,
    passphrase: &str,
    store_private_key: bool,
    bits: usize,
) -> Result<(String, Zeroizing<String>)> {
    let key = KeyPair::generate(bits)?;
    let public_key_pem = key.public_key_pem()?;
    let private_key_pem = key.private_key_pem()?;
    if store_private_key {
        keys::write_key_files(
            &key,
            &key_dir.join(PRIVATE_KEY_FILE),
            &key_dir.join(PUBLIC_KEY_FILE),
            passphrase,
        )?;
    } else {
        layout::write_new(&key_dir.join(PUBLIC_KEY_FILE), public_key_pem.as_bytes())?;
    }
    Ok((public_key_pem, private_key_pem))
}

/// Slugs of the key pairs in `store`.
pub fn list_key_pairs(keystores: &Path, store: &str) -> Result<Vec<String>> {
    let (_, dir) = store_dir(keystores, store)?;
    layout::list_dirs(&dir)
}

/// Reads a stored key pair, decrypting the private key when present.
pub fn read_key_pair(
    keystores: &Path,
    store: &str,
    id: &str,
    passphrase: &str,
) -> Result<StoredKeyPair> {
    let (_, dir) = store_dir(keystores, store)?;
    let key_slug = slug_of(id, Artifact::KeyPair)?;
    let key_dir = dir.join(&key_slug);
    let public_path = key_dir.join(PUBLIC_KEY_FILE);
    if !public_path.is_file() {
        return Err(Error::NotFound {
            artifact: Artifact::KeyPair,
            slug: key_slug,
        });
    }
    let public_key_pem = layout::read_string(&public_path)?;

    let private_path = key_dir.join(PRIVATE_KEY_FILE);
    let private_key_pem = if private_path.is_file() {
        let stored = Zeroizing::new(layout::read_bytes(&private_path)?);
        Some(protect::unprotect(&stored, passphrase)?)
    } else {
        None
    };

    Ok(StoredKeyPair {
        id: key_slug,
        public_key_pem,
        private_key_pem,
    })
}
