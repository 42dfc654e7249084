//! The engine: one PKI root, its settings, and the per-CA lock scopes.
//!
//! Every mutating operation takes the scope of each CA directory it writes
//! before its first existence check and holds it until the last write.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::authority::{self, Authority, SigningAuthority};
use crate::config::EngineConfig;
use crate::crl;
use crate::csr::{self, CsrSource, RequestInfo};
use crate::error::{Artifact, Error, Prerequisite, Result};
use crate::issuance::{self, IssuedCertificate};
use crate::keys;
use crate::keystore::{self, StoredKeyPair};
use crate::layout::{self, CA_STEM, CaLayout};
use crate::ledger::{self, IndexEntry};
use crate::lock::LockRegistry;
use crate::path::{CaPath, slugify};
use crate::types::CertificateConfiguration;
use crate::x509::CertificateInfo;

const PEM_SUFFIX: &str = ".pem";

/// A request created for a child certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedRequest {
    /// Slug of the request inside the CA's `certreqs/`.
    pub slug: String,
    /// PEM of the request.
    pub request_pem: String,
}

/// A certificate read back from a CA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredCertificate {
    /// Slug of the certificate.
    pub slug: String,
    /// PEM text.
    pub certificate_pem: String,
    /// Parsed summary.
    pub info: CertificateInfo,
}

/// A request read back from a CA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRequest {
    /// Slug of the request.
    pub slug: String,
    /// PEM text.
    pub request_pem: String,
    /// Parsed content.
    pub info: RequestInfo,
}

/// File-backed certificate authority engine.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    locks: LockRegistry,
}

impl Engine {
    /// Validates `config` and prepares the PKI root.
    ///
    /// Creates `roots/`, `keystores/` and the default key store when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the directories
    /// cannot be created.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let roots = config.roots_dir();
        std::fs::create_dir_all(&roots).map_err(|e| Error::storage(&roots, e))?;
        keystore::ensure_store(&config.keystores_dir(), &config.default_key_store)?;
        info!(pki_root = %config.pki_root.display(), "engine ready");
        Ok(Self {
            config,
            locks: LockRegistry::new(),
        })
    }

    /// The settings this engine runs with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves a chain to an existing CA.
    fn locate(&self, chain: &str) -> Result<(CaPath, CaLayout)> {
        let path = CaPath::parse(chain)?;
        let ca = CaLayout::new(path.directory(&self.config.pki_root));
        if !ca.exists() {
            return Err(Error::InvalidPath(format!("no CA chain exists at '{path}'")));
        }
        Ok((path, ca))
    }

    fn store<'a>(&'a self, store: Option<&'a str>) -> &'a str {
        store.unwrap_or(self.config.default_key_store.as_str())
    }

    fn store_scope(&self, store: &str) -> PathBuf {
        self.config.keystores_dir().join(slugify(store))
    }

    // --- Certificate authorities ---

    /// Creates a self-signed root CA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an incomplete request and
    /// [`Error::AlreadyExists`] when the root is already there.
    pub fn create_root(&self, request: &CertificateConfiguration) -> Result<Authority> {
        let scope = CaPath::root(slugify(&request.subject.common_name))
            .directory(&self.config.pki_root);
        let _guard = self.locks.lock(&scope);
        authority::create_root(&self.config, request)
    }

    /// Creates an intermediate CA below the CA named by `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for an unknown parent and
    /// [`Error::MissingPrerequisite`] when the parent cannot sign.
    pub fn create_intermediate(
        &self,
        parent: &str,
        request: &CertificateConfiguration,
        parent_passphrase: &str,
    ) -> Result<Authority> {
        let parent = CaPath::parse(parent)?;
        let parent_dir = parent.directory(&self.config.pki_root);
        let child_dir = parent
            .child(slugify(&request.subject.common_name))
            .directory(&self.config.pki_root);
        let _guards = self.locks.lock_all(&[parent_dir.as_path(), child_dir.as_path()]);
        authority::create_intermediate(&self.config, &parent, request, parent_passphrase)
    }

    /// Generates a key pair and a request for a child certificate of a CA.
    ///
    /// The key lands in the CA's `private/<slug>.priv.pem`, protected with the
    /// request's passphrase, and the request in `certreqs/<slug>.pem`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] when the request exists and
    /// [`Error::InvalidPath`] for the reserved slug `ca`.
    pub fn create_csr(
        &self,
        ca_path: &str,
        request: &CertificateConfiguration,
        is_ca: bool,
    ) -> Result<CreatedRequest> {
        let (path, ca) = self.locate(ca_path)?;
        request.validate()?;
        let slug = slugify(&request.subject.common_name);
        if slug == CA_STEM {
            return Err(Error::InvalidPath(format!(
                "'{CA_STEM}' is reserved for the CA's own request"
            )));
        }

        let _guard = self.locks.lock(ca.base());
        let request_path = ca.request_for(&slug);
        if request_path.is_file() {
            return Err(Error::AlreadyExists {
                artifact: Artifact::CertificateRequest,
                slug,
            });
        }
        let key = keys::load_or_generate(
            &ca.private_key_for(&slug),
            &ca.public_key_for(&slug),
            self.config.key_bits,
            &request.rsa_private_key_passphrase,
        )?;
        let request_pem = csr::generate_and_persist(
            &request_path,
            &slug,
            &request.subject,
            &request.san_data,
            is_ca,
            &key,
        )?;
        info!(%slug, ca = %path, is_ca, "created certificate request");
        Ok(CreatedRequest { slug, request_pem })
    }

    /// Signs a request with the CA named by `ca_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPrerequisite`] when the CA cannot sign,
    /// [`Error::NotFound`] for a missing stored request, and
    /// [`Error::AlreadyExists`] when the certificate was issued before.
    pub fn issue_certificate(
        &self,
        ca_path: &str,
        passphrase: &str,
        source: &CsrSource,
    ) -> Result<IssuedCertificate> {
        let signing = CaPath::parse(ca_path)?;
        let request_pem = match source {
            CsrSource::Pem(text) => csr::unwrap_pem(text)?,
            CsrSource::Stored { ca_path, target } => {
                let id = slugify(CsrSource::stored_id(target)?);
                let (_, holder) = self.locate(ca_path)?;
                let path = holder.request_for(&id);
                if !path.is_file() {
                    return Err(Error::NotFound {
                        artifact: Artifact::CertificateRequest,
                        slug: id,
                    });
                }
                debug!(path = %path.display(), "using stored certificate request");
                layout::read_string(&path)?
            }
        };
        let _guard = self.locks.lock(&signing.directory(&self.config.pki_root));
        issuance::issue(&self.config, &signing, passphrase, &request_pem)
    }

    /// Rebuilds the CA's revocation list and returns its PEM.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decryption`] when `passphrase` does not open the key.
    pub fn renew_crl(&self, ca_path: &str, passphrase: &str) -> Result<String> {
        let (_, ca) = self.locate(ca_path)?;
        let _guard = self.locks.lock(ca.base());
        let signer = SigningAuthority::load(ca, passphrase)?;
        crl::issue(&signer.layout, &signer.key, self.config.crl_next_update)
    }

    /// PEM of the CA's own certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for an unknown CA.
    pub fn read_ca_certificate(&self, ca_path: &str) -> Result<String> {
        let (path, ca) = self.locate(ca_path)?;
        let file = ca.certificate();
        if !file.is_file() {
            return Err(Error::NotFound {
                artifact: Artifact::Certificate,
                slug: path.slug().to_string(),
            });
        }
        layout::read_string(&file)
    }

    /// PEM of the CA's revocation list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the CA has no list.
    pub fn read_crl(&self, ca_path: &str) -> Result<String> {
        let (path, ca) = self.locate(ca_path)?;
        let file = ca.crl();
        if !file.is_file() {
            return Err(Error::NotFound {
                artifact: Artifact::RevocationList,
                slug: path.slug().to_string(),
            });
        }
        layout::read_string(&file)
    }

    /// Slugs of every root CA.
    pub fn list_roots(&self) -> Result<Vec<String>> {
        layout::list_dirs(&self.config.roots_dir())
    }

    /// Slugs of the CA's direct children.
    pub fn list_intermediates(&self, ca_path: &str) -> Result<Vec<String>> {
        let (_, ca) = self.locate(ca_path)?;
        layout::list_dirs(&ca.intermediates_dir())
    }

    /// Slugs of the certificates the CA holds, without its own.
    pub fn list_certificates(&self, ca_path: &str) -> Result<Vec<String>> {
        let (_, ca) = self.locate(ca_path)?;
        Ok(without_own(layout::list_files(&ca.certs_dir(), PEM_SUFFIX)?))
    }

    /// Slugs of the requests the CA holds, without its own.
    pub fn list_requests(&self, ca_path: &str) -> Result<Vec<String>> {
        let (_, ca) = self.locate(ca_path)?;
        Ok(without_own(layout::list_files(&ca.requests_dir(), PEM_SUFFIX)?))
    }

    /// Reads a certificate held by the CA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when there is no such certificate.
    pub fn read_certificate(&self, ca_path: &str, id: &str) -> Result<StoredCertificate> {
        let (_, ca) = self.locate(ca_path)?;
        let slug = slugify(id);
        let file = ca.certificate_for(&slug);
        if slug.is_empty() || !file.is_file() {
            return Err(Error::NotFound {
                artifact: Artifact::Certificate,
                slug,
            });
        }
        let certificate_pem = layout::read_string(&file)?;
        let info = CertificateInfo::from_pem(&certificate_pem)?;
        Ok(StoredCertificate {
            slug,
            certificate_pem,
            info,
        })
    }

    /// Reads a request held by the CA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when there is no such request.
    pub fn read_request(&self, ca_path: &str, id: &str) -> Result<StoredRequest> {
        let (_, ca) = self.locate(ca_path)?;
        let slug = slugify(id);
        let file = ca.request_for(&slug);
        if slug.is_empty() || !file.is_file() {
            return Err(Error::NotFound {
                artifact: Artifact::CertificateRequest,
                slug,
            });
        }
        let request_pem = layout::read_string(&file)?;
        let info = RequestInfo::from_pem(&request_pem)?;
        Ok(StoredRequest {
            slug,
            request_pem,
            info,
        })
    }

    /// Parsed rows of the CA's ledger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPrerequisite`] when the CA has no index.
    pub fn ledger_entries(&self, ca_path: &str) -> Result<Vec<IndexEntry>> {
        let (_, ca) = self.locate(ca_path)?;
        let index = ca.index_file();
        if !index.is_file() {
            return Err(Error::MissingPrerequisite(Prerequisite::IndexFile));
        }
        ledger::entries(&index)
    }

    // --- Key stores ---

    /// Creates a key store.
    pub fn create_key_store(&self, name: &str) -> Result<String> {
        let _guard = self.locks.lock(&self.store_scope(name));
        keystore::create_store(&self.config.keystores_dir(), name)
    }

    /// Slugs of every key store.
    pub fn list_key_stores(&self) -> Result<Vec<String>> {
        keystore::list_stores(&self.config.keystores_dir())
    }

    /// Generates a key pair in `store`, or the default store.
    pub fn create_key_pair(
        &self,
        store: Option<&str>,
        id: &str,
        passphrase: &str,
        store_private_key: bool,
    ) -> Result<StoredKeyPair> {
        let store = self.store(store);
        let _guard = self.locks.lock(&self.store_scope(store));
        keystore::create_key_pair(
            &self.config.keystores_dir(),
            store,
            id,
            passphrase,
            store_private_key,
            self.config.key_bits,
        )
    }

    /// Slugs of the key pairs in `store`, or the default store.
    pub fn list_key_pairs(&self, store: Option<&str>) -> Result<Vec<String>> {
        keystore::list_key_pairs(&self.config.keystores_dir(), self.store(store))
    }

    /// Reads a key pair from `store`, or the default store.
    pub fn read_key_pair(
        &self,
        store: Option<&str>,
        id: &str,
        passphrase: &str,
    ) -> Result<StoredKeyPair> {
        keystore::read_key_pair(&self.config.keystores_dir(), self.store(store), id, passphrase)
    }
}

fn without_own(mut names: Vec<String>) -> Vec<String> {
    names.retain(|name| name != CA_STEM);
    names
}
