//! File-backed Certificate Authority engine for Locksmith.
#![forbid(unsafe_code)]
//!
//! Root and intermediate CAs live as directory trees below a PKI root, each
//! with its own key, certificate, serial counter, issuance ledger and
//! revocation list. Certificates are issued from PKCS#10 requests.
//!
//! # Example
//!
//! ```
//! use locksmith_pki::{CertificateConfiguration, CsrSource, Engine, EngineConfig, Subject};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let engine = Engine::new(EngineConfig {
//!     key_bits: 2048,
//!     ..EngineConfig::new(dir.path())
//! })?;
//!
//! let root = CertificateConfiguration {
//!     subject: Subject {
//!         organization: vec!["Example Org".into()],
//!         organizational_unit: vec!["Sec".into()],
//!         ..Subject::new("Example Root")
//!     },
//!     expiration_date: vec![10, 0, 0],
//!     ..Default::default()
//! };
//! let authority = engine.create_root(&root)?;
//! assert_eq!(authority.slug, "example-root");
//!
//! let server = CertificateConfiguration {
//!     subject: Subject {
//!         common_name: "www.example.test".into(),
//!         ..root.subject.clone()
//!     },
//!     expiration_date: vec![1, 0, 0],
//!     ..Default::default()
//! };
//! let request = engine.create_csr("Example Root", &server, false)?;
//! let issued = engine.issue_certificate("Example Root", "", &CsrSource::Pem(request.request_pem))?;
//! assert_eq!(issued.serial, 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`engine`] - The [`Engine`] wiring everything below together
//! - [`api`] - Status-tagged boundary responses
//! - [`authority`] - Root and intermediate CA bootstrap
//! - [`issuance`] - Certificates from requests
//! - [`crl`] - Revocation lists
//! - [`csr`] - Certificate signing requests
//! - [`keys`] / [`protect`] - RSA keys and passphrase protection
//! - [`keystore`] - Stand-alone key pairs
//! - [`layout`] / [`ledger`] - On-disk CA layout, serial counter and index
//! - [`path`] - Slugs and CA chain paths
//! - [`lock`] - Per-CA mutual exclusion
//! - [`error`] - Error types

pub mod api;
pub mod authority;
pub mod config;
pub mod crl;
pub mod csr;
pub mod der;
pub mod engine;
pub mod error;
pub mod issuance;
pub mod keys;
pub mod keystore;
pub mod layout;
pub mod ledger;
pub mod lock;
pub mod path;
pub mod protect;
pub mod types;
pub mod x509;

// Re-export commonly used types at crate root
pub use api::{PemEncoding, Response};
pub use authority::Authority;
pub use config::EngineConfig;
pub use csr::{CsrSource, RequestInfo};
pub use engine::{CreatedRequest, Engine, StoredCertificate, StoredRequest};
pub use error::{Artifact, Error, Prerequisite, Result};
pub use issuance::IssuedCertificate;
pub use keystore::StoredKeyPair;
pub use ledger::{EntryState, IndexEntry};
pub use path::{CaPath, slugify};
pub use types::{CertificateConfiguration, SanData, Subject, Validity};
pub use x509::CertificateInfo;
