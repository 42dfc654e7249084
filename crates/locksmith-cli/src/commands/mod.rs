//! CLI command implementations.
//!
//! Each submodule implements one command group against an [`Engine`]:
//! - [`root`] - Root CAs
//! - [`intermediate`] - Intermediate CAs
//! - [`csr`] - Certificate signing requests
//! - [`cert`] - Issued certificates and the issuance ledger
//! - [`crl`] - Revocation lists
//! - [`keystore`] - Key stores
//! - [`key`] - Key pairs
//!
//! [`Engine`]: locksmith_pki::Engine

pub mod cert;
pub mod crl;
pub mod csr;
pub mod intermediate;
pub mod key;
pub mod keystore;
pub mod root;

pub use cert::CertCommand;
pub use crl::CrlCommand;
pub use csr::CsrCommand;
pub use intermediate::IntermediateCommand;
pub use key::KeyCommand;
pub use keystore::KeystoreCommand;
pub use root::RootCommand;
