//! # locksmith-cli
//!
//! Locksmith command-line interface.
//!
//! Provides commands for:
//! - Root and intermediate certificate authorities
//! - Certificate signing requests and issued certificates
//! - Revocation lists
//! - Key stores and key pairs
//!
//! Every command runs one [`locksmith_pki::Engine`] operation against the
//! PKI root and prints the resulting [`locksmith_pki::Response`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, SubjectArgs};
pub use error::CliError;
pub use output::OutputFormat;
