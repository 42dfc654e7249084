//! PKI engine error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for PKI engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Kinds of on-disk artifact an error can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// A root certificate authority.
    RootAuthority,
    /// An intermediate certificate authority.
    IntermediateAuthority,
    /// An issued certificate.
    Certificate,
    /// A certificate signing request.
    CertificateRequest,
    /// A certificate revocation list.
    RevocationList,
    /// A key pair inside a key store.
    KeyPair,
    /// A key store.
    KeyStore,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RootAuthority => "root CA",
            Self::IntermediateAuthority => "intermediate CA",
            Self::Certificate => "certificate",
            Self::CertificateRequest => "certificate request",
            Self::RevocationList => "CRL",
            Self::KeyPair => "key pair",
            Self::KeyStore => "key store",
        };
        f.write_str(name)
    }
}

/// Signing-CA artifacts that must exist before anything can be signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    /// `certs/ca.pem`
    Certificate,
    /// `private/ca.priv.pem`
    PrivateKey,
    /// `ca.serial`
    SerialFile,
    /// `ca.index`
    IndexFile,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Certificate => "certificate",
            Self::PrivateKey => "private key",
            Self::SerialFile => "serial file",
            Self::IndexFile => "index file",
        };
        f.write_str(name)
    }
}

/// PKI engine error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// The certificate configuration is missing required fields.
    #[error("invalid certificate configuration: {}", .0.join(", "))]
    Configuration(Vec<String>),

    /// The engine configuration is invalid.
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// No CA path was supplied.
    #[error("missing CA path")]
    MissingPath,

    /// The CA path does not name an existing chain, or is malformed.
    #[error("invalid CA path: {0}")]
    InvalidPath(String),

    /// The signing CA lacks a required artifact.
    #[error("signing CA {0} does not exist")]
    MissingPrerequisite(Prerequisite),

    /// The target artifact already exists.
    #[error("{artifact} '{slug}' already exists")]
    AlreadyExists {
        /// What kind of artifact collided.
        artifact: Artifact,
        /// Slug of the existing artifact.
        slug: String,
    },

    /// The requested artifact does not exist.
    #[error("{artifact} '{slug}' not found")]
    NotFound {
        /// What kind of artifact was looked up.
        artifact: Artifact,
        /// Slug that was looked up.
        slug: String,
    },

    /// RSA key generation failed.
    #[error("key pair generation failed: {0}")]
    KeyGeneration(String),

    /// A protected private key could not be opened.
    #[error("private key decryption failed: {0}")]
    Decryption(String),

    /// PEM, DER, or key material could not be decoded.
    #[error("parsing failed: {0}")]
    Parse(String),

    /// Building or signing a certificate, CSR, or CRL failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Filesystem read or write failure.
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wraps an IO error with the path it happened on.
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Stable status tag reported at the API boundary.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "cert-config-error",
            Self::Config(_) => "engine-config-error",
            Self::MissingPath => "missing-parent-path",
            Self::InvalidPath(_) => "invalid-parent-path",
            Self::MissingPrerequisite(p) => match p {
                Prerequisite::Certificate => "no-signing-ca-certificate",
                Prerequisite::PrivateKey => "no-signing-ca-key",
                Prerequisite::SerialFile => "no-signing-ca-serial-file",
                Prerequisite::IndexFile => "no-signing-ca-index-db",
            },
            Self::AlreadyExists { artifact, .. } => match artifact {
                Artifact::RootAuthority => "root-exists",
                Artifact::IntermediateAuthority => "intermed-ca-exists",
                Artifact::Certificate => "certificate-exists",
                Artifact::CertificateRequest => "certificate-request-exists",
                Artifact::RevocationList => "crl-exists",
                Artifact::KeyPair => "key-pair-exists",
                Artifact::KeyStore => "key-store-exists",
            },
            Self::NotFound { artifact, .. } => match artifact {
                Artifact::RootAuthority | Artifact::IntermediateAuthority => "invalid-parent-path",
                Artifact::Certificate => "no-certificate",
                Artifact::CertificateRequest => "invalid-csr-target",
                Artifact::RevocationList => "no-ca-crl",
                Artifact::KeyPair => "invalid-key-pair-id",
                Artifact::KeyStore => "invalid-key-store",
            },
            Self::KeyGeneration(_) => "key-pair-generation-error",
            Self::Decryption(_) => "private-key-decryption-error",
            Self::Parse(_) => "parse-error",
            Self::Signing(_) => "signing-error",
            Self::Storage { .. } => "storage-error",
        }
    }

    /// Human-readable messages for the boundary.
    ///
    /// Configuration errors report every missing field separately.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Configuration(missing) => missing.clone(),
            other => vec![other.to_string()],
        }
    }

    /// Returns true for the "already exists" outcome.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_lists_every_field() {
        let err = Error::Configuration(vec![
            "Missing common name field".into(),
            "Missing Organization field".into(),
        ]);
        assert_eq!(err.status(), "cert-config-error");
        assert_eq!(err.messages().len(), 2);
        assert!(err.to_string().contains("Missing Organization field"));
    }

    #[test]
    fn prerequisite_statuses_are_distinct() {
        let tags: Vec<_> = [
            Prerequisite::Certificate,
            Prerequisite::PrivateKey,
            Prerequisite::SerialFile,
            Prerequisite::IndexFile,
        ]
        .into_iter()
        .map(|p| Error::MissingPrerequisite(p).status())
        .collect();
        assert_eq!(
            tags,
            [
                "no-signing-ca-certificate",
                "no-signing-ca-key",
                "no-signing-ca-serial-file",
                "no-signing-ca-index-db"
            ]
        );
    }

    #[test]
    fn already_exists_names_the_slug() {
        let err = Error::AlreadyExists {
            artifact: Artifact::Certificate,
            slug: "www-example-com".into(),
        };
        assert!(err.is_already_exists());
        assert_eq!(err.status(), "certificate-exists");
        assert_eq!(err.to_string(), "certificate 'www-example-com' already exists");
    }

    #[test]
    fn storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::storage("/tmp/ca.serial", io);
        assert_eq!(err.status(), "storage-error");
        assert!(std::error::Error::source(&err).is_some());
    }
}
