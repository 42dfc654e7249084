//! PKCS#10 certificate signing requests.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rcgen::CertificateParams;
use serde::Serialize;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::FromDer;

use crate::der;
use crate::error::{Artifact, Error, Result};
use crate::keys::KeyPair;
use crate::layout;
use crate::types::{SanData, Subject};
use crate::x509::{self, distinguished_name, san_types};

/// PEM label of certificate signing requests.
pub const REQUEST_LABEL: &str = "CERTIFICATE REQUEST";

/// Where the CSR for an issuance comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsrSource {
    /// PEM text, optionally base64-wrapped.
    Pem(String),
    /// A request stored in a CA's `certreqs/`.
    Stored {
        /// Chain of the CA holding the request.
        ca_path: String,
        /// Reference of the form `certreqs/<id>`.
        target: String,
    },
}

impl CsrSource {
    /// Splits a `certreqs/<id>` target into its id.
    pub fn stored_id(target: &str) -> Result<&str> {
        match target.trim_matches('/').split_once('/') {
            Some(("certreqs", id)) if !id.is_empty() && !id.contains('/') => Ok(id),
            _ => Err(Error::InvalidPath("invalid-csr-target-type".into())),
        }
    }
}

/// Builds the request template.
///
/// A CA request carries a critical `CA:true, pathLen:0` Basic Constraints
/// extension request.
pub fn build(subject: &Subject, san: &SanData, is_ca: bool) -> Result<CertificateParams> {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(subject);
    params.subject_alt_names = san_types(san)?;
    if is_ca {
        params.custom_extensions.push(der::ca_basic_constraints());
    }
    Ok(params)
}

/// Signs the template with SHA-512-with-RSA and returns the DER request.
pub fn sign(params: &CertificateParams, key: &KeyPair) -> Result<Vec<u8>> {
    let request = params
        .serialize_request(&key.to_rcgen()?)
        .map_err(|e| Error::Signing(format!("failed to sign certificate request: {e}")))?;
    Ok(request.der().to_vec())
}

/// PEM encoding of a DER request.
#[must_use]
pub fn encode(der: &[u8]) -> String {
    x509::pem_encode(REQUEST_LABEL, der)
}

/// DER bytes of a PEM request.
pub fn decode(pem: &str) -> Result<Vec<u8>> {
    x509::pem_contents(pem, REQUEST_LABEL)
}

/// Accepts PEM text or the base64-wrapped PEM used for JSON transport.
pub fn unwrap_pem(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("-----BEGIN") {
        return Ok(trimmed.to_string());
    }
    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|e| Error::Parse(format!("request is neither PEM nor base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Parse(format!("request is not UTF-8: {e}")))
}

/// Builds, signs, and writes a request once.
///
/// Fails with [`Error::AlreadyExists`] when `path` already holds a request.
pub fn generate_and_persist(
    path: &Path,
    slug: &str,
    subject: &Subject,
    san: &SanData,
    is_ca: bool,
    key: &KeyPair,
) -> Result<String> {
    let pem = encode(&sign(&build(subject, san, is_ca)?, key)?);
    if !layout::write_new(path, pem.as_bytes())? {
        return Err(Error::AlreadyExists {
            artifact: Artifact::CertificateRequest,
            slug: slug.to_string(),
        });
    }
    Ok(pem)
}

/// Decoded content of a request whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestInfo {
    /// Requested subject.
    pub subject: Subject,
    /// Requested Subject Alternative Names.
    pub san: SanData,
    /// True when Basic Constraints `CA:true` is requested.
    pub is_ca: bool,
    /// DER `SubjectPublicKeyInfo` the request was signed with.
    #[serde(skip)]
    pub public_key_der: Vec<u8>,
}

impl RequestInfo {
    /// Parses a DER request and checks its self-signature.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, request) = X509CertificationRequest::from_der(der)
            .map_err(|e| Error::Parse(format!("invalid certificate request: {e}")))?;
        request
            .verify_signature()
            .map_err(|e| Error::Parse(format!("certificate request signature is invalid: {e}")))?;

        let mut san = SanData::default();
        let mut is_ca = false;
        if let Some(extensions) = request.requested_extensions() {
            for ext in extensions {
                match ext {
                    ParsedExtension::SubjectAlternativeName(names) => {
                        san = x509::san_from_general_names(&names.general_names);
                    }
                    ParsedExtension::BasicConstraints(bc) => is_ca = bc.ca,
                    _ => {}
                }
            }
        }
        Ok(Self {
            subject: x509::subject_from_name(&request.certification_request_info.subject)?,
            san,
            is_ca,
            public_key_der: request.certification_request_info.subject_pki.raw.to_vec(),
        })
    }

    /// Parses a PEM request and checks its self-signature.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_der(&decode(pem)?)
    }
}
