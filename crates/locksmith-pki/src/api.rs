//! Boundary responses.
//!
//! Each function runs one engine operation and folds the outcome into a
//! [`Response`]: a status tag, a success flag, the produced data, and a list
//! of human-readable messages. PEM artifacts may be base64-wrapped for JSON
//! transport with [`PemEncoding::Base64`].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::csr::CsrSource;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::types::CertificateConfiguration;

/// How PEM text is placed into response data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PemEncoding {
    /// PEM text as is.
    #[default]
    Pem,
    /// Base64 of the PEM text.
    Base64,
}

impl PemEncoding {
    fn apply(self, pem: String) -> String {
        match self {
            Self::Pem => pem,
            Self::Base64 => STANDARD.encode(pem),
        }
    }
}

/// Outcome of one boundary call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Stable status tag, e.g. `root-created` or `no-signing-ca-key`.
    pub status: String,
    /// True when the operation produced its artifact.
    pub success: bool,
    /// Produced data, or the identity of an existing artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable messages.
    pub messages: Vec<String>,
    /// Error descriptions, empty on success.
    pub errors: Vec<String>,
}

impl Response {
    /// A successful response carrying `data`.
    pub fn ok(status: &str, data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                status: status.to_string(),
                success: true,
                data: Some(data),
                messages: Vec::new(),
                errors: Vec::new(),
            },
            Err(e) => Self {
                status: "serialization-error".to_string(),
                success: false,
                data: None,
                messages: Vec::new(),
                errors: vec![e.to_string()],
            },
        }
    }

    /// A failed response for `error`.
    ///
    /// "Already exists" is reported with the existing artifact's identity in
    /// `data` and its description as a message, not as an error.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        let status = error.status().to_string();
        if let Error::AlreadyExists { artifact, slug } = error {
            return Self {
                status,
                success: false,
                data: Some(json!({ "artifact": artifact.to_string(), "slug": slug })),
                messages: error.messages(),
                errors: Vec::new(),
            };
        }
        Self {
            status,
            success: false,
            data: None,
            messages: error.messages(),
            errors: vec![error.to_string()],
        }
    }

    /// Folds an engine result into a response.
    pub fn from_result<T: Serialize>(status: &str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(status, data),
            Err(e) => {
                debug!(status = e.status(), error = %e, "operation failed");
                Self::from_error(&e)
            }
        }
    }
}

/// Creates a root CA.
pub fn create_root(engine: &Engine, request: &CertificateConfiguration) -> Response {
    Response::from_result("root-created", engine.create_root(request))
}

/// Creates an intermediate CA below `parent`.
pub fn create_intermediate(
    engine: &Engine,
    parent: &str,
    request: &CertificateConfiguration,
    parent_passphrase: &str,
) -> Response {
    Response::from_result(
        "intermed-ca-created",
        engine.create_intermediate(parent, request, parent_passphrase),
    )
}

/// Creates a request for a child certificate of the CA at `ca_path`.
pub fn create_csr(
    engine: &Engine,
    ca_path: &str,
    request: &CertificateConfiguration,
    is_ca: bool,
) -> Response {
    Response::from_result(
        "certificate-request-created",
        engine.create_csr(ca_path, request, is_ca),
    )
}

/// Issues a certificate from a request.
pub fn issue_certificate(
    engine: &Engine,
    ca_path: &str,
    passphrase: &str,
    source: &CsrSource,
) -> Response {
    Response::from_result(
        "certificate-issued",
        engine.issue_certificate(ca_path, passphrase, source),
    )
}

/// Reads the certificate of the CA at `ca_path`.
pub fn read_ca_certificate(engine: &Engine, ca_path: &str, encoding: PemEncoding) -> Response {
    let result = engine
        .read_ca_certificate(ca_path)
        .map(|pem| json!({ "certificate": encoding.apply(pem) }));
    Response::from_result("ok", result)
}

/// Reads the revocation list of the CA at `ca_path`.
pub fn read_crl(engine: &Engine, ca_path: &str, encoding: PemEncoding) -> Response {
    let result = engine
        .read_crl(ca_path)
        .map(|pem| json!({ "crl": encoding.apply(pem) }));
    Response::from_result("ok", result)
}
