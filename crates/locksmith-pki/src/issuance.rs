//! Leaf certificate issuance from certificate signing requests.

use chrono::Utc;
use rcgen::{
    CertificateParams, ExtendedKeyUsagePurpose, IsCa, KeyUsagePurpose, SerialNumber,
    SubjectPublicKeyInfo,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::authority::{SigningAuthority, check_prerequisites};
use crate::config::EngineConfig;
use crate::csr::RequestInfo;
use crate::error::{Artifact, Error, Result};
use crate::layout::{self, CaLayout};
use crate::ledger::{self, IndexEntry};
use crate::path::{CaPath, slugify};
use crate::types::Subject;
use crate::x509::{distinguished_name, san_types, to_rcgen_time};

/// A certificate issued from a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedCertificate {
    /// Slug of the certificate inside the signing CA's `certs/`.
    pub slug: String,
    /// Serial number assigned by the signing CA.
    pub serial: u64,
    /// Subject copied from the request.
    pub subject: Subject,
    /// PEM of the issued certificate.
    pub certificate_pem: String,
}

/// Signs `request_pem` with the CA at `signing`.
///
/// The certificate is a server certificate valid for the configured leaf
/// offset. Only the subject, SAN and public key are taken from the request;
/// other requested extensions are ignored. Nothing is mutated unless the certificate is written: a failed
/// check or signature leaves the serial counter and ledger untouched.
pub fn issue(
    config: &EngineConfig,
    signing: &CaPath,
    passphrase: &str,
    request_pem: &str,
) -> Result<IssuedCertificate> {
    let ca = CaLayout::new(signing.directory(&config.pki_root));
    if !ca.exists() {
        return Err(Error::InvalidPath(format!("no CA chain exists at '{signing}'")));
    }
    check_prerequisites(&ca)?;

    let requested = RequestInfo::from_pem(request_pem)?;
    if requested.is_ca {
        return Err(Error::Signing(
            "request asks for CA constraints, create an intermediate CA instead".into(),
        ));
    }
    let slug = slugify(&requested.subject.common_name);
    if slug.is_empty() {
        return Err(Error::Parse("certificate request has no common name".into()));
    }
    let certificate_path = ca.certificate_for(&slug);
    if certificate_path.is_file() {
        return Err(Error::AlreadyExists {
            artifact: Artifact::Certificate,
            slug,
        });
    }

    let signer = SigningAuthority::load(ca, passphrase)?;
    let serial = ledger::read_serial(&signer.layout.serial_file())?;
    let (not_before, not_after) = config.leaf_validity.window(Utc::now())?;

    let public_key = SubjectPublicKeyInfo::from_der(&requested.public_key_der)
        .map_err(|e| Error::Parse(format!("unsupported request public key: {e}")))?;
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(&requested.subject);
    params.subject_alt_names = san_types(&requested.san)?;
    params.serial_number = Some(SerialNumber::from(serial));
    params.not_before = to_rcgen_time(not_before)?;
    params.not_after = to_rcgen_time(not_after)?;
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params.use_authority_key_identifier_extension = true;

    let (issuer_certificate, issuer_key) = signer.rcgen_issuer()?;
    let certificate = params
        .signed_by(&public_key, &issuer_certificate, &issuer_key)
        .map_err(|e| Error::Signing(format!("failed to sign certificate: {e}")))?;
    let pem = certificate.pem();

    if !layout::write_new(&certificate_path, pem.as_bytes())? {
        return Err(Error::AlreadyExists {
            artifact: Artifact::Certificate,
            slug,
        });
    }
    let newcert = signer.layout.newcert(serial);
    if !layout::write_new(&newcert, pem.as_bytes())? {
        warn!(path = %newcert.display(), "serial copy already present, keeping it");
    }
    ledger::increment_serial(&signer.layout.serial_file())?;
    ledger::append(
        &signer.layout.index_file(),
        &IndexEntry::issued(serial, not_after, &certificate_path, requested.subject.compiled()),
    )?;

    info!(%slug, ca = %signing, serial, "issued certificate");
    Ok(IssuedCertificate {
        slug,
        serial,
        subject: requested.subject,
        certificate_pem: pem,
    })
}
