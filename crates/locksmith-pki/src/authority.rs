//! CA bootstrap: self-signed roots and parent-signed intermediates.
//!
//! Every step checks for its own artifact first, so a partially created CA
//! is resumed instead of rebuilt. Callers hold the scope of every CA touched.

use std::path::Path;

use chrono::{DateTime, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, IsCa, KeyIdMethod, KeyUsagePurpose, SerialNumber,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::crl;
use crate::csr::{self, RequestInfo};
use crate::der;
use crate::error::{Artifact, Error, Prerequisite, Result};
use crate::keys::{self, KeyPair};
use crate::layout::{self, CaLayout};
use crate::ledger::{self, IndexEntry};
use crate::path::{CaPath, slugify};
use crate::types::{CertificateConfiguration, SanData, Subject};
use crate::x509::{distinguished_name, san_types, to_rcgen_time};

/// A CA produced by bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authority {
    /// Slug chain from the root, e.g. `example-root/example-ica`.
    pub path: String,
    /// Slug of the CA itself.
    pub slug: String,
    /// Serial number of the CA certificate.
    pub serial: u64,
    /// PEM of the CA certificate.
    pub certificate_pem: String,
}

/// Fails with the first signing artifact missing from `layout`.
///
/// Checked in order: certificate, private key, serial file, index file.
pub(crate) fn check_prerequisites(layout: &CaLayout) -> Result<()> {
    let required = [
        (layout.certificate(), Prerequisite::Certificate),
        (layout.private_key(), Prerequisite::PrivateKey),
        (layout.serial_file(), Prerequisite::SerialFile),
        (layout.index_file(), Prerequisite::IndexFile),
    ];
    for (path, prerequisite) in required {
        if !path.is_file() {
            debug!(path = %path.display(), %prerequisite, "signing CA prerequisite missing");
            return Err(Error::MissingPrerequisite(prerequisite));
        }
    }
    Ok(())
}

/// A CA loaded for signing: certificate, decrypted key, and layout.
pub(crate) struct SigningAuthority {
    pub(crate) layout: CaLayout,
    pub(crate) key: KeyPair,
    certificate_pem: String,
}

impl SigningAuthority {
    /// Checks prerequisites and opens the CA key with `passphrase`.
    pub(crate) fn load(layout: CaLayout, passphrase: &str) -> Result<Self> {
        check_prerequisites(&layout)?;
        let certificate_pem = layout::read_string(&layout.certificate())?;
        let key = keys::read_private_key(&layout.private_key(), passphrase)?;
        Ok(Self {
            layout,
            key,
            certificate_pem,
        })
    }

    /// The CA certificate and key in the form rcgen signs with.
    ///
    /// The key identifier is pinned to the SHA-1 key id so issued
    /// certificates carry a matching Authority Key Identifier.
    pub(crate) fn rcgen_issuer(&self) -> Result<(rcgen::Certificate, rcgen::KeyPair)> {
        let key_pair = self.key.to_rcgen()?;
        let mut params = CertificateParams::from_ca_cert_pem(&self.certificate_pem)
            .map_err(|e| Error::Parse(format!("unusable CA certificate: {e}")))?;
        params.key_identifier_method = KeyIdMethod::PreSpecified(self.key.key_id()?);
        let certificate = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Signing(format!("failed to load CA certificate: {e}")))?;
        Ok((certificate, key_pair))
    }
}

/// Slug of a CA named by its subject.
fn authority_slug(subject: &Subject) -> Result<String> {
    let slug = slugify(&subject.common_name);
    if slug.is_empty() {
        return Err(Error::Configuration(vec!["Invalid common name field".into()]));
    }
    Ok(slug)
}

/// Template shared by root and intermediate certificates.
fn authority_params(
    subject: &Subject,
    san: &SanData,
    window: (DateTime<Utc>, DateTime<Utc>),
    serial: u64,
    key: &KeyPair,
) -> Result<CertificateParams> {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(subject);
    params.subject_alt_names = san_types(san)?;
    params.serial_number = Some(SerialNumber::from(serial));
    params.not_before = to_rcgen_time(window.0)?;
    params.not_after = to_rcgen_time(window.1)?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.key_identifier_method = KeyIdMethod::PreSpecified(key.key_id()?);
    Ok(params)
}

/// Returns the CA's own request, building it on first use.
fn ensure_self_request(
    layout: &CaLayout,
    slug: &str,
    request: &CertificateConfiguration,
    key: &KeyPair,
) -> Result<String> {
    let path = layout.request();
    if path.is_file() {
        debug!(%slug, "reusing existing CA certificate request");
        return layout::read_string(&path);
    }
    csr::generate_and_persist(&path, slug, &request.subject, &request.san_data, true, key)
}

fn write_once(path: &Path, pem: &str, artifact: Artifact, slug: &str) -> Result<()> {
    if layout::write_new(path, pem.as_bytes())? {
        Ok(())
    } else {
        Err(Error::AlreadyExists {
            artifact,
            slug: slug.to_string(),
        })
    }
}

fn copy_into_parent(src: &Path, dst: &Path) -> Result<()> {
    if !layout::copy_new(src, dst)? {
        warn!(path = %dst.display(), "parent already holds this artifact, keeping it");
    }
    Ok(())
}

/// Creates a self-signed root CA under `<pki_root>/roots/<slug>`.
pub fn create_root(config: &EngineConfig, request: &CertificateConfiguration) -> Result<Authority> {
    let validity = request.validate()?;
    let slug = authority_slug(&request.subject)?;
    let path = CaPath::root(slug.clone());
    let ca = CaLayout::new(path.directory(&config.pki_root));

    if ca.certificate().is_file() {
        return Err(Error::AlreadyExists {
            artifact: Artifact::RootAuthority,
            slug,
        });
    }

    ca.setup()?;
    let key = keys::load_or_generate(
        &ca.private_key(),
        &ca.public_key(),
        config.key_bits,
        &request.rsa_private_key_passphrase,
    )?;
    ensure_self_request(&ca, &slug, request, &key)?;

    let serial = ledger::read_serial(&ca.serial_file())?;
    let window = validity.window(Utc::now())?;
    let key_id = key.key_id()?;
    let mut params = authority_params(&request.subject, &request.san_data, window, serial, &key)?;
    params
        .custom_extensions
        .push(der::authority_key_identifier_extension(&key_id));
    if !request.san_data.is_empty() {
        params
            .custom_extensions
            .push(der::issuer_alt_name(&request.san_data));
    }

    let certificate = params
        .self_signed(&key.to_rcgen()?)
        .map_err(|e| Error::Signing(format!("failed to self-sign root certificate: {e}")))?;
    let pem = certificate.pem();
    write_once(&ca.certificate(), &pem, Artifact::RootAuthority, &slug)?;
    ledger::increment_serial(&ca.serial_file())?;
    ledger::append(
        &ca.index_file(),
        &IndexEntry::issued(serial, window.1, &ca.certificate(), request.subject.compiled()),
    )?;
    crl::issue(&ca, &key, config.crl_next_update)?;

    info!(%slug, serial, "created root CA");
    Ok(Authority {
        path: path.to_string(),
        slug,
        serial,
        certificate_pem: pem,
    })
}

/// Creates an intermediate CA below `parent`, signed with the parent's key.
///
/// The parent's key is opened with `parent_passphrase`. The new CA's request
/// and certificate are copied into the parent's `certreqs/`, `certs/` and
/// `newcerts/`, and the parent's ledger records the issuance.
pub fn create_intermediate(
    config: &EngineConfig,
    parent: &CaPath,
    request: &CertificateConfiguration,
    parent_passphrase: &str,
) -> Result<Authority> {
    let validity = request.validate()?;
    let slug = authority_slug(&request.subject)?;
    let parent_ca = CaLayout::new(parent.directory(&config.pki_root));
    if !parent_ca.exists() {
        return Err(Error::InvalidPath(format!("no CA chain exists at '{parent}'")));
    }
    let path = parent.child(slug.clone());
    let ca = parent_ca.child(&slug);

    if ca.certificate().is_file() {
        return Err(Error::AlreadyExists {
            artifact: Artifact::IntermediateAuthority,
            slug,
        });
    }
    if parent_ca.certificate_for(&slug).is_file() {
        return Err(Error::AlreadyExists {
            artifact: Artifact::Certificate,
            slug,
        });
    }

    let signer = SigningAuthority::load(parent_ca, parent_passphrase)?;
    ca.setup()?;
    let key = keys::load_or_generate(
        &ca.private_key(),
        &ca.public_key(),
        config.key_bits,
        &request.rsa_private_key_passphrase,
    )?;
    let requested = RequestInfo::from_pem(&ensure_self_request(&ca, &slug, request, &key)?)?;

    let serial = ledger::read_serial(&signer.layout.serial_file())?;
    let window = validity.window(Utc::now())?;
    let mut params = authority_params(&requested.subject, &request.san_data, window, serial, &key)?;
    params.use_authority_key_identifier_extension = true;
    if !request.san_data.is_empty() {
        params
            .custom_extensions
            .push(der::issuer_alt_name(&request.san_data));
    }

    let (issuer_certificate, issuer_key) = signer.rcgen_issuer()?;
    let certificate = params
        .signed_by(&key.to_rcgen()?, &issuer_certificate, &issuer_key)
        .map_err(|e| Error::Signing(format!("failed to sign intermediate certificate: {e}")))?;
    let pem = certificate.pem();
    write_once(&ca.certificate(), &pem, Artifact::IntermediateAuthority, &slug)?;

    let parent_ca = &signer.layout;
    copy_into_parent(&ca.request(), &parent_ca.request_for(&slug))?;
    copy_into_parent(&ca.certificate(), &parent_ca.certificate_for(&slug))?;
    copy_into_parent(&ca.certificate(), &parent_ca.newcert(serial))?;

    ledger::increment_serial(&parent_ca.serial_file())?;
    ledger::increment_serial(&ca.serial_file())?;
    ledger::append(
        &parent_ca.index_file(),
        &IndexEntry::issued(
            serial,
            window.1,
            &parent_ca.certificate_for(&slug),
            requested.subject.compiled(),
        ),
    )?;
    crl::issue(&ca, &key, config.crl_next_update)?;

    info!(%slug, parent = %parent, serial, "created intermediate CA");
    Ok(Authority {
        path: path.to_string(),
        slug,
        serial,
        certificate_pem: pem,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x509::CertificateInfo;

    fn engine_config(dir: &Path) -> EngineConfig {
        EngineConfig {
            key_bits: keys::MIN_KEY_BITS,
            ..EngineConfig::new(dir)
        }
    }

    fn request(cn: &str) -> CertificateConfiguration {
        CertificateConfiguration {
            subject: Subject {
                organization: vec!["Example Org".into()],
                organizational_unit: vec!["Sec".into()],
                ..Subject::new(cn)
            },
            expiration_date: vec![10, 0, 0],
            ..Default::default()
        }
    }

    #[test]
    fn root_creation_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let root = create_root(&config, &request("Example Root")).unwrap();

        assert_eq!(root.slug, "example-root");
        assert_eq!(root.serial, 1);
        let ca = CaLayout::new(dir.path().join("roots/example-root"));
        assert_eq!(ledger::read_serial(&ca.serial_file()).unwrap(), 2);
        assert!(ca.request().is_file());
        assert!(ca.crl().is_file());
        assert!(ca.public_key().is_file());

        let info = CertificateInfo::from_pem(&layout::read_string(&ca.certificate()).unwrap())
            .unwrap();
        assert_eq!(info.subject, info.issuer);
        assert_eq!(info.subject.common_name, "Example Root");
        assert!(info.is_ca);
        assert_eq!(info.serial, 1);

        let rows = ledger::entries(&ca.index_file()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].serial, 1);
        assert_eq!(rows[0].subject, "/O=Example Org/OU=Sec/CN=Example Root");
    }

    #[test]
    fn second_root_creation_reports_existing() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let first = create_root(&config, &request("Example Root")).unwrap();
        let ca = CaLayout::new(dir.path().join("roots/example-root"));
        let key_before = layout::read_string(&ca.private_key()).unwrap();

        let err = create_root(&config, &request("Example Root")).unwrap_err();
        assert_eq!(err.status(), "root-exists");
        assert_eq!(layout::read_string(&ca.certificate()).unwrap(), first.certificate_pem);
        assert_eq!(layout::read_string(&ca.private_key()).unwrap(), key_before);
        assert_eq!(ledger::read_serial(&ca.serial_file()).unwrap(), 2);
    }

    #[test]
    fn invalid_configuration_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let err = create_root(&config, &CertificateConfiguration::default()).unwrap_err();
        assert_eq!(err.messages().len(), 4);
        assert!(!dir.path().join("roots").exists());
    }

    #[test]
    fn partially_created_root_is_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let ca = CaLayout::new(dir.path().join("roots/example-root"));
        ca.setup().unwrap();
        let key = keys::load_or_generate(&ca.private_key(), &ca.public_key(), 2048, "").unwrap();

        let root = create_root(&config, &request("Example Root")).unwrap();
        let info = CertificateInfo::from_pem(&root.certificate_pem).unwrap();
        assert_eq!(info.serial, 1);
        let reloaded = keys::read_private_key(&ca.private_key(), "").unwrap();
        assert_eq!(reloaded.public_key(), key.public_key());
    }

    #[test]
    fn protected_root_key_is_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let mut req = request("Protected Root");
        req.rsa_private_key_passphrase = "root secret".into();
        create_root(&config, &req).unwrap();

        let ca = CaLayout::new(dir.path().join("roots/protected-root"));
        let stored = layout::read_bytes(&ca.private_key()).unwrap();
        assert!(crate::protect::is_protected(&stored));
        assert!(keys::read_private_key(&ca.private_key(), "root secret").is_ok());
    }

    #[test]
    fn intermediate_is_signed_by_parent_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let root = create_root(&config, &request("Example Root")).unwrap();
        let parent = CaPath::parse("Example Root").unwrap();

        let ica = create_intermediate(&config, &parent, &request("Example ICA"), "").unwrap();
        assert_eq!(ica.path, "example-root/example-ica");
        assert_eq!(ica.serial, 2);

        let root_ca = CaLayout::new(dir.path().join("roots/example-root"));
        let ica_ca = root_ca.child("example-ica");
        assert_eq!(ledger::read_serial(&root_ca.serial_file()).unwrap(), 3);
        assert_eq!(ledger::read_serial(&ica_ca.serial_file()).unwrap(), 2);
        assert!(root_ca.request_for("example-ica").is_file());
        assert_eq!(
            layout::read_string(&root_ca.certificate_for("example-ica")).unwrap(),
            ica.certificate_pem
        );
        assert!(root_ca.newcert(2).is_file());
        assert!(ica_ca.crl().is_file());

        let info = CertificateInfo::from_pem(&ica.certificate_pem).unwrap();
        let root_info = CertificateInfo::from_pem(&root.certificate_pem).unwrap();
        assert_eq!(info.issuer, root_info.subject);
        assert_eq!(info.subject.common_name, "Example ICA");
        assert!(info.is_ca);

        let rows = ledger::entries(&root_ca.index_file()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].serial, 2);
        assert_eq!(rows[1].subject, "/O=Example Org/OU=Sec/CN=Example ICA");
        assert!(ledger::entries(&ica_ca.index_file()).unwrap().is_empty());
    }

    fn issuer_alt_dns(pem: &str) -> Vec<String> {
        use x509_parser::extensions::ParsedExtension;
        use x509_parser::prelude::{FromDer, X509Certificate};

        let der = crate::x509::pem_contents(pem, "CERTIFICATE").unwrap();
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        cert.extensions()
            .iter()
            .find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::IssuerAlternativeName(ian) => {
                    Some(crate::x509::san_from_general_names(&ian.general_names).dns_names)
                }
                _ => None,
            })
            .unwrap_or_default()
    }

    fn request_with_dns(cn: &str, dns: &str) -> CertificateConfiguration {
        CertificateConfiguration {
            san_data: SanData {
                dns_names: vec![dns.into()],
                ..SanData::default()
            },
            ..request(cn)
        }
    }

    #[test]
    fn intermediate_issuer_alt_name_comes_from_its_own_request() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let root = create_root(&config, &request_with_dns("Example Root", "root.example.test"))
            .unwrap();
        let parent = CaPath::parse("example-root").unwrap();
        let ica = create_intermediate(
            &config,
            &parent,
            &request_with_dns("Example ICA", "ica.example.test"),
            "",
        )
        .unwrap();

        assert_eq!(issuer_alt_dns(&root.certificate_pem), ["root.example.test"]);
        assert_eq!(issuer_alt_dns(&ica.certificate_pem), ["ica.example.test"]);
    }

    #[test]
    fn intermediate_without_san_has_no_issuer_alt_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        create_root(&config, &request_with_dns("Example Root", "root.example.test")).unwrap();
        let parent = CaPath::parse("example-root").unwrap();
        let ica = create_intermediate(&config, &parent, &request("Example ICA"), "").unwrap();
        assert!(issuer_alt_dns(&ica.certificate_pem).is_empty());
    }

    #[test]
    fn intermediate_requires_existing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let parent = CaPath::parse("Missing Root").unwrap();
        let err = create_intermediate(&config, &parent, &request("Example ICA"), "").unwrap_err();
        assert_eq!(err.status(), "invalid-parent-path");
    }

    #[test]
    fn intermediate_reports_missing_parent_serial() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        create_root(&config, &request("Example Root")).unwrap();
        let root_ca = CaLayout::new(dir.path().join("roots/example-root"));
        std::fs::remove_file(root_ca.serial_file()).unwrap();

        let parent = CaPath::parse("example-root").unwrap();
        let err = create_intermediate(&config, &parent, &request("Example ICA"), "").unwrap_err();
        assert!(matches!(err, Error::MissingPrerequisite(Prerequisite::SerialFile)));
        assert!(!root_ca.child("example-ica").exists());
        assert_eq!(ledger::entries(&root_ca.index_file()).unwrap().len(), 1);
    }

    #[test]
    fn intermediate_with_wrong_parent_passphrase_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        let mut root = request("Example Root");
        root.rsa_private_key_passphrase = "right".into();
        create_root(&config, &root).unwrap();

        let parent = CaPath::parse("example-root").unwrap();
        let err =
            create_intermediate(&config, &parent, &request("Example ICA"), "wrong").unwrap_err();
        assert_eq!(err.status(), "private-key-decryption-error");
    }

    #[test]
    fn repeated_intermediate_reports_existing() {
        let dir = tempfile::tempdir().unwrap();
        let config = engine_config(dir.path());
        create_root(&config, &request("Example Root")).unwrap();
        let parent = CaPath::parse("example-root").unwrap();
        create_intermediate(&config, &parent, &request("Example ICA"), "").unwrap();

        let err = create_intermediate(&config, &parent, &request("Example ICA"), "").unwrap_err();
        assert_eq!(err.status(), "intermed-ca-exists");
    }
}
