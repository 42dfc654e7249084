//! End-to-end tests for a full certificate chain.
//!
//! These tests verify:
//! 1. Root CA bootstrap and its on-disk layout
//! 2. Intermediate CA creation signed by the root
//! 3. Requests and issued certificates below the intermediate
//! 4. Revocation lists for every CA
//! 5. Serial and ledger bookkeeping across the chain

use std::path::Path;

use locksmith_pki::{
    CertificateConfiguration, CsrSource, Engine, EngineConfig, EntryState, SanData, Subject,
};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_parser::revocation_list::CertificateRevocationList;

fn engine(dir: &Path) -> Engine {
    Engine::new(EngineConfig {
        key_bits: 2048,
        ..EngineConfig::new(dir)
    })
    .unwrap()
}

fn config(cn: &str, passphrase: &str) -> CertificateConfiguration {
    CertificateConfiguration {
        subject: Subject {
            organization: vec!["Example Org".into()],
            organizational_unit: vec!["Sec".into()],
            country: vec!["US".into()],
            ..Subject::new(cn)
        },
        expiration_date: vec![5, 0, 0],
        rsa_private_key_passphrase: passphrase.into(),
        san_data: SanData {
            dns_names: vec![format!("{}.example.test", locksmith_pki::slugify(cn))],
            ..SanData::default()
        },
    }
}

fn der_of(pem: &str) -> Vec<u8> {
    let (_, parsed) = parse_x509_pem(pem.as_bytes()).unwrap();
    parsed.contents
}

fn assert_signed_by(child_pem: &str, issuer_pem: &str) {
    let child_der = der_of(child_pem);
    let issuer_der = der_of(issuer_pem);
    let (_, child) = X509Certificate::from_der(&child_der).unwrap();
    let (_, issuer) = X509Certificate::from_der(&issuer_der).unwrap();
    assert_eq!(child.issuer().as_raw(), issuer.subject().as_raw());
    child.verify_signature(Some(issuer.public_key())).unwrap();
}

// ============================================================================
// Full chain
// ============================================================================

#[test]
fn test_root_intermediate_leaf_chain() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    // 1. Root with a protected key
    let root = engine.create_root(&config("Example Root", "root-pass")).unwrap();
    assert_eq!(root.path, "example-root");
    assert_signed_by(&root.certificate_pem, &root.certificate_pem);

    // 2. Intermediate signed by the root
    let ica = engine
        .create_intermediate("Example Root", &config("Example ICA", "ica-pass"), "root-pass")
        .unwrap();
    assert_eq!(ica.path, "example-root/example-ica");
    assert_eq!(ica.serial, 2);
    assert_signed_by(&ica.certificate_pem, &root.certificate_pem);

    let ica_dir = dir.path().join("roots/example-root/intermed-ca/example-ica");
    for file in [
        "certs/ca.pem",
        "private/ca.priv.pem",
        "private/ca.pub.pem",
        "certreqs/ca.pem",
        "crl/ca.crl",
        "ca.index",
        "ca.serial",
    ] {
        assert!(ica_dir.join(file).is_file(), "missing {file}");
    }
    let root_dir = dir.path().join("roots/example-root");
    assert!(root_dir.join("certs/example-ica.pem").is_file());
    assert!(root_dir.join("certreqs/example-ica.pem").is_file());
    assert!(root_dir.join("newcerts/2.pem").is_file());

    // 3. Request and certificate below the intermediate
    let request = engine
        .create_csr("example-root/example-ica", &config("www.example.test", ""), false)
        .unwrap();
    let issued = engine
        .issue_certificate(
            "Example Root/Example ICA",
            "ica-pass",
            &CsrSource::Pem(request.request_pem),
        )
        .unwrap();
    assert_eq!(issued.serial, 2);
    assert_signed_by(&issued.certificate_pem, &ica.certificate_pem);

    let stored = engine
        .read_certificate("example-root/example-ica", "www-example-test")
        .unwrap();
    assert!(!stored.info.is_ca);
    assert_eq!(stored.info.issuer.common_name, "Example ICA");

    // 4. Revocation lists
    for (path, issuer_pem) in [
        ("example-root", &root.certificate_pem),
        ("example-root/example-ica", &ica.certificate_pem),
    ] {
        let crl_pem = engine.read_crl(path).unwrap();
        let crl_der = der_of(&crl_pem);
        let (_, crl) = CertificateRevocationList::from_der(&crl_der).unwrap();
        let issuer_der = der_of(issuer_pem);
        let (_, issuer) = X509Certificate::from_der(&issuer_der).unwrap();
        assert_eq!(crl.issuer().as_raw(), issuer.subject().as_raw());
        assert_eq!(crl.iter_revoked_certificates().count(), 0);
        assert!(crl.next_update().is_some());
    }

    // 5. Bookkeeping
    assert_eq!(engine.list_roots().unwrap(), ["example-root"]);
    assert_eq!(
        engine.list_intermediates("example-root").unwrap(),
        ["example-ica"]
    );
    let root_ledger = engine.ledger_entries("example-root").unwrap();
    assert_eq!(
        root_ledger.iter().map(|e| e.serial).collect::<Vec<_>>(),
        [1, 2]
    );
    assert!(root_ledger.iter().all(|e| e.state == EntryState::Valid));
    let ica_ledger = engine.ledger_entries("example-root/example-ica").unwrap();
    assert_eq!(ica_ledger.last().unwrap().serial, issued.serial);
    assert_eq!(ica_ledger.last().unwrap().subject, issued.subject.compiled());
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_bootstrap_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let first = engine.create_root(&config("Example Root", "")).unwrap();
    let key_before = std::fs::read(dir.path().join("roots/example-root/private/ca.priv.pem")).unwrap();

    let err = engine.create_root(&config("Example Root", "")).unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(err.status(), "root-exists");
    assert_eq!(
        engine.read_ca_certificate("example-root").unwrap(),
        first.certificate_pem
    );
    let key_after = std::fs::read(dir.path().join("roots/example-root/private/ca.priv.pem")).unwrap();
    assert_eq!(key_before, key_after);
}

#[test]
fn test_wrong_parent_passphrase_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    engine.create_root(&config("Example Root", "right")).unwrap();

    let err = engine
        .create_intermediate("Example Root", &config("Example ICA", ""), "wrong")
        .unwrap_err();
    assert_eq!(err.status(), "private-key-decryption-error");
    assert!(engine.list_intermediates("example-root").unwrap().is_empty());
    assert_eq!(engine.ledger_entries("example-root").unwrap().len(), 1);
}

#[test]
fn test_issuance_from_stored_request_of_another_ca() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    engine.create_root(&config("Example Root", "")).unwrap();
    engine
        .create_intermediate("Example Root", &config("Example ICA", ""), "")
        .unwrap();
    engine
        .create_csr("example-root", &config("api.example.test", ""), false)
        .unwrap();

    let issued = engine
        .issue_certificate(
            "example-root/example-ica",
            "",
            &CsrSource::Stored {
                ca_path: "example-root".into(),
                target: "certreqs/api-example-test".into(),
            },
        )
        .unwrap();
    assert_eq!(issued.slug, "api-example-test");
    assert_eq!(
        engine.list_certificates("example-root/example-ica").unwrap(),
        ["api-example-test"]
    );
    assert_eq!(engine.list_certificates("example-root").unwrap(), ["example-ica"]);
}
