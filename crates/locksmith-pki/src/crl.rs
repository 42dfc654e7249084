//! Certificate revocation lists.
//!
//! Lists are rebuilt wholesale on every issue and always carry an empty
//! revoked set.

use chrono::{DateTime, Utc};
use tracing::info;
use yasna::Tag;

use crate::der::{
    self, OID_AUTHORITY_KEY_IDENTIFIER, OID_CRL_NUMBER, OID_ISSUER_ALT_NAME, write_extension,
    write_sha512_with_rsa, write_time,
};
use crate::error::{Error, Result};
use crate::keys::KeyPair;
use crate::layout::{self, CaLayout};
use crate::types::Validity;
use crate::x509::{self, IssuerInfo};

/// PEM label of revocation lists.
pub const CRL_LABEL: &str = "X509 CRL";

const CRL_VERSION_2: u8 = 1;

/// Builds and signs a DER CRL for the issuer.
pub fn build(
    key: &KeyPair,
    issuer: &IssuerInfo,
    this_update: DateTime<Utc>,
    next_update: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let key_id = key.key_id()?;
    let aki = der::authority_key_identifier(&key_id);
    let crl_number = yasna::construct_der(|writer| writer.write_u8(0));
    let ian = (!issuer.san.is_empty()).then(|| der::general_names(&issuer.san));
    let this_update = x509::to_rcgen_time(this_update)?;
    let next_update = x509::to_rcgen_time(next_update)?;

    let tbs = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_u8(CRL_VERSION_2);
            write_sha512_with_rsa(writer.next());
            writer.next().write_der(&issuer.subject_der);
            write_time(writer.next(), this_update);
            write_time(writer.next(), next_update);
            writer.next().write_tagged(Tag::context(0), |writer| {
                writer.write_sequence(|writer| {
                    write_extension(writer.next(), OID_AUTHORITY_KEY_IDENTIFIER, false, &aki);
                    write_extension(writer.next(), OID_CRL_NUMBER, false, &crl_number);
                    if let Some(ian) = &ian {
                        write_extension(writer.next(), OID_ISSUER_ALT_NAME, false, ian);
                    }
                });
            });
        });
    });

    let signature = key.sign_sha512(&tbs);
    Ok(yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_der(&tbs);
            write_sha512_with_rsa(writer.next());
            writer
                .next()
                .write_bitvec_bytes(&signature, signature.len() * 8);
        });
    }))
}

/// Issues a fresh CRL for the CA and writes it to `crl/ca.crl`.
///
/// Returns the PEM text.
pub fn issue(layout: &CaLayout, key: &KeyPair, next_update: Validity) -> Result<String> {
    let certificate = layout::read_string(&layout.certificate())?;
    let issuer = IssuerInfo::from_pem(&certificate)?;
    let now = Utc::now();
    let next = next_update
        .apply(now.date_naive())
        .map(|date| date.and_time(now.time()).and_utc())
        .ok_or_else(|| Error::Signing("CRL next update is out of range".into()))?;

    let pem = x509::pem_encode(CRL_LABEL, &build(key, &issuer, now, next)?);
    layout::write_replace(&layout.crl(), pem.as_bytes())?;
    info!(
        ca = %issuer.info.subject.common_name,
        next_update = %next,
        "issued certificate revocation list"
    );
    Ok(pem)
}
