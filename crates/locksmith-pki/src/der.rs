//! DER encoders for the X.509 extensions rcgen does not write for us.

use rcgen::CustomExtension;
use time::OffsetDateTime;
use yasna::models::{GeneralizedTime, ObjectIdentifier, UTCTime};
use yasna::{DERWriter, Tag};

use crate::types::SanData;

/// `id-ce-basicConstraints`
pub const OID_BASIC_CONSTRAINTS: &[u64] = &[2, 5, 29, 19];
/// `id-ce-issuerAltName`
pub const OID_ISSUER_ALT_NAME: &[u64] = &[2, 5, 29, 18];
/// `id-ce-authorityKeyIdentifier`
pub const OID_AUTHORITY_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 35];
/// `id-ce-cRLNumber`
pub const OID_CRL_NUMBER: &[u64] = &[2, 5, 29, 20];
/// `sha512WithRSAEncryption`
pub const OID_SHA512_WITH_RSA: &[u64] = &[1, 2, 840, 113_549, 1, 1, 13];

const GN_RFC822_NAME: u64 = 1;
const GN_DNS_NAME: u64 = 2;
const GN_URI: u64 = 6;
const GN_IP_ADDRESS: u64 = 7;

/// `GeneralNames` holding every entry of the SAN data.
///
/// Order is DNS names, email addresses, IP addresses, then URIs.
#[must_use]
pub fn general_names(san: &SanData) -> Vec<u8> {
    yasna::construct_der(|writer| write_general_names(writer, san))
}

/// Writes `GeneralNames` for the SAN data.
pub fn write_general_names(writer: DERWriter, san: &SanData) {
    writer.write_sequence(|writer| {
        for dns in &san.dns_names {
            writer
                .next()
                .write_tagged_implicit(Tag::context(GN_DNS_NAME), |w| w.write_ia5_string(dns));
        }
        for email in &san.email_addresses {
            writer
                .next()
                .write_tagged_implicit(Tag::context(GN_RFC822_NAME), |w| {
                    w.write_ia5_string(email);
                });
        }
        for ip in &san.ip_addresses {
            let octets = match ip {
                std::net::IpAddr::V4(v4) => v4.octets().to_vec(),
                std::net::IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            writer
                .next()
                .write_tagged_implicit(Tag::context(GN_IP_ADDRESS), |w| w.write_bytes(&octets));
        }
        for uri in &san.uris {
            writer
                .next()
                .write_tagged_implicit(Tag::context(GN_URI), |w| w.write_ia5_string(uri));
        }
    });
}

/// Non-critical Issuer-Alternative-Name extension mirroring the SAN data.
#[must_use]
pub fn issuer_alt_name(san: &SanData) -> CustomExtension {
    CustomExtension::from_oid_content(OID_ISSUER_ALT_NAME, general_names(san))
}

/// Critical Basic Constraints extension with `CA:true, pathLen:0`.
///
/// CSRs carry this as a raw extension request since rcgen refuses to put
/// CA constraints into a request.
#[must_use]
pub fn ca_basic_constraints() -> CustomExtension {
    let content = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_bool(true);
            writer.next().write_u8(0);
        });
    });
    let mut ext = CustomExtension::from_oid_content(OID_BASIC_CONSTRAINTS, content);
    ext.set_criticality(true);
    ext
}

/// `AuthorityKeyIdentifier` carrying only a key identifier.
#[must_use]
pub fn authority_key_identifier(key_id: &[u8]) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer
                .next()
                .write_tagged_implicit(Tag::context(0), |w| w.write_bytes(key_id));
        });
    })
}

/// Non-critical Authority Key Identifier extension.
#[must_use]
pub fn authority_key_identifier_extension(key_id: &[u8]) -> CustomExtension {
    CustomExtension::from_oid_content(OID_AUTHORITY_KEY_IDENTIFIER, authority_key_identifier(key_id))
}

/// Writes one `Extension` structure.
pub fn write_extension(writer: DERWriter, oid: &[u64], critical: bool, value: &[u8]) {
    writer.write_sequence(|writer| {
        writer.next().write_oid(&ObjectIdentifier::from_slice(oid));
        if critical {
            writer.next().write_bool(true);
        }
        writer.next().write_bytes(value);
    });
}

/// Writes the sha512WithRSAEncryption `AlgorithmIdentifier`.
pub fn write_sha512_with_rsa(writer: DERWriter) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_oid(&ObjectIdentifier::from_slice(OID_SHA512_WITH_RSA));
        writer.next().write_null();
    });
}

/// Writes a time as UTCTime inside 1950..2050 and GeneralizedTime outside.
pub fn write_time(writer: DERWriter, dt: OffsetDateTime) {
    let dt = dt.replace_nanosecond(0).unwrap_or(dt);
    if (1950..2050).contains(&dt.year()) {
        writer.write_utctime(&UTCTime::from_datetime(dt));
    } else {
        writer.write_generalized_time(&GeneralizedTime::from_datetime(dt));
    }
}
