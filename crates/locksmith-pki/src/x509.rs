//! Conversions between engine types and X.509 structures, plus read-side
//! inspection of stored certificates.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use rcgen::{DistinguishedName, DnType, Ia5String, SanType};
use serde::Serialize;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::{FromDer, X509Certificate, X509Name};

use crate::error::{Error, Result};
use crate::types::{SanData, Subject};

/// PEM label of certificates.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

const OID_COMMON_NAME: &str = "2.5.4.3";
const OID_COUNTRY: &str = "2.5.4.6";
const OID_LOCALITY: &str = "2.5.4.7";
const OID_PROVINCE: &str = "2.5.4.8";
const OID_STREET_ADDRESS: &str = "2.5.4.9";
const OID_ORGANIZATION: &str = "2.5.4.10";
const OID_ORGANIZATIONAL_UNIT: &str = "2.5.4.11";
const OID_POSTAL_CODE: &str = "2.5.4.17";

/// Builds an rcgen distinguished name from the first value of each field.
#[must_use]
pub fn distinguished_name(subject: &Subject) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    let fields = [
        (DnType::CountryName, subject.country.first()),
        (DnType::StateOrProvinceName, subject.province.first()),
        (DnType::LocalityName, subject.locality.first()),
        (DnType::CustomDnType(vec![2, 5, 4, 9]), subject.street_address.first()),
        (DnType::CustomDnType(vec![2, 5, 4, 17]), subject.postal_code.first()),
        (DnType::OrganizationName, subject.organization.first()),
        (DnType::OrganizationalUnitName, subject.organizational_unit.first()),
    ];
    for (ty, value) in fields {
        if let Some(value) = value {
            dn.push(ty, value.as_str());
        }
    }
    if !subject.common_name.is_empty() {
        dn.push(DnType::CommonName, subject.common_name.as_str());
    }
    dn
}

/// Reads the subject fields back out of a parsed X.509 name.
pub fn subject_from_name(name: &X509Name<'_>) -> Result<Subject> {
    let mut subject = Subject::default();
    for attr in name.iter_attributes() {
        let value = attr
            .as_str()
            .map_err(|e| Error::Parse(format!("unreadable name attribute: {e}")))?
            .to_string();
        match attr.attr_type().to_id_string().as_str() {
            OID_COMMON_NAME => subject.common_name = value,
            OID_COUNTRY => subject.country.push(value),
            OID_LOCALITY => subject.locality.push(value),
            OID_PROVINCE => subject.province.push(value),
            OID_STREET_ADDRESS => subject.street_address.push(value),
            OID_ORGANIZATION => subject.organization.push(value),
            OID_ORGANIZATIONAL_UNIT => subject.organizational_unit.push(value),
            OID_POSTAL_CODE => subject.postal_code.push(value),
            _ => {}
        }
    }
    Ok(subject)
}

/// Converts SAN data into rcgen SAN entries.
pub fn san_types(san: &SanData) -> Result<Vec<SanType>> {
    let ia5 = |kind: &str, value: &str| {
        Ia5String::try_from(value.to_string())
            .map_err(|e| Error::Signing(format!("invalid {kind} '{value}': {e}")))
    };
    let mut out = Vec::new();
    for dns in &san.dns_names {
        out.push(SanType::DnsName(ia5("DNS name", dns)?));
    }
    for email in &san.email_addresses {
        out.push(SanType::Rfc822Name(ia5("email", email)?));
    }
    for ip in &san.ip_addresses {
        out.push(SanType::IpAddress(*ip));
    }
    for uri in &san.uris {
        out.push(SanType::URI(ia5("URI", uri)?));
    }
    Ok(out)
}

/// Collects SAN data from parsed general names.
pub(crate) fn san_from_general_names(names: &[GeneralName<'_>]) -> SanData {
    let mut san = SanData::default();
    for name in names {
        match name {
            GeneralName::DNSName(dns) => san.dns_names.push((*dns).to_string()),
            GeneralName::RFC822Name(email) => san.email_addresses.push((*email).to_string()),
            GeneralName::URI(uri) => san.uris.push((*uri).to_string()),
            GeneralName::IPAddress(bytes) => {
                if let Some(ip) = ip_from_bytes(bytes) {
                    san.ip_addresses.push(ip);
                }
            }
            _ => {}
        }
    }
    san
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(|b| IpAddr::V4(Ipv4Addr::from(b))),
        16 => <[u8; 16]>::try_from(bytes).ok().map(|b| IpAddr::V6(Ipv6Addr::from(b))),
        _ => None,
    }
}

/// Decodes a PEM block, checking its label.
pub fn pem_contents(text: &str, label: &str) -> Result<Vec<u8>> {
    let block = pem::parse(text.trim()).map_err(|e| Error::Parse(format!("invalid PEM: {e}")))?;
    if block.tag() != label {
        return Err(Error::Parse(format!(
            "expected PEM label '{label}', found '{}'",
            block.tag()
        )));
    }
    Ok(block.contents().to_vec())
}

/// Encodes DER bytes as PEM with LF line endings.
#[must_use]
pub fn pem_encode(label: &str, der: &[u8]) -> String {
    pem::encode_config(
        &pem::Pem::new(label, der.to_vec()),
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Interprets a big-endian serial number as an integer.
pub(crate) fn serial_from_bytes(raw: &[u8]) -> Result<u64> {
    let significant: Vec<u8> = raw.iter().copied().skip_while(|b| *b == 0).collect();
    if significant.len() > 8 {
        return Err(Error::Parse("serial number does not fit in 64 bits".into()));
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
}

/// Converts a chrono time into the representation rcgen expects.
pub(crate) fn to_rcgen_time(dt: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::Signing(format!("invalid timestamp: {e}")))
}

fn timestamp(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| Error::Parse(format!("invalid timestamp {ts}")))
}

/// Summary of a stored certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    /// Subject name.
    pub subject: Subject,
    /// Issuer name.
    pub issuer: Subject,
    /// Serial number.
    pub serial: u64,
    /// Start of validity.
    pub not_before: DateTime<Utc>,
    /// End of validity.
    pub not_after: DateTime<Utc>,
    /// Whether Basic Constraints marks this as a CA.
    pub is_ca: bool,
    /// Subject Alternative Names.
    pub san: SanData,
}

impl CertificateInfo {
    /// Parses a certificate from DER.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Parse(format!("invalid certificate: {e}")))?;
        Self::from_x509(&cert)
    }

    /// Parses a certificate from PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_der(&pem_contents(pem, CERTIFICATE_LABEL)?)
    }

    fn from_x509(cert: &X509Certificate<'_>) -> Result<Self> {
        let mut is_ca = false;
        let mut san = SanData::default();
        for ext in cert.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::BasicConstraints(bc) => is_ca = bc.ca,
                ParsedExtension::SubjectAlternativeName(names) => {
                    san = san_from_general_names(&names.general_names);
                }
                _ => {}
            }
        }
        Ok(Self {
            subject: subject_from_name(cert.subject())?,
            issuer: subject_from_name(cert.issuer())?,
            serial: serial_from_bytes(cert.raw_serial())?,
            not_before: timestamp(cert.validity().not_before.timestamp())?,
            not_after: timestamp(cert.validity().not_after.timestamp())?,
            is_ca,
            san,
        })
    }
}

/// Fields of a CA certificate needed to sign with it.
pub(crate) struct IssuerInfo {
    /// Raw DER of the subject name.
    pub subject_der: Vec<u8>,
    /// Subject Alternative Names, mirrored into IAN extensions.
    pub san: SanData,
    /// Summary of the certificate.
    pub info: CertificateInfo,
}

impl IssuerInfo {
    pub(crate) fn from_pem(pem: &str) -> Result<Self> {
        let der = pem_contents(pem, CERTIFICATE_LABEL)?;
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| Error::Parse(format!("invalid CA certificate: {e}")))?;
        let info = CertificateInfo::from_x509(&cert)?;
        Ok(Self {
            subject_der: cert.subject().as_raw().to_vec(),
            san: info.san.clone(),
            info,
        })
    }
}
