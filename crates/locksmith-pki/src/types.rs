//! Core request types: certificate configuration, subject, SAN data, validity.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Subject distinguished name fields.
///
/// Every field except the common name is a list; only the first value of a
/// list ends up in issued certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Common name (CN).
    pub common_name: String,
    /// Organization (O).
    #[serde(default)]
    pub organization: Vec<String>,
    /// Organizational unit (OU).
    #[serde(default)]
    pub organizational_unit: Vec<String>,
    /// Country (C).
    #[serde(default)]
    pub country: Vec<String>,
    /// State or province (ST).
    #[serde(default)]
    pub province: Vec<String>,
    /// Locality (L).
    #[serde(default)]
    pub locality: Vec<String>,
    /// Street address.
    #[serde(default)]
    pub street_address: Vec<String>,
    /// Postal code.
    #[serde(default)]
    pub postal_code: Vec<String>,
}

impl Subject {
    /// Creates a subject with only a common name set.
    #[must_use]
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Self::default()
        }
    }

    /// Compiles the ledger form of the subject, e.g. `/C=US/O=Example/CN=Root`.
    #[must_use]
    pub fn compiled(&self) -> String {
        let mut out = String::new();
        let parts = [
            ("C", self.country.first()),
            ("S", self.province.first()),
            ("L", self.locality.first()),
            ("O", self.organization.first()),
            ("OU", self.organizational_unit.first()),
        ];
        for (key, value) in parts {
            if let Some(value) = value {
                out.push('/');
                out.push_str(key);
                out.push('=');
                out.push_str(value);
            }
        }
        if !self.common_name.is_empty() {
            out.push_str("/CN=");
            out.push_str(&self.common_name);
        }
        out
    }
}

/// Subject Alternative Name data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanData {
    /// IP addresses.
    #[serde(default)]
    pub ip_addresses: Vec<IpAddr>,
    /// Email addresses.
    #[serde(default)]
    pub email_addresses: Vec<String>,
    /// DNS names.
    #[serde(default)]
    pub dns_names: Vec<String>,
    /// URIs.
    #[serde(default)]
    pub uris: Vec<String>,
}

impl SanData {
    /// Returns true when no alternative names are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ip_addresses.is_empty()
            && self.email_addresses.is_empty()
            && self.dns_names.is_empty()
            && self.uris.is_empty()
    }
}

/// A validity offset of `[years, months, days]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct Validity {
    /// Years to add.
    pub years: i32,
    /// Months to add.
    pub months: i32,
    /// Days to add.
    pub days: i32,
}

impl Validity {
    /// Creates a new validity offset.
    #[must_use]
    pub const fn new(years: i32, months: i32, days: i32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }

    /// Parses the wire form, which must have exactly three elements.
    #[must_use]
    pub fn from_slice(parts: &[i32]) -> Option<Self> {
        match parts {
            [years, months, days] => Some(Self::new(*years, *months, *days)),
            _ => None,
        }
    }

    /// Applies the offset to a date.
    ///
    /// Months are added before days. A day-of-month that does not exist in the
    /// target month is clamped to the last day of that month.
    #[must_use]
    pub fn apply(&self, date: NaiveDate) -> Option<NaiveDate> {
        let months = i64::from(self.years) * 12 + i64::from(self.months);
        let shifted = if months >= 0 {
            date.checked_add_months(Months::new(u32::try_from(months).ok()?))?
        } else {
            date.checked_sub_months(Months::new(u32::try_from(-months).ok()?))?
        };
        if self.days >= 0 {
            shifted.checked_add_days(Days::new(u64::from(self.days.unsigned_abs())))
        } else {
            shifted.checked_sub_days(Days::new(u64::from(self.days.unsigned_abs())))
        }
    }

    /// Certificate validity window for an issuance happening at `now`.
    ///
    /// Starts at yesterday 00:00 UTC and ends at today 00:00 UTC plus the
    /// offset.
    pub fn window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let today = now.date_naive();
        let yesterday = today
            .pred_opt()
            .ok_or_else(|| Error::Configuration(vec!["Invalid Expiration Date field".into()]))?;
        let end = self
            .apply(today)
            .ok_or_else(|| Error::Configuration(vec!["Invalid Expiration Date field".into()]))?;
        Ok((midnight(yesterday), midnight(end)))
    }
}

impl From<[i32; 3]> for Validity {
    fn from([years, months, days]: [i32; 3]) -> Self {
        Self::new(years, months, days)
    }
}

impl From<Validity> for [i32; 3] {
    fn from(v: Validity) -> Self {
        [v.years, v.months, v.days]
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Everything needed to create a CA or a CSR.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateConfiguration {
    /// Subject distinguished name.
    pub subject: Subject,
    /// Validity offset as `[years, months, days]`.
    #[serde(default)]
    pub expiration_date: Vec<i32>,
    /// Passphrase protecting the generated private key. Empty means plaintext.
    #[serde(default)]
    pub rsa_private_key_passphrase: String,
    /// Subject Alternative Name data.
    #[serde(default)]
    pub san_data: SanData,
}

impl CertificateConfiguration {
    /// Checks required fields, reporting every missing one.
    ///
    /// Returns the parsed validity offset on success.
    pub fn validate(&self) -> Result<Validity> {
        let mut missing = Vec::new();
        if self.subject.common_name.trim().is_empty() {
            missing.push("Missing common name field".to_string());
        }
        if self.subject.organization.is_empty() {
            missing.push("Missing Organization field".to_string());
        }
        if self.subject.organizational_unit.is_empty() {
            missing.push("Missing OrganizationalUnit field".to_string());
        }
        let validity = Validity::from_slice(&self.expiration_date);
        if validity.is_none() {
            missing.push("Missing Expiration Date field".to_string());
        }
        match validity {
            Some(validity) if missing.is_empty() => Ok(validity),
            _ => Err(Error::Configuration(missing)),
        }
    }
}

impl fmt::Debug for CertificateConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateConfiguration")
            .field("subject", &self.subject)
            .field("expiration_date", &self.expiration_date)
            .field("rsa_private_key_passphrase", &"[REDACTED]")
            .field("san_data", &self.san_data)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn config() -> CertificateConfiguration {
        CertificateConfiguration {
            subject: Subject {
                organization: vec!["Example Org".into()],
                organizational_unit: vec!["Sec".into()],
                ..Subject::new("Example Root")
            },
            expiration_date: vec![10, 0, 0],
            ..Default::default()
        }
    }

    #[test]
    fn valid_configuration_returns_validity() {
        assert_eq!(config().validate().unwrap(), Validity::new(10, 0, 0));
    }

    #[test]
    fn empty_configuration_reports_all_fields() {
        let err = CertificateConfiguration::default().validate().unwrap_err();
        match err {
            Error::Configuration(missing) => assert_eq!(
                missing,
                [
                    "Missing common name field",
                    "Missing Organization field",
                    "Missing OrganizationalUnit field",
                    "Missing Expiration Date field",
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test_case(vec![] ; "empty")]
    #[test_case(vec![1, 0] ; "two elements")]
    #[test_case(vec![1, 0, 0, 0] ; "four elements")]
    fn expiration_must_have_three_elements(expiration: Vec<i32>) {
        let mut cfg = config();
        cfg.expiration_date = expiration;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.messages(), ["Missing Expiration Date field"]);
    }

    #[test]
    fn compiled_subject_uses_first_values() {
        let subject = Subject {
            country: vec!["US".into(), "CA".into()],
            province: vec!["NC".into()],
            locality: vec!["Raleigh".into()],
            organization: vec!["Example Org".into()],
            organizational_unit: vec!["Sec".into(), "Ops".into()],
            ..Subject::new("Example Root")
        };
        assert_eq!(
            subject.compiled(),
            "/C=US/S=NC/L=Raleigh/O=Example Org/OU=Sec/CN=Example Root"
        );
    }

    #[test]
    fn window_starts_yesterday_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 13, 45, 10).unwrap();
        let (start, end) = Validity::new(1, 0, 1).window(now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn window_clamps_month_end() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 8, 0, 0).unwrap();
        let (_, end) = Validity::new(0, 1, 0).window(now).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn validity_serializes_as_array() {
        let json = serde_json::to_string(&Validity::new(1, 2, 3)).unwrap();
        assert_eq!(json, "[1,2,3]");
        let back: Validity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Validity::new(1, 2, 3));
    }

    #[test]
    fn debug_redacts_passphrase() {
        let mut cfg = config();
        cfg.rsa_private_key_passphrase = "hunter2".into();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
