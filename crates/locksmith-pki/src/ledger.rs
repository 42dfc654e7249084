//! Serial counter and issuance ledger (`ca.serial` and `ca.index`).

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::layout;

/// Format of ledger expiry and revocation timestamps.
const TIME_FORMAT: &str = "%y%m%d%H%M%SZ";

/// Reads the current serial number.
pub fn read_serial(path: &Path) -> Result<u64> {
    let text = layout::read_string(path)?;
    text.trim()
        .parse()
        .map_err(|e| Error::Parse(format!("invalid serial '{}': {e}", text.trim())))
}

/// Advances the serial counter by one and returns the new value.
///
/// The file is replaced atomically; callers serialize access per CA.
pub fn increment_serial(path: &Path) -> Result<u64> {
    let next = read_serial(path)?
        .checked_add(1)
        .ok_or_else(|| Error::Parse("serial counter overflow".into()))?;
    layout::write_replace(path, next.to_string().as_bytes())?;
    debug!(serial = next, path = %path.display(), "advanced serial counter");
    Ok(next)
}

/// Certificate state recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryState {
    /// `V`
    Valid,
    /// `E`
    Expired,
    /// `R`
    Revoked,
}

impl EntryState {
    const fn flag(self) -> char {
        match self {
            Self::Valid => 'V',
            Self::Expired => 'E',
            Self::Revoked => 'R',
        }
    }
}

/// One row of `ca.index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    /// Certificate state.
    pub state: EntryState,
    /// Expiry as `YYMMDDHHMMSSZ`.
    pub expires: String,
    /// Revocation time as `YYMMDDHHMMSSZ`, empty unless revoked.
    pub revoked: String,
    /// Serial number.
    pub serial: u64,
    /// Path of the certificate artifact.
    pub path: String,
    /// Compiled subject, e.g. `/O=Example/CN=Root`.
    pub subject: String,
}

impl IndexEntry {
    /// A valid-state entry for a freshly issued certificate.
    #[must_use]
    pub fn issued(
        serial: u64,
        not_after: DateTime<Utc>,
        path: &Path,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            state: EntryState::Valid,
            expires: not_after.format(TIME_FORMAT).to_string(),
            revoked: String::new(),
            serial,
            path: path.display().to_string(),
            subject: subject.into(),
        }
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{:02}\t{}\t{}",
            self.state.flag(),
            self.expires,
            self.revoked,
            self.serial,
            self.path,
            self.subject
        )
    }
}

impl FromStr for IndexEntry {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        let [state, expires, revoked, serial, path, subject] = fields.as_slice() else {
            return Err(Error::Parse(format!(
                "index row has {} fields, expected 6",
                fields.len()
            )));
        };
        let state = match *state {
            "V" => EntryState::Valid,
            "E" => EntryState::Expired,
            "R" => EntryState::Revoked,
            other => return Err(Error::Parse(format!("unknown index state '{other}'"))),
        };
        let serial = serial
            .parse()
            .map_err(|e| Error::Parse(format!("invalid index serial '{serial}': {e}")))?;
        Ok(Self {
            state,
            expires: (*expires).to_string(),
            revoked: (*revoked).to_string(),
            serial,
            path: (*path).to_string(),
            subject: (*subject).to_string(),
        })
    }
}

/// Appends one row to the index, flushing before returning.
pub fn append(index: &Path, entry: &IndexEntry) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(index)
        .map_err(|e| Error::storage(index, e))?;
    writeln!(file, "{entry}")
        .and_then(|()| file.flush())
        .and_then(|()| file.sync_data())
        .map_err(|e| Error::storage(index, e))?;
    debug!(serial = entry.serial, index = %index.display(), "appended index entry");
    Ok(())
}

/// Parses every row of the index.
pub fn entries(index: &Path) -> Result<Vec<IndexEntry>> {
    layout::read_string(index)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}
