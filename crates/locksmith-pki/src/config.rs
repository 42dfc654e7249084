//! Engine configuration.
//!
//! Loaded from the `[locksmith]` table of a TOML file:
//!
//! ```toml
//! [locksmith]
//! pki_root = "/var/lib/locksmith"
//! key_bits = 4096
//! leaf_validity = [1, 0, 1]
//! crl_next_update = [1, 0, 0]
//! default_key_store = "default"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::{DEFAULT_KEY_BITS, MIN_KEY_BITS};
use crate::path::slugify;
use crate::types::Validity;

/// Settings for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding `roots/` and `keystores/`.
    pub pki_root: PathBuf,
    /// RSA modulus size for generated keys.
    pub key_bits: usize,
    /// Validity offset of issued leaf certificates.
    pub leaf_validity: Validity,
    /// Offset from now to a CRL's next update.
    pub crl_next_update: Validity,
    /// Key store used when a caller does not name one.
    pub default_key_store: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pki_root: PathBuf::new(),
            key_bits: DEFAULT_KEY_BITS,
            leaf_validity: Validity::new(1, 0, 1),
            crl_next_update: Validity::new(1, 0, 0),
            default_key_store: "default".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    locksmith: EngineConfig,
}

impl EngineConfig {
    /// Default settings rooted at `pki_root`.
    #[must_use]
    pub fn new(pki_root: impl Into<PathBuf>) -> Self {
        Self {
            pki_root: pki_root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        file.locksmith.validate()?;
        Ok(file.locksmith)
    }

    /// Validate the configuration, reporting every invalid field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] listing each problem.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.pki_root.as_os_str().is_empty() {
            problems.push("pki_root cannot be empty".to_string());
        }
        if self.key_bits < MIN_KEY_BITS {
            problems.push(format!("key_bits must be at least {MIN_KEY_BITS}"));
        }
        if negative(self.leaf_validity) {
            problems.push("leaf_validity cannot be negative".to_string());
        }
        if negative(self.crl_next_update) {
            problems.push("crl_next_update cannot be negative".to_string());
        }
        if slugify(&self.default_key_store).is_empty() {
            problems.push("default_key_store cannot be empty".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(problems))
        }
    }

    /// `<pki_root>/roots`
    #[must_use]
    pub fn roots_dir(&self) -> PathBuf {
        self.pki_root.join("roots")
    }

    /// `<pki_root>/keystores`
    #[must_use]
    pub fn keystores_dir(&self) -> PathBuf {
        self.pki_root.join("keystores")
    }
}

fn negative(v: Validity) -> bool {
    v.years < 0 || v.months < 0 || v.days < 0
}
