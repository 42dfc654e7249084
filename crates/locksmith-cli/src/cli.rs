//! Command-line argument parsing with clap.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use locksmith_pki::{CertificateConfiguration, EngineConfig, SanData, Subject};

use crate::error::CliError;

/// Locksmith - file-backed certificate authorities.
#[derive(Parser, Debug, Clone)]
#[command(name = "locksmith")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (TOML with a `[locksmith]` table).
    #[arg(short, long, env = "LOCKSMITH_CONFIG")]
    pub config: Option<PathBuf>,

    /// PKI root directory, overriding the configuration file.
    #[arg(short = 'r', long, env = "LOCKSMITH_PKI_ROOT")]
    pub pki_root: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Engine settings from `--config`, with `--pki-root` applied on top.
    ///
    /// Without a configuration file the defaults are used, so `--pki-root`
    /// alone is enough.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn engine_config(&self) -> Result<EngineConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)
                .map_err(|e| CliError::Config(e.to_string()))?,
            None => EngineConfig::default(),
        };
        if let Some(root) = &self.pki_root {
            config.pki_root.clone_from(root);
        }
        Ok(config)
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Root certificate authorities.
    Root {
        /// Root subcommand to execute.
        #[command(subcommand)]
        command: RootCommands,
    },

    /// Intermediate certificate authorities.
    Intermediate {
        /// Intermediate subcommand to execute.
        #[command(subcommand)]
        command: IntermediateCommands,
    },

    /// Certificate signing requests held by a CA.
    Csr {
        /// CSR subcommand to execute.
        #[command(subcommand)]
        command: CsrCommands,
    },

    /// Certificates issued by a CA.
    Cert {
        /// Certificate subcommand to execute.
        #[command(subcommand)]
        command: CertCommands,
    },

    /// Certificate revocation lists.
    Crl {
        /// CRL subcommand to execute.
        #[command(subcommand)]
        command: CrlCommands,
    },

    /// Key stores.
    Keystore {
        /// Key store subcommand to execute.
        #[command(subcommand)]
        command: KeystoreCommands,
    },

    /// Key pairs inside a key store.
    Key {
        /// Key subcommand to execute.
        #[command(subcommand)]
        command: KeyCommands,
    },
}

/// Subject, validity, key and SAN options shared by every creation command.
#[derive(Args, Debug, Clone, Default)]
pub struct SubjectArgs {
    /// Common name.
    #[arg(long = "cn")]
    pub common_name: String,

    /// Organization (repeatable).
    #[arg(long = "org")]
    pub organization: Vec<String>,

    /// Organizational unit (repeatable).
    #[arg(long = "ou")]
    pub organizational_unit: Vec<String>,

    /// Country (repeatable).
    #[arg(long)]
    pub country: Vec<String>,

    /// State or province (repeatable).
    #[arg(long)]
    pub province: Vec<String>,

    /// Locality (repeatable).
    #[arg(long)]
    pub locality: Vec<String>,

    /// Street address (repeatable).
    #[arg(long = "street")]
    pub street_address: Vec<String>,

    /// Postal code (repeatable).
    #[arg(long)]
    pub postal_code: Vec<String>,

    /// Validity offset as YEARS,MONTHS,DAYS.
    #[arg(long, value_delimiter = ',', num_args = 1)]
    pub validity: Vec<i32>,

    /// Passphrase protecting the generated private key.
    #[arg(long, env = "LOCKSMITH_KEY_PASSPHRASE", default_value = "", hide_env_values = true)]
    pub passphrase: String,

    /// DNS subject alternative name (repeatable).
    #[arg(long = "dns")]
    pub dns_names: Vec<String>,

    /// Email subject alternative name (repeatable).
    #[arg(long = "email")]
    pub email_addresses: Vec<String>,

    /// IP subject alternative name (repeatable).
    #[arg(long = "ip")]
    pub ip_addresses: Vec<IpAddr>,

    /// URI subject alternative name (repeatable).
    #[arg(long = "uri")]
    pub uris: Vec<String>,
}

impl SubjectArgs {
    /// The engine request these options describe.
    #[must_use]
    pub fn to_configuration(&self) -> CertificateConfiguration {
        CertificateConfiguration {
            subject: Subject {
                organization: self.organization.clone(),
                organizational_unit: self.organizational_unit.clone(),
                country: self.country.clone(),
                province: self.province.clone(),
                locality: self.locality.clone(),
                street_address: self.street_address.clone(),
                postal_code: self.postal_code.clone(),
                ..Subject::new(self.common_name.as_str())
            },
            expiration_date: self.validity.clone(),
            rsa_private_key_passphrase: self.passphrase.clone(),
            san_data: SanData {
                dns_names: self.dns_names.clone(),
                email_addresses: self.email_addresses.clone(),
                ip_addresses: self.ip_addresses.clone(),
                uris: self.uris.clone(),
            },
        }
    }
}

/// Root CA subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum RootCommands {
    /// Create a self-signed root CA.
    Create(SubjectArgs),

    /// List root CAs.
    List,

    /// Print the certificate of a CA.
    Show {
        /// CA chain, e.g. "Example Root" or "example-root/example-ica".
        path: String,

        /// Wrap the PEM in base64.
        #[arg(long)]
        base64: bool,
    },
}

/// Intermediate CA subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum IntermediateCommands {
    /// Create an intermediate CA signed by its parent.
    Create {
        /// Chain of the parent CA.
        #[arg(long)]
        parent: String,

        /// Passphrase of the parent's private key.
        #[arg(long, env = "LOCKSMITH_PARENT_PASSPHRASE", default_value = "", hide_env_values = true)]
        parent_passphrase: String,

        /// Subject and key options of the new CA.
        #[command(flatten)]
        subject: SubjectArgs,
    },

    /// List the direct children of a CA.
    List {
        /// Chain of the parent CA.
        parent: String,
    },
}

/// CSR subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum CsrCommands {
    /// Generate a key and a request stored in a CA's `certreqs/`.
    Create {
        /// Chain of the CA that will hold the request.
        #[arg(long)]
        ca: String,

        /// Request CA constraints.
        #[arg(long)]
        is_ca: bool,

        /// Subject and key options of the request.
        #[command(flatten)]
        subject: SubjectArgs,
    },

    /// List requests held by a CA.
    List {
        /// Chain of the CA.
        ca: String,
    },

    /// Show a request held by a CA.
    Show {
        /// Chain of the CA.
        ca: String,
        /// Request slug.
        id: String,
    },
}

/// Certificate subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum CertCommands {
    /// Issue a certificate from a request.
    Issue {
        /// Chain of the signing CA.
        #[arg(long)]
        ca: String,

        /// Passphrase of the signing CA's private key.
        #[arg(long, env = "LOCKSMITH_CA_PASSPHRASE", default_value = "", hide_env_values = true)]
        passphrase: String,

        /// File holding the PEM (or base64 PEM) request.
        #[arg(long, conflicts_with = "stored", required_unless_present = "stored")]
        csr_file: Option<PathBuf>,

        /// Stored request as `certreqs/<id>`.
        #[arg(long)]
        stored: Option<String>,

        /// Chain of the CA holding the stored request. Defaults to the signer.
        #[arg(long, requires = "stored")]
        from: Option<String>,
    },

    /// List certificates issued by a CA.
    List {
        /// Chain of the CA.
        ca: String,
    },

    /// Show a certificate issued by a CA.
    Show {
        /// Chain of the CA.
        ca: String,
        /// Certificate slug.
        id: String,
    },

    /// Print the issuance ledger of a CA.
    Ledger {
        /// Chain of the CA.
        ca: String,
    },
}

/// CRL subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum CrlCommands {
    /// Print the revocation list of a CA.
    Show {
        /// Chain of the CA.
        ca: String,

        /// Wrap the PEM in base64.
        #[arg(long)]
        base64: bool,
    },

    /// Rebuild the revocation list of a CA.
    Renew {
        /// Chain of the CA.
        ca: String,

        /// Passphrase of the CA's private key.
        #[arg(long, env = "LOCKSMITH_CA_PASSPHRASE", default_value = "", hide_env_values = true)]
        passphrase: String,
    },
}

/// Key store subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum KeystoreCommands {
    /// Create a key store.
    Create {
        /// Store name.
        name: String,
    },

    /// List key stores.
    List,
}

/// Key pair subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum KeyCommands {
    /// Generate a key pair.
    Create {
        /// Key name.
        id: String,

        /// Key store, defaults to the configured one.
        #[arg(long)]
        store: Option<String>,

        /// Passphrase protecting the stored private key.
        #[arg(long, env = "LOCKSMITH_KEY_PASSPHRASE", default_value = "", hide_env_values = true)]
        passphrase: String,

        /// Keep the private key in the store.
        #[arg(long)]
        store_private_key: bool,
    },

    /// List key pairs.
    List {
        /// Key store, defaults to the configured one.
        #[arg(long)]
        store: Option<String>,
    },

    /// Show a key pair.
    Show {
        /// Key name.
        id: String,

        /// Key store, defaults to the configured one.
        #[arg(long)]
        store: Option<String>,

        /// Passphrase of the stored private key.
        #[arg(long, env = "LOCKSMITH_KEY_PASSPHRASE", default_value = "", hide_env_values = true)]
        passphrase: String,
    },
}
