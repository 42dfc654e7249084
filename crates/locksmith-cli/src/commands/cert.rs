//! Certificate command implementation.

use std::io::Write;
use std::path::Path;

use locksmith_pki::{CsrSource, Engine, Response, api};

use crate::cli::CertCommands;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for certificate subcommands.
pub struct CertCommand<'a> {
    engine: &'a Engine,
}

impl<'a> CertCommand<'a> {
    /// Creates a new certificate command handler.
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Executes the certificate subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the request file cannot be read or the command fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &CertCommands,
    ) -> Result<(), CliError> {
        let response = match command {
            CertCommands::Issue {
                ca,
                passphrase,
                csr_file,
                stored,
                from,
            } => {
                let source = source(ca, csr_file.as_deref(), stored.as_deref(), from.as_deref())?;
                api::issue_certificate(self.engine, ca, passphrase, &source)
            }
            CertCommands::List { ca } => {
                Response::from_result("ok", self.engine.list_certificates(ca))
            }
            CertCommands::Show { ca, id } => {
                Response::from_result("ok", self.engine.read_certificate(ca, id))
            }
            CertCommands::Ledger { ca } => {
                Response::from_result("ok", self.engine.ledger_entries(ca))
            }
        };
        format.report(out, response)
    }
}

fn source(
    signer: &str,
    csr_file: Option<&Path>,
    stored: Option<&str>,
    from: Option<&str>,
) -> Result<CsrSource, CliError> {
    match (csr_file, stored) {
        (Some(path), _) => Ok(CsrSource::Pem(std::fs::read_to_string(path)?)),
        (None, Some(target)) => Ok(CsrSource::Stored {
            ca_path: from.unwrap_or(signer).to_string(),
            target: target.to_string(),
        }),
        (None, None) => Err(CliError::Config(
            "either --csr-file or --stored is required".into(),
        )),
    }
}
