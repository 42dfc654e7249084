//! CRL command implementation.

use std::io::Write;

use locksmith_pki::{Engine, Response, api};
use serde_json::json;

use crate::cli::CrlCommands;
use crate::commands::root::encoding;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for CRL subcommands.
pub struct CrlCommand<'a> {
    engine: &'a Engine,
}

impl<'a> CrlCommand<'a> {
    /// Creates a new CRL command handler.
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Executes the CRL subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &CrlCommands,
    ) -> Result<(), CliError> {
        let response = match command {
            CrlCommands::Show { ca, base64 } => api::read_crl(self.engine, ca, encoding(*base64)),
            CrlCommands::Renew { ca, passphrase } => Response::from_result(
                "crl-renewed",
                self.engine
                    .renew_crl(ca, passphrase)
                    .map(|pem| json!({ "crl": pem })),
            ),
        };
        format.report(out, response)
    }
}
