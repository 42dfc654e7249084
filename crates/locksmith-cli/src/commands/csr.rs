//! CSR command implementation.

use std::io::Write;

use locksmith_pki::{Engine, Response, api};

use crate::cli::CsrCommands;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for CSR subcommands.
pub struct CsrCommand<'a> {
    engine: &'a Engine,
}

impl<'a> CsrCommand<'a> {
    /// Creates a new CSR command handler.
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Executes the CSR subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &CsrCommands,
    ) -> Result<(), CliError> {
        let response = match command {
            CsrCommands::Create { ca, is_ca, subject } => {
                api::create_csr(self.engine, ca, &subject.to_configuration(), *is_ca)
            }
            CsrCommands::List { ca } => Response::from_result("ok", self.engine.list_requests(ca)),
            CsrCommands::Show { ca, id } => {
                Response::from_result("ok", self.engine.read_request(ca, id))
            }
        };
        format.report(out, response)
    }
}
