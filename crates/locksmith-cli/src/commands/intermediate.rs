//! Intermediate CA command implementation.

use std::io::Write;

use locksmith_pki::{Engine, Response, api};

use crate::cli::IntermediateCommands;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for intermediate subcommands.
pub struct IntermediateCommand<'a> {
    engine: &'a Engine,
}

impl<'a> IntermediateCommand<'a> {
    /// Creates a new intermediate command handler.
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Executes the intermediate subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &IntermediateCommands,
    ) -> Result<(), CliError> {
        let response = match command {
            IntermediateCommands::Create {
                parent,
                parent_passphrase,
                subject,
            } => api::create_intermediate(
                self.engine,
                parent,
                &subject.to_configuration(),
                parent_passphrase,
            ),
            IntermediateCommands::List { parent } => {
                Response::from_result("ok", self.engine.list_intermediates(parent))
            }
        };
        format.report(out, response)
    }
}
