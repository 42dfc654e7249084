//! Key store command implementation.

use std::io::Write;

use locksmith_pki::{Engine, Response};

use crate::cli::KeystoreCommands;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for key store subcommands.
pub struct KeystoreCommand<'a> {
    engine: &'a Engine,
}

impl<'a> KeystoreCommand<'a> {
    /// Creates a new key store command handler.
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Executes the key store subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &KeystoreCommands,
    ) -> Result<(), CliError> {
        let response = match command {
            KeystoreCommands::Create { name } => {
                Response::from_result("key-store-created", self.engine.create_key_store(name))
            }
            KeystoreCommands::List => Response::from_result("ok", self.engine.list_key_stores()),
        };
        format.report(out, response)
    }
}
