//! Root CA command implementation.

use std::io::Write;

use locksmith_pki::{Engine, PemEncoding, Response, api};

use crate::cli::RootCommands;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for root subcommands.
pub struct RootCommand<'a> {
    engine: &'a Engine,
}

impl<'a> RootCommand<'a> {
    /// Creates a new root command handler.
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Executes the root subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &RootCommands,
    ) -> Result<(), CliError> {
        let response = match command {
            RootCommands::Create(args) => api::create_root(self.engine, &args.to_configuration()),
            RootCommands::List => Response::from_result("ok", self.engine.list_roots()),
            RootCommands::Show { path, base64 } => {
                api::read_ca_certificate(self.engine, path, encoding(*base64))
            }
        };
        format.report(out, response)
    }
}

/// PEM encoding selected by a `--base64` flag.
pub(crate) const fn encoding(base64: bool) -> PemEncoding {
    if base64 { PemEncoding::Base64 } else { PemEncoding::Pem }
}
