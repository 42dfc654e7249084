//! Key pair command implementation.
//!
//! Private keys are printed only by `key create` and `key show`; they never
//! reach the log.

use std::io::Write;

use locksmith_pki::{Engine, Response, StoredKeyPair};
use serde::Serialize;

use crate::cli::KeyCommands;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for key pair subcommands.
pub struct KeyCommand<'a> {
    engine: &'a Engine,
}

/// Printable form of a key pair.
#[derive(Debug, Serialize)]
struct KeyPairView {
    id: String,
    public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
}

impl From<StoredKeyPair> for KeyPairView {
    fn from(pair: StoredKeyPair) -> Self {
        Self {
            private_key: pair.private_key_pem.as_deref().cloned(),
            id: pair.id,
            public_key: pair.public_key_pem,
        }
    }
}

impl<'a> KeyCommand<'a> {
    /// Creates a new key pair command handler.
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Executes the key pair subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &KeyCommands,
    ) -> Result<(), CliError> {
        let response = match command {
            KeyCommands::Create {
                id,
                store,
                passphrase,
                store_private_key,
            } => Response::from_result(
                "key-pair-created",
                self.engine
                    .create_key_pair(store.as_deref(), id, passphrase, *store_private_key)
                    .map(KeyPairView::from),
            ),
            KeyCommands::List { store } => {
                Response::from_result("ok", self.engine.list_key_pairs(store.as_deref()))
            }
            KeyCommands::Show {
                id,
                store,
                passphrase,
            } => Response::from_result(
                "ok",
                self.engine
                    .read_key_pair(store.as_deref(), id, passphrase)
                    .map(KeyPairView::from),
            ),
        };
        format.report(out, response)
    }
}
