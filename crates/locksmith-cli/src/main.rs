//! Locksmith CLI binary entrypoint.
//!
//! This is the main entry point for the `locksmith` command-line tool.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use locksmith_cli::cli::{Cli, Commands};
use locksmith_cli::commands::{
    CertCommand, CrlCommand, CsrCommand, IntermediateCommand, KeyCommand, KeystoreCommand,
    RootCommand,
};
use locksmith_cli::output::OutputFormat;
use locksmith_pki::Engine;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let mut stdout = io::stdout().lock();
    match run(cli, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run<W: Write>(cli: Cli, out: &mut W) -> Result<(), locksmith_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let config = cli.engine_config()?;
    debug!(pki_root = %config.pki_root.display(), "starting engine");
    let engine = Engine::new(config)?;

    match cli.command {
        Commands::Root { command } => RootCommand::new(&engine).execute(out, &format, &command),
        Commands::Intermediate { command } => {
            IntermediateCommand::new(&engine).execute(out, &format, &command)
        }
        Commands::Csr { command } => CsrCommand::new(&engine).execute(out, &format, &command),
        Commands::Cert { command } => CertCommand::new(&engine).execute(out, &format, &command),
        Commands::Crl { command } => CrlCommand::new(&engine).execute(out, &format, &command),
        Commands::Keystore { command } => {
            KeystoreCommand::new(&engine).execute(out, &format, &command)
        }
        Commands::Key { command } => KeyCommand::new(&engine).execute(out, &format, &command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locksmith_cli::CliError;

    fn run_in(root: &std::path::Path, args: &[&str]) -> (Result<(), CliError>, String) {
        let root = root.to_str().unwrap();
        let config = std::path::Path::new(root).join("locksmith.toml");
        std::fs::write(
            &config,
            format!("[locksmith]\npki_root = {root:?}\nkey_bits = 2048\n"),
        )
        .unwrap();
        let config = config.to_str().unwrap();
        let mut argv = vec!["locksmith", "--format", "json", "-c", config, "--pki-root", root];
        argv.extend_from_slice(args);
        let mut out = Vec::new();
        let result = run(Cli::parse_from(argv), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    fn json(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    const ROOT: &[&str] = &[
        "root", "create", "--cn", "Example Root", "--org", "Example Org", "--ou", "Sec",
        "--validity", "10,0,0",
    ];

    #[test]
    fn run_without_pki_root_fails() {
        let mut out = Vec::new();
        let mut cli = Cli::parse_from(["locksmith", "root", "list"]);
        cli.pki_root = None;
        cli.config = None;
        let err = run(cli, &mut out).unwrap_err();
        assert!(matches!(err, CliError::Engine(ref e) if e.status() == "cert-config-error"));
        assert!(out.is_empty());
    }

    #[test]
    fn root_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (result, text) = run_in(dir.path(), ROOT);
        result.unwrap();
        let response = json(&text);
        assert_eq!(response["status"], "root-created");
        assert_eq!(response["data"]["slug"], "example-root");

        let (result, text) = run_in(dir.path(), ROOT);
        assert!(matches!(result, Err(CliError::Failed { ref status, .. }) if status == "root-exists"));
        assert_eq!(json(&text)["success"], false);

        let (result, text) = run_in(dir.path(), &["root", "list"]);
        result.unwrap();
        assert_eq!(json(&text)["data"][0], "example-root");

        let (result, text) = run_in(dir.path(), &["crl", "show", "Example Root"]);
        result.unwrap();
        let crl = json(&text)["data"]["crl"].as_str().unwrap().to_string();
        assert!(crl.starts_with("-----BEGIN X509 CRL-----"));
    }

    #[test]
    fn incomplete_root_lists_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (result, text) = run_in(dir.path(), &["root", "create", "--cn", "Example Root"]);
        let Err(CliError::Failed { status, messages }) = result else {
            unreachable!("expected a failed response");
        };
        assert_eq!(status, "cert-config-error");
        assert_eq!(
            messages,
            [
                "Missing Organization field",
                "Missing OrganizationalUnit field",
                "Missing Expiration Date field",
            ]
        );
        assert_eq!(json(&text)["status"], "cert-config-error");
    }

    #[test]
    fn csr_and_issue() {
        let dir = tempfile::tempdir().unwrap();
        run_in(dir.path(), ROOT).0.unwrap();
        run_in(
            dir.path(),
            &[
                "csr", "create", "--ca", "example-root", "--cn", "www.example.test", "--org",
                "Example Org", "--ou", "Web", "--validity", "1,0,0", "--dns", "www.example.test",
            ],
        )
        .0
        .unwrap();

        let (result, text) = run_in(
            dir.path(),
            &["cert", "issue", "--ca", "example-root", "--stored", "certreqs/www-example-test"],
        );
        result.unwrap();
        let response = json(&text);
        assert_eq!(response["status"], "certificate-issued");
        assert_eq!(response["data"]["serial"], 2);

        let (result, text) = run_in(dir.path(), &["cert", "ledger", "example-root"]);
        result.unwrap();
        assert_eq!(json(&text)["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn key_pairs_in_default_store() {
        let dir = tempfile::tempdir().unwrap();
        let (result, text) = run_in(
            dir.path(),
            &["key", "create", "signer", "--passphrase", "pw", "--store-private-key"],
        );
        result.unwrap();
        assert!(json(&text)["data"]["private_key"].is_string());

        let (result, text) = run_in(dir.path(), &["key", "show", "signer", "--passphrase", "pw"]);
        result.unwrap();
        assert!(json(&text)["data"]["public_key"]
            .as_str()
            .unwrap()
            .starts_with("-----BEGIN PUBLIC KEY-----"));

        let (result, _) = run_in(dir.path(), &["key", "show", "signer", "--passphrase", "nope"]);
        assert!(matches!(
            result,
            Err(CliError::Failed { ref status, .. }) if status == "private-key-decryption-error"
        ));
    }
}
