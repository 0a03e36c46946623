//! passvault - PIN-gated local passcode vault
//!
//! Flags (several may be combined; they run in this order):
//! - -c N: print N new passcodes
//! - -p PIN: set the session pin
//! - -s PIN: start a five minute session
//! - -e NAME: create/update the passcode of an environment
//! - -g NAME|all: show one environment's passcode, or all of them
//! - --status: show the session state
//!
//! --json switches -g output to a JSON object of name to passcode.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use passvault::error::kind;
use passvault::session::is_pin;
use passvault::{passcode, SessionState, Vault, VaultError};
use passvault_core::Config;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit statuses, one per failure class
mod exit {
    pub const OTHER: u8 = 1;
    pub const NO_ARGS: u8 = 3;
    pub const CREATE_NOT_NUMERIC: u8 = 4;
    pub const ENV_NOT_FOUND: u8 = 5;
    pub const PIN_MISMATCH: u8 = 6;
    pub const SESSION_EXPIRED: u8 = 7;
    pub const PIN_NOT_NUMERIC: u8 = 8;
    pub const SESSION_MISSING: u8 = 9;
    pub const PIN_MISSING: u8 = 10;
    pub const INVALID_ENV: u8 = 11;
    pub const KEY: u8 = 12;
    pub const CRYPTO: u8 = 13;
    pub const GENERATION: u8 = 14;
    pub const BACKUP_EXISTS: u8 = 15;
}

#[derive(Parser)]
#[command(name = "passvault")]
#[command(about = "PIN-gated local passcode vault - one generated passcode per environment")]
#[command(version)]
#[command(after_help = r#"GETTING STARTED:
    passvault -p 1234          set a session pin (once)
    passvault -s 1234          open a five minute session
    passvault -e prod          generate a passcode for "prod"
    passvault -g prod          show it again
    passvault -g all           show every environment and backup

STORAGE:
    All files live in the vault root (current directory by default):
    data.public/data.private keypair, session.pin, session, and data/<env>.
    Updating an environment keeps the old ciphertext as data/<env>.<timestamp>."#)]
struct Cli {
    /// Print N freshly generated passcodes
    #[arg(short = 'c', long = "create", value_name = "N")]
    create: Option<String>,

    /// Set the numeric session pin
    #[arg(short = 'p', long = "pin", value_name = "PIN")]
    pin: Option<String>,

    /// Start a session with the pin
    #[arg(short = 's', long = "session", value_name = "PIN")]
    session: Option<String>,

    /// Create or update the passcode of an environment
    #[arg(short = 'e', long = "environment", value_name = "NAME")]
    environment: Option<String>,

    /// Show the passcode of an environment, or "all"
    #[arg(short = 'g', long = "get", value_name = "NAME|all")]
    get: Option<String>,

    /// Print -g results as JSON
    #[arg(long)]
    json: bool,

    /// Show whether a session is open
    #[arg(long)]
    status: bool,

    /// Vault root directory (overrides the config file)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Config file (default ~/.config/passvault/config.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn has_action(&self) -> bool {
        self.create.is_some()
            || self.pin.is_some()
            || self.session.is_some()
            || self.environment.is_some()
            || self.get.is_some()
            || self.status
    }

    fn needs_vault(&self) -> bool {
        self.pin.is_some()
            || self.session.is_some()
            || self.environment.is_some()
            || self.get.is_some()
            || self.status
    }
}

/// Which flag was running when something failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Config,
    Create,
    Pin,
    Session,
    Environment,
    Get,
    Status,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.has_action() {
        print_usage();
        return ExitCode::from(exit::NO_ARGS);
    }

    let result = run(&cli, &mut io::stdout(), &mut io::stderr());
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err((step, err)) => {
            eprintln!("ERROR: {:#}", err);
            print_usage();
            ExitCode::from(exit_code(step, &err))
        }
    }
}

/// Run every requested flag in order; results go to `out`, notes to `err`
fn run(
    cli: &Cli,
    out: &mut impl Write,
    err: &mut impl Write,
) -> std::result::Result<(), (Step, anyhow::Error)> {
    if let Some(count) = &cli.create {
        cmd_create(count, out).map_err(|e| (Step::Create, e))?;
    }

    if !cli.needs_vault() {
        return Ok(());
    }

    let vault = open_vault(cli).map_err(|e| (Step::Config, e))?;

    if let Some(pin) = &cli.pin {
        cmd_pin(&vault, pin, out).map_err(|e| (Step::Pin, e))?;
    }
    if let Some(pin) = &cli.session {
        cmd_session(&vault, pin, out).map_err(|e| (Step::Session, e))?;
    }
    if let Some(environment) = &cli.environment {
        cmd_environment(&vault, environment, out).map_err(|e| (Step::Environment, e))?;
    }
    if let Some(environment) = &cli.get {
        cmd_get(&vault, environment, cli.json, out, err).map_err(|e| (Step::Get, e))?;
    }
    if cli.status {
        cmd_status(&vault, out).map_err(|e| (Step::Status, e))?;
    }

    Ok(())
}

fn open_vault(cli: &Cli) -> Result<Vault> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(root) = &cli.root {
        config = config.with_root(root);
    }
    tracing::debug!(root = %config.root.display(), "opening vault");
    Ok(Vault::new(&config))
}

fn exit_code(step: Step, err: &anyhow::Error) -> u8 {
    match kind(err) {
        Some(VaultError::InvalidArgument(_)) if step == Step::Create => exit::CREATE_NOT_NUMERIC,
        Some(VaultError::InvalidArgument(_)) if step == Step::Pin => exit::PIN_NOT_NUMERIC,
        Some(VaultError::InvalidArgument(_)) => exit::OTHER,
        Some(VaultError::EnvironmentNotFound(_)) => exit::ENV_NOT_FOUND,
        Some(VaultError::PinMismatch) => exit::PIN_MISMATCH,
        Some(VaultError::SessionExpired(_)) => exit::SESSION_EXPIRED,
        Some(VaultError::SessionMissing) => exit::SESSION_MISSING,
        Some(VaultError::SessionPinMissing) => exit::PIN_MISSING,
        Some(VaultError::InvalidEnvironment(_)) => exit::INVALID_ENV,
        Some(VaultError::KeyLoad(_)) | Some(VaultError::KeyWrite(_)) => exit::KEY,
        Some(VaultError::Encryption(_)) | Some(VaultError::Decryption(_)) => exit::CRYPTO,
        Some(VaultError::GenerationExhausted(_)) => exit::GENERATION,
        Some(VaultError::BackupExists(_)) => exit::BACKUP_EXISTS,
        None => exit::OTHER,
    }
}

fn print_usage() {
    eprintln!();
    eprintln!("{}", Cli::command().render_usage());
    eprintln!("Create a session pin (-p) before first use. See --help for details.");
}

/// Print new passcodes without touching the vault
fn cmd_create(count: &str, out: &mut impl Write) -> Result<()> {
    let count: usize = match count.parse() {
        Ok(n) if is_pin(count) => n,
        _ => anyhow::bail!(VaultError::InvalidArgument(
            "option -c requires a numeric argument, ie number of passcodes to create".to_string()
        )),
    };

    for code in passcode::generate_many(count)? {
        writeln!(out, "{}", code)?;
    }
    Ok(())
}

fn cmd_pin(vault: &Vault, pin: &str, out: &mut impl Write) -> Result<()> {
    vault.set_pin(pin)?;
    writeln!(out, "success: Session pin set")?;
    Ok(())
}

fn cmd_session(vault: &Vault, pin: &str, out: &mut impl Write) -> Result<()> {
    let expires = vault.start_session(pin)?;
    writeln!(out, "success: Session open until {}", expires)?;
    Ok(())
}

fn cmd_environment(vault: &Vault, environment: &str, out: &mut impl Write) -> Result<()> {
    let updated = vault.set_secret(environment)?;

    if let Some(backup) = &updated.backup {
        writeln!(out, "Creating a backup: {}", backup.display())?;
    }
    writeln!(out, "{}", updated.passcode)?;
    Ok(())
}

fn cmd_get(
    vault: &Vault,
    environment: &str,
    json: bool,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    let secrets = if environment == "all" {
        let listing = vault.get_all()?;
        for name in &listing.skipped {
            writeln!(err, "WARNING: skipped {}: cannot be decrypted with this vault's key", name)?;
        }
        listing.secrets
    } else {
        vec![(environment.to_string(), vault.get_secret(environment)?)]
    };

    if json {
        let map: BTreeMap<String, String> = secrets.into_iter().collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&map)?)?;
        return Ok(());
    }

    if environment == "all" {
        if secrets.is_empty() {
            writeln!(err, "No environments stored. Add one with: passvault -e <name>")?;
        }
        for (name, value) in secrets {
            writeln!(out, "****** {} ******\t{}", name, value)?;
        }
        return Ok(());
    }

    for (_, value) in secrets {
        writeln!(out, "{}", value)?;
    }
    Ok(())
}

fn cmd_status(vault: &Vault, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Vault: {}", vault.root().display())?;
    match vault.session_state()? {
        SessionState::NoPinSet => writeln!(out, "Session: no pin set (see option -p)")?,
        SessionState::PinSet => writeln!(out, "Session: none started (see option -s)")?,
        SessionState::Active { expires } => writeln!(out, "Session: open until {}", expires)?,
        SessionState::Expired { expired_at } => {
            writeln!(out, "Session: timed out at {}", expired_at)?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    type Outcome = std::result::Result<(), (Step, anyhow::Error)>;

    /// Run the CLI against a vault under `dir` with small keys
    fn invoke(dir: &TempDir, args: &[&str]) -> (Outcome, String, String) {
        let config = dir.path().join("config.yaml");
        if !config.exists() {
            fs::write(&config, "key_bits: 512\n").unwrap();
        }
        let root = dir.path().join("vault");

        let mut argv = vec![
            "passvault".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "--root".to_string(),
            root.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        let cli = Cli::try_parse_from(argv).unwrap();

        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = run(&cli, &mut out, &mut err);
        (
            outcome,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn failure(outcome: Outcome) -> (Step, u8) {
        let (step, err) = outcome.err().unwrap();
        (step, exit_code(step, &err))
    }

    #[test]
    fn test_run_environment_output_matches_get() {
        let dir = TempDir::new().unwrap();
        let (outcome, out, _) = invoke(&dir, &["-p", "1234", "-s", "1234", "-e", "ENV1"]);
        assert!(outcome.is_ok());

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3, "{}", out);
        assert_eq!(lines[0], "success: Session pin set");
        assert!(lines[1].starts_with("success: Session open until "));
        let created = lines[2];
        assert!(passcode::is_valid(created));

        let (outcome, out, _) = invoke(&dir, &["-g", "ENV1"]);
        assert!(outcome.is_ok());
        assert_eq!(out, format!("{}\n", created));

        // Update prints the backup first, then the new passcode
        let (outcome, out, _) = invoke(&dir, &["-e", "ENV1"]);
        assert!(outcome.is_ok());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2, "{}", out);
        assert!(lines[0].starts_with("Creating a backup: "));
        let (_, got, _) = invoke(&dir, &["-g", "ENV1"]);
        assert_eq!(got, format!("{}\n", lines[1]));
    }

    #[test]
    fn test_run_maps_failures_to_exit_codes() {
        let dir = TempDir::new().unwrap();

        let (outcome, _, _) = invoke(&dir, &["-s", "1234"]);
        assert_eq!(failure(outcome), (Step::Session, exit::PIN_MISSING));

        let (outcome, _, _) = invoke(&dir, &["-p", "12a4"]);
        assert_eq!(failure(outcome), (Step::Pin, exit::PIN_NOT_NUMERIC));

        let (outcome, _, _) = invoke(&dir, &["-c", "x"]);
        assert_eq!(failure(outcome), (Step::Create, exit::CREATE_NOT_NUMERIC));

        assert!(invoke(&dir, &["-p", "1234"]).0.is_ok());
        let (outcome, _, _) = invoke(&dir, &["-g", "ENV1"]);
        assert_eq!(failure(outcome), (Step::Get, exit::SESSION_MISSING));

        let (outcome, _, _) = invoke(&dir, &["-s", "9999"]);
        assert_eq!(failure(outcome), (Step::Session, exit::PIN_MISMATCH));

        assert!(invoke(&dir, &["-s", "1234"]).0.is_ok());
        let (outcome, _, _) = invoke(&dir, &["-g", "ENV1"]);
        assert_eq!(failure(outcome), (Step::Get, exit::ENV_NOT_FOUND));

        let (outcome, _, _) = invoke(&dir, &["-e", "../session"]);
        assert_eq!(failure(outcome), (Step::Environment, exit::INVALID_ENV));
    }

    #[test]
    fn test_run_get_all_reports_skipped_files() {
        let dir = TempDir::new().unwrap();
        let (outcome, out, _) = invoke(&dir, &["-p", "1234", "-s", "1234", "-e", "ENV1"]);
        assert!(outcome.is_ok());
        let created = out.lines().last().unwrap().to_string();
        fs::write(dir.path().join("vault").join("data").join("junk"), b"garbage").unwrap();

        let (outcome, out, err) = invoke(&dir, &["-g", "all"]);
        assert!(outcome.is_ok());
        assert_eq!(out, format!("****** ENV1 ******\t{}\n", created));
        assert!(err.contains("skipped junk"), "{}", err);
    }

    #[test]
    fn test_run_create_prints_count() {
        let dir = TempDir::new().unwrap();
        let (outcome, out, _) = invoke(&dir, &["-c", "3"]);
        assert!(outcome.is_ok());
        let codes: Vec<&str> = out.lines().collect();
        assert_eq!(codes.len(), 3);
        assert!(codes.iter().all(|c| passcode::is_valid(c)));
        // -c alone never opens the vault
        assert!(!dir.path().join("vault").exists());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::try_parse_from(["passvault", "-c", "3"]).unwrap();
        assert_eq!(cli.create.as_deref(), Some("3"));
        assert!(!cli.needs_vault());

        let cli = Cli::try_parse_from(["passvault", "-p", "1234", "-s", "1234", "-e", "ENV1"]).unwrap();
        assert_eq!(cli.pin.as_deref(), Some("1234"));
        assert_eq!(cli.session.as_deref(), Some("1234"));
        assert_eq!(cli.environment.as_deref(), Some("ENV1"));
        assert!(cli.needs_vault());

        let cli = Cli::try_parse_from(["passvault", "-g", "all"]).unwrap();
        assert_eq!(cli.get.as_deref(), Some("all"));
    }

    #[test]
    fn test_cli_long_flags() {
        let cli = Cli::try_parse_from([
            "passvault",
            "--create",
            "2",
            "--pin",
            "42",
            "--session",
            "42",
            "--environment",
            "prod",
            "--get",
            "prod",
            "--status",
            "--json",
            "--root",
            "/tmp/vault",
        ])
        .unwrap();
        assert_eq!(cli.create.as_deref(), Some("2"));
        assert_eq!(cli.get.as_deref(), Some("prod"));
        assert!(cli.status);
        assert!(cli.json);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/vault")));
    }

    #[test]
    fn test_cli_no_flags() {
        let cli = Cli::try_parse_from(["passvault"]).unwrap();
        assert!(!cli.has_action());
    }

    #[test]
    fn test_cli_rejects_unknown_and_missing_values() {
        assert!(Cli::try_parse_from(["passvault", "-x"]).is_err());
        assert!(Cli::try_parse_from(["passvault", "-c"]).is_err());
        // --help exits through an error value
        assert!(Cli::try_parse_from(["passvault", "--help"]).is_err());
    }

    #[test]
    fn test_create_requires_number() {
        for bad in ["", "three", "-1", "1.5"] {
            let err = cmd_create(bad, &mut Vec::<u8>::new()).err().unwrap();
            assert_eq!(exit_code(Step::Create, &err), exit::CREATE_NOT_NUMERIC, "{:?}", bad);
        }
        assert!(cmd_create("0", &mut Vec::<u8>::new()).is_ok());
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            exit_code(Step::Create, &VaultError::InvalidArgument(String::new()).into()),
            exit_code(Step::Pin, &VaultError::InvalidArgument(String::new()).into()),
            exit_code(Step::Get, &VaultError::EnvironmentNotFound(String::new()).into()),
            exit_code(Step::Session, &VaultError::PinMismatch.into()),
            exit_code(Step::Get, &VaultError::SessionExpired(String::new()).into()),
            exit_code(Step::Get, &VaultError::SessionMissing.into()),
            exit_code(Step::Session, &VaultError::SessionPinMissing.into()),
            exit_code(Step::Get, &VaultError::InvalidEnvironment(String::new()).into()),
            exit_code(Step::Pin, &VaultError::KeyLoad(String::new()).into()),
            exit_code(Step::Get, &VaultError::Decryption(String::new()).into()),
            exit_code(Step::Create, &VaultError::GenerationExhausted(1).into()),
            exit_code(Step::Environment, &VaultError::BackupExists(String::new()).into()),
            exit_code(Step::Config, &anyhow::anyhow!("bad config")),
            exit::NO_ARGS,
        ];

        let mut unique = codes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
        // clap uses 2 for malformed flags
        assert!(!codes.contains(&2));
    }
}
