//! nevr-env CLI — operational tooling over the core.
//!
//! Usage:
//!   nevr-env keygen
//!   nevr-env push|pull|diff|sync [--file <env>] [--key <key>]
//!   nevr-env scan [<dir>] [--no-redact] [--exclude <substring>]...
//!   nevr-env audit verify|summary|export [--format json|csv|text]
//!   nevr-env rotation status [--file <path>]
//!   nevr-env hook
//!
//! Exit code 0 means success/clean; 1 means failure or findings present.

use std::path::PathBuf;
use std::process::ExitCode;

use crate::audit::{AuditLog, ExportFormat, AUDIT_FILE};
use crate::key;
use crate::rotation::{RotationFile, ROTATION_FILE};
use crate::scanner::{self, ScanOptions, PRE_COMMIT_HOOK};
use crate::store::VaultStore;
use crate::vault::VAULT_FILE;

type CmdResult = Result<ExitCode, Box<dyn std::error::Error>>;

pub fn run() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "keygen" => cmd_keygen(&args[2..]),
        "push" => cmd_vault(VaultOp::Push, &args[2..]),
        "pull" => cmd_vault(VaultOp::Pull, &args[2..]),
        "diff" => cmd_vault(VaultOp::Diff, &args[2..]),
        "sync" => cmd_vault(VaultOp::Sync, &args[2..]),
        "scan" => cmd_scan(&args[2..]),
        "audit" => cmd_audit(&args[2..]),
        "rotation" => cmd_rotation(&args[2..]),
        "hook" => {
            print!("{}", PRE_COMMIT_HOOK);
            Ok(ExitCode::SUCCESS)
        }
        "--help" | "-h" => {
            print_usage();
            Ok(ExitCode::SUCCESS)
        }
        "--version" | "-V" => {
            println!("nevr-env {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        cmd => {
            eprintln!("error: unknown command '{}'", cmd);
            print_usage();
            Err("unknown command".into())
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!(
        r#"nevr-env — encrypted, auditable environment management

USAGE:
    nevr-env <COMMAND> [OPTIONS]

COMMANDS:
    keygen      Generate a new encryption key
    push        Encrypt the env file into the vault
    pull        Decrypt the vault over the env file
    diff        Compare vault and env file by key name
    sync        Union-merge vault and env file (local wins)
    scan        Scan a directory tree for committed secrets
    audit       Inspect the audit chain (verify | summary | export)
    rotation    Show secret rotation status
    hook        Print the git pre-commit hook snippet

OPTIONS (vault commands):
    --file <path>    Env file (default .env)
    --key <key>      Encryption key (default $NEVR_ENV_KEY)
    --vault <path>   Vault file (default {vault})
    --audit <path>   Audit log (default {audit})

EXAMPLES:
    nevr-env keygen
    NEVR_ENV_KEY=nevr_... nevr-env push
    nevr-env scan . --exclude fixtures
    nevr-env audit verify

Exit code 1 signals failure or findings (secrets found, differences
present, invalid chain)."#,
        vault = VAULT_FILE,
        audit = AUDIT_FILE,
    );
}

// ---------------------------------------------------------------------------
// keygen
// ---------------------------------------------------------------------------

fn cmd_keygen(args: &[String]) -> CmdResult {
    if !args.is_empty() {
        return Err(format!("unknown option: {}", args[0]).into());
    }

    let new_key = key::generate_key();
    println!("{}", new_key);

    // Record generation when a log already exists; keygen alone should not
    // seed an audit file into an arbitrary directory.
    let audit_path = PathBuf::from(AUDIT_FILE);
    if audit_path.exists() {
        let log = AuditLog::new(audit_path);
        if let Err(e) = log.record(crate::audit::AuditAction::KeyGenerate, crate::audit::Target::key()) {
            tracing::warn!(error = %e, "audit append failed");
        }
    }

    eprintln!();
    eprintln!("Store this key in your team's secret manager.");
    eprintln!("It never leaves this machine and cannot be recovered.");
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// push / pull / diff / sync
// ---------------------------------------------------------------------------

enum VaultOp {
    Push,
    Pull,
    Diff,
    Sync,
}

fn cmd_vault(op: VaultOp, args: &[String]) -> CmdResult {
    let mut env_path = PathBuf::from(".env");
    let mut vault_path = PathBuf::from(VAULT_FILE);
    let mut audit_path = PathBuf::from(AUDIT_FILE);
    let mut passphrase: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--file" | "-f" => {
                i += 1;
                env_path = PathBuf::from(args.get(i).ok_or("missing file path")?);
            }
            "--key" | "-k" => {
                i += 1;
                passphrase = Some(args.get(i).ok_or("missing key")?.clone());
            }
            "--vault" => {
                i += 1;
                vault_path = PathBuf::from(args.get(i).ok_or("missing vault path")?);
            }
            "--audit" => {
                i += 1;
                audit_path = PathBuf::from(args.get(i).ok_or("missing audit path")?);
            }
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }

    let passphrase = match passphrase.or_else(|| std::env::var("NEVR_ENV_KEY").ok()) {
        Some(k) => k,
        None => return Err("missing key: pass --key or set NEVR_ENV_KEY".into()),
    };

    let store = VaultStore::new(vault_path, audit_path);
    match op {
        VaultOp::Push => {
            let vault_file = store.push(&env_path, &passphrase)?;
            eprintln!(
                "Pushed {} variables -> {}",
                vault_file.metadata.variables,
                store.vault_path().display()
            );
            Ok(ExitCode::SUCCESS)
        }
        VaultOp::Pull => {
            let mapping = store.pull(&env_path, &passphrase)?;
            eprintln!("Pulled {} variables -> {}", mapping.len(), env_path.display());
            Ok(ExitCode::SUCCESS)
        }
        VaultOp::Diff => {
            let diff = store.diff(&env_path, &passphrase)?;
            for k in &diff.added {
                println!("+ {}", k);
            }
            for k in &diff.removed {
                println!("- {}", k);
            }
            for k in &diff.changed {
                println!("~ {}", k);
            }
            if diff.is_empty() {
                eprintln!("Vault and {} are in sync", env_path.display());
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(1))
            }
        }
        VaultOp::Sync => {
            let outcome = store.sync(&env_path, &passphrase)?;
            eprintln!(
                "Synced: {} pulled from vault, {} pushed to vault",
                outcome.pulled.len(),
                outcome.pushed.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

fn cmd_scan(args: &[String]) -> CmdResult {
    let mut root = PathBuf::from(".");
    let mut options = ScanOptions::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--no-redact" => options.redact = false,
            "--exclude" | "-e" => {
                i += 1;
                options.exclude.push(args.get(i).ok_or("missing exclusion")?.clone());
            }
            arg if !arg.starts_with('-') => root = PathBuf::from(arg),
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }

    let result = scanner::scan_directory(&root, &options)?;

    for m in &result.matches {
        println!(
            "{}:{}:{} [{}] {}: {}",
            m.file.display(),
            m.line,
            m.column,
            m.pattern.severity,
            m.pattern.name,
            m.matched,
        );
    }
    eprintln!(
        "Scanned {} files: {} critical, {} high, {} medium, {} low",
        result.files_scanned,
        result.summary.critical,
        result.summary.high,
        result.summary.medium,
        result.summary.low,
    );

    Ok(if result.has_secrets { ExitCode::from(1) } else { ExitCode::SUCCESS })
}

// ---------------------------------------------------------------------------
// audit
// ---------------------------------------------------------------------------

fn cmd_audit(args: &[String]) -> CmdResult {
    let sub = args.first().map(String::as_str).ok_or("missing audit subcommand")?;
    let mut audit_path = PathBuf::from(AUDIT_FILE);
    let mut format = ExportFormat::Json;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--audit" => {
                i += 1;
                audit_path = PathBuf::from(args.get(i).ok_or("missing audit path")?);
            }
            "--format" => {
                i += 1;
                format = match args.get(i).map(String::as_str) {
                    Some("json") => ExportFormat::Json,
                    Some("csv") => ExportFormat::Csv,
                    Some("text") => ExportFormat::Text,
                    other => return Err(format!("unknown format: {:?}", other).into()),
                };
            }
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }

    let log = AuditLog::new(audit_path);
    match sub {
        "verify" => {
            let verification = log.verify();
            if verification.valid {
                eprintln!("Chain valid: {} entries", verification.entries);
                Ok(ExitCode::SUCCESS)
            } else {
                for err in &verification.errors {
                    eprintln!("entry {}: {}", err.index, err.message);
                }
                Ok(ExitCode::from(1))
            }
        }
        "summary" => {
            let summary = log.summary();
            println!("Entries: {}", summary.entries);
            for (action, count) in &summary.by_action {
                println!("  {}: {}", action, count);
            }
            println!("Actors:");
            for (actor, count) in &summary.by_actor {
                println!("  {}: {}", actor, count);
            }
            if !summary.secret_keys.is_empty() {
                println!(
                    "Keys touched: {}",
                    summary.secret_keys.iter().cloned().collect::<Vec<_>>().join(", ")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        "export" => {
            print!("{}", log.export(format));
            Ok(ExitCode::SUCCESS)
        }
        other => Err(format!("unknown audit subcommand: {}", other).into()),
    }
}

// ---------------------------------------------------------------------------
// rotation
// ---------------------------------------------------------------------------

fn cmd_rotation(args: &[String]) -> CmdResult {
    let sub = args.first().map(String::as_str).ok_or("missing rotation subcommand")?;
    let mut path = PathBuf::from(ROTATION_FILE);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--file" | "-f" => {
                i += 1;
                path = PathBuf::from(args.get(i).ok_or("missing file path")?);
            }
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }

    match sub {
        "status" => {
            let file = RotationFile::load(&path)?;
            let report = file.report(chrono::Utc::now());
            if report.is_empty() {
                eprintln!("No rotation records");
                return Ok(ExitCode::SUCCESS);
            }
            let mut expired = false;
            for entry in &report {
                println!(
                    "{:<30} {:<8} {:>6.1}d of {}d",
                    entry.key, entry.status, entry.age_days, entry.max_age_days
                );
                expired |= entry.status == crate::rotation::RotationStatus::Expired;
            }
            Ok(if expired { ExitCode::from(1) } else { ExitCode::SUCCESS })
        }
        other => Err(format!("unknown rotation subcommand: {}", other).into()),
    }
}
