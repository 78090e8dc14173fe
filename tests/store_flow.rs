use nevr_env::audit::AuditAction;
use nevr_env::error::VaultError;
use nevr_env::store::VaultStore;
use nevr_env::vault;

use std::fs;
use std::path::{Path, PathBuf};

const KEY: &str = "nevr_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

struct Fixture {
    _dir: tempfile::TempDir,
    store: VaultStore,
    env_path: PathBuf,
}

fn fixture(env_content: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join(".env");
    fs::write(&env_path, env_content).unwrap();
    let store = VaultStore::open_dir(dir.path());
    Fixture { _dir: dir, store, env_path }
}

#[test]
fn push_then_pull_roundtrips() {
    let f = fixture("A=1\nB=\"hello world\"\n");
    let pushed = f.store.push(&f.env_path, KEY).unwrap();
    assert_eq!(pushed.metadata.variables, 2);
    assert!(pushed.metadata.created_by.is_some());

    fs::remove_file(&f.env_path).unwrap();
    let mapping = f.store.pull(&f.env_path, KEY).unwrap();
    assert_eq!(mapping.get("A").unwrap(), "1");
    assert_eq!(mapping.get("B").unwrap(), "hello world");
    assert_eq!(fs::read_to_string(&f.env_path).unwrap(), "A=1\nB=\"hello world\"\n");
}

#[test]
fn repeated_pushes_keep_creation_metadata() {
    let f = fixture("A=1\n");
    let first = f.store.push(&f.env_path, KEY).unwrap();

    fs::write(&f.env_path, "A=1\nB=2\n").unwrap();
    let second = f.store.push(&f.env_path, KEY).unwrap();

    assert_eq!(second.metadata.created_at, first.metadata.created_at);
    assert_eq!(second.metadata.created_by, first.metadata.created_by);
    assert_eq!(second.metadata.variables, 2);
}

#[test]
fn operations_append_audit_entries() {
    let f = fixture("A=1\n");
    f.store.push(&f.env_path, KEY).unwrap();
    f.store.pull(&f.env_path, KEY).unwrap();
    f.store.diff(&f.env_path, KEY).unwrap();

    let entries = f.store.audit().load();
    let actions: Vec<AuditAction> = entries.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::VaultPush, AuditAction::VaultPull, AuditAction::VaultDiff]
    );
    assert!(f.store.audit().verify().valid);

    // Push records key names and state fingerprints.
    assert_eq!(entries[0].target.secret_keys.as_deref(), Some(&["A".to_string()][..]));
    assert!(entries[0].target.after_hash.is_some());
}

#[test]
fn audit_log_never_contains_values() {
    // Property: entry serialization holds no plaintext value bytes.
    let canary = "swordfish-canary-value";
    let f = fixture(&format!("PASSWORD={}\nAPI_KEY=other-{}\n", canary, canary));
    f.store.push(&f.env_path, KEY).unwrap();
    f.store.pull(&f.env_path, KEY).unwrap();
    f.store.diff(&f.env_path, KEY).unwrap();
    f.store.sync(&f.env_path, KEY).unwrap();

    let raw = fs::read_to_string(f.store.audit().path()).unwrap();
    assert!(!raw.contains(canary));
    // Key names are fine; they are the whole point of the log.
    assert!(raw.contains("PASSWORD"));
}

#[test]
fn diff_reports_names_only() {
    let f = fixture("A=1\nB=2\n");
    f.store.push(&f.env_path, KEY).unwrap();

    fs::write(&f.env_path, "A=changed\nC=3\n").unwrap();
    let diff = f.store.diff(&f.env_path, KEY).unwrap();

    assert_eq!(diff.added, vec!["C".to_string()]);
    assert_eq!(diff.removed, vec!["B".to_string()]);
    assert_eq!(diff.changed, vec!["A".to_string()]);
    assert!(!diff.is_empty());
}

#[test]
fn diff_is_empty_when_in_sync() {
    let f = fixture("A=1\n");
    f.store.push(&f.env_path, KEY).unwrap();
    let diff = f.store.diff(&f.env_path, KEY).unwrap();
    assert!(diff.is_empty());
}

#[test]
fn sync_merges_with_local_wins() {
    let f = fixture("SHARED=local\nLOCAL_ONLY=here\n");
    // Seed the vault with a different state.
    let sealed = vault::encrypt(b"SHARED=vault\nVAULT_ONLY=there\n", KEY, None).unwrap();
    vault::store(f.store.vault_path(), &sealed).unwrap();

    let outcome = f.store.sync(&f.env_path, KEY).unwrap();
    assert_eq!(outcome.pulled, vec!["VAULT_ONLY".to_string()]);
    assert_eq!(outcome.pushed, vec!["LOCAL_ONLY".to_string()]);

    // Both sides identical afterwards.
    let local = nevr_env::envfile::parse(&fs::read_to_string(&f.env_path).unwrap());
    assert_eq!(local.get("SHARED").unwrap(), "local");
    assert_eq!(local.get("VAULT_ONLY").unwrap(), "there");
    assert_eq!(local.get("LOCAL_ONLY").unwrap(), "here");

    let reloaded = vault::load(f.store.vault_path()).unwrap();
    let plaintext = vault::decrypt(&reloaded, KEY).unwrap();
    let vault_map = nevr_env::envfile::parse(std::str::from_utf8(&plaintext).unwrap());
    assert_eq!(vault_map, local);
}

#[test]
fn invalid_key_is_rejected_up_front() {
    let f = fixture("A=1\n");
    assert!(matches!(f.store.push(&f.env_path, "not-a-key"), Err(VaultError::InvalidKey)));
    assert!(matches!(f.store.pull(&f.env_path, "nevr_short"), Err(VaultError::InvalidKey)));
}

#[test]
fn missing_env_file_fails_push() {
    let dir = tempfile::tempdir().unwrap();
    let store = VaultStore::open_dir(dir.path());
    let missing = dir.path().join("absent.env");
    assert!(matches!(store.push(&missing, KEY), Err(VaultError::FileNotFound(_))));
}

#[test]
fn tampered_vault_fails_any_read() {
    let f = fixture("A=1\n");
    f.store.push(&f.env_path, KEY).unwrap();

    let mut sealed = vault::load(f.store.vault_path()).unwrap();
    sealed.encrypted[0] ^= 0x01;
    vault::store(f.store.vault_path(), &sealed).unwrap();

    assert!(matches!(f.store.pull(&f.env_path, KEY), Err(VaultError::IntegrityFailed)));
    assert!(matches!(f.store.diff(&f.env_path, KEY), Err(VaultError::IntegrityFailed)));
    assert!(matches!(f.store.sync(&f.env_path, KEY), Err(VaultError::IntegrityFailed)));
}

#[test]
fn store_paths_are_exposed() {
    let dir = tempfile::tempdir().unwrap();
    let store = VaultStore::open_dir(dir.path());
    assert!(store.vault_path().ends_with(Path::new(".nevr-env.vault")));
    assert!(store.audit().path().ends_with(Path::new(".nevr-env.audit.log")));
}
