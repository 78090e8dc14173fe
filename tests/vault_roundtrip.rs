use nevr_env::error::VaultError;
use nevr_env::vault::{self, VaultFile};

const KEY: &str = "nevr_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
const OTHER_KEY: &str = "nevr_BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

#[test]
fn roundtrip_through_serialized_form() {
    // Scenario: encrypt, serialize, parse, decrypt.
    let plaintext = b"A=1\nB=\"hello world\"\n";
    let sealed = vault::encrypt(plaintext, KEY, None).unwrap();

    let json = serde_json::to_string(&sealed).unwrap();
    let parsed: VaultFile = serde_json::from_str(&json).unwrap();

    let opened = vault::decrypt(&parsed, KEY).unwrap();
    assert_eq!(opened.as_slice(), plaintext.as_slice());
    assert_eq!(parsed.metadata.variables, 2);
}

#[test]
fn roundtrip_various_plaintexts() {
    for plaintext in [
        b"".to_vec(),
        b"A=1\n".to_vec(),
        b"# only a comment\n".to_vec(),
        "UNICODE=\u{00e9}\u{4e16}\u{754c}\n".as_bytes().to_vec(),
        vec![0xABu8; 4096],
    ] {
        let sealed = vault::encrypt(&plaintext, KEY, None).unwrap();
        let opened = vault::decrypt(&sealed, KEY).unwrap();
        assert_eq!(opened.as_slice(), plaintext.as_slice());
    }
}

#[test]
fn wrong_key_fails() {
    let sealed = vault::encrypt(b"A=1\n", KEY, None).unwrap();
    match vault::decrypt(&sealed, OTHER_KEY) {
        Err(VaultError::IntegrityFailed) | Err(VaultError::DecryptFailed) => {}
        other => panic!("expected integrity or decrypt failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn hmac_bit_flips_fail_before_aead() {
    // Scenario: any flipped bit in the stored hmac is an integrity failure.
    let sealed = vault::encrypt(b"A=1\n", KEY, None).unwrap();
    for bit in 0..8 {
        let mut tampered = sealed.clone();
        tampered.hmac[0] ^= 1 << bit;
        assert!(
            matches!(vault::decrypt(&tampered, KEY), Err(VaultError::IntegrityFailed)),
            "bit {} not caught by hmac check",
            bit
        );
    }
    // A flipped bit elsewhere in the hmac is caught too.
    let mut tampered = sealed.clone();
    let last = tampered.hmac.len() - 1;
    tampered.hmac[last] ^= 0x80;
    assert!(matches!(vault::decrypt(&tampered, KEY), Err(VaultError::IntegrityFailed)));
}

#[test]
fn ciphertext_bit_flips_fail() {
    // Scenario: flip the first byte of `encrypted`; the hmac envelope
    // catches it before the AEAD primitive is invoked.
    let sealed = vault::encrypt(b"A=1\nB=2\n", KEY, None).unwrap();
    for bit in 0..8 {
        let mut tampered = sealed.clone();
        tampered.encrypted[0] ^= 1 << bit;
        assert!(
            matches!(vault::decrypt(&tampered, KEY), Err(VaultError::IntegrityFailed)),
            "bit {} not caught",
            bit
        );
    }
}

#[test]
fn truncated_hmac_fails() {
    let mut sealed = vault::encrypt(b"A=1\n", KEY, None).unwrap();
    sealed.hmac.truncate(16);
    assert!(matches!(vault::decrypt(&sealed, KEY), Err(VaultError::IntegrityFailed)));
}

#[test]
fn version_gate_runs_first() {
    let mut sealed = vault::encrypt(b"A=1\n", KEY, None).unwrap();
    sealed.version = 99;
    // Even with a tampered hmac, the version mismatch is reported.
    sealed.hmac[0] ^= 0x01;
    assert!(matches!(
        vault::decrypt(&sealed, KEY),
        Err(VaultError::VersionMismatch { found: 99, expected: 1 })
    ));
}

#[test]
fn reencrypt_preserves_creation_metadata() {
    let mut first = vault::encrypt(b"A=1\n", KEY, None).unwrap();
    first.metadata.created_by = Some("alice".into());

    let second = vault::encrypt(b"A=1\nB=2\nC=3\n", KEY, Some(&first.metadata)).unwrap();
    assert_eq!(second.metadata.created_at, first.metadata.created_at);
    assert_eq!(second.metadata.created_by.as_deref(), Some("alice"));
    assert!(second.metadata.updated_at >= first.metadata.updated_at);
    assert_eq!(second.metadata.variables, 3);

    // Fresh salt and IV per encryption.
    assert_ne!(second.salt, first.salt);
    assert_ne!(second.iv, first.iv);
}

#[test]
fn vault_file_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".nevr-env.vault");

    let sealed = vault::encrypt(b"A=1\n", KEY, None).unwrap();
    vault::store(&path, &sealed).unwrap();

    let loaded = vault::load(&path).unwrap();
    let opened = vault::decrypt(&loaded, KEY).unwrap();
    assert_eq!(opened.as_slice(), b"A=1\n");
}

#[test]
fn missing_vault_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.vault");
    assert!(matches!(vault::load(&path), Err(VaultError::FileNotFound(_))));
}
