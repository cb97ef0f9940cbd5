//! Signing identities
//!
//! An [`Identity`] binds a role (requestor or provider) to base-chain key
//! material. The address is always derived from the secret, never supplied.
//!
//! ## Sources
//!
//! - BIP-39 mnemonic (anything containing whitespace), first account on
//!   `m/44'/60'/0'/0/0`
//! - Hex private key, with or without `0x`
//! - Freshly generated 12-word mnemonic

use std::fmt;
use std::path::{Path, PathBuf};

use alloy::{
    primitives::Address,
    signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner},
};
use bip39::Mnemonic;
use eyre::{eyre, Result, WrapErr};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::redact::Redacted;

/// Which side of the lifecycle an identity plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Deposits and pays
    Requestor,
    /// Receives and withdraws
    Provider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requestor => "requestor",
            Role::Provider => "provider",
        }
    }

    /// File name used when the identity is persisted as a keystore
    pub fn keystore_file_name(&self) -> String {
        format!("{}.key.json", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret material an identity was derived from
#[derive(Clone, PartialEq, Eq)]
pub enum SecretSource {
    Mnemonic(String),
    PrivateKey(String),
}

impl SecretSource {
    /// Classify a user-supplied secret: phrases have spaces, keys do not
    pub fn parse(secret: &str) -> Self {
        let trimmed = secret.trim();
        if trimmed.split_whitespace().count() > 1 {
            SecretSource::Mnemonic(trimmed.to_string())
        } else {
            SecretSource::PrivateKey(trimmed.to_string())
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SecretSource::Mnemonic(_) => "mnemonic",
            SecretSource::PrivateKey(_) => "private key",
        }
    }
}

/// A role bound to base-chain key material
#[derive(Clone)]
pub struct Identity {
    role: Role,
    address: Address,
    signer: PrivateKeySigner,
    secret: Redacted<SecretSource>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("role", &self.role)
            .field("address", &self.address)
            .field("secret", &self.secret)
            .finish()
    }
}

impl Identity {
    /// Derive an identity from a mnemonic or private key string
    pub fn from_secret(role: Role, secret: &str) -> Result<Self> {
        match SecretSource::parse(secret) {
            SecretSource::Mnemonic(phrase) => Self::from_mnemonic(role, &phrase),
            SecretSource::PrivateKey(key) => Self::from_private_key(role, &key),
        }
    }

    /// Derive the first account of a BIP-39 mnemonic
    pub fn from_mnemonic(role: Role, phrase: &str) -> Result<Self> {
        Mnemonic::parse(phrase).map_err(|e| eyre!("Invalid mnemonic: {}", e))?;

        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .index(0)
            .map_err(|e| eyre!("Invalid derivation index: {}", e))?
            .build()
            .map_err(|e| eyre!("Failed to derive key from mnemonic: {}", e))?;

        Ok(Self::bind(
            role,
            signer,
            SecretSource::Mnemonic(phrase.to_string()),
        ))
    }

    /// Load a hex private key (32 bytes, optional `0x` prefix)
    pub fn from_private_key(role: Role, private_key: &str) -> Result<Self> {
        let pk = private_key.strip_prefix("0x").unwrap_or(private_key);
        let pk_bytes = hex::decode(pk).map_err(|_| eyre!("Private key is not valid hex"))?;
        if pk_bytes.len() != 32 {
            return Err(eyre!("Private key must be 32 bytes, got {}", pk_bytes.len()));
        }

        let signer: PrivateKeySigner = pk
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;

        Ok(Self::bind(
            role,
            signer,
            SecretSource::PrivateKey(format!("0x{}", pk)),
        ))
    }

    /// Generate a fresh 12-word mnemonic and derive from it
    pub fn generate(role: Role) -> Result<Self> {
        let entropy: [u8; 16] = rand::random();
        let mnemonic =
            Mnemonic::from_entropy(&entropy).map_err(|e| eyre!("Mnemonic generation failed: {}", e))?;
        let identity = Self::from_mnemonic(role, &mnemonic.to_string())?;
        info!(role = %role, address = %identity.address, "Generated new identity");
        Ok(identity)
    }

    fn bind(role: Role, signer: PrivateKeySigner, secret: SecretSource) -> Self {
        let address = signer.address();
        debug!(role = %role, address = %address, source = secret.kind(), "Identity loaded");
        Self {
            role,
            address,
            signer,
            secret: Redacted(secret),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Base-chain signer (for wallets and message signatures)
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn secret(&self) -> &Redacted<SecretSource> {
        &self.secret
    }

    /// Write an encrypted keystore (empty passphrase) named after the role
    /// into `dir` and return its path.
    pub fn save_keystore(&self, dir: &Path) -> Result<PathBuf> {
        let file_name = self.role.keystore_file_name();
        let mut rng = rand::thread_rng();

        PrivateKeySigner::encrypt_keystore(
            dir,
            &mut rng,
            self.signer.to_bytes(),
            "",
            Some(&file_name),
        )
        .map_err(|e| eyre!("Failed to encrypt keystore: {}", e))?;

        let path = dir.join(&file_name);
        normalize_keystore(&path, self.address)?;

        info!(role = %self.role, path = %path.display(), "Keystore saved");
        Ok(path)
    }
}

/// Rewrite a keystore so consumers that expect lowercase key names and a bare
/// hex `address` can read it: top-level keys are lower-cased (`Crypto` ->
/// `crypto`) and `address` is set to the lowercase address without `0x`.
pub fn normalize_keystore(path: &Path, address: Address) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read keystore {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).wrap_err("Keystore is not valid JSON")?;

    let Value::Object(fields) = value else {
        return Err(eyre!("Keystore {} is not a JSON object", path.display()));
    };

    let mut normalized: Map<String, Value> = fields
        .into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect();
    normalized.insert(
        "address".to_string(),
        Value::String(hex::encode(address.as_slice())),
    );

    let output = serde_json::to_string_pretty(&Value::Object(normalized))?;
    std::fs::write(path, output)
        .wrap_err_with(|| format!("Failed to write keystore {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anvil's first account
    const PHRASE: &str = "test test test test test test test test test test test junk";
    const PHRASE_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_secret_source_classification() {
        assert!(matches!(
            SecretSource::parse(PHRASE),
            SecretSource::Mnemonic(_)
        ));
        assert!(matches!(
            SecretSource::parse(PRIVATE_KEY),
            SecretSource::PrivateKey(_)
        ));
    }

    #[test]
    fn test_mnemonic_and_private_key_agree() {
        let from_phrase = Identity::from_secret(Role::Requestor, PHRASE).unwrap();
        let from_key = Identity::from_secret(Role::Provider, PRIVATE_KEY).unwrap();

        assert_eq!(from_phrase.address(), from_key.address());
        assert_eq!(
            from_phrase.address(),
            PHRASE_ADDRESS.parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_private_key_without_prefix() {
        let key = PRIVATE_KEY.trim_start_matches("0x");
        let identity = Identity::from_private_key(Role::Provider, key).unwrap();
        assert_eq!(
            identity.address(),
            PHRASE_ADDRESS.parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_secrets() {
        assert!(Identity::from_private_key(Role::Provider, "0x1234").is_err());
        assert!(Identity::from_private_key(Role::Provider, "not-hex").is_err());
        assert!(Identity::from_mnemonic(Role::Provider, "not a real mnemonic phrase").is_err());
    }

    #[test]
    fn test_generated_identities_differ() {
        let a = Identity::generate(Role::Requestor).unwrap();
        let b = Identity::generate(Role::Requestor).unwrap();
        assert_ne!(a.address(), b.address());
        assert!(matches!(a.secret().expose(), SecretSource::Mnemonic(_)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let identity = Identity::from_private_key(Role::Provider, PRIVATE_KEY).unwrap();
        let debug = format!("{:?}", identity);
        assert!(!debug.contains("ac0974"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_keystore_saved_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let identity = Identity::from_private_key(Role::Requestor, PRIVATE_KEY).unwrap();

        let path = identity.save_keystore(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "requestor.key.json");

        let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json.get("crypto").is_some());
        assert!(json.get("Crypto").is_none());
        assert_eq!(
            json["address"],
            "f39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );

        let restored = PrivateKeySigner::decrypt_keystore(&path, "").unwrap();
        assert_eq!(restored.address(), identity.address());
    }

    #[test]
    fn test_normalize_lowercases_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider.key.json");
        std::fs::write(&path, r#"{"Crypto":{"cipher":"aes-128-ctr"},"Version":3}"#).unwrap();

        normalize_keystore(&path, Address::repeat_byte(0xab)).unwrap();

        let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["crypto"]["cipher"], "aes-128-ctr");
        assert_eq!(json["version"], 3);
        assert_eq!(json["address"], "ab".repeat(20));
    }
}
